use thiserror::Error;

use crate::{
    application::repos::RepoError, domain::error::DomainError, infra::error::InfraError,
};

/// A request the core understood but refuses to carry out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("user is disabled")]
    UserDisabled,
    #[error("group is disabled")]
    GroupDisabled,
    #[error("the target has blocked you")]
    BlockedByTarget,
    #[error("cannot apply to yourself")]
    SelfApply,
    #[error("already a contact")]
    AlreadyContact,
    #[error("already a member of this group")]
    AlreadyMember,
    #[error("not a member of this group")]
    NotMember,
    #[error("the group owner cannot be removed")]
    CannotRemoveOwner,
    #[error("the group owner cannot leave; dismiss the group instead")]
    OwnerCannotLeave,
    #[error("only the group owner may do this")]
    NotOwner,
    #[error("this group only accepts members through approval")]
    ApprovalRequired,
    #[error("application is not pending")]
    ApplyNotPending,
    #[error("not a contact")]
    NotContact,
    #[error("contact is already blocked")]
    AlreadyBlocked,
    #[error("contact is not blocked")]
    NotBlocked,
    #[error("blocked, cannot open a session")]
    SessionBlocked,
    #[error("session belongs to another user")]
    NotSessionOwner,
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Rejected(#[from] Rejection),
    #[error("{entity} not found")]
    NotFound { entity: &'static str },
    #[error(transparent)]
    Invalid(#[from] DomainError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

impl ServiceError {
    pub fn not_found(entity: &'static str) -> Self {
        Self::NotFound { entity }
    }
}

/// Process-level failure of the `rapport` binary.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }
}

impl From<DomainError> for AppError {
    fn from(error: DomainError) -> Self {
        Self::Validation(error.to_string())
    }
}
