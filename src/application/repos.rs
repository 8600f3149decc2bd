//! Repository traits describing persistence adapters.
//!
//! Read traits return live (non-tombstoned) rows unless a method says
//! otherwise. `RelationsRepo` holds every multi-table mutation; each of its
//! methods commits all of its writes or none of them.

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;

use crate::domain::entities::{
    ContactApplyRecord, ContactRecord, GroupRecord, MessageRecord, SessionRecord, UserRecord,
};
use crate::domain::ids::{ApplyId, ContactTarget, GroupId, SessionId, UserId};
use crate::domain::types::{ApplyStatus, ContactType, GroupStatus, UserStatus};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
    #[error("{entity} `{id}` was modified concurrently")]
    Conflict { entity: &'static str, id: String },
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }

    pub fn integrity(message: impl Into<String>) -> Self {
        Self::Integrity {
            message: message.into(),
        }
    }

    pub fn group_conflict(id: &GroupId) -> Self {
        Self::Conflict {
            entity: "group",
            id: id.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CreateUserParams {
    pub nickname: String,
    pub avatar: String,
    pub telephone: String,
    pub email: String,
    pub signature: String,
    pub is_admin: bool,
}

#[derive(Debug, Clone)]
pub struct CreateApplyParams {
    pub user_id: UserId,
    pub contact_id: ContactTarget,
    pub message: String,
    pub applied_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct CreateSessionParams {
    pub send_id: UserId,
    pub receive_id: ContactTarget,
    pub receive_name: String,
    pub avatar: String,
}

#[derive(Debug, Clone)]
pub struct AppendMessageParams {
    pub session_id: SessionId,
    pub send_id: UserId,
    pub send_name: String,
    pub send_avatar: String,
    pub receive_id: ContactTarget,
    pub content: String,
}

/// What a user purge touched besides the purged rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PurgeOutcome {
    pub users_removed: u64,
    /// Groups owned by purged users, dismissed in the same transaction.
    pub dismissed_groups: Vec<GroupId>,
    /// Groups whose member list lost at least one purged user.
    pub shrunk_groups: Vec<GroupId>,
}

#[async_trait]
pub trait UsersRepo: Send + Sync {
    async fn find_user(&self, id: &UserId) -> Result<Option<UserRecord>, RepoError>;

    /// Live users among `ids`, in no particular order.
    async fn find_users(&self, ids: &[UserId]) -> Result<Vec<UserRecord>, RepoError>;
}

#[async_trait]
pub trait UsersWriteRepo: Send + Sync {
    async fn create_user(&self, params: CreateUserParams) -> Result<UserRecord, RepoError>;

    async fn set_admin(&self, ids: &[UserId], is_admin: bool) -> Result<u64, RepoError>;
}

#[async_trait]
pub trait GroupsRepo: Send + Sync {
    async fn find_group(&self, id: &GroupId) -> Result<Option<GroupRecord>, RepoError>;

    /// Live groups among `ids`, in no particular order.
    async fn find_groups(&self, ids: &[GroupId]) -> Result<Vec<GroupRecord>, RepoError>;

    /// Like `find_group`, but also returns a tombstoned group.
    async fn find_group_any(&self, id: &GroupId) -> Result<Option<GroupRecord>, RepoError>;

    /// Live groups owned by `owner`, newest first.
    async fn list_owned_groups(&self, owner: &UserId) -> Result<Vec<GroupRecord>, RepoError>;

    /// Every group including tombstoned ones, newest first.
    async fn list_all_groups(&self) -> Result<Vec<GroupRecord>, RepoError>;
}

#[async_trait]
pub trait ContactsRepo: Send + Sync {
    async fn find_contact(
        &self,
        user: &UserId,
        contact: &ContactTarget,
    ) -> Result<Option<ContactRecord>, RepoError>;

    /// Live edges of `user` toward targets of `kind`, newest first.
    async fn list_contacts(
        &self,
        user: &UserId,
        kind: ContactType,
    ) -> Result<Vec<ContactRecord>, RepoError>;
}

#[async_trait]
pub trait AppliesRepo: Send + Sync {
    async fn find_apply(
        &self,
        user: &UserId,
        contact: &ContactTarget,
    ) -> Result<Option<ContactApplyRecord>, RepoError>;

    /// Pending applies addressed to `target`, oldest first.
    async fn list_pending_applies(
        &self,
        target: &ContactTarget,
    ) -> Result<Vec<ContactApplyRecord>, RepoError>;
}

#[async_trait]
pub trait AppliesWriteRepo: Send + Sync {
    async fn create_apply(&self, params: CreateApplyParams)
    -> Result<ContactApplyRecord, RepoError>;

    /// Move an apply back to pending with a fresh message and timestamp.
    async fn renew_apply(
        &self,
        id: &ApplyId,
        message: &str,
        applied_at: OffsetDateTime,
    ) -> Result<ContactApplyRecord, RepoError>;

    async fn set_apply_status(&self, id: &ApplyId, status: ApplyStatus) -> Result<(), RepoError>;
}

#[async_trait]
pub trait SessionsRepo: Send + Sync {
    async fn find_session(&self, id: &SessionId) -> Result<Option<SessionRecord>, RepoError>;

    async fn find_session_between(
        &self,
        send: &UserId,
        receive: &ContactTarget,
    ) -> Result<Option<SessionRecord>, RepoError>;

    /// Live sessions opened by `send` toward targets of `kind`, newest first.
    async fn list_sessions(
        &self,
        send: &UserId,
        kind: ContactType,
    ) -> Result<Vec<SessionRecord>, RepoError>;
}

#[async_trait]
pub trait SessionsWriteRepo: Send + Sync {
    async fn create_session(&self, params: CreateSessionParams)
    -> Result<SessionRecord, RepoError>;

    async fn tombstone_session(&self, id: &SessionId) -> Result<(), RepoError>;
}

#[async_trait]
pub trait MessagesRepo: Send + Sync {
    /// Messages exchanged between two users in either direction, oldest first.
    async fn list_between(&self, a: &UserId, b: &UserId) -> Result<Vec<MessageRecord>, RepoError>;

    /// Messages addressed to a group, oldest first.
    async fn list_for_group(&self, group: &GroupId) -> Result<Vec<MessageRecord>, RepoError>;

    async fn append_message(&self, params: AppendMessageParams)
    -> Result<MessageRecord, RepoError>;
}

/// Cascading relationship mutations.
///
/// Group saves compare `GroupRecord::version` with the stored row and fail
/// with `RepoError::Conflict` when they differ; the returned record carries
/// the bumped version.
#[async_trait]
pub trait RelationsRepo: Send + Sync {
    /// Insert a new group together with its owner's membership edge.
    async fn create_group_with_owner(&self, group: &GroupRecord) -> Result<(), RepoError>;

    /// Save the grown member list and insert the newcomer's edge.
    async fn enter_group(
        &self,
        group: &GroupRecord,
        member: &UserId,
    ) -> Result<GroupRecord, RepoError>;

    /// `enter_group` plus marking the join apply as agreed.
    async fn approve_group_apply(
        &self,
        apply: &ApplyId,
        group: &GroupRecord,
        member: &UserId,
    ) -> Result<GroupRecord, RepoError>;

    /// Mark a contact apply as agreed and insert both user edges.
    async fn approve_contact_apply(
        &self,
        apply: &ApplyId,
        owner: &UserId,
        requester: &UserId,
    ) -> Result<(), RepoError>;

    /// Save the shrunk member list and retract the leaver's session, edge and apply.
    async fn leave_group(
        &self,
        group: &GroupRecord,
        member: &UserId,
    ) -> Result<GroupRecord, RepoError>;

    /// Save the shrunk member list and retract sessions, edges and applies of `removed`.
    async fn remove_members(
        &self,
        group: &GroupRecord,
        removed: &[UserId],
    ) -> Result<GroupRecord, RepoError>;

    /// Tombstone a group and everything that references it.
    async fn dismiss_group(&self, id: &GroupId) -> Result<(), RepoError>;

    /// Dismiss cascade over several groups at once.
    async fn delete_groups(&self, ids: &[GroupId]) -> Result<(), RepoError>;

    /// Bulk status change; disabling also retracts sessions addressed to the groups.
    async fn set_groups_status(&self, ids: &[GroupId], status: GroupStatus)
    -> Result<(), RepoError>;

    /// Save profile fields and copy name and avatar onto sessions addressed to the group.
    async fn update_group_profile(&self, group: &GroupRecord) -> Result<GroupRecord, RepoError>;

    async fn delete_contact(&self, owner: &UserId, contact: &UserId) -> Result<(), RepoError>;

    async fn black_contact(&self, owner: &UserId, contact: &UserId) -> Result<(), RepoError>;

    async fn cancel_black_contact(&self, owner: &UserId, contact: &UserId)
    -> Result<(), RepoError>;

    /// Bulk status change; disabling also retracts every session of those users.
    async fn set_users_status(&self, ids: &[UserId], status: UserStatus) -> Result<(), RepoError>;

    /// Physically remove users and every row that references them.
    async fn purge_users(&self, ids: &[UserId]) -> Result<PurgeOutcome, RepoError>;
}
