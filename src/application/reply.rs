//! The `(message, data, code)` triple every core operation answers with.

use serde::Serialize;
use tracing::{error, info, warn};

use crate::application::error::{Rejection, ServiceError};
use crate::application::repos::RepoError;

pub const CODE_OK: i32 = 0;
pub const CODE_SYSTEM_ERROR: i32 = -1;
pub const CODE_REJECTED: i32 = -2;
pub const CODE_NOT_FOUND: i32 = -3;
pub const CODE_CANNOT_REMOVE_OWNER: i32 = -4;
pub const CODE_CONFLICT: i32 = -5;

const SYSTEM_ERROR_MESSAGE: &str = "system error";
const CONFLICT_MESSAGE: &str = "modified concurrently, please retry";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reply<T> {
    pub message: String,
    pub data: Option<T>,
    pub code: i32,
}

impl<T> Reply<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            message: message.into(),
            data: Some(data),
            code: CODE_OK,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.code == CODE_OK
    }

    /// Translate a failed operation into a reply, logging it at the level its
    /// kind deserves. Persistence details never reach the message.
    pub fn from_error(operation: &'static str, err: &ServiceError) -> Self {
        let (message, code) = match err {
            ServiceError::Rejected(rejection) => {
                info!(operation, reason = %rejection, "request rejected");
                let code = match rejection {
                    Rejection::CannotRemoveOwner => CODE_CANNOT_REMOVE_OWNER,
                    _ => CODE_REJECTED,
                };
                (rejection.to_string(), code)
            }
            ServiceError::Invalid(domain) => {
                info!(operation, reason = %domain, "request rejected");
                (domain.to_string(), CODE_REJECTED)
            }
            ServiceError::NotFound { entity } => {
                info!(operation, entity, "request target not found");
                (err.to_string(), CODE_NOT_FOUND)
            }
            ServiceError::Repo(RepoError::NotFound) => {
                info!(operation, "request target vanished during write");
                (err.to_string(), CODE_NOT_FOUND)
            }
            ServiceError::Repo(conflict @ RepoError::Conflict { .. }) => {
                warn!(operation, error = %conflict, "concurrent modification");
                (CONFLICT_MESSAGE.to_string(), CODE_CONFLICT)
            }
            ServiceError::Repo(repo) => {
                error!(operation, error = %repo, "persistence failure");
                (SYSTEM_ERROR_MESSAGE.to_string(), CODE_SYSTEM_ERROR)
            }
        };
        Self {
            message,
            data: None,
            code,
        }
    }

    pub fn from_result(
        operation: &'static str,
        success: &'static str,
        result: Result<T, ServiceError>,
    ) -> Self {
        match result {
            Ok(data) => Self::ok(success, data),
            Err(err) => Self::from_error(operation, &err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::DomainError;

    #[test]
    fn rejection_codes() {
        let reply: Reply<()> =
            Reply::from_error("remove_members", &Rejection::CannotRemoveOwner.into());
        assert_eq!(reply.code, CODE_CANNOT_REMOVE_OWNER);

        let reply: Reply<()> = Reply::from_error("leave_group", &Rejection::NotMember.into());
        assert_eq!(reply.code, CODE_REJECTED);
        assert_eq!(reply.message, "not a member of this group");
        assert!(reply.data.is_none());

        let invalid = ServiceError::from(DomainError::validation("name", "empty"));
        assert_eq!(Reply::<()>::from_error("create_group", &invalid).code, CODE_REJECTED);
    }

    #[test]
    fn persistence_details_stay_out_of_message() {
        let err = ServiceError::from(RepoError::from_persistence("connection reset by peer"));
        let reply: Reply<()> = Reply::from_error("dismiss_group", &err);
        assert_eq!(reply.code, CODE_SYSTEM_ERROR);
        assert_eq!(reply.message, SYSTEM_ERROR_MESSAGE);
    }

    #[test]
    fn conflict_and_not_found_codes() {
        let conflict = ServiceError::from(RepoError::Conflict {
            entity: "group",
            id: "G1".to_string(),
        });
        assert_eq!(Reply::<()>::from_error("enter_group", &conflict).code, CODE_CONFLICT);

        let missing = ServiceError::not_found("group");
        let reply = Reply::<()>::from_error("group_info", &missing);
        assert_eq!(reply.code, CODE_NOT_FOUND);
        assert_eq!(reply.message, "group not found");
    }

    #[test]
    fn success_carries_payload() {
        let reply = Reply::from_result("count", "ok", Ok::<_, ServiceError>(3));
        assert!(reply.is_ok());
        assert_eq!(reply.data, Some(3));
    }
}
