use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    #[error("{entity} id `{raw}` is invalid: {reason}")]
    InvalidId {
        entity: &'static str,
        raw: String,
        reason: &'static str,
    },
    #[error("validation failed for `{field}`: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },
    #[error("membership invariant violated: {message}")]
    Membership { message: String },
}

impl DomainError {
    pub fn invalid_id(entity: &'static str, raw: &str, reason: &'static str) -> Self {
        Self::InvalidId {
            entity,
            raw: raw.to_string(),
            reason,
        }
    }

    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    pub fn membership(message: impl Into<String>) -> Self {
        Self::Membership {
            message: message.into(),
        }
    }
}
