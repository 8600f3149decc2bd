use crate::application::repos::RepoError;
use crate::domain::error::DomainError;
use crate::domain::ids::ContactTarget;

pub fn map_sqlx_error(err: sqlx::Error) -> RepoError {
    match err {
        sqlx::Error::RowNotFound => RepoError::NotFound,
        sqlx::Error::Database(db) if db.message().contains("duplicate key") => {
            RepoError::Duplicate {
                constraint: db.constraint().unwrap_or("unknown").to_string(),
            }
        }
        sqlx::Error::Database(db)
            if db.message().contains("violates foreign key constraint")
                || db.message().contains("invalid input syntax") =>
        {
            RepoError::InvalidInput {
                message: db.message().to_string(),
            }
        }
        sqlx::Error::Database(db) if db.message().contains("violates") => RepoError::Integrity {
            message: db.message().to_string(),
        },
        sqlx::Error::Database(db)
            if db
                .message()
                .contains("canceling statement due to user request") =>
        {
            RepoError::Timeout
        }
        other => RepoError::from_persistence(other),
    }
}

/// Stored ids are written by this crate; a malformed one means corrupted data.
pub(super) fn corrupt_id(err: DomainError) -> RepoError {
    RepoError::integrity(format!("stored identifier is corrupt: {err}"))
}

pub(super) fn parse_target(raw: &str) -> Result<ContactTarget, RepoError> {
    ContactTarget::parse(raw).map_err(corrupt_id)
}

/// Plain strings for binding an id list to `= ANY($n)`.
pub(super) fn id_strings<'a, I, T>(ids: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a T>,
    T: std::fmt::Display + 'a,
{
    ids.into_iter().map(ToString::to_string).collect()
}
