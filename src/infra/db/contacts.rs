use async_trait::async_trait;
use time::OffsetDateTime;

use crate::application::repos::{ContactsRepo, RepoError};
use crate::domain::entities::ContactRecord;
use crate::domain::ids::{ContactTarget, UserId};
use crate::domain::types::{ContactStatus, ContactType};

use super::PostgresRepositories;
use super::util::{map_sqlx_error, parse_target};

const CONTACT_COLUMNS: &str = "user_id, contact_id, status, created_at, updated_at, deleted_at";

#[derive(sqlx::FromRow)]
struct ContactRow {
    user_id: UserId,
    contact_id: String,
    status: ContactStatus,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
    deleted_at: Option<OffsetDateTime>,
}

impl TryFrom<ContactRow> for ContactRecord {
    type Error = RepoError;

    fn try_from(row: ContactRow) -> Result<Self, Self::Error> {
        Ok(Self {
            user_id: row.user_id,
            contact_id: parse_target(&row.contact_id)?,
            status: row.status,
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted_at: row.deleted_at,
        })
    }
}

#[async_trait]
impl ContactsRepo for PostgresRepositories {
    async fn find_contact(
        &self,
        user: &UserId,
        contact: &ContactTarget,
    ) -> Result<Option<ContactRecord>, RepoError> {
        let row = sqlx::query_as::<_, ContactRow>(&format!(
            "SELECT {CONTACT_COLUMNS} FROM contacts \
             WHERE user_id = $1 AND contact_id = $2 AND deleted_at IS NULL"
        ))
        .bind(user)
        .bind(contact.as_str())
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        row.map(ContactRecord::try_from).transpose()
    }

    async fn list_contacts(
        &self,
        user: &UserId,
        kind: ContactType,
    ) -> Result<Vec<ContactRecord>, RepoError> {
        let rows = sqlx::query_as::<_, ContactRow>(&format!(
            "SELECT {CONTACT_COLUMNS} FROM contacts \
             WHERE user_id = $1 AND contact_type = $2 AND deleted_at IS NULL \
             ORDER BY created_at DESC, id DESC"
        ))
        .bind(user)
        .bind(kind)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(ContactRecord::try_from).collect()
    }
}
