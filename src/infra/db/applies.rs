use async_trait::async_trait;
use time::OffsetDateTime;

use crate::application::repos::{AppliesRepo, AppliesWriteRepo, CreateApplyParams, RepoError};
use crate::domain::entities::ContactApplyRecord;
use crate::domain::ids::{ApplyId, ContactTarget, UserId};
use crate::domain::types::ApplyStatus;

use super::PostgresRepositories;
use super::util::{map_sqlx_error, parse_target};

const APPLY_COLUMNS: &str = "uuid, user_id, contact_id, status, message, last_apply_at, deleted_at";

#[derive(sqlx::FromRow)]
struct ApplyRow {
    uuid: ApplyId,
    user_id: UserId,
    contact_id: String,
    status: ApplyStatus,
    message: String,
    last_apply_at: OffsetDateTime,
    deleted_at: Option<OffsetDateTime>,
}

impl TryFrom<ApplyRow> for ContactApplyRecord {
    type Error = RepoError;

    fn try_from(row: ApplyRow) -> Result<Self, Self::Error> {
        Ok(Self {
            uuid: row.uuid,
            user_id: row.user_id,
            contact_id: parse_target(&row.contact_id)?,
            status: row.status,
            message: row.message,
            last_apply_at: row.last_apply_at,
            deleted_at: row.deleted_at,
        })
    }
}

#[async_trait]
impl AppliesRepo for PostgresRepositories {
    async fn find_apply(
        &self,
        user: &UserId,
        contact: &ContactTarget,
    ) -> Result<Option<ContactApplyRecord>, RepoError> {
        let row = sqlx::query_as::<_, ApplyRow>(&format!(
            "SELECT {APPLY_COLUMNS} FROM contact_applies \
             WHERE user_id = $1 AND contact_id = $2 AND deleted_at IS NULL"
        ))
        .bind(user)
        .bind(contact.as_str())
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        row.map(ContactApplyRecord::try_from).transpose()
    }

    async fn list_pending_applies(
        &self,
        target: &ContactTarget,
    ) -> Result<Vec<ContactApplyRecord>, RepoError> {
        let rows = sqlx::query_as::<_, ApplyRow>(&format!(
            "SELECT {APPLY_COLUMNS} FROM contact_applies \
             WHERE contact_id = $1 AND status = $2 AND deleted_at IS NULL \
             ORDER BY last_apply_at ASC, uuid"
        ))
        .bind(target.as_str())
        .bind(ApplyStatus::Pending)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(ContactApplyRecord::try_from).collect()
    }
}

#[async_trait]
impl AppliesWriteRepo for PostgresRepositories {
    async fn create_apply(
        &self,
        params: CreateApplyParams,
    ) -> Result<ContactApplyRecord, RepoError> {
        let CreateApplyParams {
            user_id,
            contact_id,
            message,
            applied_at,
        } = params;

        let row = sqlx::query_as::<_, ApplyRow>(&format!(
            "INSERT INTO contact_applies \
                 (uuid, user_id, contact_id, contact_type, status, message, last_apply_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {APPLY_COLUMNS}"
        ))
        .bind(ApplyId::generate())
        .bind(&user_id)
        .bind(contact_id.as_str())
        .bind(contact_id.kind())
        .bind(ApplyStatus::Pending)
        .bind(message)
        .bind(applied_at)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        ContactApplyRecord::try_from(row)
    }

    async fn renew_apply(
        &self,
        id: &ApplyId,
        message: &str,
        applied_at: OffsetDateTime,
    ) -> Result<ContactApplyRecord, RepoError> {
        let row = sqlx::query_as::<_, ApplyRow>(&format!(
            "UPDATE contact_applies \
             SET status = $2, message = $3, last_apply_at = $4 \
             WHERE uuid = $1 AND deleted_at IS NULL \
             RETURNING {APPLY_COLUMNS}"
        ))
        .bind(id)
        .bind(ApplyStatus::Pending)
        .bind(message)
        .bind(applied_at)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        ContactApplyRecord::try_from(row)
    }

    async fn set_apply_status(&self, id: &ApplyId, status: ApplyStatus) -> Result<(), RepoError> {
        let result = sqlx::query(
            "UPDATE contact_applies SET status = $2 WHERE uuid = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .bind(status)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }
}
