use async_trait::async_trait;
use time::OffsetDateTime;

use crate::application::repos::{
    CreateSessionParams, RepoError, SessionsRepo, SessionsWriteRepo,
};
use crate::domain::entities::SessionRecord;
use crate::domain::ids::{ContactTarget, GroupId, SessionId, UserId};
use crate::domain::types::ContactType;

use super::PostgresRepositories;
use super::util::{map_sqlx_error, parse_target};

const SESSION_COLUMNS: &str = "uuid, send_id, receive_id, receive_name, avatar, created_at, deleted_at";

#[derive(sqlx::FromRow)]
struct SessionRow {
    uuid: SessionId,
    send_id: UserId,
    receive_id: String,
    receive_name: String,
    avatar: String,
    created_at: OffsetDateTime,
    deleted_at: Option<OffsetDateTime>,
}

impl TryFrom<SessionRow> for SessionRecord {
    type Error = RepoError;

    fn try_from(row: SessionRow) -> Result<Self, Self::Error> {
        Ok(Self {
            uuid: row.uuid,
            send_id: row.send_id,
            receive_id: parse_target(&row.receive_id)?,
            receive_name: row.receive_name,
            avatar: row.avatar,
            created_at: row.created_at,
            deleted_at: row.deleted_at,
        })
    }
}

fn receive_prefix(kind: ContactType) -> String {
    let prefix = match kind {
        ContactType::User => UserId::PREFIX,
        ContactType::Group => GroupId::PREFIX,
    };
    format!("{prefix}%")
}

#[async_trait]
impl SessionsRepo for PostgresRepositories {
    async fn find_session(&self, id: &SessionId) -> Result<Option<SessionRecord>, RepoError> {
        let row = sqlx::query_as::<_, SessionRow>(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions WHERE uuid = $1 AND deleted_at IS NULL"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        row.map(SessionRecord::try_from).transpose()
    }

    async fn find_session_between(
        &self,
        send: &UserId,
        receive: &ContactTarget,
    ) -> Result<Option<SessionRecord>, RepoError> {
        let row = sqlx::query_as::<_, SessionRow>(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions \
             WHERE send_id = $1 AND receive_id = $2 AND deleted_at IS NULL \
             ORDER BY created_at DESC \
             LIMIT 1"
        ))
        .bind(send)
        .bind(receive.as_str())
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        row.map(SessionRecord::try_from).transpose()
    }

    async fn list_sessions(
        &self,
        send: &UserId,
        kind: ContactType,
    ) -> Result<Vec<SessionRecord>, RepoError> {
        let rows = sqlx::query_as::<_, SessionRow>(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions \
             WHERE send_id = $1 AND receive_id LIKE $2 AND deleted_at IS NULL \
             ORDER BY created_at DESC, uuid"
        ))
        .bind(send)
        .bind(receive_prefix(kind))
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(SessionRecord::try_from).collect()
    }
}

#[async_trait]
impl SessionsWriteRepo for PostgresRepositories {
    async fn create_session(
        &self,
        params: CreateSessionParams,
    ) -> Result<SessionRecord, RepoError> {
        let CreateSessionParams {
            send_id,
            receive_id,
            receive_name,
            avatar,
        } = params;

        let row = sqlx::query_as::<_, SessionRow>(&format!(
            "INSERT INTO sessions (uuid, send_id, receive_id, receive_name, avatar) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {SESSION_COLUMNS}"
        ))
        .bind(SessionId::generate())
        .bind(&send_id)
        .bind(receive_id.as_str())
        .bind(receive_name)
        .bind(avatar)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        SessionRecord::try_from(row)
    }

    async fn tombstone_session(&self, id: &SessionId) -> Result<(), RepoError> {
        let result = sqlx::query(
            "UPDATE sessions SET deleted_at = now() WHERE uuid = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }
}
