use async_trait::async_trait;
use time::OffsetDateTime;

use crate::application::repos::{AppendMessageParams, MessagesRepo, RepoError};
use crate::domain::entities::MessageRecord;
use crate::domain::ids::{GroupId, MessageId, SessionId, UserId};

use super::PostgresRepositories;
use super::util::{map_sqlx_error, parse_target};

const MESSAGE_COLUMNS: &str =
    "uuid, session_id, send_id, send_name, send_avatar, receive_id, content, created_at";

#[derive(sqlx::FromRow)]
struct MessageRow {
    uuid: MessageId,
    session_id: SessionId,
    send_id: UserId,
    send_name: String,
    send_avatar: String,
    receive_id: String,
    content: String,
    created_at: OffsetDateTime,
}

impl TryFrom<MessageRow> for MessageRecord {
    type Error = RepoError;

    fn try_from(row: MessageRow) -> Result<Self, Self::Error> {
        Ok(Self {
            uuid: row.uuid,
            session_id: row.session_id,
            send_id: row.send_id,
            send_name: row.send_name,
            send_avatar: row.send_avatar,
            receive_id: parse_target(&row.receive_id)?,
            content: row.content,
            created_at: row.created_at,
        })
    }
}

#[async_trait]
impl MessagesRepo for PostgresRepositories {
    async fn list_between(&self, a: &UserId, b: &UserId) -> Result<Vec<MessageRecord>, RepoError> {
        let rows = sqlx::query_as::<_, MessageRow>(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages \
             WHERE (send_id = $1 AND receive_id = $2) OR (send_id = $2 AND receive_id = $1) \
             ORDER BY created_at ASC, uuid"
        ))
        .bind(a)
        .bind(b)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(MessageRecord::try_from).collect()
    }

    async fn list_for_group(&self, group: &GroupId) -> Result<Vec<MessageRecord>, RepoError> {
        let rows = sqlx::query_as::<_, MessageRow>(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages \
             WHERE receive_id = $1 \
             ORDER BY created_at ASC, uuid"
        ))
        .bind(group)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(MessageRecord::try_from).collect()
    }

    async fn append_message(
        &self,
        params: AppendMessageParams,
    ) -> Result<MessageRecord, RepoError> {
        let AppendMessageParams {
            session_id,
            send_id,
            send_name,
            send_avatar,
            receive_id,
            content,
        } = params;

        let row = sqlx::query_as::<_, MessageRow>(&format!(
            "INSERT INTO messages \
                 (uuid, session_id, send_id, send_name, send_avatar, receive_id, content) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {MESSAGE_COLUMNS}"
        ))
        .bind(MessageId::generate())
        .bind(&session_id)
        .bind(&send_id)
        .bind(send_name)
        .bind(send_avatar)
        .bind(receive_id.as_str())
        .bind(content)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        MessageRecord::try_from(row)
    }
}
