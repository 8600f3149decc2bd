use async_trait::async_trait;
use time::OffsetDateTime;

use crate::application::repos::{CreateUserParams, RepoError, UsersRepo, UsersWriteRepo};
use crate::domain::entities::UserRecord;
use crate::domain::ids::UserId;
use crate::domain::types::UserStatus;

use super::PostgresRepositories;
use super::util::{id_strings, map_sqlx_error};

const USER_COLUMNS: &str = "uuid, nickname, avatar, telephone, email, signature, status, \
                            is_admin, created_at, deleted_at";

#[derive(sqlx::FromRow)]
pub(super) struct UserRow {
    uuid: UserId,
    nickname: String,
    avatar: String,
    telephone: String,
    email: String,
    signature: String,
    status: UserStatus,
    is_admin: bool,
    created_at: OffsetDateTime,
    deleted_at: Option<OffsetDateTime>,
}

impl From<UserRow> for UserRecord {
    fn from(row: UserRow) -> Self {
        Self {
            uuid: row.uuid,
            nickname: row.nickname,
            avatar: row.avatar,
            telephone: row.telephone,
            email: row.email,
            signature: row.signature,
            status: row.status,
            is_admin: row.is_admin,
            created_at: row.created_at,
            deleted_at: row.deleted_at,
        }
    }
}

#[async_trait]
impl UsersRepo for PostgresRepositories {
    async fn find_user(&self, id: &UserId) -> Result<Option<UserRecord>, RepoError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE uuid = $1 AND deleted_at IS NULL"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(UserRecord::from))
    }

    async fn find_users(&self, ids: &[UserId]) -> Result<Vec<UserRecord>, RepoError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE uuid = ANY($1) AND deleted_at IS NULL"
        ))
        .bind(id_strings(ids))
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(UserRecord::from).collect())
    }
}

#[async_trait]
impl UsersWriteRepo for PostgresRepositories {
    async fn create_user(&self, params: CreateUserParams) -> Result<UserRecord, RepoError> {
        let CreateUserParams {
            nickname,
            avatar,
            telephone,
            email,
            signature,
            is_admin,
        } = params;

        let row = sqlx::query_as::<_, UserRow>(&format!(
            "INSERT INTO users (uuid, nickname, avatar, telephone, email, signature, is_admin) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(UserId::generate())
        .bind(nickname)
        .bind(avatar)
        .bind(telephone)
        .bind(email)
        .bind(signature)
        .bind(is_admin)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(UserRecord::from(row))
    }

    async fn set_admin(&self, ids: &[UserId], is_admin: bool) -> Result<u64, RepoError> {
        let result = sqlx::query(
            "UPDATE users SET is_admin = $2 WHERE uuid = ANY($1) AND deleted_at IS NULL",
        )
        .bind(id_strings(ids))
        .bind(is_admin)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected())
    }
}
