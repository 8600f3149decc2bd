use async_trait::async_trait;
use sqlx::types::Json;
use time::OffsetDateTime;

use crate::application::repos::{GroupsRepo, RepoError};
use crate::domain::entities::GroupRecord;
use crate::domain::ids::{GroupId, UserId};
use crate::domain::types::{AddMode, GroupStatus};

use super::PostgresRepositories;
use super::util::{id_strings, map_sqlx_error};

pub(super) const GROUP_COLUMNS: &str = "uuid, name, notice, avatar, owner_id, members, \
                                        member_cnt, add_mode, status, version, created_at, \
                                        updated_at, deleted_at";

#[derive(sqlx::FromRow)]
pub(super) struct GroupRow {
    uuid: GroupId,
    name: String,
    notice: String,
    avatar: String,
    owner_id: UserId,
    members: Json<Vec<UserId>>,
    member_cnt: i32,
    add_mode: AddMode,
    status: GroupStatus,
    version: i64,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
    deleted_at: Option<OffsetDateTime>,
}

impl From<GroupRow> for GroupRecord {
    fn from(row: GroupRow) -> Self {
        Self {
            uuid: row.uuid,
            name: row.name,
            notice: row.notice,
            avatar: row.avatar,
            owner_id: row.owner_id,
            members: row.members.0,
            member_cnt: row.member_cnt,
            add_mode: row.add_mode,
            status: row.status,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted_at: row.deleted_at,
        }
    }
}

#[async_trait]
impl GroupsRepo for PostgresRepositories {
    async fn find_group(&self, id: &GroupId) -> Result<Option<GroupRecord>, RepoError> {
        let row = sqlx::query_as::<_, GroupRow>(&format!(
            "SELECT {GROUP_COLUMNS} FROM groups WHERE uuid = $1 AND deleted_at IS NULL"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(GroupRecord::from))
    }

    async fn find_groups(&self, ids: &[GroupId]) -> Result<Vec<GroupRecord>, RepoError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query_as::<_, GroupRow>(&format!(
            "SELECT {GROUP_COLUMNS} FROM groups WHERE uuid = ANY($1) AND deleted_at IS NULL"
        ))
        .bind(id_strings(ids))
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(GroupRecord::from).collect())
    }

    async fn find_group_any(&self, id: &GroupId) -> Result<Option<GroupRecord>, RepoError> {
        let row = sqlx::query_as::<_, GroupRow>(&format!(
            "SELECT {GROUP_COLUMNS} FROM groups WHERE uuid = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(GroupRecord::from))
    }

    async fn list_owned_groups(&self, owner: &UserId) -> Result<Vec<GroupRecord>, RepoError> {
        let rows = sqlx::query_as::<_, GroupRow>(&format!(
            "SELECT {GROUP_COLUMNS} FROM groups \
             WHERE owner_id = $1 AND deleted_at IS NULL \
             ORDER BY created_at DESC, uuid"
        ))
        .bind(owner)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(GroupRecord::from).collect())
    }

    async fn list_all_groups(&self) -> Result<Vec<GroupRecord>, RepoError> {
        let rows = sqlx::query_as::<_, GroupRow>(&format!(
            "SELECT {GROUP_COLUMNS} FROM groups ORDER BY created_at DESC, uuid"
        ))
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(GroupRecord::from).collect())
    }
}
