//! Cascading relationship transactions.
//!
//! Every public method opens one transaction, writes the primary row first
//! and its dependents after, and commits only when all statements succeeded.

use async_trait::async_trait;
use sqlx::PgConnection;
use sqlx::types::Json;

use crate::application::repos::{PurgeOutcome, RelationsRepo, RepoError};
use crate::domain::entities::GroupRecord;
use crate::domain::ids::{ApplyId, ContactTarget, GroupId, UserId};
use crate::domain::types::{ApplyStatus, ContactStatus, GroupStatus, UserStatus};

use super::PostgresRepositories;
use super::groups::{GROUP_COLUMNS, GroupRow};
use super::util::{id_strings, map_sqlx_error};

async fn insert_group(conn: &mut PgConnection, group: &GroupRecord) -> Result<(), RepoError> {
    sqlx::query(
        "INSERT INTO groups \
             (uuid, name, notice, avatar, owner_id, members, member_cnt, add_mode, status, \
              version, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
    )
    .bind(&group.uuid)
    .bind(&group.name)
    .bind(&group.notice)
    .bind(&group.avatar)
    .bind(&group.owner_id)
    .bind(Json(&group.members))
    .bind(group.member_cnt)
    .bind(group.add_mode)
    .bind(group.status)
    .bind(group.version)
    .bind(group.created_at)
    .bind(group.updated_at)
    .execute(&mut *conn)
    .await
    .map_err(map_sqlx_error)?;
    Ok(())
}

/// Conditional save keyed on the version the caller read.
async fn save_group(conn: &mut PgConnection, group: &GroupRecord) -> Result<GroupRecord, RepoError> {
    let row = sqlx::query_as::<_, GroupRow>(&format!(
        "UPDATE groups \
         SET name = $3, notice = $4, avatar = $5, members = $6, member_cnt = $7, \
             add_mode = $8, status = $9, version = version + 1, updated_at = now() \
         WHERE uuid = $1 AND version = $2 AND deleted_at IS NULL \
         RETURNING {GROUP_COLUMNS}"
    ))
    .bind(&group.uuid)
    .bind(group.version)
    .bind(&group.name)
    .bind(&group.notice)
    .bind(&group.avatar)
    .bind(Json(&group.members))
    .bind(group.member_cnt)
    .bind(group.add_mode)
    .bind(group.status)
    .fetch_optional(&mut *conn)
    .await
    .map_err(map_sqlx_error)?;

    if let Some(row) = row {
        return Ok(GroupRecord::from(row));
    }

    let live: Option<(i64,)> =
        sqlx::query_as("SELECT version FROM groups WHERE uuid = $1 AND deleted_at IS NULL")
            .bind(&group.uuid)
            .fetch_optional(&mut *conn)
            .await
            .map_err(map_sqlx_error)?;
    match live {
        Some(_) => Err(RepoError::group_conflict(&group.uuid)),
        None => Err(RepoError::NotFound),
    }
}

async fn insert_contact(
    conn: &mut PgConnection,
    user: &UserId,
    target: &ContactTarget,
    status: ContactStatus,
) -> Result<(), RepoError> {
    sqlx::query(
        "INSERT INTO contacts (user_id, contact_id, contact_type, status) VALUES ($1, $2, $3, $4)",
    )
    .bind(user)
    .bind(target.as_str())
    .bind(target.kind())
    .bind(status)
    .execute(&mut *conn)
    .await
    .map_err(map_sqlx_error)?;
    Ok(())
}

async fn agree_apply(conn: &mut PgConnection, apply: &ApplyId) -> Result<(), RepoError> {
    let result = sqlx::query(
        "UPDATE contact_applies SET status = $2 WHERE uuid = $1 AND deleted_at IS NULL",
    )
    .bind(apply)
    .bind(ApplyStatus::Agree)
    .execute(&mut *conn)
    .await
    .map_err(map_sqlx_error)?;

    if result.rows_affected() == 0 {
        return Err(RepoError::NotFound);
    }
    Ok(())
}

/// Tombstone sessions, edges and applies that point at any of `groups`.
async fn retract_group_dependents(
    conn: &mut PgConnection,
    groups: &[String],
) -> Result<(), RepoError> {
    sqlx::query(
        "UPDATE sessions SET deleted_at = now() \
         WHERE receive_id = ANY($1) AND deleted_at IS NULL",
    )
    .bind(groups)
    .execute(&mut *conn)
    .await
    .map_err(map_sqlx_error)?;

    sqlx::query(
        "UPDATE contacts SET deleted_at = now(), updated_at = now() \
         WHERE contact_id = ANY($1) AND deleted_at IS NULL",
    )
    .bind(groups)
    .execute(&mut *conn)
    .await
    .map_err(map_sqlx_error)?;

    sqlx::query(
        "UPDATE contact_applies SET deleted_at = now() \
         WHERE contact_id = ANY($1) AND deleted_at IS NULL",
    )
    .bind(groups)
    .execute(&mut *conn)
    .await
    .map_err(map_sqlx_error)?;

    Ok(())
}

async fn dismiss_many(conn: &mut PgConnection, groups: &[String]) -> Result<(), RepoError> {
    sqlx::query(
        "UPDATE groups SET deleted_at = now(), updated_at = now(), version = version + 1 \
         WHERE uuid = ANY($1) AND deleted_at IS NULL",
    )
    .bind(groups)
    .execute(&mut *conn)
    .await
    .map_err(map_sqlx_error)?;

    retract_group_dependents(conn, groups).await
}

/// Tombstone what `members` hold toward `group`, marking their edges with `status`.
async fn retract_memberships(
    conn: &mut PgConnection,
    group: &GroupId,
    members: &[String],
    status: ContactStatus,
) -> Result<(), RepoError> {
    sqlx::query(
        "UPDATE sessions SET deleted_at = now() \
         WHERE receive_id = $1 AND send_id = ANY($2) AND deleted_at IS NULL",
    )
    .bind(group)
    .bind(members)
    .execute(&mut *conn)
    .await
    .map_err(map_sqlx_error)?;

    sqlx::query(
        "UPDATE contacts SET status = $3, deleted_at = now(), updated_at = now() \
         WHERE contact_id = $1 AND user_id = ANY($2) AND deleted_at IS NULL",
    )
    .bind(group)
    .bind(members)
    .bind(status)
    .execute(&mut *conn)
    .await
    .map_err(map_sqlx_error)?;

    sqlx::query(
        "UPDATE contact_applies SET deleted_at = now() \
         WHERE contact_id = $1 AND user_id = ANY($2) AND deleted_at IS NULL",
    )
    .bind(group)
    .bind(members)
    .execute(&mut *conn)
    .await
    .map_err(map_sqlx_error)?;

    Ok(())
}

async fn set_edge_status(
    conn: &mut PgConnection,
    user: &UserId,
    contact: &UserId,
    status: ContactStatus,
    tombstone: bool,
) -> Result<(), RepoError> {
    let sql = if tombstone {
        "UPDATE contacts SET status = $3, deleted_at = now(), updated_at = now() \
         WHERE user_id = $1 AND contact_id = $2 AND deleted_at IS NULL"
    } else {
        "UPDATE contacts SET status = $3, updated_at = now() \
         WHERE user_id = $1 AND contact_id = $2 AND deleted_at IS NULL"
    };
    sqlx::query(sql)
        .bind(user)
        .bind(contact)
        .bind(status)
        .execute(&mut *conn)
        .await
        .map_err(map_sqlx_error)?;
    Ok(())
}

#[async_trait]
impl RelationsRepo for PostgresRepositories {
    async fn create_group_with_owner(&self, group: &GroupRecord) -> Result<(), RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;
        insert_group(&mut tx, group).await?;
        insert_contact(
            &mut tx,
            &group.owner_id,
            &ContactTarget::Group(group.uuid.clone()),
            ContactStatus::Normal,
        )
        .await?;
        tx.commit().await.map_err(map_sqlx_error)
    }

    async fn enter_group(
        &self,
        group: &GroupRecord,
        member: &UserId,
    ) -> Result<GroupRecord, RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;
        let saved = save_group(&mut tx, group).await?;
        insert_contact(
            &mut tx,
            member,
            &ContactTarget::Group(group.uuid.clone()),
            ContactStatus::Normal,
        )
        .await?;
        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(saved)
    }

    async fn approve_group_apply(
        &self,
        apply: &ApplyId,
        group: &GroupRecord,
        member: &UserId,
    ) -> Result<GroupRecord, RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;
        let saved = save_group(&mut tx, group).await?;
        insert_contact(
            &mut tx,
            member,
            &ContactTarget::Group(group.uuid.clone()),
            ContactStatus::Normal,
        )
        .await?;
        agree_apply(&mut tx, apply).await?;
        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(saved)
    }

    async fn approve_contact_apply(
        &self,
        apply: &ApplyId,
        owner: &UserId,
        requester: &UserId,
    ) -> Result<(), RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;
        agree_apply(&mut tx, apply).await?;
        insert_contact(
            &mut tx,
            owner,
            &ContactTarget::User(requester.clone()),
            ContactStatus::Normal,
        )
        .await?;
        insert_contact(
            &mut tx,
            requester,
            &ContactTarget::User(owner.clone()),
            ContactStatus::Normal,
        )
        .await?;
        tx.commit().await.map_err(map_sqlx_error)
    }

    async fn leave_group(
        &self,
        group: &GroupRecord,
        member: &UserId,
    ) -> Result<GroupRecord, RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;
        let saved = save_group(&mut tx, group).await?;
        retract_memberships(
            &mut tx,
            &group.uuid,
            &[member.to_string()],
            ContactStatus::QuitGroup,
        )
        .await?;
        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(saved)
    }

    async fn remove_members(
        &self,
        group: &GroupRecord,
        removed: &[UserId],
    ) -> Result<GroupRecord, RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;
        let saved = save_group(&mut tx, group).await?;
        retract_memberships(
            &mut tx,
            &group.uuid,
            &id_strings(removed),
            ContactStatus::KickOutGroup,
        )
        .await?;
        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(saved)
    }

    async fn dismiss_group(&self, id: &GroupId) -> Result<(), RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;
        let result = sqlx::query(
            "UPDATE groups SET deleted_at = now(), updated_at = now(), version = version + 1 \
             WHERE uuid = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;
        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        retract_group_dependents(&mut tx, &[id.to_string()]).await?;
        tx.commit().await.map_err(map_sqlx_error)
    }

    async fn delete_groups(&self, ids: &[GroupId]) -> Result<(), RepoError> {
        let ids = id_strings(ids);
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;
        dismiss_many(&mut tx, &ids).await?;
        tx.commit().await.map_err(map_sqlx_error)
    }

    async fn set_groups_status(
        &self,
        ids: &[GroupId],
        status: GroupStatus,
    ) -> Result<(), RepoError> {
        let ids = id_strings(ids);
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;
        sqlx::query(
            "UPDATE groups SET status = $2, updated_at = now(), version = version + 1 \
             WHERE uuid = ANY($1) AND deleted_at IS NULL",
        )
        .bind(&ids)
        .bind(status)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        if status == GroupStatus::Disable {
            sqlx::query(
                "UPDATE sessions SET deleted_at = now() \
                 WHERE receive_id = ANY($1) AND deleted_at IS NULL",
            )
            .bind(&ids)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        }
        tx.commit().await.map_err(map_sqlx_error)
    }

    async fn update_group_profile(&self, group: &GroupRecord) -> Result<GroupRecord, RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;
        let saved = save_group(&mut tx, group).await?;
        sqlx::query(
            "UPDATE sessions SET receive_name = $2, avatar = $3 \
             WHERE receive_id = $1 AND deleted_at IS NULL",
        )
        .bind(&saved.uuid)
        .bind(&saved.name)
        .bind(&saved.avatar)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;
        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(saved)
    }

    async fn delete_contact(&self, owner: &UserId, contact: &UserId) -> Result<(), RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;
        set_edge_status(&mut tx, owner, contact, ContactStatus::Delete, true).await?;
        set_edge_status(&mut tx, contact, owner, ContactStatus::BeDelete, true).await?;

        sqlx::query(
            "UPDATE sessions SET deleted_at = now() \
             WHERE ((send_id = $1 AND receive_id = $2) OR (send_id = $2 AND receive_id = $1)) \
               AND deleted_at IS NULL",
        )
        .bind(owner)
        .bind(contact)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        sqlx::query(
            "UPDATE contact_applies SET deleted_at = now() \
             WHERE ((user_id = $1 AND contact_id = $2) OR (user_id = $2 AND contact_id = $1)) \
               AND deleted_at IS NULL",
        )
        .bind(owner)
        .bind(contact)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)
    }

    async fn black_contact(&self, owner: &UserId, contact: &UserId) -> Result<(), RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;
        set_edge_status(&mut tx, owner, contact, ContactStatus::Black, false).await?;
        set_edge_status(&mut tx, contact, owner, ContactStatus::BeBlack, false).await?;

        // Only the blocker's outbound session goes away.
        sqlx::query(
            "UPDATE sessions SET deleted_at = now() \
             WHERE send_id = $1 AND receive_id = $2 AND deleted_at IS NULL",
        )
        .bind(owner)
        .bind(contact)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)
    }

    async fn cancel_black_contact(
        &self,
        owner: &UserId,
        contact: &UserId,
    ) -> Result<(), RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;
        set_edge_status(&mut tx, owner, contact, ContactStatus::Normal, false).await?;
        set_edge_status(&mut tx, contact, owner, ContactStatus::Normal, false).await?;
        tx.commit().await.map_err(map_sqlx_error)
    }

    async fn set_users_status(&self, ids: &[UserId], status: UserStatus) -> Result<(), RepoError> {
        let ids = id_strings(ids);
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;
        sqlx::query("UPDATE users SET status = $2 WHERE uuid = ANY($1) AND deleted_at IS NULL")
            .bind(&ids)
            .bind(status)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        if status == UserStatus::Disable {
            sqlx::query(
                "UPDATE sessions SET deleted_at = now() \
                 WHERE (send_id = ANY($1) OR receive_id = ANY($1)) AND deleted_at IS NULL",
            )
            .bind(&ids)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        }
        tx.commit().await.map_err(map_sqlx_error)
    }

    async fn purge_users(&self, ids: &[UserId]) -> Result<PurgeOutcome, RepoError> {
        let raw_ids = id_strings(ids);
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        let owned: Vec<(GroupId,)> = sqlx::query_as(
            "SELECT uuid FROM groups WHERE owner_id = ANY($1) AND deleted_at IS NULL FOR UPDATE",
        )
        .bind(&raw_ids)
        .fetch_all(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;
        let dismissed_groups: Vec<GroupId> = owned.into_iter().map(|(id,)| id).collect();
        if !dismissed_groups.is_empty() {
            dismiss_many(&mut tx, &id_strings(&dismissed_groups)).await?;
        }

        let joined = sqlx::query_as::<_, GroupRow>(&format!(
            "SELECT {GROUP_COLUMNS} FROM groups \
             WHERE members ?| $1 AND deleted_at IS NULL \
             FOR UPDATE"
        ))
        .bind(&raw_ids)
        .fetch_all(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        let mut shrunk_groups = Vec::with_capacity(joined.len());
        for row in joined {
            let mut group = GroupRecord::from(row);
            group.members.retain(|member| !ids.contains(member));
            group.member_cnt = i32::try_from(group.members.len())
                .map_err(|_| RepoError::integrity("member list exceeds supported size"))?;
            save_group(&mut tx, &group).await?;
            shrunk_groups.push(group.uuid);
        }

        for sql in [
            "DELETE FROM sessions WHERE send_id = ANY($1) OR receive_id = ANY($1)",
            "DELETE FROM contacts WHERE user_id = ANY($1) OR contact_id = ANY($1)",
            "DELETE FROM contact_applies WHERE user_id = ANY($1) OR contact_id = ANY($1)",
        ] {
            sqlx::query(sql)
                .bind(&raw_ids)
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;
        }

        let removed = sqlx::query("DELETE FROM users WHERE uuid = ANY($1)")
            .bind(&raw_ids)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(PurgeOutcome {
            users_removed: removed.rows_affected(),
            dismissed_groups,
            shrunk_groups,
        })
    }
}
