//! Group lifecycle: creation, joining, leaving, removal, dismissal and profile edits.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::info;

use crate::application::error::{Rejection, ServiceError};
use crate::application::guards::{
    ensure_non_empty, require_active_group, require_active_user, require_group,
};
use crate::application::repos::{GroupsRepo, RelationsRepo, UsersRepo};
use crate::cache::CacheTrigger;
use crate::domain::entities::GroupRecord;
use crate::domain::ids::{GroupId, UserId};
use crate::domain::members;
use crate::domain::types::{AddMode, GroupStatus};

#[derive(Debug, Clone)]
pub struct CreateGroupCommand {
    pub owner: UserId,
    pub name: String,
    pub notice: String,
    pub avatar: String,
    pub add_mode: AddMode,
}

/// Profile edit; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct UpdateGroupCommand {
    pub name: Option<String>,
    pub notice: Option<String>,
    pub avatar: Option<String>,
    pub add_mode: Option<AddMode>,
}

/// Row of the administrative group list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupListEntry {
    pub uuid: GroupId,
    pub name: String,
    pub owner_id: UserId,
    pub status: GroupStatus,
    pub is_deleted: bool,
}

impl From<&GroupRecord> for GroupListEntry {
    fn from(group: &GroupRecord) -> Self {
        Self {
            uuid: group.uuid.clone(),
            name: group.name.clone(),
            owner_id: group.owner_id.clone(),
            status: group.status,
            is_deleted: group.is_deleted(),
        }
    }
}

#[derive(Clone)]
pub struct GroupService {
    users: Arc<dyn UsersRepo>,
    groups: Arc<dyn GroupsRepo>,
    relations: Arc<dyn RelationsRepo>,
    cache_trigger: Option<Arc<CacheTrigger>>,
}

impl GroupService {
    pub fn new(
        users: Arc<dyn UsersRepo>,
        groups: Arc<dyn GroupsRepo>,
        relations: Arc<dyn RelationsRepo>,
    ) -> Self {
        Self {
            users,
            groups,
            relations,
            cache_trigger: None,
        }
    }

    /// Set the cache trigger for this service (optional).
    pub fn with_cache_trigger_opt(mut self, trigger: Option<Arc<CacheTrigger>>) -> Self {
        self.cache_trigger = trigger;
        self
    }

    pub async fn create_group(
        &self,
        command: CreateGroupCommand,
    ) -> Result<GroupRecord, ServiceError> {
        ensure_non_empty(&command.name, "name")?;
        require_active_user(self.users.as_ref(), &command.owner).await?;

        let now = OffsetDateTime::now_utc();
        let group = GroupRecord {
            uuid: GroupId::generate(),
            name: command.name.trim().to_string(),
            notice: command.notice,
            avatar: command.avatar,
            owner_id: command.owner.clone(),
            members: vec![command.owner.clone()],
            member_cnt: 1,
            add_mode: command.add_mode,
            status: GroupStatus::Normal,
            version: 1,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        self.relations.create_group_with_owner(&group).await?;
        info!(group = %group.uuid, owner = %group.owner_id, "group created");

        if let Some(trigger) = &self.cache_trigger {
            trigger.group_created(&group.uuid, &group.owner_id).await;
        }
        Ok(group)
    }

    /// Join a group that admits members without approval.
    pub async fn enter_group_directly(
        &self,
        group_id: &GroupId,
        user_id: &UserId,
    ) -> Result<GroupRecord, ServiceError> {
        let group = require_active_group(self.groups.as_ref(), group_id).await?;
        if group.add_mode == AddMode::Approval {
            return Err(Rejection::ApprovalRequired.into());
        }
        require_active_user(self.users.as_ref(), user_id).await?;
        if members::is_member(&group, user_id) {
            return Err(Rejection::AlreadyMember.into());
        }

        let updated = members::with_member(&group, user_id)?;
        let saved = self.relations.enter_group(&updated, user_id).await?;

        if let Some(trigger) = &self.cache_trigger {
            trigger.member_joined(group_id, user_id).await;
        }
        Ok(saved)
    }

    pub async fn leave_group(
        &self,
        user_id: &UserId,
        group_id: &GroupId,
    ) -> Result<GroupRecord, ServiceError> {
        let group = require_group(self.groups.as_ref(), group_id).await?;
        if group.owner_id == *user_id {
            return Err(Rejection::OwnerCannotLeave.into());
        }
        if !members::is_member(&group, user_id) {
            return Err(Rejection::NotMember.into());
        }

        let updated = members::without_member(&group, user_id)?;
        let saved = self.relations.leave_group(&updated, user_id).await?;

        if let Some(trigger) = &self.cache_trigger {
            trigger.member_left(group_id, user_id).await;
        }
        Ok(saved)
    }

    /// Remove members on the owner's behalf; returns the ids actually removed.
    pub async fn remove_members(
        &self,
        requester: &UserId,
        group_id: &GroupId,
        users: &[UserId],
    ) -> Result<Vec<UserId>, ServiceError> {
        let group = require_group(self.groups.as_ref(), group_id).await?;
        if group.owner_id != *requester {
            return Err(Rejection::NotOwner.into());
        }
        if users.contains(&group.owner_id) {
            return Err(Rejection::CannotRemoveOwner.into());
        }

        let removal = members::without_members(&group, users)?;
        if removal.removed.is_empty() {
            return Ok(removal.removed);
        }
        self.relations
            .remove_members(&removal.group, &removal.removed)
            .await?;
        info!(group = %group_id, removed = removal.removed.len(), "members removed");

        if let Some(trigger) = &self.cache_trigger {
            trigger.members_removed(group_id, &removal.removed).await;
        }
        Ok(removal.removed)
    }

    pub async fn dismiss_group(
        &self,
        requester: &UserId,
        group_id: &GroupId,
    ) -> Result<(), ServiceError> {
        let group = require_group(self.groups.as_ref(), group_id).await?;
        if group.owner_id != *requester {
            return Err(Rejection::NotOwner.into());
        }
        self.relations.dismiss_group(group_id).await?;
        info!(group = %group_id, "group dismissed");

        if let Some(trigger) = &self.cache_trigger {
            trigger.group_dismissed(group_id, &group.owner_id).await;
        }
        Ok(())
    }

    pub async fn update_group_profile(
        &self,
        requester: &UserId,
        group_id: &GroupId,
        command: UpdateGroupCommand,
    ) -> Result<GroupRecord, ServiceError> {
        let mut group = require_group(self.groups.as_ref(), group_id).await?;
        if group.owner_id != *requester {
            return Err(Rejection::NotOwner.into());
        }

        if let Some(name) = command.name {
            ensure_non_empty(&name, "name")?;
            group.name = name.trim().to_string();
        }
        if let Some(notice) = command.notice {
            group.notice = notice;
        }
        if let Some(avatar) = command.avatar {
            group.avatar = avatar;
        }
        if let Some(add_mode) = command.add_mode {
            group.add_mode = add_mode;
        }

        let saved = self.relations.update_group_profile(&group).await?;

        if let Some(trigger) = &self.cache_trigger {
            trigger
                .group_profile_updated(group_id, &saved.owner_id)
                .await;
        }
        Ok(saved)
    }

    pub async fn add_mode(&self, group_id: &GroupId) -> Result<AddMode, ServiceError> {
        Ok(require_group(self.groups.as_ref(), group_id).await?.add_mode)
    }

    /// Every group including dismissed ones.
    pub async fn list_all_groups(&self) -> Result<Vec<GroupListEntry>, ServiceError> {
        let groups = self.groups.list_all_groups().await?;
        Ok(groups.iter().map(GroupListEntry::from).collect())
    }

    pub async fn delete_groups(&self, ids: &[GroupId]) -> Result<(), ServiceError> {
        if ids.is_empty() {
            return Ok(());
        }
        self.relations.delete_groups(ids).await?;
        info!(count = ids.len(), "groups deleted");

        if let Some(trigger) = &self.cache_trigger {
            trigger.groups_deleted(ids).await;
        }
        Ok(())
    }

    pub async fn set_groups_status(
        &self,
        ids: &[GroupId],
        status: GroupStatus,
    ) -> Result<(), ServiceError> {
        if ids.is_empty() {
            return Ok(());
        }
        self.relations.set_groups_status(ids, status).await?;
        info!(count = ids.len(), ?status, "group status changed");

        if let Some(trigger) = &self.cache_trigger {
            trigger.groups_status_changed(ids).await;
        }
        Ok(())
    }
}
