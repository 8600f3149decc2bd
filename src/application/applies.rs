//! Contact and join applications.
//!
//! One apply row exists per `(requester, target)` pair and moves through
//! `pending → agree | refuse | black`. Agreed and refused applies return to
//! pending when the requester applies again; a blocked one never does.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::info;

use crate::application::error::{Rejection, ServiceError};
use crate::application::guards::{
    require_active_group, require_active_user, require_group, require_user,
};
use crate::application::repos::{
    AppliesRepo, AppliesWriteRepo, ContactsRepo, CreateApplyParams, GroupsRepo, RelationsRepo,
    UsersRepo,
};
use crate::cache::CacheTrigger;
use crate::domain::entities::ContactApplyRecord;
use crate::domain::ids::{ApplyId, ContactTarget, UserId};
use crate::domain::members;
use crate::domain::types::{ApplyStatus, ContactStatus};

/// A pending application as shown to the user or group it targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingApply {
    pub apply_id: ApplyId,
    pub contact_id: UserId,
    pub contact_name: String,
    pub contact_avatar: String,
    pub message: String,
}

#[derive(Clone)]
pub struct ApplyService {
    users: Arc<dyn UsersRepo>,
    groups: Arc<dyn GroupsRepo>,
    contacts: Arc<dyn ContactsRepo>,
    applies: Arc<dyn AppliesRepo>,
    applies_write: Arc<dyn AppliesWriteRepo>,
    relations: Arc<dyn RelationsRepo>,
    cache_trigger: Option<Arc<CacheTrigger>>,
}

impl ApplyService {
    pub fn new(
        users: Arc<dyn UsersRepo>,
        groups: Arc<dyn GroupsRepo>,
        contacts: Arc<dyn ContactsRepo>,
        applies: Arc<dyn AppliesRepo>,
        applies_write: Arc<dyn AppliesWriteRepo>,
        relations: Arc<dyn RelationsRepo>,
    ) -> Self {
        Self {
            users,
            groups,
            contacts,
            applies,
            applies_write,
            relations,
            cache_trigger: None,
        }
    }

    pub fn with_cache_trigger_opt(mut self, trigger: Option<Arc<CacheTrigger>>) -> Self {
        self.cache_trigger = trigger;
        self
    }

    /// File or renew an application from `requester` to `target`.
    pub async fn apply(
        &self,
        requester: &UserId,
        target: &ContactTarget,
        message: &str,
    ) -> Result<ContactApplyRecord, ServiceError> {
        if target.as_user() == Some(requester) {
            return Err(Rejection::SelfApply.into());
        }
        require_active_user(self.users.as_ref(), requester).await?;

        match target {
            ContactTarget::User(id) => {
                require_active_user(self.users.as_ref(), id).await?;
                if let Some(edge) = self.contacts.find_contact(requester, target).await? {
                    return Err(match edge.status {
                        ContactStatus::BeBlack => Rejection::BlockedByTarget,
                        _ => Rejection::AlreadyContact,
                    }
                    .into());
                }
            }
            ContactTarget::Group(id) => {
                let group = require_active_group(self.groups.as_ref(), id).await?;
                if members::is_member(&group, requester) {
                    return Err(Rejection::AlreadyMember.into());
                }
            }
        }

        let now = OffsetDateTime::now_utc();
        let record = match self.applies.find_apply(requester, target).await? {
            None => {
                self.applies_write
                    .create_apply(CreateApplyParams {
                        user_id: requester.clone(),
                        contact_id: target.clone(),
                        message: message.to_string(),
                        applied_at: now,
                    })
                    .await?
            }
            Some(existing) if existing.status == ApplyStatus::Black => {
                return Err(Rejection::BlockedByTarget.into());
            }
            Some(existing) => {
                self.applies_write
                    .renew_apply(&existing.uuid, message, now)
                    .await?
            }
        };

        info!(apply = %record.uuid, %requester, target = %target, "application filed");
        Ok(record)
    }

    async fn pending_apply(
        &self,
        target: &ContactTarget,
        requester: &UserId,
    ) -> Result<ContactApplyRecord, ServiceError> {
        let apply = self
            .applies
            .find_apply(requester, target)
            .await?
            .ok_or_else(|| ServiceError::not_found("application"))?;
        if apply.status != ApplyStatus::Pending {
            return Err(Rejection::ApplyNotPending.into());
        }
        Ok(apply)
    }

    /// Accept `requester`'s pending application to `target`.
    pub async fn pass(
        &self,
        target: &ContactTarget,
        requester: &UserId,
    ) -> Result<(), ServiceError> {
        let apply = self.pending_apply(target, requester).await?;

        match target {
            ContactTarget::User(owner) => {
                require_active_user(self.users.as_ref(), requester).await?;
                self.relations
                    .approve_contact_apply(&apply.uuid, owner, requester)
                    .await?;
                info!(apply = %apply.uuid, %owner, %requester, "contact application passed");

                if let Some(trigger) = &self.cache_trigger {
                    trigger.contact_added(owner, requester).await;
                }
            }
            ContactTarget::Group(group_id) => {
                let group = require_active_group(self.groups.as_ref(), group_id).await?;
                if members::is_member(&group, requester) {
                    return Err(Rejection::AlreadyMember.into());
                }
                let updated = members::with_member(&group, requester)?;
                self.relations
                    .approve_group_apply(&apply.uuid, &updated, requester)
                    .await?;
                info!(apply = %apply.uuid, group = %group_id, %requester, "join application passed");

                if let Some(trigger) = &self.cache_trigger {
                    trigger.member_joined(group_id, requester).await;
                }
            }
        }
        Ok(())
    }

    pub async fn refuse(
        &self,
        target: &ContactTarget,
        requester: &UserId,
    ) -> Result<(), ServiceError> {
        let apply = self.pending_apply(target, requester).await?;
        self.applies_write
            .set_apply_status(&apply.uuid, ApplyStatus::Refuse)
            .await?;
        info!(apply = %apply.uuid, "application refused");
        Ok(())
    }

    /// Block the requester: the apply stays `black` and further applies are rejected.
    pub async fn black(
        &self,
        target: &ContactTarget,
        requester: &UserId,
    ) -> Result<(), ServiceError> {
        let apply = self
            .applies
            .find_apply(requester, target)
            .await?
            .ok_or_else(|| ServiceError::not_found("application"))?;
        self.applies_write
            .set_apply_status(&apply.uuid, ApplyStatus::Black)
            .await?;
        info!(apply = %apply.uuid, "application blocked");
        Ok(())
    }

    /// Pending applications addressed to `target`, oldest first.
    pub async fn list_pending(
        &self,
        target: &ContactTarget,
    ) -> Result<Vec<PendingApply>, ServiceError> {
        match target {
            ContactTarget::User(id) => {
                require_user(self.users.as_ref(), id).await?;
            }
            ContactTarget::Group(id) => {
                require_group(self.groups.as_ref(), id).await?;
            }
        }

        let applies = self.applies.list_pending_applies(target).await?;
        let requesters: Vec<UserId> = applies.iter().map(|a| a.user_id.clone()).collect();
        let users: HashMap<UserId, _> = self
            .users
            .find_users(&requesters)
            .await?
            .into_iter()
            .map(|user| (user.uuid.clone(), user))
            .collect();

        Ok(applies
            .into_iter()
            .filter_map(|apply| {
                let user = users.get(&apply.user_id)?;
                Some(PendingApply {
                    apply_id: apply.uuid,
                    contact_id: apply.user_id,
                    contact_name: user.nickname.clone(),
                    contact_avatar: user.avatar.clone(),
                    message: apply.message,
                })
            })
            .collect())
    }
}
