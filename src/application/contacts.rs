//! User-to-user contact edges: delete, block and unblock, plus contact lookup.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::application::error::{Rejection, ServiceError};
use crate::application::guards::{require_group, require_user};
use crate::application::repos::{ContactsRepo, GroupsRepo, RelationsRepo, UsersRepo};
use crate::cache::CacheTrigger;
use crate::domain::entities::ContactRecord;
use crate::domain::ids::{ContactTarget, GroupId, UserId};
use crate::domain::types::{AddMode, ContactStatus};

/// Details shown for one contact, user or group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContactInfo {
    User {
        contact_id: UserId,
        contact_name: String,
        contact_avatar: String,
        email: String,
        telephone: String,
        signature: String,
    },
    Group {
        contact_id: GroupId,
        contact_name: String,
        contact_avatar: String,
        notice: String,
        add_mode: AddMode,
        members: Vec<UserId>,
        member_cnt: i32,
        owner_id: UserId,
    },
}

#[derive(Clone)]
pub struct ContactService {
    users: Arc<dyn UsersRepo>,
    groups: Arc<dyn GroupsRepo>,
    contacts: Arc<dyn ContactsRepo>,
    relations: Arc<dyn RelationsRepo>,
    cache_trigger: Option<Arc<CacheTrigger>>,
}

impl ContactService {
    pub fn new(
        users: Arc<dyn UsersRepo>,
        groups: Arc<dyn GroupsRepo>,
        contacts: Arc<dyn ContactsRepo>,
        relations: Arc<dyn RelationsRepo>,
    ) -> Self {
        Self {
            users,
            groups,
            contacts,
            relations,
            cache_trigger: None,
        }
    }

    pub fn with_cache_trigger_opt(mut self, trigger: Option<Arc<CacheTrigger>>) -> Self {
        self.cache_trigger = trigger;
        self
    }

    async fn edge(&self, owner: &UserId, contact: &UserId) -> Result<ContactRecord, ServiceError> {
        self.contacts
            .find_contact(owner, &ContactTarget::User(contact.clone()))
            .await?
            .ok_or(ServiceError::Rejected(Rejection::NotContact))
    }

    pub async fn delete_contact(&self, owner: &UserId, contact: &UserId) -> Result<(), ServiceError> {
        self.edge(owner, contact).await?;
        self.relations.delete_contact(owner, contact).await?;
        info!(%owner, %contact, "contact deleted");

        if let Some(trigger) = &self.cache_trigger {
            trigger.contact_deleted(owner, contact).await;
        }
        Ok(())
    }

    pub async fn black_contact(&self, owner: &UserId, contact: &UserId) -> Result<(), ServiceError> {
        let edge = self.edge(owner, contact).await?;
        match edge.status {
            ContactStatus::Black => return Err(Rejection::AlreadyBlocked.into()),
            // Blocking back would overwrite the contact's own block.
            ContactStatus::BeBlack => return Err(Rejection::BlockedByTarget.into()),
            _ => {}
        }
        self.relations.black_contact(owner, contact).await?;
        info!(%owner, %contact, "contact blocked");

        if let Some(trigger) = &self.cache_trigger {
            trigger.contact_blocked(owner, contact).await;
        }
        Ok(())
    }

    /// Lift a block; only the side that blocked may do so.
    pub async fn cancel_black_contact(
        &self,
        owner: &UserId,
        contact: &UserId,
    ) -> Result<(), ServiceError> {
        let blocked = self.edge(owner, contact).await?;
        if blocked.status != ContactStatus::Black {
            return Err(Rejection::NotBlocked.into());
        }
        let reverse = self.edge(contact, owner).await?;
        if reverse.status != ContactStatus::BeBlack {
            return Err(Rejection::NotBlocked.into());
        }

        self.relations.cancel_black_contact(owner, contact).await?;
        info!(%owner, %contact, "contact unblocked");

        if let Some(trigger) = &self.cache_trigger {
            trigger.contact_unblocked(owner, contact).await;
        }
        Ok(())
    }

    pub async fn contact_info(&self, target: &ContactTarget) -> Result<ContactInfo, ServiceError> {
        match target {
            ContactTarget::User(id) => {
                let user = require_user(self.users.as_ref(), id).await?;
                if user.is_disabled() {
                    return Err(Rejection::UserDisabled.into());
                }
                Ok(ContactInfo::User {
                    contact_id: user.uuid,
                    contact_name: user.nickname,
                    contact_avatar: user.avatar,
                    email: user.email,
                    telephone: user.telephone,
                    signature: user.signature,
                })
            }
            ContactTarget::Group(id) => {
                let group = require_group(self.groups.as_ref(), id).await?;
                if group.is_disabled() {
                    return Err(Rejection::GroupDisabled.into());
                }
                Ok(ContactInfo::Group {
                    contact_id: group.uuid,
                    contact_name: group.name,
                    contact_avatar: group.avatar,
                    notice: group.notice,
                    add_mode: group.add_mode,
                    members: group.members,
                    member_cnt: group.member_cnt,
                    owner_id: group.owner_id,
                })
            }
        }
    }
}
