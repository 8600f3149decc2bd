//! Message sessions between a user and another user or a group.

use std::sync::Arc;

use tracing::info;

use crate::application::error::{Rejection, ServiceError};
use crate::application::guards::{require_active_group, require_active_user, require_user};
use crate::application::repos::{
    ContactsRepo, CreateSessionParams, GroupsRepo, SessionsRepo, SessionsWriteRepo, UsersRepo,
};
use crate::cache::CacheTrigger;
use crate::domain::entities::SessionRecord;
use crate::domain::ids::{ContactTarget, SessionId, UserId};

#[derive(Clone)]
pub struct SessionService {
    users: Arc<dyn UsersRepo>,
    groups: Arc<dyn GroupsRepo>,
    contacts: Arc<dyn ContactsRepo>,
    sessions: Arc<dyn SessionsRepo>,
    sessions_write: Arc<dyn SessionsWriteRepo>,
    cache_trigger: Option<Arc<CacheTrigger>>,
}

impl SessionService {
    pub fn new(
        users: Arc<dyn UsersRepo>,
        groups: Arc<dyn GroupsRepo>,
        contacts: Arc<dyn ContactsRepo>,
        sessions: Arc<dyn SessionsRepo>,
        sessions_write: Arc<dyn SessionsWriteRepo>,
    ) -> Self {
        Self {
            users,
            groups,
            contacts,
            sessions,
            sessions_write,
            cache_trigger: None,
        }
    }

    pub fn with_cache_trigger_opt(mut self, trigger: Option<Arc<CacheTrigger>>) -> Self {
        self.cache_trigger = trigger;
        self
    }

    /// Create a session, copying the receiver's display name and avatar.
    pub async fn create_session(
        &self,
        send: &UserId,
        receive: &ContactTarget,
    ) -> Result<SessionRecord, ServiceError> {
        require_user(self.users.as_ref(), send).await?;
        let (receive_name, avatar) = match receive {
            ContactTarget::User(id) => {
                let user = require_active_user(self.users.as_ref(), id).await?;
                (user.nickname, user.avatar)
            }
            ContactTarget::Group(id) => {
                let group = require_active_group(self.groups.as_ref(), id).await?;
                (group.name, group.avatar)
            }
        };

        let session = self
            .sessions_write
            .create_session(CreateSessionParams {
                send_id: send.clone(),
                receive_id: receive.clone(),
                receive_name,
                avatar,
            })
            .await?;
        info!(session = %session.uuid, %send, receive = %receive, "session created");

        if let Some(trigger) = &self.cache_trigger {
            trigger.session_opened(send).await;
        }
        Ok(session)
    }

    /// Return the live session for the pair, creating it when missing.
    pub async fn open_session(
        &self,
        send: &UserId,
        receive: &ContactTarget,
    ) -> Result<SessionId, ServiceError> {
        if let Some(existing) = self.sessions.find_session_between(send, receive).await? {
            return Ok(existing.uuid);
        }
        Ok(self.create_session(send, receive).await?.uuid)
    }

    /// Whether `send` may open a session toward `receive`.
    pub async fn check_open_session_allowed(
        &self,
        send: &UserId,
        receive: &ContactTarget,
    ) -> Result<(), ServiceError> {
        if let Some(edge) = self.contacts.find_contact(send, receive).await?
            && edge.status.is_blocked()
        {
            return Err(Rejection::SessionBlocked.into());
        }
        match receive {
            ContactTarget::User(id) => {
                require_active_user(self.users.as_ref(), id).await?;
            }
            ContactTarget::Group(id) => {
                require_active_group(self.groups.as_ref(), id).await?;
            }
        }
        Ok(())
    }

    /// Tombstone a session; only its sender may delete it.
    pub async fn delete_session(
        &self,
        owner: &UserId,
        session_id: &SessionId,
    ) -> Result<(), ServiceError> {
        let session = self
            .sessions
            .find_session(session_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("session"))?;
        if session.send_id != *owner {
            return Err(Rejection::NotSessionOwner.into());
        }
        self.sessions_write.tombstone_session(session_id).await?;

        if let Some(trigger) = &self.cache_trigger {
            trigger.session_deleted(owner).await;
        }
        Ok(())
    }
}
