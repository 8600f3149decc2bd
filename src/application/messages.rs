//! Message history. Messages are append-only and never touched by cascades.

use std::sync::Arc;

use crate::application::error::{Rejection, ServiceError};
use crate::application::guards::{require_group, require_user};
use crate::application::repos::{
    AppendMessageParams, GroupsRepo, MessagesRepo, SessionsRepo, UsersRepo,
};
use crate::domain::entities::MessageRecord;
use crate::domain::ids::{GroupId, SessionId, UserId};

#[derive(Clone)]
pub struct MessageService {
    users: Arc<dyn UsersRepo>,
    groups: Arc<dyn GroupsRepo>,
    sessions: Arc<dyn SessionsRepo>,
    messages: Arc<dyn MessagesRepo>,
}

impl MessageService {
    pub fn new(
        users: Arc<dyn UsersRepo>,
        groups: Arc<dyn GroupsRepo>,
        sessions: Arc<dyn SessionsRepo>,
        messages: Arc<dyn MessagesRepo>,
    ) -> Self {
        Self {
            users,
            groups,
            sessions,
            messages,
        }
    }

    /// Messages between two users in either direction, oldest first.
    pub async fn message_list(
        &self,
        user_one: &UserId,
        user_two: &UserId,
    ) -> Result<Vec<MessageRecord>, ServiceError> {
        Ok(self.messages.list_between(user_one, user_two).await?)
    }

    pub async fn group_message_list(
        &self,
        group: &GroupId,
    ) -> Result<Vec<MessageRecord>, ServiceError> {
        Ok(self.messages.list_for_group(group).await?)
    }

    /// Record a message sent through a live session.
    pub async fn record_message(
        &self,
        sender: &UserId,
        session_id: &SessionId,
        content: &str,
    ) -> Result<MessageRecord, ServiceError> {
        let session = self
            .sessions
            .find_session(session_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("session"))?;
        if session.send_id != *sender {
            return Err(Rejection::NotSessionOwner.into());
        }
        let user = require_user(self.users.as_ref(), sender).await?;
        if let Some(group) = session.receive_id.as_group() {
            require_group(self.groups.as_ref(), group).await?;
        }

        let message = self
            .messages
            .append_message(AppendMessageParams {
                session_id: session.uuid,
                send_id: user.uuid,
                send_name: user.nickname,
                send_avatar: user.avatar,
                receive_id: session.receive_id,
                content: content.to_string(),
            })
            .await?;
        Ok(message)
    }
}
