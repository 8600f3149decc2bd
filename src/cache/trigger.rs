//! Cache trigger service.
//!
//! Write paths call one method per committed change; the event is queued and
//! consumed right away so the next read rebuilds from the store.

use std::sync::Arc;

use tracing::debug;

use crate::domain::ids::{GroupId, UserId};

use super::config::CacheConfig;
use super::consumer::CacheConsumer;
use super::events::{EventKind, EventQueue};

pub struct CacheTrigger {
    config: CacheConfig,
    queue: Arc<EventQueue>,
    consumer: Arc<CacheConsumer>,
}

impl CacheTrigger {
    pub fn new(config: CacheConfig, queue: Arc<EventQueue>, consumer: Arc<CacheConsumer>) -> Self {
        Self {
            config,
            queue,
            consumer,
        }
    }

    /// Publish an event and optionally consume immediately.
    pub async fn trigger(&self, kind: EventKind, consume_now: bool) {
        if !self.config.is_enabled() {
            debug!(event_kind = ?kind, "Cache trigger skipped: cache disabled");
            return;
        }

        self.queue.publish(kind);

        if consume_now {
            self.consumer.consume().await;
        }
    }

    pub async fn group_created(&self, group: &GroupId, owner: &UserId) {
        self.trigger(
            EventKind::GroupCreated {
                group: group.clone(),
                owner: owner.clone(),
            },
            true,
        )
        .await;
    }

    pub async fn member_joined(&self, group: &GroupId, user: &UserId) {
        self.trigger(
            EventKind::MemberJoined {
                group: group.clone(),
                user: user.clone(),
            },
            true,
        )
        .await;
    }

    pub async fn member_left(&self, group: &GroupId, user: &UserId) {
        self.trigger(
            EventKind::MemberLeft {
                group: group.clone(),
                user: user.clone(),
            },
            true,
        )
        .await;
    }

    pub async fn members_removed(&self, group: &GroupId, users: &[UserId]) {
        self.trigger(
            EventKind::MembersRemoved {
                group: group.clone(),
                users: users.to_vec(),
            },
            true,
        )
        .await;
    }

    pub async fn group_dismissed(&self, group: &GroupId, owner: &UserId) {
        self.trigger(
            EventKind::GroupDismissed {
                group: group.clone(),
                owner: owner.clone(),
            },
            true,
        )
        .await;
    }

    pub async fn groups_deleted(&self, groups: &[GroupId]) {
        self.trigger(
            EventKind::GroupsDeleted {
                groups: groups.to_vec(),
            },
            true,
        )
        .await;
    }

    pub async fn groups_status_changed(&self, groups: &[GroupId]) {
        self.trigger(
            EventKind::GroupsStatusChanged {
                groups: groups.to_vec(),
            },
            true,
        )
        .await;
    }

    pub async fn group_profile_updated(&self, group: &GroupId, owner: &UserId) {
        self.trigger(
            EventKind::GroupProfileUpdated {
                group: group.clone(),
                owner: owner.clone(),
            },
            true,
        )
        .await;
    }

    pub async fn contact_added(&self, owner: &UserId, contact: &UserId) {
        self.trigger(
            EventKind::ContactAdded {
                owner: owner.clone(),
                contact: contact.clone(),
            },
            true,
        )
        .await;
    }

    pub async fn contact_deleted(&self, owner: &UserId, contact: &UserId) {
        self.trigger(
            EventKind::ContactDeleted {
                owner: owner.clone(),
                contact: contact.clone(),
            },
            true,
        )
        .await;
    }

    pub async fn contact_blocked(&self, owner: &UserId, contact: &UserId) {
        self.trigger(
            EventKind::ContactBlocked {
                owner: owner.clone(),
                contact: contact.clone(),
            },
            true,
        )
        .await;
    }

    pub async fn contact_unblocked(&self, owner: &UserId, contact: &UserId) {
        self.trigger(
            EventKind::ContactUnblocked {
                owner: owner.clone(),
                contact: contact.clone(),
            },
            true,
        )
        .await;
    }

    pub async fn session_opened(&self, user: &UserId) {
        self.trigger(EventKind::SessionOpened { user: user.clone() }, true)
            .await;
    }

    pub async fn session_deleted(&self, user: &UserId) {
        self.trigger(EventKind::SessionDeleted { user: user.clone() }, true)
            .await;
    }

    pub async fn users_changed(&self, users: &[UserId]) {
        self.trigger(
            EventKind::UsersChanged {
                users: users.to_vec(),
            },
            true,
        )
        .await;
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn queue(&self) -> &Arc<EventQueue> {
        &self.queue
    }
}
