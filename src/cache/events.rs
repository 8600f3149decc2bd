//! Cache event system.
//!
//! Relationship writes publish events after commit; the consumer drains them
//! into invalidation plans.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use metrics::gauge;
use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use crate::domain::ids::{GroupId, UserId};

use super::lock::mutex_lock;

const SOURCE: &str = "cache::events";

pub(crate) const METRIC_CACHE_QUEUE_LEN: &str = "rapport_cache_event_queue_len";

/// Monotonic epoch for ordering events within this process.
pub type Epoch = u64;

#[derive(Debug, Clone)]
pub struct CacheEvent {
    /// Unique identifier used to drop duplicates within a batch.
    pub id: Uuid,
    pub epoch: Epoch,
    pub kind: EventKind,
    pub timestamp: OffsetDateTime,
}

impl CacheEvent {
    pub fn new(kind: EventKind, epoch: Epoch) -> Self {
        Self {
            id: Uuid::new_v4(),
            epoch,
            kind,
            timestamp: OffsetDateTime::now_utc(),
        }
    }
}

/// Committed relationship changes that make projections stale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    // Groups
    GroupCreated { group: GroupId, owner: UserId },
    MemberJoined { group: GroupId, user: UserId },
    MemberLeft { group: GroupId, user: UserId },
    MembersRemoved { group: GroupId, users: Vec<UserId> },
    GroupDismissed { group: GroupId, owner: UserId },
    GroupsDeleted { groups: Vec<GroupId> },
    GroupsStatusChanged { groups: Vec<GroupId> },
    GroupProfileUpdated { group: GroupId, owner: UserId },

    // Contacts
    ContactAdded { owner: UserId, contact: UserId },
    ContactDeleted { owner: UserId, contact: UserId },
    ContactBlocked { owner: UserId, contact: UserId },
    ContactUnblocked { owner: UserId, contact: UserId },

    // Sessions
    SessionOpened { user: UserId },
    SessionDeleted { user: UserId },

    // Administration
    UsersChanged { users: Vec<UserId> },
}

/// In-memory event queue; contention is expected to be low.
pub struct EventQueue {
    queue: Mutex<VecDeque<CacheEvent>>,
    epoch_counter: AtomicU64,
}

impl EventQueue {
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            epoch_counter: AtomicU64::new(0),
        }
    }

    pub fn next_epoch(&self) -> Epoch {
        self.epoch_counter.fetch_add(1, Ordering::SeqCst)
    }

    pub fn publish(&self, kind: EventKind) {
        let event = CacheEvent::new(kind, self.next_epoch());

        info!(
            event_id = %event.id,
            event_epoch = event.epoch,
            event_kind = ?event.kind,
            "Cache event enqueued"
        );

        let mut queue = mutex_lock(&self.queue, SOURCE, "publish");
        queue.push_back(event);
        gauge!(METRIC_CACHE_QUEUE_LEN).set(queue.len() as f64);
    }

    /// Drain up to `limit` events in FIFO order.
    pub fn drain(&self, limit: usize) -> Vec<CacheEvent> {
        let mut queue = mutex_lock(&self.queue, SOURCE, "drain");
        let count = limit.min(queue.len());
        let drained: Vec<CacheEvent> = queue.drain(..count).collect();
        gauge!(METRIC_CACHE_QUEUE_LEN).set(queue.len() as f64);
        drained
    }

    pub fn len(&self) -> usize {
        mutex_lock(&self.queue, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}
