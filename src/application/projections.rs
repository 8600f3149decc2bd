//! Read projections served cache-aside.
//!
//! Each projection is computed from the store on a miss, written back with
//! the configured TTL and returned. Cache trouble of any kind degrades to a
//! store read; it never fails the request.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::application::error::ServiceError;
use crate::application::guards::require_group;
use crate::application::repos::{ContactsRepo, GroupsRepo, SessionsRepo, UsersRepo};
use crate::cache::{CacheKey, CacheStore};
use crate::domain::entities::{GroupRecord, SessionRecord, UserRecord};
use crate::domain::ids::{GroupId, SessionId, UserId};
use crate::domain::types::{AddMode, ContactStatus, ContactType, GroupStatus};

pub(crate) const METRIC_CACHE_HIT: &str = "rapport_cache_hit_total";
pub(crate) const METRIC_CACHE_MISS: &str = "rapport_cache_miss_total";
pub(crate) const METRIC_CACHE_DECODE_ERROR: &str = "rapport_cache_decode_error_total";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactUserView {
    pub user_id: UserId,
    pub user_name: String,
    pub avatar: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupSummaryView {
    pub group_id: GroupId,
    pub group_name: String,
    pub avatar: String,
}

impl From<&GroupRecord> for GroupSummaryView {
    fn from(group: &GroupRecord) -> Self {
        Self {
            group_id: group.uuid.clone(),
            group_name: group.name.clone(),
            avatar: group.avatar.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMemberView {
    pub user_id: UserId,
    pub nickname: String,
    pub avatar: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupInfoView {
    pub uuid: GroupId,
    pub name: String,
    pub notice: String,
    pub avatar: String,
    pub member_cnt: i32,
    pub owner_id: UserId,
    pub add_mode: AddMode,
    pub status: GroupStatus,
    pub is_deleted: bool,
}

impl From<GroupRecord> for GroupInfoView {
    fn from(group: GroupRecord) -> Self {
        let is_deleted = group.is_deleted();
        Self {
            uuid: group.uuid,
            name: group.name,
            notice: group.notice,
            avatar: group.avatar,
            member_cnt: group.member_cnt,
            owner_id: group.owner_id,
            add_mode: group.add_mode,
            status: group.status,
            is_deleted,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSessionView {
    pub session_id: SessionId,
    pub avatar: String,
    pub user_id: UserId,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupSessionView {
    pub session_id: SessionId,
    pub avatar: String,
    pub group_id: GroupId,
    pub group_name: String,
}

/// A value that can be stored as a projection.
pub trait Projection: Serialize + DeserializeOwned {
    /// Whether the value counts as an empty result.
    fn is_empty_projection(&self) -> bool;
}

impl<T: Serialize + DeserializeOwned> Projection for Vec<T> {
    fn is_empty_projection(&self) -> bool {
        self.is_empty()
    }
}

impl Projection for GroupInfoView {
    fn is_empty_projection(&self) -> bool {
        false
    }
}

/// Whether an empty result is written back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Empty {
    Cache,
    Skip,
}

#[derive(Clone)]
struct ProjectionCache {
    store: Arc<dyn CacheStore>,
    ttl: Duration,
}

#[derive(Clone)]
pub struct ProjectionService {
    users: Arc<dyn UsersRepo>,
    groups: Arc<dyn GroupsRepo>,
    contacts: Arc<dyn ContactsRepo>,
    sessions: Arc<dyn SessionsRepo>,
    cache: Option<ProjectionCache>,
}

impl ProjectionService {
    pub fn new(
        users: Arc<dyn UsersRepo>,
        groups: Arc<dyn GroupsRepo>,
        contacts: Arc<dyn ContactsRepo>,
        sessions: Arc<dyn SessionsRepo>,
    ) -> Self {
        Self {
            users,
            groups,
            contacts,
            sessions,
            cache: None,
        }
    }

    /// Read through `store`; without it every read computes from the repositories.
    pub fn with_cache(mut self, store: Arc<dyn CacheStore>, ttl: Duration) -> Self {
        self.cache = Some(ProjectionCache { store, ttl });
        self
    }

    async fn read_through<T, F, Fut>(
        &self,
        key: CacheKey,
        empty: Empty,
        compute: F,
    ) -> Result<T, ServiceError>
    where
        T: Projection,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ServiceError>>,
    {
        let Some(cache) = &self.cache else {
            return compute().await;
        };

        let rendered = key.render();
        let family = key.family().prefix();

        match cache.store.get(&rendered).await {
            Ok(Some(raw)) => match serde_json::from_str::<T>(&raw) {
                Ok(value) => {
                    counter!(METRIC_CACHE_HIT, "family" => family).increment(1);
                    return Ok(value);
                }
                Err(err) => {
                    counter!(METRIC_CACHE_DECODE_ERROR, "family" => family).increment(1);
                    warn!(key = %rendered, error = %err, "Cached projection undecodable; rebuilding");
                }
            },
            Ok(None) => {}
            Err(err) => {
                warn!(
                    key = %rendered,
                    backend = cache.store.backend_name(),
                    error = %err,
                    "Cache read failed; reading from store"
                );
            }
        }
        counter!(METRIC_CACHE_MISS, "family" => family).increment(1);

        let value = compute().await?;
        if empty == Empty::Skip && value.is_empty_projection() {
            debug!(key = %rendered, "Empty projection not cached");
            return Ok(value);
        }

        match serde_json::to_string(&value) {
            Ok(raw) => {
                if let Err(err) = cache.store.set(&rendered, &raw, cache.ttl).await {
                    warn!(
                        key = %rendered,
                        backend = cache.store.backend_name(),
                        error = %err,
                        "Cache write failed"
                    );
                }
            }
            Err(err) => warn!(key = %rendered, error = %err, "Projection not serializable"),
        }
        Ok(value)
    }

    async fn users_by_id(&self, ids: &[UserId]) -> Result<HashMap<UserId, UserRecord>, ServiceError> {
        Ok(self
            .users
            .find_users(ids)
            .await?
            .into_iter()
            .map(|user| (user.uuid.clone(), user))
            .collect())
    }

    async fn groups_by_id(
        &self,
        ids: &[GroupId],
    ) -> Result<HashMap<GroupId, GroupRecord>, ServiceError> {
        Ok(self
            .groups
            .find_groups(ids)
            .await?
            .into_iter()
            .map(|group| (group.uuid.clone(), group))
            .collect())
    }

    /// Users `user` has a live contact edge with, newest first.
    pub async fn contact_user_list(
        &self,
        user: &UserId,
    ) -> Result<Vec<ContactUserView>, ServiceError> {
        self.read_through(CacheKey::ContactUsers(user.clone()), Empty::Skip, move || async move {
            let edges = self.contacts.list_contacts(user, ContactType::User).await?;
            let ids: Vec<UserId> = edges
                .iter()
                .filter(|edge| {
                    !matches!(edge.status, ContactStatus::Delete | ContactStatus::BeDelete)
                })
                .filter_map(|edge| edge.contact_id.as_user().cloned())
                .collect();
            let users = self.users_by_id(&ids).await?;
            Ok(ids
                .iter()
                .filter_map(|id| users.get(id))
                .map(|contact| ContactUserView {
                    user_id: contact.uuid.clone(),
                    user_name: contact.nickname.clone(),
                    avatar: contact.avatar.clone(),
                })
                .collect())
        })
        .await
    }

    /// Groups `user` belongs to without owning them.
    pub async fn joined_groups(&self, user: &UserId) -> Result<Vec<GroupSummaryView>, ServiceError> {
        self.read_through(CacheKey::JoinedGroups(user.clone()), Empty::Skip, move || async move {
            let edges = self.contacts.list_contacts(user, ContactType::Group).await?;
            let ids: Vec<GroupId> = edges
                .iter()
                .filter(|edge| !edge.status.has_left_group())
                .filter_map(|edge| edge.contact_id.as_group().cloned())
                .collect();
            let groups = self.groups_by_id(&ids).await?;
            Ok(ids
                .iter()
                .filter_map(|id| groups.get(id))
                .filter(|group| group.owner_id != *user)
                .map(GroupSummaryView::from)
                .collect())
        })
        .await
    }

    pub async fn owned_groups(&self, owner: &UserId) -> Result<Vec<GroupSummaryView>, ServiceError> {
        self.read_through(CacheKey::OwnedGroups(owner.clone()), Empty::Cache, move || async move {
            let groups = self.groups.list_owned_groups(owner).await?;
            Ok(groups.iter().map(GroupSummaryView::from).collect())
        })
        .await
    }

    /// Members in join order.
    pub async fn group_members(
        &self,
        group_id: &GroupId,
    ) -> Result<Vec<GroupMemberView>, ServiceError> {
        self.read_through(CacheKey::GroupMembers(group_id.clone()), Empty::Cache, move || async move {
            let group = require_group(self.groups.as_ref(), group_id).await?;
            let users = self.users_by_id(&group.members).await?;
            Ok(group
                .members
                .iter()
                .filter_map(|id| users.get(id))
                .map(|member| GroupMemberView {
                    user_id: member.uuid.clone(),
                    nickname: member.nickname.clone(),
                    avatar: member.avatar.clone(),
                })
                .collect())
        })
        .await
    }

    /// Group details, including groups that were dismissed.
    pub async fn group_info(&self, group_id: &GroupId) -> Result<GroupInfoView, ServiceError> {
        self.read_through(CacheKey::GroupInfo(group_id.clone()), Empty::Cache, move || async move {
            let group = self
                .groups
                .find_group_any(group_id)
                .await?
                .ok_or_else(|| ServiceError::not_found("group"))?;
            Ok(GroupInfoView::from(group))
        })
        .await
    }

    pub async fn user_sessions(&self, user: &UserId) -> Result<Vec<UserSessionView>, ServiceError> {
        self.read_through(CacheKey::UserSessions(user.clone()), Empty::Cache, move || async move {
            let sessions = self.sessions.list_sessions(user, ContactType::User).await?;
            Ok(sessions.into_iter().filter_map(user_session_view).collect())
        })
        .await
    }

    pub async fn group_sessions(
        &self,
        user: &UserId,
    ) -> Result<Vec<GroupSessionView>, ServiceError> {
        self.read_through(CacheKey::GroupSessions(user.clone()), Empty::Skip, move || async move {
            let sessions = self.sessions.list_sessions(user, ContactType::Group).await?;
            Ok(sessions.into_iter().filter_map(group_session_view).collect())
        })
        .await
    }
}

fn user_session_view(session: SessionRecord) -> Option<UserSessionView> {
    let user_id = session.receive_id.as_user()?.clone();
    Some(UserSessionView {
        session_id: session.uuid,
        avatar: session.avatar,
        user_id,
        username: session.receive_name,
    })
}

fn group_session_view(session: SessionRecord) -> Option<GroupSessionView> {
    let group_id = session.receive_id.as_group()?.clone();
    Some(GroupSessionView {
        session_id: session.uuid,
        avatar: session.avatar,
        group_id,
        group_name: session.receive_name,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_info_reports_tombstone() {
        let now = time::OffsetDateTime::now_utc();
        let group = GroupRecord {
            uuid: GroupId::parse("G1").unwrap(),
            name: "ops".to_string(),
            notice: String::new(),
            avatar: String::new(),
            owner_id: UserId::parse("U1").unwrap(),
            members: vec![UserId::parse("U1").unwrap()],
            member_cnt: 1,
            add_mode: AddMode::Direct,
            status: GroupStatus::Normal,
            version: 2,
            created_at: now,
            updated_at: now,
            deleted_at: Some(now),
        };
        let view = GroupInfoView::from(group);
        assert!(view.is_deleted);
        assert!(!view.is_empty_projection());
    }

    #[test]
    fn session_views_split_by_target_kind() {
        let now = time::OffsetDateTime::now_utc();
        let session = SessionRecord {
            uuid: SessionId::parse("S1").unwrap(),
            send_id: UserId::parse("U1").unwrap(),
            receive_id: GroupId::parse("G1").unwrap().into(),
            receive_name: "ops".to_string(),
            avatar: "a.png".to_string(),
            created_at: now,
            deleted_at: None,
        };
        assert!(user_session_view(session.clone()).is_none());
        let view = group_session_view(session).expect("group session");
        assert_eq!(view.group_name, "ops");
    }
}
