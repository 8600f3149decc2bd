mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::{Harness, ok};
use rapport::application::core::{ChatCore, CoreCache, CoreRepos};
use rapport::application::groups::UpdateGroupCommand;
use rapport::application::repos::CreateUserParams;
use rapport::cache::{CacheConfig, CacheError, CacheStore};
use rapport::domain::types::AddMode;
use rapport::infra::memory::MemoryStore;

#[tokio::test]
async fn cached_reads_match_fresh_reads_after_every_write() {
    let h = Harness::cached();
    let fresh = h.uncached_view();
    let owner = h.user("owner").await;
    let alice = h.user("alice").await;
    let bob = h.user("bob").await;
    let group = h.group(&owner, "coherent", AddMode::Direct).await;

    async fn assert_same(cached: &ChatCore, fresh: &ChatCore, users: &[&str], group: &str) {
        for user in users {
            assert_eq!(
                cached.user_list(user).await,
                fresh.user_list(user).await,
                "contact list of {user}"
            );
            assert_eq!(
                cached.load_my_joined_groups(user).await,
                fresh.load_my_joined_groups(user).await
            );
            assert_eq!(
                cached.load_my_groups(user).await,
                fresh.load_my_groups(user).await
            );
            assert_eq!(
                cached.user_session_list(user).await,
                fresh.user_session_list(user).await
            );
            assert_eq!(
                cached.group_session_list(user).await,
                fresh.group_session_list(user).await
            );
        }
        assert_eq!(
            cached.group_member_list(group).await,
            fresh.group_member_list(group).await
        );
        assert_eq!(cached.group_info(group).await, fresh.group_info(group).await);
    }

    let users = [owner.as_str(), alice.as_str(), bob.as_str()];
    assert_same(&h.core, &fresh, &users, group.as_str()).await;

    ok(h.core.enter_group_directly(group.as_str(), alice.as_str()).await);
    assert_same(&h.core, &fresh, &users, group.as_str()).await;

    ok(h.core.open_session(alice.as_str(), group.as_str()).await);
    assert_same(&h.core, &fresh, &users, group.as_str()).await;

    h.befriend(&alice, &bob).await;
    ok(h.core.open_session(bob.as_str(), alice.as_str()).await);
    assert_same(&h.core, &fresh, &users, group.as_str()).await;

    ok(h.core.black_contact(bob.as_str(), alice.as_str()).await);
    assert_same(&h.core, &fresh, &users, group.as_str()).await;

    ok(h.core.cancel_black_contact(bob.as_str(), alice.as_str()).await);
    ok(h.core.delete_contact(alice.as_str(), bob.as_str()).await);
    assert_same(&h.core, &fresh, &users, group.as_str()).await;

    ok(h.core
        .remove_group_members(owner.as_str(), group.as_str(), &[alice.to_string()])
        .await);
    assert_same(&h.core, &fresh, &users, group.as_str()).await;

    ok(h.core.dismiss_group(owner.as_str(), group.as_str()).await);
    assert_same(&h.core, &fresh, &users, group.as_str()).await;
}

#[tokio::test]
async fn renaming_a_group_reaches_every_member_view() {
    let h = Harness::cached();
    let owner = h.user("owner").await;
    let alice = h.user("alice").await;
    let group = h.group(&owner, "old name", AddMode::Direct).await;
    ok(h.core.enter_group_directly(group.as_str(), alice.as_str()).await);
    ok(h.core.open_session(alice.as_str(), group.as_str()).await);

    assert_eq!(
        ok(h.core.load_my_joined_groups(alice.as_str()).await)[0].group_name,
        "old name"
    );
    assert_eq!(
        ok(h.core.group_session_list(alice.as_str()).await)[0].group_name,
        "old name"
    );
    assert_eq!(ok(h.core.group_info(group.as_str()).await).name, "old name");
    let info_key = format!("group_info_{group}");
    let joined_key = format!("my_joined_group_list_{alice}");
    assert!(h.cache.keys().contains(&info_key));
    assert!(h.cache.keys().contains(&joined_key));

    ok(h.core
        .update_group_info(
            owner.as_str(),
            group.as_str(),
            UpdateGroupCommand {
                name: Some("new name".to_string()),
                ..Default::default()
            },
        )
        .await);

    let keys = h.cache.keys();
    assert!(!keys.contains(&info_key));
    assert!(!keys.contains(&joined_key));
    assert_eq!(
        ok(h.core.load_my_joined_groups(alice.as_str()).await)[0].group_name,
        "new name"
    );
    assert_eq!(ok(h.core.group_info(group.as_str()).await).name, "new name");
    assert_eq!(
        ok(h.core.group_session_list(alice.as_str()).await)[0].group_name,
        "new name"
    );
}

#[tokio::test]
async fn empty_lists_are_cached_only_for_stable_families() {
    let h = Harness::cached();
    let lonely = h.user("lonely").await;

    assert!(ok(h.core.load_my_groups(lonely.as_str()).await).is_empty());
    assert!(ok(h.core.user_list(lonely.as_str()).await).is_empty());

    let keys = h.cache.keys();
    assert!(keys.contains(&format!("contact_mygroup_list_{lonely}")));
    assert!(!keys.contains(&format!("contact_user_list_{lonely}")));
}

/// Store that fails every call, standing in for an unreachable redis.
struct BrokenStore;

#[async_trait]
impl CacheStore for BrokenStore {
    async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
        Err(CacheError::unavailable("connection refused"))
    }

    async fn set(&self, _key: &str, _value: &str, _ttl: Duration) -> Result<(), CacheError> {
        Err(CacheError::unavailable("connection refused"))
    }

    async fn delete_exact(&self, _keys: &[String]) -> Result<u64, CacheError> {
        Err(CacheError::unavailable("connection refused"))
    }

    async fn delete_pattern(&self, _pattern: &str) -> Result<u64, CacheError> {
        Err(CacheError::unavailable("connection refused"))
    }

    async fn ping(&self) -> Result<(), CacheError> {
        Err(CacheError::unavailable("connection refused"))
    }

    fn backend_name(&self) -> &'static str {
        "broken"
    }
}

#[tokio::test]
async fn cache_outage_never_fails_a_request() {
    let store = Arc::new(MemoryStore::new());
    let core = ChatCore::new(
        CoreRepos::from_backend(store),
        Some(CoreCache {
            store: Arc::new(BrokenStore),
            config: CacheConfig::default(),
        }),
    );

    let owner = ok(core
        .create_user(CreateUserParams {
            nickname: "owner".to_string(),
            avatar: String::new(),
            telephone: String::new(),
            email: String::new(),
            signature: String::new(),
            is_admin: false,
        })
        .await);
    let group = ok(core
        .create_group(owner.as_str(), "resilient", "", "", AddMode::Direct)
        .await);

    let owned = ok(core.load_my_groups(owner.as_str()).await);
    assert_eq!(owned.len(), 1);
    assert_eq!(owned[0].group_id, group);
    ok(core.dismiss_group(owner.as_str(), group.as_str()).await);
    assert!(ok(core.load_my_groups(owner.as_str()).await).is_empty());
}

#[tokio::test]
async fn disabled_cache_publishes_nothing() {
    let store = Arc::new(MemoryStore::new());
    let config = CacheConfig {
        enabled: false,
        ..Default::default()
    };
    let core = ChatCore::new(
        CoreRepos::from_backend(store),
        Some(CoreCache {
            store: Arc::new(BrokenStore),
            config,
        }),
    );
    assert!(core.cache_trigger().is_none());
}
