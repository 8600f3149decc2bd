#![allow(dead_code)]

use std::sync::Arc;

use rapport::application::core::{ChatCore, CoreCache, CoreRepos};
use rapport::application::reply::Reply;
use rapport::application::repos::CreateUserParams;
use rapport::cache::{CacheConfig, CacheStore, MemoryCache};
use rapport::domain::ids::{GroupId, UserId};
use rapport::domain::types::AddMode;
use rapport::infra::memory::MemoryStore;

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub cache: Arc<MemoryCache>,
    pub core: ChatCore,
}

impl Harness {
    /// Core over a fresh memory store with the in-process cache enabled.
    pub fn cached() -> Self {
        let store = Arc::new(MemoryStore::new());
        let config = CacheConfig::default();
        let cache = Arc::new(MemoryCache::new(&config));
        let core = ChatCore::new(
            CoreRepos::from_backend(store.clone()),
            Some(CoreCache {
                store: cache.clone() as Arc<dyn CacheStore>,
                config,
            }),
        );
        Self { store, cache, core }
    }

    /// A second core over the same store that never caches.
    pub fn uncached_view(&self) -> ChatCore {
        ChatCore::new(CoreRepos::from_backend(self.store.clone()), None)
    }

    pub async fn user(&self, nickname: &str) -> UserId {
        ok(self
            .core
            .create_user(CreateUserParams {
                nickname: nickname.to_string(),
                avatar: format!("https://cdn.example.com/{nickname}.png"),
                telephone: "13800000000".to_string(),
                email: format!("{nickname}@example.com"),
                signature: String::new(),
                is_admin: false,
            })
            .await)
    }

    pub async fn group(&self, owner: &UserId, name: &str, add_mode: AddMode) -> GroupId {
        ok(self
            .core
            .create_group(owner.as_str(), name, "welcome", "", add_mode)
            .await)
    }

    /// Make `a` and `b` contacts through an accepted application.
    pub async fn befriend(&self, a: &UserId, b: &UserId) {
        ok(self.core.apply_contact(a.as_str(), b.as_str(), "hi").await);
        ok(self
            .core
            .pass_contact_apply(b.as_str(), a.as_str())
            .await);
    }
}

pub fn ok<T: std::fmt::Debug>(reply: Reply<T>) -> T {
    assert_eq!(reply.code, 0, "unexpected failure: {}", reply.message);
    reply.data.expect("successful reply carries data")
}

pub fn ids(values: &[&UserId]) -> Vec<String> {
    values.iter().map(|id| id.to_string()).collect()
}
