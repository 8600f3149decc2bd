//! User administration: registration, status, purge and admin flag.

use std::sync::Arc;

use tracing::{info, warn};

use crate::application::error::ServiceError;
use crate::application::guards::{ensure_non_empty, require_user};
use crate::application::repos::{
    CreateUserParams, PurgeOutcome, RelationsRepo, UsersRepo, UsersWriteRepo,
};
use crate::cache::CacheTrigger;
use crate::domain::entities::UserRecord;
use crate::domain::ids::UserId;
use crate::domain::types::UserStatus;

#[derive(Clone)]
pub struct UserAdminService {
    users: Arc<dyn UsersRepo>,
    users_write: Arc<dyn UsersWriteRepo>,
    relations: Arc<dyn RelationsRepo>,
    cache_trigger: Option<Arc<CacheTrigger>>,
}

impl UserAdminService {
    pub fn new(
        users: Arc<dyn UsersRepo>,
        users_write: Arc<dyn UsersWriteRepo>,
        relations: Arc<dyn RelationsRepo>,
    ) -> Self {
        Self {
            users,
            users_write,
            relations,
            cache_trigger: None,
        }
    }

    pub fn with_cache_trigger_opt(mut self, trigger: Option<Arc<CacheTrigger>>) -> Self {
        self.cache_trigger = trigger;
        self
    }

    pub async fn create_user(&self, params: CreateUserParams) -> Result<UserRecord, ServiceError> {
        ensure_non_empty(&params.nickname, "nickname")?;
        let user = self.users_write.create_user(params).await?;
        info!(user = %user.uuid, "user created");
        Ok(user)
    }

    pub async fn find_user(&self, id: &UserId) -> Result<UserRecord, ServiceError> {
        require_user(self.users.as_ref(), id).await
    }

    pub async fn set_users_status(
        &self,
        ids: &[UserId],
        status: UserStatus,
    ) -> Result<(), ServiceError> {
        if ids.is_empty() {
            return Ok(());
        }
        self.relations.set_users_status(ids, status).await?;
        info!(count = ids.len(), ?status, "user status changed");
        self.users_changed(ids).await;
        Ok(())
    }

    pub async fn purge_users(&self, ids: &[UserId]) -> Result<PurgeOutcome, ServiceError> {
        if ids.is_empty() {
            return Ok(PurgeOutcome::default());
        }
        let outcome = self.relations.purge_users(ids).await?;
        if outcome.users_removed < ids.len() as u64 {
            warn!(
                requested = ids.len(),
                removed = outcome.users_removed,
                "some users to purge did not exist"
            );
        }
        info!(
            removed = outcome.users_removed,
            dismissed = outcome.dismissed_groups.len(),
            shrunk = outcome.shrunk_groups.len(),
            "users purged"
        );
        self.users_changed(ids).await;
        Ok(outcome)
    }

    /// Returns how many users changed.
    pub async fn set_admin(&self, ids: &[UserId], is_admin: bool) -> Result<u64, ServiceError> {
        if ids.is_empty() {
            return Ok(0);
        }
        let updated = self.users_write.set_admin(ids, is_admin).await?;
        info!(updated, is_admin, "admin flag changed");
        self.users_changed(ids).await;
        Ok(updated)
    }

    async fn users_changed(&self, ids: &[UserId]) {
        if let Some(trigger) = &self.cache_trigger {
            trigger.users_changed(ids).await;
        }
    }
}
