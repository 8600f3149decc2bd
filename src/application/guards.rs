//! Lookups shared by the services: load a record or fail with a typed error.

use crate::application::error::{Rejection, ServiceError};
use crate::application::repos::{GroupsRepo, UsersRepo};
use crate::domain::entities::{GroupRecord, UserRecord};
use crate::domain::error::DomainError;
use crate::domain::ids::{GroupId, UserId};

pub(crate) async fn require_user(
    users: &dyn UsersRepo,
    id: &UserId,
) -> Result<UserRecord, ServiceError> {
    users
        .find_user(id)
        .await?
        .ok_or_else(|| ServiceError::not_found("user"))
}

pub(crate) async fn require_active_user(
    users: &dyn UsersRepo,
    id: &UserId,
) -> Result<UserRecord, ServiceError> {
    let user = require_user(users, id).await?;
    if user.is_disabled() {
        return Err(Rejection::UserDisabled.into());
    }
    Ok(user)
}

pub(crate) async fn require_group(
    groups: &dyn GroupsRepo,
    id: &GroupId,
) -> Result<GroupRecord, ServiceError> {
    groups
        .find_group(id)
        .await?
        .ok_or_else(|| ServiceError::not_found("group"))
}

pub(crate) async fn require_active_group(
    groups: &dyn GroupsRepo,
    id: &GroupId,
) -> Result<GroupRecord, ServiceError> {
    let group = require_group(groups, id).await?;
    if group.is_disabled() {
        return Err(Rejection::GroupDisabled.into());
    }
    Ok(group)
}

pub(crate) fn ensure_non_empty(value: &str, field: &'static str) -> Result<(), ServiceError> {
    if value.trim().is_empty() {
        return Err(DomainError::validation(field, "must not be empty").into());
    }
    Ok(())
}
