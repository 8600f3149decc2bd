//! Pure operations on a group's denormalized member list.
//!
//! Each function returns a new `GroupRecord` with `members` and `member_cnt`
//! moved together, leaving persistence to the caller.

use crate::domain::entities::GroupRecord;
use crate::domain::error::DomainError;
use crate::domain::ids::UserId;

fn count_of(members: &[UserId]) -> Result<i32, DomainError> {
    i32::try_from(members.len())
        .map_err(|_| DomainError::membership("member list exceeds supported size"))
}

pub fn is_member(group: &GroupRecord, user: &UserId) -> bool {
    group.members.iter().any(|member| member == user)
}

/// Append `user` to the member list.
pub fn with_member(group: &GroupRecord, user: &UserId) -> Result<GroupRecord, DomainError> {
    if is_member(group, user) {
        return Err(DomainError::membership(format!(
            "user `{user}` already belongs to group `{}`",
            group.uuid
        )));
    }
    let mut updated = group.clone();
    updated.members.push(user.clone());
    updated.member_cnt = count_of(&updated.members)?;
    Ok(updated)
}

/// Drop `user` from the member list.
pub fn without_member(group: &GroupRecord, user: &UserId) -> Result<GroupRecord, DomainError> {
    if !is_member(group, user) {
        return Err(DomainError::membership(format!(
            "user `{user}` is not a member of group `{}`",
            group.uuid
        )));
    }
    let mut updated = group.clone();
    updated.members.retain(|member| member != user);
    updated.member_cnt = count_of(&updated.members)?;
    Ok(updated)
}

/// Outcome of removing a batch of members.
#[derive(Debug, Clone, PartialEq)]
pub struct Removal {
    pub group: GroupRecord,
    /// Ids that were members and got removed, in request order.
    pub removed: Vec<UserId>,
}

/// Remove every listed member, skipping ids that are not members.
///
/// Fails without changes when the owner is among `users`.
pub fn without_members(group: &GroupRecord, users: &[UserId]) -> Result<Removal, DomainError> {
    if users.iter().any(|user| *user == group.owner_id) {
        return Err(DomainError::membership(format!(
            "owner `{}` cannot be removed from group `{}`",
            group.owner_id, group.uuid
        )));
    }

    let mut removed = Vec::new();
    for user in users {
        if is_member(group, user) && !removed.contains(user) {
            removed.push(user.clone());
        }
    }

    let mut updated = group.clone();
    updated.members.retain(|member| !removed.contains(member));
    updated.member_cnt = count_of(&updated.members)?;
    Ok(Removal {
        group: updated,
        removed,
    })
}
