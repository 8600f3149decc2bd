//! Domain entities mirrored from persistent storage.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::domain::ids::{ApplyId, ContactTarget, GroupId, MessageId, SessionId, UserId};
use crate::domain::types::{
    AddMode, ApplyStatus, ContactStatus, ContactType, GroupStatus, UserStatus,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub uuid: UserId,
    pub nickname: String,
    pub avatar: String,
    pub telephone: String,
    pub email: String,
    pub signature: String,
    pub status: UserStatus,
    pub is_admin: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub deleted_at: Option<OffsetDateTime>,
}

impl UserRecord {
    pub fn is_disabled(&self) -> bool {
        self.status == UserStatus::Disable
    }
}

/// A group and its denormalized member list.
///
/// `members` keeps join order and `member_cnt` always equals its length.
/// `version` increases on every save and guards against lost updates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupRecord {
    pub uuid: GroupId,
    pub name: String,
    pub notice: String,
    pub avatar: String,
    pub owner_id: UserId,
    pub members: Vec<UserId>,
    pub member_cnt: i32,
    pub add_mode: AddMode,
    pub status: GroupStatus,
    pub version: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub deleted_at: Option<OffsetDateTime>,
}

impl GroupRecord {
    pub fn is_disabled(&self) -> bool {
        self.status == GroupStatus::Disable
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// One directed relationship edge from a user toward a user or group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactRecord {
    pub user_id: UserId,
    pub contact_id: ContactTarget,
    pub status: ContactStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub deleted_at: Option<OffsetDateTime>,
}

impl ContactRecord {
    pub fn contact_type(&self) -> ContactType {
        self.contact_id.kind()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactApplyRecord {
    pub uuid: ApplyId,
    pub user_id: UserId,
    pub contact_id: ContactTarget,
    pub status: ApplyStatus,
    pub message: String,
    #[serde(with = "time::serde::rfc3339")]
    pub last_apply_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub deleted_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub uuid: SessionId,
    pub send_id: UserId,
    pub receive_id: ContactTarget,
    pub receive_name: String,
    pub avatar: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub deleted_at: Option<OffsetDateTime>,
}

/// Append-only chat message; never touched by relationship cascades.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub uuid: MessageId,
    pub session_id: SessionId,
    pub send_id: UserId,
    pub send_name: String,
    pub send_avatar: String,
    pub receive_id: ContactTarget,
    pub content: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}
