//! Shared domain enumerations aligned with persisted database enums.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "user_status", rename_all = "snake_case")]
pub enum UserStatus {
    Normal,
    Disable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "group_status", rename_all = "snake_case")]
pub enum GroupStatus {
    Normal,
    Disable,
}

/// How a user may join a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "group_add_mode", rename_all = "snake_case")]
pub enum AddMode {
    Direct,
    Approval,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "contact_type", rename_all = "snake_case")]
pub enum ContactType {
    User,
    Group,
}

/// Status of one directed contact edge.
///
/// `Black`/`BeBlack` and `Delete`/`BeDelete` come in pairs: the first is the
/// side that acted, the second the side it was done to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "contact_status", rename_all = "snake_case")]
pub enum ContactStatus {
    Normal,
    Black,
    BeBlack,
    QuitGroup,
    KickOutGroup,
    Delete,
    BeDelete,
}

impl ContactStatus {
    /// Terminal statuses for a group membership edge.
    pub fn has_left_group(self) -> bool {
        matches!(self, Self::QuitGroup | Self::KickOutGroup)
    }

    /// Whether either side has blocked the other.
    pub fn is_blocked(self) -> bool {
        matches!(self, Self::Black | Self::BeBlack)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "apply_status", rename_all = "snake_case")]
pub enum ApplyStatus {
    Pending,
    Agree,
    Refuse,
    Black,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_exit_statuses() {
        assert!(ContactStatus::QuitGroup.has_left_group());
        assert!(ContactStatus::KickOutGroup.has_left_group());
        assert!(!ContactStatus::Normal.has_left_group());
        assert!(ContactStatus::BeBlack.is_blocked());
        assert!(!ContactStatus::Delete.is_blocked());
    }

    #[test]
    fn statuses_serialize_in_snake_case() {
        let json = serde_json::to_string(&ContactStatus::KickOutGroup).expect("serialize");
        assert_eq!(json, "\"kick_out_group\"");
    }
}
