//! Typed identifiers.
//!
//! Every identifier is an opaque token whose first character names the entity
//! kind (`U`, `G`, `S`, `A`, `M`). The prefix is checked once, when a raw
//! string crosses into the core; afterwards the type carries the kind.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::error::DomainError;
use crate::domain::types::ContactType;

const ID_BODY_LEN: usize = 11;

/// Generate the 11-character random body shared by all identifier kinds.
fn random_body() -> String {
    Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(ID_BODY_LEN)
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

fn validate(raw: &str, prefix: char, entity: &'static str) -> Result<(), DomainError> {
    let mut chars = raw.chars();
    if chars.next() != Some(prefix) {
        return Err(DomainError::invalid_id(entity, raw, "wrong kind prefix"));
    }
    let body = chars.as_str();
    if body.is_empty() || !body.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(DomainError::invalid_id(entity, raw, "malformed body"));
    }
    Ok(())
}

macro_rules! typed_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal, $entity:literal) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type,
        )]
        #[serde(try_from = "String", into = "String")]
        #[sqlx(transparent)]
        pub struct $name(String);

        impl $name {
            pub const PREFIX: char = $prefix;

            /// Mint a fresh identifier.
            pub fn generate() -> Self {
                Self(format!("{}{}", Self::PREFIX, random_body()))
            }

            pub fn parse(raw: &str) -> Result<Self, DomainError> {
                validate(raw, Self::PREFIX, $entity)?;
                Ok(Self(raw.to_string()))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = DomainError;

            fn from_str(raw: &str) -> Result<Self, Self::Err> {
                Self::parse(raw)
            }
        }

        impl TryFrom<String> for $name {
            type Error = DomainError;

            fn try_from(raw: String) -> Result<Self, Self::Error> {
                validate(&raw, Self::PREFIX, $entity)?;
                Ok(Self(raw))
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

typed_id!(
    /// Identifier of a user account.
    UserId,
    'U',
    "user"
);
typed_id!(
    /// Identifier of a group.
    GroupId,
    'G',
    "group"
);
typed_id!(
    /// Identifier of a conversation session.
    SessionId,
    'S',
    "session"
);
typed_id!(
    /// Identifier of a contact or join application.
    ApplyId,
    'A',
    "apply"
);
typed_id!(MessageId, 'M', "message");

/// The far end of a contact edge, apply or session: a user or a group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ContactTarget {
    User(UserId),
    Group(GroupId),
}

impl ContactTarget {
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        match raw.chars().next() {
            Some(UserId::PREFIX) => UserId::parse(raw).map(Self::User),
            Some(GroupId::PREFIX) => GroupId::parse(raw).map(Self::Group),
            _ => Err(DomainError::invalid_id(
                "contact",
                raw,
                "must name a user or a group",
            )),
        }
    }

    pub fn kind(&self) -> ContactType {
        match self {
            Self::User(_) => ContactType::User,
            Self::Group(_) => ContactType::Group,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::User(id) => id.as_str(),
            Self::Group(id) => id.as_str(),
        }
    }

    pub fn as_user(&self) -> Option<&UserId> {
        match self {
            Self::User(id) => Some(id),
            Self::Group(_) => None,
        }
    }

    pub fn as_group(&self) -> Option<&GroupId> {
        match self {
            Self::Group(id) => Some(id),
            Self::User(_) => None,
        }
    }
}

impl fmt::Display for ContactTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContactTarget {
    type Err = DomainError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Self::parse(raw)
    }
}

impl TryFrom<String> for ContactTarget {
    type Error = DomainError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::parse(&raw)
    }
}

impl From<ContactTarget> for String {
    fn from(target: ContactTarget) -> Self {
        match target {
            ContactTarget::User(id) => id.into(),
            ContactTarget::Group(id) => id.into(),
        }
    }
}

impl From<UserId> for ContactTarget {
    fn from(id: UserId) -> Self {
        Self::User(id)
    }
}

impl From<GroupId> for ContactTarget {
    fn from(id: GroupId) -> Self {
        Self::Group(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_carry_prefix_and_fixed_length() {
        let user = UserId::generate();
        let group = GroupId::generate();

        assert!(user.as_str().starts_with('U'));
        assert!(group.as_str().starts_with('G'));
        assert_eq!(user.as_str().len(), 1 + ID_BODY_LEN);
        assert!(UserId::parse(user.as_str()).is_ok());
    }

    #[test]
    fn parse_rejects_wrong_prefix() {
        assert!(UserId::parse("G123").is_err());
        assert!(GroupId::parse("U123").is_err());
        assert!(UserId::parse("U").is_err());
        assert!(UserId::parse("").is_err());
        assert!(UserId::parse("U12-3").is_err());
    }

    #[test]
    fn contact_target_dispatches_on_prefix() {
        let user = ContactTarget::parse("U1").expect("user target");
        let group = ContactTarget::parse("G123").expect("group target");

        assert_eq!(user.kind(), ContactType::User);
        assert_eq!(group.kind(), ContactType::Group);
        assert_eq!(group.as_group().map(GroupId::as_str), Some("G123"));
        assert!(ContactTarget::parse("S1").is_err());
    }

    #[test]
    fn serde_round_trips_through_plain_strings() {
        let target = ContactTarget::Group(GroupId::parse("G9").expect("group"));
        let json = serde_json::to_string(&target).expect("serialize");
        assert_eq!(json, "\"G9\"");

        let parsed: ContactTarget = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed, target);
        assert!(serde_json::from_str::<UserId>("\"G9\"").is_err());
    }
}
