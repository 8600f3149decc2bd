//! Cache key definitions.
//!
//! Every projection lives under `{family}_{identity}`. Invalidation either
//! names one key exactly or sweeps a whole family with `{family}_*`.

use std::fmt;

use crate::domain::ids::{GroupId, UserId};

/// A kind of cached projection; its prefix is the first part of every key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyFamily {
    /// A user's user-to-user contacts.
    ContactUsers,
    /// Groups a user joined but does not own.
    JoinedGroups,
    /// Groups a user owns.
    OwnedGroups,
    /// A group's member list.
    GroupMembers,
    /// A group's detail view.
    GroupInfo,
    /// A user's sessions with other users.
    UserSessions,
    /// A user's sessions with groups.
    GroupSessions,
}

impl KeyFamily {
    pub const ALL: [KeyFamily; 7] = [
        KeyFamily::ContactUsers,
        KeyFamily::JoinedGroups,
        KeyFamily::OwnedGroups,
        KeyFamily::GroupMembers,
        KeyFamily::GroupInfo,
        KeyFamily::UserSessions,
        KeyFamily::GroupSessions,
    ];

    pub fn prefix(self) -> &'static str {
        match self {
            KeyFamily::ContactUsers => "contact_user_list",
            KeyFamily::JoinedGroups => "my_joined_group_list",
            KeyFamily::OwnedGroups => "contact_mygroup_list",
            KeyFamily::GroupMembers => "group_memberlist",
            KeyFamily::GroupInfo => "group_info",
            KeyFamily::UserSessions => "session_list",
            KeyFamily::GroupSessions => "group_session_list",
        }
    }

    /// Glob matching every key of this family.
    pub fn glob(self) -> String {
        format!("{}_*", self.prefix())
    }
}

/// One cached projection for one identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CacheKey {
    ContactUsers(UserId),
    JoinedGroups(UserId),
    OwnedGroups(UserId),
    GroupMembers(GroupId),
    GroupInfo(GroupId),
    UserSessions(UserId),
    GroupSessions(UserId),
}

impl CacheKey {
    pub fn family(&self) -> KeyFamily {
        match self {
            CacheKey::ContactUsers(_) => KeyFamily::ContactUsers,
            CacheKey::JoinedGroups(_) => KeyFamily::JoinedGroups,
            CacheKey::OwnedGroups(_) => KeyFamily::OwnedGroups,
            CacheKey::GroupMembers(_) => KeyFamily::GroupMembers,
            CacheKey::GroupInfo(_) => KeyFamily::GroupInfo,
            CacheKey::UserSessions(_) => KeyFamily::UserSessions,
            CacheKey::GroupSessions(_) => KeyFamily::GroupSessions,
        }
    }

    fn identity(&self) -> &str {
        match self {
            CacheKey::ContactUsers(id)
            | CacheKey::JoinedGroups(id)
            | CacheKey::OwnedGroups(id)
            | CacheKey::UserSessions(id)
            | CacheKey::GroupSessions(id) => id.as_str(),
            CacheKey::GroupMembers(id) | CacheKey::GroupInfo(id) => id.as_str(),
        }
    }

    /// The string stored in the cache backend.
    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.family().prefix(), self.identity())
    }
}

/// Match `key` against a glob where `*` stands for any run of characters.
pub fn glob_matches(pattern: &str, key: &str) -> bool {
    let mut parts = pattern.split('*');
    let first = parts.next().unwrap_or_default();
    let Some(mut rest) = key.strip_prefix(first) else {
        return false;
    };

    let segments: Vec<&str> = parts.collect();
    let Some((last, middle)) = segments.split_last() else {
        return rest.is_empty();
    };

    for segment in middle {
        match rest.find(segment) {
            Some(index) => rest = &rest[index + segment.len()..],
            None => return false,
        }
    }
    rest.len() >= last.len() && rest.ends_with(last)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(raw: &str) -> UserId {
        UserId::parse(raw).expect("user id")
    }

    fn group(raw: &str) -> GroupId {
        GroupId::parse(raw).expect("group id")
    }

    #[test]
    fn keys_render_with_family_prefix() {
        assert_eq!(
            CacheKey::ContactUsers(user("U1")).render(),
            "contact_user_list_U1"
        );
        assert_eq!(
            CacheKey::JoinedGroups(user("U1")).render(),
            "my_joined_group_list_U1"
        );
        assert_eq!(
            CacheKey::OwnedGroups(user("U1")).render(),
            "contact_mygroup_list_U1"
        );
        assert_eq!(
            CacheKey::GroupMembers(group("G123")).render(),
            "group_memberlist_G123"
        );
        assert_eq!(CacheKey::GroupInfo(group("G123")).render(), "group_info_G123");
        assert_eq!(CacheKey::UserSessions(user("U2")).render(), "session_list_U2");
        assert_eq!(
            CacheKey::GroupSessions(user("U2")).render(),
            "group_session_list_U2"
        );
    }

    #[test]
    fn family_globs_do_not_overlap() {
        let user_sessions = KeyFamily::UserSessions.glob();
        assert!(glob_matches(&user_sessions, "session_list_U1"));
        assert!(!glob_matches(&user_sessions, "group_session_list_U1"));

        for family in KeyFamily::ALL {
            for other in KeyFamily::ALL {
                let sample = format!("{}_U7", other.prefix());
                assert_eq!(
                    glob_matches(&family.glob(), &sample),
                    family == other,
                    "{} vs {sample}",
                    family.glob()
                );
            }
        }
    }

    #[test]
    fn glob_wildcards() {
        assert!(glob_matches("*", "anything"));
        assert!(glob_matches("a*c", "abc"));
        assert!(glob_matches("a*c", "ac"));
        assert!(!glob_matches("a*c", "ab"));
        assert!(glob_matches("*_U1", "session_list_U1"));
        assert!(!glob_matches("*_U1", "session_list_U12"));
        assert!(glob_matches("exact", "exact"));
        assert!(!glob_matches("exact", "exactly"));
        assert!(glob_matches("a*b*c", "a-b-c"));
        assert!(!glob_matches("ab*ba", "aba"));
    }
}
