//! Invalidation plan generation.
//!
//! Merges a batch of events into the exact keys and family sweeps to delete.

use std::collections::{BTreeSet, HashSet};
use std::fmt;

use super::events::{CacheEvent, EventKind};
use super::keys::{CacheKey, KeyFamily};

#[derive(Debug, Default, PartialEq, Eq)]
pub struct InvalidationPlan {
    /// Keys deleted one by one.
    pub exact: BTreeSet<CacheKey>,
    /// Families swept with `{family}_*`.
    pub families: BTreeSet<KeyFamily>,
}

impl fmt::Display for InvalidationPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let families: Vec<&str> = self.families.iter().map(|f| f.prefix()).collect();
        write!(
            f,
            "InvalidationPlan {{ exact: {}, families: [{}] }}",
            self.exact.len(),
            families.join(", ")
        )
    }
}

impl InvalidationPlan {
    /// Merge events into one plan, dropping duplicate event ids and exact
    /// keys already covered by a family sweep.
    pub fn from_events(events: Vec<CacheEvent>) -> Self {
        let mut plan = Self::default();
        let mut seen_ids = HashSet::new();

        for event in events.into_iter().filter(|e| seen_ids.insert(e.id)) {
            plan.add(&event.kind);
        }

        let families = &plan.families;
        plan.exact.retain(|key| !families.contains(&key.family()));
        plan
    }

    fn add(&mut self, kind: &EventKind) {
        match kind {
            EventKind::GroupCreated { owner, .. } => {
                self.key(CacheKey::OwnedGroups(owner.clone()));
                self.key(CacheKey::JoinedGroups(owner.clone()));
            }
            EventKind::MemberJoined { group, user } | EventKind::MemberLeft { group, user } => {
                self.key(CacheKey::JoinedGroups(user.clone()));
                self.key(CacheKey::GroupSessions(user.clone()));
                self.key(CacheKey::GroupMembers(group.clone()));
                self.key(CacheKey::GroupInfo(group.clone()));
            }
            EventKind::MembersRemoved { group, users } => {
                for user in users {
                    self.key(CacheKey::JoinedGroups(user.clone()));
                    self.key(CacheKey::GroupSessions(user.clone()));
                }
                self.key(CacheKey::GroupMembers(group.clone()));
                self.key(CacheKey::GroupInfo(group.clone()));
            }
            EventKind::GroupDismissed { group, owner } => {
                self.key(CacheKey::OwnedGroups(owner.clone()));
                self.sweep(KeyFamily::JoinedGroups);
                self.sweep(KeyFamily::GroupSessions);
                self.key(CacheKey::GroupMembers(group.clone()));
                self.key(CacheKey::GroupInfo(group.clone()));
            }
            EventKind::GroupsDeleted { groups } => {
                self.sweep(KeyFamily::OwnedGroups);
                self.sweep(KeyFamily::JoinedGroups);
                self.sweep(KeyFamily::GroupSessions);
                for group in groups {
                    self.key(CacheKey::GroupMembers(group.clone()));
                    self.key(CacheKey::GroupInfo(group.clone()));
                }
            }
            EventKind::GroupsStatusChanged { groups } => {
                self.sweep(KeyFamily::GroupSessions);
                self.sweep(KeyFamily::JoinedGroups);
                for group in groups {
                    self.key(CacheKey::GroupInfo(group.clone()));
                }
            }
            EventKind::GroupProfileUpdated { group, owner } => {
                self.key(CacheKey::OwnedGroups(owner.clone()));
                self.sweep(KeyFamily::JoinedGroups);
                self.sweep(KeyFamily::GroupSessions);
                self.key(CacheKey::GroupInfo(group.clone()));
            }
            EventKind::ContactAdded { owner, contact }
            | EventKind::ContactDeleted { owner, contact }
            | EventKind::ContactBlocked { owner, contact }
            | EventKind::ContactUnblocked { owner, contact } => {
                for user in [owner, contact] {
                    self.key(CacheKey::ContactUsers(user.clone()));
                    self.key(CacheKey::UserSessions(user.clone()));
                }
            }
            EventKind::SessionOpened { user } | EventKind::SessionDeleted { user } => {
                self.key(CacheKey::UserSessions(user.clone()));
                self.key(CacheKey::GroupSessions(user.clone()));
            }
            EventKind::UsersChanged { .. } => {
                for family in KeyFamily::ALL {
                    self.sweep(family);
                }
            }
        }
    }

    fn key(&mut self, key: CacheKey) {
        self.exact.insert(key);
    }

    fn sweep(&mut self, family: KeyFamily) {
        self.families.insert(family);
    }

    pub fn is_empty(&self) -> bool {
        self.exact.is_empty() && self.families.is_empty()
    }

    /// Rendered exact keys, in a stable order.
    pub fn exact_keys(&self) -> Vec<String> {
        self.exact.iter().map(CacheKey::render).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ids::{GroupId, UserId};

    fn user(raw: &str) -> UserId {
        UserId::parse(raw).expect("user id")
    }

    fn group(raw: &str) -> GroupId {
        GroupId::parse(raw).expect("group id")
    }

    fn plan_for(kinds: Vec<EventKind>) -> InvalidationPlan {
        let events = kinds
            .into_iter()
            .enumerate()
            .map(|(epoch, kind)| CacheEvent::new(kind, epoch as u64))
            .collect();
        InvalidationPlan::from_events(events)
    }

    #[test]
    fn member_join_targets_user_and_group_keys() {
        let plan = plan_for(vec![EventKind::MemberJoined {
            group: group("G1"),
            user: user("U2"),
        }]);

        assert!(plan.families.is_empty());
        assert_eq!(
            plan.exact_keys(),
            vec![
                "my_joined_group_list_U2",
                "group_memberlist_G1",
                "group_info_G1",
                "group_session_list_U2",
            ]
        );
    }

    #[test]
    fn contact_events_cover_both_sides() {
        let plan = plan_for(vec![EventKind::ContactBlocked {
            owner: user("U1"),
            contact: user("U2"),
        }]);

        for key in [
            "contact_user_list_U1",
            "contact_user_list_U2",
            "session_list_U1",
            "session_list_U2",
        ] {
            assert!(plan.exact_keys().iter().any(|k| k == key), "missing {key}");
        }
        assert_eq!(plan.exact.len(), 4);
    }

    #[test]
    fn dismiss_sweeps_member_facing_families() {
        let plan = plan_for(vec![EventKind::GroupDismissed {
            group: group("G123"),
            owner: user("U1"),
        }]);

        assert_eq!(
            plan.families,
            BTreeSet::from([KeyFamily::JoinedGroups, KeyFamily::GroupSessions])
        );
        assert!(plan.exact.contains(&CacheKey::OwnedGroups(user("U1"))));
        assert!(plan.exact.contains(&CacheKey::GroupMembers(group("G123"))));
        assert!(plan.exact.contains(&CacheKey::GroupInfo(group("G123"))));
    }

    #[test]
    fn sweeps_absorb_exact_keys_of_the_same_family() {
        let plan = plan_for(vec![
            EventKind::MemberJoined {
                group: group("G1"),
                user: user("U2"),
            },
            EventKind::GroupProfileUpdated {
                group: group("G1"),
                owner: user("U1"),
            },
        ]);

        assert!(!plan.exact.contains(&CacheKey::JoinedGroups(user("U2"))));
        assert!(!plan.exact.contains(&CacheKey::GroupSessions(user("U2"))));
        assert!(plan.exact.contains(&CacheKey::GroupMembers(group("G1"))));
        assert!(plan.exact.contains(&CacheKey::GroupInfo(group("G1"))));
        assert!(plan.exact.contains(&CacheKey::OwnedGroups(user("U1"))));
    }

    #[test]
    fn users_changed_sweeps_everything() {
        let plan = plan_for(vec![
            EventKind::SessionOpened { user: user("U1") },
            EventKind::UsersChanged {
                users: vec![user("U1")],
            },
        ]);

        assert_eq!(plan.families.len(), KeyFamily::ALL.len());
        assert!(plan.exact.is_empty());
    }

    #[test]
    fn duplicate_event_ids_are_merged() {
        let event = CacheEvent::new(
            EventKind::SessionDeleted { user: user("U1") },
            0,
        );
        let plan = InvalidationPlan::from_events(vec![event.clone(), event]);
        assert_eq!(plan.exact.len(), 2);
    }

    #[test]
    fn empty_batch_yields_empty_plan() {
        let plan = InvalidationPlan::from_events(Vec::new());
        assert!(plan.is_empty());
        assert_eq!(plan.to_string(), "InvalidationPlan { exact: 0, families: [] }");
    }
}
