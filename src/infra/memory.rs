//! In-process repository backend.
//!
//! Every table lives behind one mutex. Writes run against a cloned draft
//! that replaces the tables only when the whole operation succeeds, which
//! gives each `RelationsRepo` method the same all-or-nothing behaviour as a
//! database transaction. The live-pair uniqueness of contacts and applies is
//! enforced the way the Postgres partial unique indexes do.

use std::sync::Mutex;

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::application::repos::{
    AppendMessageParams, AppliesRepo, AppliesWriteRepo, ContactsRepo, CreateApplyParams,
    CreateSessionParams, CreateUserParams, GroupsRepo, MessagesRepo, PurgeOutcome,
    RelationsRepo, RepoError, SessionsRepo, SessionsWriteRepo, UsersRepo, UsersWriteRepo,
};
use crate::cache::lock::mutex_lock;
use crate::domain::entities::{
    ContactApplyRecord, ContactRecord, GroupRecord, MessageRecord, SessionRecord, UserRecord,
};
use crate::domain::ids::{
    ApplyId, ContactTarget, GroupId, MessageId, SessionId, UserId,
};
use crate::domain::types::{
    ApplyStatus, ContactStatus, ContactType, GroupStatus, UserStatus,
};

const SOURCE: &str = "infra::memory";

#[derive(Debug, Clone, Default)]
struct Tables {
    users: Vec<UserRecord>,
    groups: Vec<GroupRecord>,
    contacts: Vec<ContactRecord>,
    applies: Vec<ContactApplyRecord>,
    sessions: Vec<SessionRecord>,
    messages: Vec<MessageRecord>,
}

fn live_target(target: &ContactTarget, raw: &str) -> bool {
    target.as_str() == raw
}

impl Tables {
    fn live_group_mut(&mut self, id: &GroupId) -> Option<&mut GroupRecord> {
        self.groups
            .iter_mut()
            .find(|group| group.uuid == *id && group.deleted_at.is_none())
    }

    fn save_group(&mut self, group: &GroupRecord, now: OffsetDateTime) -> Result<GroupRecord, RepoError> {
        let stored = self.live_group_mut(&group.uuid).ok_or(RepoError::NotFound)?;
        if stored.version != group.version {
            return Err(RepoError::group_conflict(&group.uuid));
        }
        let mut saved = group.clone();
        saved.version = stored.version + 1;
        saved.updated_at = now;
        saved.created_at = stored.created_at;
        saved.deleted_at = None;
        *stored = saved.clone();
        Ok(saved)
    }

    fn insert_contact(
        &mut self,
        user: &UserId,
        target: ContactTarget,
        status: ContactStatus,
        now: OffsetDateTime,
    ) -> Result<(), RepoError> {
        let duplicate = self.contacts.iter().any(|edge| {
            edge.user_id == *user && edge.contact_id == target && edge.deleted_at.is_none()
        });
        if duplicate {
            return Err(RepoError::Duplicate {
                constraint: "contacts_live_pair_key".to_string(),
            });
        }
        self.contacts.push(ContactRecord {
            user_id: user.clone(),
            contact_id: target,
            status,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        });
        Ok(())
    }

    fn agree_apply(&mut self, id: &ApplyId) -> Result<(), RepoError> {
        let apply = self
            .applies
            .iter_mut()
            .find(|apply| apply.uuid == *id && apply.deleted_at.is_none())
            .ok_or(RepoError::NotFound)?;
        apply.status = ApplyStatus::Agree;
        Ok(())
    }

    fn set_edge(
        &mut self,
        user: &UserId,
        contact: &UserId,
        status: ContactStatus,
        tombstone: bool,
        now: OffsetDateTime,
    ) {
        for edge in self.contacts.iter_mut().filter(|edge| {
            edge.user_id == *user
                && live_target(&edge.contact_id, contact.as_str())
                && edge.deleted_at.is_none()
        }) {
            edge.status = status;
            edge.updated_at = now;
            if tombstone {
                edge.deleted_at = Some(now);
            }
        }
    }

    fn retract_group_dependents(&mut self, groups: &[GroupId], now: OffsetDateTime) {
        let targets: Vec<ContactTarget> = groups.iter().cloned().map(ContactTarget::from).collect();
        for session in self.sessions.iter_mut() {
            if session.deleted_at.is_none() && targets.contains(&session.receive_id) {
                session.deleted_at = Some(now);
            }
        }
        for edge in self.contacts.iter_mut() {
            if edge.deleted_at.is_none() && targets.contains(&edge.contact_id) {
                edge.deleted_at = Some(now);
                edge.updated_at = now;
            }
        }
        for apply in self.applies.iter_mut() {
            if apply.deleted_at.is_none() && targets.contains(&apply.contact_id) {
                apply.deleted_at = Some(now);
            }
        }
    }

    fn dismiss_many(&mut self, groups: &[GroupId], now: OffsetDateTime) -> usize {
        let mut dismissed = 0;
        for group in self.groups.iter_mut() {
            if group.deleted_at.is_none() && groups.contains(&group.uuid) {
                group.deleted_at = Some(now);
                group.updated_at = now;
                group.version += 1;
                dismissed += 1;
            }
        }
        self.retract_group_dependents(groups, now);
        dismissed
    }

    fn retract_memberships(
        &mut self,
        group: &GroupId,
        members: &[UserId],
        status: ContactStatus,
        now: OffsetDateTime,
    ) {
        let target = ContactTarget::Group(group.clone());
        for session in self.sessions.iter_mut() {
            if session.deleted_at.is_none()
                && session.receive_id == target
                && members.contains(&session.send_id)
            {
                session.deleted_at = Some(now);
            }
        }
        for edge in self.contacts.iter_mut() {
            if edge.deleted_at.is_none()
                && edge.contact_id == target
                && members.contains(&edge.user_id)
            {
                edge.status = status;
                edge.updated_at = now;
                edge.deleted_at = Some(now);
            }
        }
        for apply in self.applies.iter_mut() {
            if apply.deleted_at.is_none()
                && apply.contact_id == target
                && members.contains(&apply.user_id)
            {
                apply.deleted_at = Some(now);
            }
        }
    }
}

/// Repository backend holding every table in process memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read<T>(&self, op: &'static str, f: impl FnOnce(&Tables) -> T) -> T {
        let tables = mutex_lock(&self.tables, SOURCE, op);
        f(&tables)
    }

    /// Run `f` against a draft copy and publish it only on success.
    fn transact<T>(
        &self,
        op: &'static str,
        f: impl FnOnce(&mut Tables, OffsetDateTime) -> Result<T, RepoError>,
    ) -> Result<T, RepoError> {
        let mut tables = mutex_lock(&self.tables, SOURCE, op);
        let mut draft = tables.clone();
        let out = f(&mut draft, OffsetDateTime::now_utc())?;
        *tables = draft;
        Ok(out)
    }
}

#[async_trait]
impl UsersRepo for MemoryStore {
    async fn find_user(&self, id: &UserId) -> Result<Option<UserRecord>, RepoError> {
        Ok(self.read("find_user", |t| {
            t.users
                .iter()
                .find(|user| user.uuid == *id && user.deleted_at.is_none())
                .cloned()
        }))
    }

    async fn find_users(&self, ids: &[UserId]) -> Result<Vec<UserRecord>, RepoError> {
        Ok(self.read("find_users", |t| {
            t.users
                .iter()
                .filter(|user| ids.contains(&user.uuid) && user.deleted_at.is_none())
                .cloned()
                .collect()
        }))
    }
}

#[async_trait]
impl UsersWriteRepo for MemoryStore {
    async fn create_user(&self, params: CreateUserParams) -> Result<UserRecord, RepoError> {
        self.transact("create_user", |t, now| {
            let user = UserRecord {
                uuid: UserId::generate(),
                nickname: params.nickname,
                avatar: params.avatar,
                telephone: params.telephone,
                email: params.email,
                signature: params.signature,
                status: UserStatus::Normal,
                is_admin: params.is_admin,
                created_at: now,
                deleted_at: None,
            };
            t.users.push(user.clone());
            Ok(user)
        })
    }

    async fn set_admin(&self, ids: &[UserId], is_admin: bool) -> Result<u64, RepoError> {
        self.transact("set_admin", |t, _| {
            let mut changed = 0;
            for user in t.users.iter_mut() {
                if ids.contains(&user.uuid) && user.deleted_at.is_none() {
                    user.is_admin = is_admin;
                    changed += 1;
                }
            }
            Ok(changed)
        })
    }
}

#[async_trait]
impl GroupsRepo for MemoryStore {
    async fn find_group(&self, id: &GroupId) -> Result<Option<GroupRecord>, RepoError> {
        Ok(self.read("find_group", |t| {
            t.groups
                .iter()
                .find(|group| group.uuid == *id && group.deleted_at.is_none())
                .cloned()
        }))
    }

    async fn find_groups(&self, ids: &[GroupId]) -> Result<Vec<GroupRecord>, RepoError> {
        Ok(self.read("find_groups", |t| {
            t.groups
                .iter()
                .filter(|group| ids.contains(&group.uuid) && group.deleted_at.is_none())
                .cloned()
                .collect()
        }))
    }

    async fn find_group_any(&self, id: &GroupId) -> Result<Option<GroupRecord>, RepoError> {
        Ok(self.read("find_group_any", |t| {
            t.groups.iter().find(|group| group.uuid == *id).cloned()
        }))
    }

    async fn list_owned_groups(&self, owner: &UserId) -> Result<Vec<GroupRecord>, RepoError> {
        Ok(self.read("list_owned_groups", |t| {
            t.groups
                .iter()
                .rev()
                .filter(|group| group.owner_id == *owner && group.deleted_at.is_none())
                .cloned()
                .collect()
        }))
    }

    async fn list_all_groups(&self) -> Result<Vec<GroupRecord>, RepoError> {
        Ok(self.read("list_all_groups", |t| {
            t.groups.iter().rev().cloned().collect()
        }))
    }
}

#[async_trait]
impl ContactsRepo for MemoryStore {
    async fn find_contact(
        &self,
        user: &UserId,
        contact: &ContactTarget,
    ) -> Result<Option<ContactRecord>, RepoError> {
        Ok(self.read("find_contact", |t| {
            t.contacts
                .iter()
                .find(|edge| {
                    edge.user_id == *user && edge.contact_id == *contact && edge.deleted_at.is_none()
                })
                .cloned()
        }))
    }

    async fn list_contacts(
        &self,
        user: &UserId,
        kind: ContactType,
    ) -> Result<Vec<ContactRecord>, RepoError> {
        Ok(self.read("list_contacts", |t| {
            t.contacts
                .iter()
                .rev()
                .filter(|edge| {
                    edge.user_id == *user
                        && edge.contact_type() == kind
                        && edge.deleted_at.is_none()
                })
                .cloned()
                .collect()
        }))
    }
}

#[async_trait]
impl AppliesRepo for MemoryStore {
    async fn find_apply(
        &self,
        user: &UserId,
        contact: &ContactTarget,
    ) -> Result<Option<ContactApplyRecord>, RepoError> {
        Ok(self.read("find_apply", |t| {
            t.applies
                .iter()
                .find(|apply| {
                    apply.user_id == *user
                        && apply.contact_id == *contact
                        && apply.deleted_at.is_none()
                })
                .cloned()
        }))
    }

    async fn list_pending_applies(
        &self,
        target: &ContactTarget,
    ) -> Result<Vec<ContactApplyRecord>, RepoError> {
        Ok(self.read("list_pending_applies", |t| {
            let mut pending: Vec<ContactApplyRecord> = t
                .applies
                .iter()
                .filter(|apply| {
                    apply.contact_id == *target
                        && apply.status == ApplyStatus::Pending
                        && apply.deleted_at.is_none()
                })
                .cloned()
                .collect();
            pending.sort_by_key(|apply| apply.last_apply_at);
            pending
        }))
    }
}

#[async_trait]
impl AppliesWriteRepo for MemoryStore {
    async fn create_apply(
        &self,
        params: CreateApplyParams,
    ) -> Result<ContactApplyRecord, RepoError> {
        self.transact("create_apply", |t, _| {
            let duplicate = t.applies.iter().any(|apply| {
                apply.user_id == params.user_id
                    && apply.contact_id == params.contact_id
                    && apply.deleted_at.is_none()
            });
            if duplicate {
                return Err(RepoError::Duplicate {
                    constraint: "contact_applies_live_pair_key".to_string(),
                });
            }
            let apply = ContactApplyRecord {
                uuid: ApplyId::generate(),
                user_id: params.user_id,
                contact_id: params.contact_id,
                status: ApplyStatus::Pending,
                message: params.message,
                last_apply_at: params.applied_at,
                deleted_at: None,
            };
            t.applies.push(apply.clone());
            Ok(apply)
        })
    }

    async fn renew_apply(
        &self,
        id: &ApplyId,
        message: &str,
        applied_at: OffsetDateTime,
    ) -> Result<ContactApplyRecord, RepoError> {
        self.transact("renew_apply", |t, _| {
            let apply = t
                .applies
                .iter_mut()
                .find(|apply| apply.uuid == *id && apply.deleted_at.is_none())
                .ok_or(RepoError::NotFound)?;
            apply.status = ApplyStatus::Pending;
            apply.message = message.to_string();
            apply.last_apply_at = applied_at;
            Ok(apply.clone())
        })
    }

    async fn set_apply_status(&self, id: &ApplyId, status: ApplyStatus) -> Result<(), RepoError> {
        self.transact("set_apply_status", |t, _| {
            let apply = t
                .applies
                .iter_mut()
                .find(|apply| apply.uuid == *id && apply.deleted_at.is_none())
                .ok_or(RepoError::NotFound)?;
            apply.status = status;
            Ok(())
        })
    }
}

#[async_trait]
impl SessionsRepo for MemoryStore {
    async fn find_session(&self, id: &SessionId) -> Result<Option<SessionRecord>, RepoError> {
        Ok(self.read("find_session", |t| {
            t.sessions
                .iter()
                .find(|session| session.uuid == *id && session.deleted_at.is_none())
                .cloned()
        }))
    }

    async fn find_session_between(
        &self,
        send: &UserId,
        receive: &ContactTarget,
    ) -> Result<Option<SessionRecord>, RepoError> {
        Ok(self.read("find_session_between", |t| {
            t.sessions
                .iter()
                .rev()
                .find(|session| {
                    session.send_id == *send
                        && session.receive_id == *receive
                        && session.deleted_at.is_none()
                })
                .cloned()
        }))
    }

    async fn list_sessions(
        &self,
        send: &UserId,
        kind: ContactType,
    ) -> Result<Vec<SessionRecord>, RepoError> {
        Ok(self.read("list_sessions", |t| {
            t.sessions
                .iter()
                .rev()
                .filter(|session| {
                    session.send_id == *send
                        && session.receive_id.kind() == kind
                        && session.deleted_at.is_none()
                })
                .cloned()
                .collect()
        }))
    }
}

#[async_trait]
impl SessionsWriteRepo for MemoryStore {
    async fn create_session(
        &self,
        params: CreateSessionParams,
    ) -> Result<SessionRecord, RepoError> {
        self.transact("create_session", |t, now| {
            let session = SessionRecord {
                uuid: SessionId::generate(),
                send_id: params.send_id,
                receive_id: params.receive_id,
                receive_name: params.receive_name,
                avatar: params.avatar,
                created_at: now,
                deleted_at: None,
            };
            t.sessions.push(session.clone());
            Ok(session)
        })
    }

    async fn tombstone_session(&self, id: &SessionId) -> Result<(), RepoError> {
        self.transact("tombstone_session", |t, now| {
            let session = t
                .sessions
                .iter_mut()
                .find(|session| session.uuid == *id && session.deleted_at.is_none())
                .ok_or(RepoError::NotFound)?;
            session.deleted_at = Some(now);
            Ok(())
        })
    }
}

#[async_trait]
impl MessagesRepo for MemoryStore {
    async fn list_between(&self, a: &UserId, b: &UserId) -> Result<Vec<MessageRecord>, RepoError> {
        Ok(self.read("list_between", |t| {
            t.messages
                .iter()
                .filter(|message| {
                    (message.send_id == *a && live_target(&message.receive_id, b.as_str()))
                        || (message.send_id == *b && live_target(&message.receive_id, a.as_str()))
                })
                .cloned()
                .collect()
        }))
    }

    async fn list_for_group(&self, group: &GroupId) -> Result<Vec<MessageRecord>, RepoError> {
        Ok(self.read("list_for_group", |t| {
            t.messages
                .iter()
                .filter(|message| live_target(&message.receive_id, group.as_str()))
                .cloned()
                .collect()
        }))
    }

    async fn append_message(
        &self,
        params: AppendMessageParams,
    ) -> Result<MessageRecord, RepoError> {
        self.transact("append_message", |t, now| {
            let message = MessageRecord {
                uuid: MessageId::generate(),
                session_id: params.session_id,
                send_id: params.send_id,
                send_name: params.send_name,
                send_avatar: params.send_avatar,
                receive_id: params.receive_id,
                content: params.content,
                created_at: now,
            };
            t.messages.push(message.clone());
            Ok(message)
        })
    }
}

#[async_trait]
impl RelationsRepo for MemoryStore {
    async fn create_group_with_owner(&self, group: &GroupRecord) -> Result<(), RepoError> {
        self.transact("create_group_with_owner", |t, now| {
            if t.groups.iter().any(|existing| existing.uuid == group.uuid) {
                return Err(RepoError::Duplicate {
                    constraint: "groups_pkey".to_string(),
                });
            }
            t.groups.push(group.clone());
            t.insert_contact(
                &group.owner_id,
                ContactTarget::Group(group.uuid.clone()),
                ContactStatus::Normal,
                now,
            )
        })
    }

    async fn enter_group(
        &self,
        group: &GroupRecord,
        member: &UserId,
    ) -> Result<GroupRecord, RepoError> {
        self.transact("enter_group", |t, now| {
            let saved = t.save_group(group, now)?;
            t.insert_contact(
                member,
                ContactTarget::Group(group.uuid.clone()),
                ContactStatus::Normal,
                now,
            )?;
            Ok(saved)
        })
    }

    async fn approve_group_apply(
        &self,
        apply: &ApplyId,
        group: &GroupRecord,
        member: &UserId,
    ) -> Result<GroupRecord, RepoError> {
        self.transact("approve_group_apply", |t, now| {
            let saved = t.save_group(group, now)?;
            t.insert_contact(
                member,
                ContactTarget::Group(group.uuid.clone()),
                ContactStatus::Normal,
                now,
            )?;
            t.agree_apply(apply)?;
            Ok(saved)
        })
    }

    async fn approve_contact_apply(
        &self,
        apply: &ApplyId,
        owner: &UserId,
        requester: &UserId,
    ) -> Result<(), RepoError> {
        self.transact("approve_contact_apply", |t, now| {
            t.agree_apply(apply)?;
            t.insert_contact(
                owner,
                ContactTarget::User(requester.clone()),
                ContactStatus::Normal,
                now,
            )?;
            t.insert_contact(
                requester,
                ContactTarget::User(owner.clone()),
                ContactStatus::Normal,
                now,
            )
        })
    }

    async fn leave_group(
        &self,
        group: &GroupRecord,
        member: &UserId,
    ) -> Result<GroupRecord, RepoError> {
        self.transact("leave_group", |t, now| {
            let saved = t.save_group(group, now)?;
            t.retract_memberships(
                &group.uuid,
                std::slice::from_ref(member),
                ContactStatus::QuitGroup,
                now,
            );
            Ok(saved)
        })
    }

    async fn remove_members(
        &self,
        group: &GroupRecord,
        removed: &[UserId],
    ) -> Result<GroupRecord, RepoError> {
        self.transact("remove_members", |t, now| {
            let saved = t.save_group(group, now)?;
            t.retract_memberships(&group.uuid, removed, ContactStatus::KickOutGroup, now);
            Ok(saved)
        })
    }

    async fn dismiss_group(&self, id: &GroupId) -> Result<(), RepoError> {
        self.transact("dismiss_group", |t, now| {
            if t.dismiss_many(std::slice::from_ref(id), now) == 0 {
                return Err(RepoError::NotFound);
            }
            Ok(())
        })
    }

    async fn delete_groups(&self, ids: &[GroupId]) -> Result<(), RepoError> {
        self.transact("delete_groups", |t, now| {
            t.dismiss_many(ids, now);
            Ok(())
        })
    }

    async fn set_groups_status(
        &self,
        ids: &[GroupId],
        status: GroupStatus,
    ) -> Result<(), RepoError> {
        self.transact("set_groups_status", |t, now| {
            for group in t.groups.iter_mut() {
                if group.deleted_at.is_none() && ids.contains(&group.uuid) {
                    group.status = status;
                    group.updated_at = now;
                    group.version += 1;
                }
            }
            if status == GroupStatus::Disable {
                for session in t.sessions.iter_mut() {
                    let addressed = session
                        .receive_id
                        .as_group()
                        .is_some_and(|group| ids.contains(group));
                    if addressed && session.deleted_at.is_none() {
                        session.deleted_at = Some(now);
                    }
                }
            }
            Ok(())
        })
    }

    async fn update_group_profile(&self, group: &GroupRecord) -> Result<GroupRecord, RepoError> {
        self.transact("update_group_profile", |t, now| {
            let saved = t.save_group(group, now)?;
            let target = ContactTarget::Group(saved.uuid.clone());
            for session in t.sessions.iter_mut() {
                if session.receive_id == target && session.deleted_at.is_none() {
                    session.receive_name = saved.name.clone();
                    session.avatar = saved.avatar.clone();
                }
            }
            Ok(saved)
        })
    }

    async fn delete_contact(&self, owner: &UserId, contact: &UserId) -> Result<(), RepoError> {
        self.transact("delete_contact", |t, now| {
            t.set_edge(owner, contact, ContactStatus::Delete, true, now);
            t.set_edge(contact, owner, ContactStatus::BeDelete, true, now);
            let between = |a: &UserId, target: &ContactTarget| {
                (a == owner && live_target(target, contact.as_str()))
                    || (a == contact && live_target(target, owner.as_str()))
            };
            for session in t.sessions.iter_mut() {
                if session.deleted_at.is_none() && between(&session.send_id, &session.receive_id) {
                    session.deleted_at = Some(now);
                }
            }
            for apply in t.applies.iter_mut() {
                if apply.deleted_at.is_none() && between(&apply.user_id, &apply.contact_id) {
                    apply.deleted_at = Some(now);
                }
            }
            Ok(())
        })
    }

    async fn black_contact(&self, owner: &UserId, contact: &UserId) -> Result<(), RepoError> {
        self.transact("black_contact", |t, now| {
            t.set_edge(owner, contact, ContactStatus::Black, false, now);
            t.set_edge(contact, owner, ContactStatus::BeBlack, false, now);
            for session in t.sessions.iter_mut() {
                if session.deleted_at.is_none()
                    && session.send_id == *owner
                    && live_target(&session.receive_id, contact.as_str())
                {
                    session.deleted_at = Some(now);
                }
            }
            Ok(())
        })
    }

    async fn cancel_black_contact(
        &self,
        owner: &UserId,
        contact: &UserId,
    ) -> Result<(), RepoError> {
        self.transact("cancel_black_contact", |t, now| {
            t.set_edge(owner, contact, ContactStatus::Normal, false, now);
            t.set_edge(contact, owner, ContactStatus::Normal, false, now);
            Ok(())
        })
    }

    async fn set_users_status(&self, ids: &[UserId], status: UserStatus) -> Result<(), RepoError> {
        self.transact("set_users_status", |t, now| {
            for user in t.users.iter_mut() {
                if ids.contains(&user.uuid) && user.deleted_at.is_none() {
                    user.status = status;
                }
            }
            if status == UserStatus::Disable {
                for session in t.sessions.iter_mut() {
                    let touches = ids.contains(&session.send_id)
                        || session
                            .receive_id
                            .as_user()
                            .is_some_and(|user| ids.contains(user));
                    if touches && session.deleted_at.is_none() {
                        session.deleted_at = Some(now);
                    }
                }
            }
            Ok(())
        })
    }

    async fn purge_users(&self, ids: &[UserId]) -> Result<PurgeOutcome, RepoError> {
        self.transact("purge_users", |t, now| {
            let dismissed_groups: Vec<GroupId> = t
                .groups
                .iter()
                .filter(|group| group.deleted_at.is_none() && ids.contains(&group.owner_id))
                .map(|group| group.uuid.clone())
                .collect();
            t.dismiss_many(&dismissed_groups, now);

            let mut shrunk_groups = Vec::new();
            for group in t.groups.iter_mut() {
                if group.deleted_at.is_some()
                    || !group.members.iter().any(|member| ids.contains(member))
                {
                    continue;
                }
                group.members.retain(|member| !ids.contains(member));
                group.member_cnt = i32::try_from(group.members.len())
                    .map_err(|_| RepoError::integrity("member list exceeds supported size"))?;
                group.version += 1;
                group.updated_at = now;
                shrunk_groups.push(group.uuid.clone());
            }

            let touches = |user: &UserId, target: &ContactTarget| {
                ids.contains(user) || target.as_user().is_some_and(|id| ids.contains(id))
            };
            t.sessions
                .retain(|session| !touches(&session.send_id, &session.receive_id));
            t.contacts
                .retain(|edge| !touches(&edge.user_id, &edge.contact_id));
            t.applies
                .retain(|apply| !touches(&apply.user_id, &apply.contact_id));

            let before = t.users.len();
            t.users.retain(|user| !ids.contains(&user.uuid));
            let users_removed = u64::try_from(before - t.users.len()).unwrap_or(u64::MAX);

            Ok(PurgeOutcome {
                users_removed,
                dismissed_groups,
                shrunk_groups,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::AddMode;

    fn group_owned_by(owner: &UserId) -> GroupRecord {
        let now = OffsetDateTime::now_utc();
        GroupRecord {
            uuid: GroupId::generate(),
            name: "memory".to_string(),
            notice: String::new(),
            avatar: String::new(),
            owner_id: owner.clone(),
            members: vec![owner.clone()],
            member_cnt: 1,
            add_mode: AddMode::Direct,
            status: GroupStatus::Normal,
            version: 1,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    #[tokio::test]
    async fn failed_transaction_leaves_no_partial_writes() {
        let store = MemoryStore::new();
        let owner = UserId::generate();
        let group = group_owned_by(&owner);
        store
            .create_group_with_owner(&group)
            .await
            .expect("create group");

        // The owner already holds a live edge, so the insert after the save fails.
        let mut grown = group.clone();
        grown.members.push(owner.clone());
        grown.member_cnt = 2;
        let err = store
            .enter_group(&grown, &owner)
            .await
            .expect_err("duplicate edge");
        assert!(matches!(err, RepoError::Duplicate { .. }));

        let stored = store
            .find_group(&group.uuid)
            .await
            .expect("read")
            .expect("group exists");
        assert_eq!(stored.member_cnt, 1);
        assert_eq!(stored.version, 1);
    }

    #[tokio::test]
    async fn find_groups_skips_tombstoned_and_unknown_ids() {
        let store = MemoryStore::new();
        let owner = UserId::generate();
        let kept = group_owned_by(&owner);
        let dismissed = group_owned_by(&owner);
        for group in [&kept, &dismissed] {
            store
                .create_group_with_owner(group)
                .await
                .expect("create group");
        }
        store.dismiss_group(&dismissed.uuid).await.expect("dismiss");

        let found = store
            .find_groups(&[dismissed.uuid.clone(), GroupId::generate(), kept.uuid.clone()])
            .await
            .expect("find groups");
        let ids: Vec<_> = found.into_iter().map(|group| group.uuid).collect();
        assert_eq!(ids, vec![kept.uuid]);
        assert!(store.find_groups(&[]).await.expect("empty").is_empty());
    }

    #[tokio::test]
    async fn stale_version_is_rejected() {
        let store = MemoryStore::new();
        let owner = UserId::generate();
        let group = group_owned_by(&owner);
        store
            .create_group_with_owner(&group)
            .await
            .expect("create group");

        let mut renamed = group.clone();
        renamed.name = "first".to_string();
        let saved = store
            .update_group_profile(&renamed)
            .await
            .expect("first save");
        assert_eq!(saved.version, 2);

        let mut stale = group.clone();
        stale.name = "second".to_string();
        let err = store
            .update_group_profile(&stale)
            .await
            .expect_err("stale save");
        assert!(matches!(err, RepoError::Conflict { .. }));
    }
}
