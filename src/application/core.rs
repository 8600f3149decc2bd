//! `ChatCore`: every core operation behind one facade.
//!
//! Methods take identifiers as raw strings, parse them once into typed ids
//! and answer with a [`Reply`] triple. Nothing here touches storage directly.

use std::sync::Arc;

use crate::application::applies::{ApplyService, PendingApply};
use crate::application::contacts::{ContactInfo, ContactService};
use crate::application::error::ServiceError;
use crate::application::groups::{
    CreateGroupCommand, GroupListEntry, GroupService, UpdateGroupCommand,
};
use crate::application::messages::MessageService;
use crate::application::projections::{
    ContactUserView, GroupInfoView, GroupMemberView, GroupSessionView, GroupSummaryView,
    ProjectionService, UserSessionView,
};
use crate::application::reply::Reply;
use crate::application::repos::{
    AppliesRepo, AppliesWriteRepo, ContactsRepo, CreateUserParams, GroupsRepo, MessagesRepo,
    PurgeOutcome, RelationsRepo, SessionsRepo, SessionsWriteRepo, UsersRepo, UsersWriteRepo,
};
use crate::application::sessions::SessionService;
use crate::application::users::UserAdminService;
use crate::cache::{CacheConfig, CacheStore, CacheTrigger, build_trigger};
use crate::domain::entities::MessageRecord;
use crate::domain::ids::{ApplyId, ContactTarget, GroupId, SessionId, UserId};
use crate::domain::types::{AddMode, GroupStatus, UserStatus};

/// Repository handles the core is built from.
#[derive(Clone)]
pub struct CoreRepos {
    pub users: Arc<dyn UsersRepo>,
    pub users_write: Arc<dyn UsersWriteRepo>,
    pub groups: Arc<dyn GroupsRepo>,
    pub contacts: Arc<dyn ContactsRepo>,
    pub applies: Arc<dyn AppliesRepo>,
    pub applies_write: Arc<dyn AppliesWriteRepo>,
    pub sessions: Arc<dyn SessionsRepo>,
    pub sessions_write: Arc<dyn SessionsWriteRepo>,
    pub messages: Arc<dyn MessagesRepo>,
    pub relations: Arc<dyn RelationsRepo>,
}

impl CoreRepos {
    /// Use one backend for every repository.
    pub fn from_backend<S>(backend: Arc<S>) -> Self
    where
        S: UsersRepo
            + UsersWriteRepo
            + GroupsRepo
            + ContactsRepo
            + AppliesRepo
            + AppliesWriteRepo
            + SessionsRepo
            + SessionsWriteRepo
            + MessagesRepo
            + RelationsRepo
            + 'static,
    {
        Self {
            users: backend.clone(),
            users_write: backend.clone(),
            groups: backend.clone(),
            contacts: backend.clone(),
            applies: backend.clone(),
            applies_write: backend.clone(),
            sessions: backend.clone(),
            sessions_write: backend.clone(),
            messages: backend.clone(),
            relations: backend,
        }
    }
}

/// Cache store plus the settings it runs with.
#[derive(Clone)]
pub struct CoreCache {
    pub store: Arc<dyn CacheStore>,
    pub config: CacheConfig,
}

#[derive(Clone)]
pub struct ChatCore {
    groups: GroupService,
    contacts: ContactService,
    applies: ApplyService,
    sessions: SessionService,
    users: UserAdminService,
    messages: MessageService,
    projections: ProjectionService,
    cache_trigger: Option<Arc<CacheTrigger>>,
}

fn user_ids(raw: &[String]) -> Result<Vec<UserId>, ServiceError> {
    Ok(raw
        .iter()
        .map(|id| UserId::parse(id))
        .collect::<Result<Vec<_>, _>>()?)
}

fn group_ids(raw: &[String]) -> Result<Vec<GroupId>, ServiceError> {
    Ok(raw
        .iter()
        .map(|id| GroupId::parse(id))
        .collect::<Result<Vec<_>, _>>()?)
}

impl ChatCore {
    /// Wire every service; `cache` is ignored when its config disables caching.
    pub fn new(repos: CoreRepos, cache: Option<CoreCache>) -> Self {
        let cache = cache.filter(|cache| cache.config.is_enabled());
        let cache_trigger = cache
            .as_ref()
            .map(|cache| build_trigger(&cache.config, cache.store.clone()));

        let mut projections = ProjectionService::new(
            repos.users.clone(),
            repos.groups.clone(),
            repos.contacts.clone(),
            repos.sessions.clone(),
        );
        if let Some(cache) = &cache {
            projections = projections.with_cache(cache.store.clone(), cache.config.ttl());
        }

        Self {
            groups: GroupService::new(
                repos.users.clone(),
                repos.groups.clone(),
                repos.relations.clone(),
            )
            .with_cache_trigger_opt(cache_trigger.clone()),
            contacts: ContactService::new(
                repos.users.clone(),
                repos.groups.clone(),
                repos.contacts.clone(),
                repos.relations.clone(),
            )
            .with_cache_trigger_opt(cache_trigger.clone()),
            applies: ApplyService::new(
                repos.users.clone(),
                repos.groups.clone(),
                repos.contacts.clone(),
                repos.applies.clone(),
                repos.applies_write.clone(),
                repos.relations.clone(),
            )
            .with_cache_trigger_opt(cache_trigger.clone()),
            sessions: SessionService::new(
                repos.users.clone(),
                repos.groups.clone(),
                repos.contacts.clone(),
                repos.sessions.clone(),
                repos.sessions_write.clone(),
            )
            .with_cache_trigger_opt(cache_trigger.clone()),
            users: UserAdminService::new(
                repos.users.clone(),
                repos.users_write.clone(),
                repos.relations.clone(),
            )
            .with_cache_trigger_opt(cache_trigger.clone()),
            messages: MessageService::new(
                repos.users.clone(),
                repos.groups.clone(),
                repos.sessions.clone(),
                repos.messages.clone(),
            ),
            projections,
            cache_trigger,
        }
    }

    pub fn cache_trigger(&self) -> Option<&Arc<CacheTrigger>> {
        self.cache_trigger.as_ref()
    }

    // Groups

    pub async fn create_group(
        &self,
        owner: &str,
        name: &str,
        notice: &str,
        avatar: &str,
        add_mode: AddMode,
    ) -> Reply<GroupId> {
        let result = async {
            let command = CreateGroupCommand {
                owner: UserId::parse(owner)?,
                name: name.to_string(),
                notice: notice.to_string(),
                avatar: avatar.to_string(),
                add_mode,
            };
            self.groups.create_group(command).await.map(|group| group.uuid)
        }
        .await;
        Reply::from_result("create_group", "group created", result)
    }

    pub async fn load_my_groups(&self, owner: &str) -> Reply<Vec<GroupSummaryView>> {
        let result = async {
            let owner = UserId::parse(owner)?;
            self.projections.owned_groups(&owner).await
        }
        .await;
        Reply::from_result("load_my_groups", "loaded", result)
    }

    pub async fn group_info(&self, group: &str) -> Reply<GroupInfoView> {
        let result = async {
            let group = GroupId::parse(group)?;
            self.projections.group_info(&group).await
        }
        .await;
        Reply::from_result("group_info", "loaded", result)
    }

    pub async fn group_list(&self) -> Reply<Vec<GroupListEntry>> {
        Reply::from_result("group_list", "loaded", self.groups.list_all_groups().await)
    }

    pub async fn group_member_list(&self, group: &str) -> Reply<Vec<GroupMemberView>> {
        let result = async {
            let group = GroupId::parse(group)?;
            self.projections.group_members(&group).await
        }
        .await;
        Reply::from_result("group_member_list", "loaded", result)
    }

    pub async fn check_group_add_mode(&self, group: &str) -> Reply<AddMode> {
        let result = async {
            let group = GroupId::parse(group)?;
            self.groups.add_mode(&group).await
        }
        .await;
        Reply::from_result("check_group_add_mode", "loaded", result)
    }

    pub async fn enter_group_directly(&self, group: &str, user: &str) -> Reply<()> {
        let result = async {
            let group = GroupId::parse(group)?;
            let user = UserId::parse(user)?;
            self.groups
                .enter_group_directly(&group, &user)
                .await
                .map(|_| ())
        }
        .await;
        Reply::from_result("enter_group_directly", "joined the group", result)
    }

    pub async fn leave_group(&self, user: &str, group: &str) -> Reply<()> {
        let result = async {
            let user = UserId::parse(user)?;
            let group = GroupId::parse(group)?;
            self.groups.leave_group(&user, &group).await.map(|_| ())
        }
        .await;
        Reply::from_result("leave_group", "left the group", result)
    }

    pub async fn remove_group_members(
        &self,
        owner: &str,
        group: &str,
        members: &[String],
    ) -> Reply<Vec<UserId>> {
        let result = async {
            let owner = UserId::parse(owner)?;
            let group = GroupId::parse(group)?;
            let members = user_ids(members)?;
            self.groups.remove_members(&owner, &group, &members).await
        }
        .await;
        Reply::from_result("remove_group_members", "members removed", result)
    }

    pub async fn dismiss_group(&self, owner: &str, group: &str) -> Reply<()> {
        let result = async {
            let owner = UserId::parse(owner)?;
            let group = GroupId::parse(group)?;
            self.groups.dismiss_group(&owner, &group).await
        }
        .await;
        Reply::from_result("dismiss_group", "group dismissed", result)
    }

    pub async fn update_group_info(
        &self,
        requester: &str,
        group: &str,
        command: UpdateGroupCommand,
    ) -> Reply<()> {
        let result = async {
            let requester = UserId::parse(requester)?;
            let group = GroupId::parse(group)?;
            self.groups
                .update_group_profile(&requester, &group, command)
                .await
                .map(|_| ())
        }
        .await;
        Reply::from_result("update_group_info", "group updated", result)
    }

    pub async fn delete_groups(&self, groups: &[String]) -> Reply<()> {
        let result = async {
            let groups = group_ids(groups)?;
            self.groups.delete_groups(&groups).await
        }
        .await;
        Reply::from_result("delete_groups", "groups deleted", result)
    }

    pub async fn set_groups_status(&self, groups: &[String], status: GroupStatus) -> Reply<()> {
        let result = async {
            let groups = group_ids(groups)?;
            self.groups.set_groups_status(&groups, status).await
        }
        .await;
        Reply::from_result("set_groups_status", "group status updated", result)
    }

    // Contacts

    pub async fn user_list(&self, owner: &str) -> Reply<Vec<ContactUserView>> {
        let result = async {
            let owner = UserId::parse(owner)?;
            self.projections.contact_user_list(&owner).await
        }
        .await;
        Reply::from_result("user_list", "loaded", result)
    }

    pub async fn load_my_joined_groups(&self, owner: &str) -> Reply<Vec<GroupSummaryView>> {
        let result = async {
            let owner = UserId::parse(owner)?;
            self.projections.joined_groups(&owner).await
        }
        .await;
        Reply::from_result("load_my_joined_groups", "loaded", result)
    }

    pub async fn contact_info(&self, contact: &str) -> Reply<ContactInfo> {
        let result = async {
            let contact = ContactTarget::parse(contact)?;
            self.contacts.contact_info(&contact).await
        }
        .await;
        Reply::from_result("contact_info", "loaded", result)
    }

    pub async fn delete_contact(&self, owner: &str, contact: &str) -> Reply<()> {
        let result = async {
            let owner = UserId::parse(owner)?;
            let contact = UserId::parse(contact)?;
            self.contacts.delete_contact(&owner, &contact).await
        }
        .await;
        Reply::from_result("delete_contact", "contact deleted", result)
    }

    pub async fn black_contact(&self, owner: &str, contact: &str) -> Reply<()> {
        let result = async {
            let owner = UserId::parse(owner)?;
            let contact = UserId::parse(contact)?;
            self.contacts.black_contact(&owner, &contact).await
        }
        .await;
        Reply::from_result("black_contact", "contact blocked", result)
    }

    pub async fn cancel_black_contact(&self, owner: &str, contact: &str) -> Reply<()> {
        let result = async {
            let owner = UserId::parse(owner)?;
            let contact = UserId::parse(contact)?;
            self.contacts.cancel_black_contact(&owner, &contact).await
        }
        .await;
        Reply::from_result("cancel_black_contact", "contact unblocked", result)
    }

    // Applications

    pub async fn apply_contact(&self, requester: &str, target: &str, message: &str) -> Reply<ApplyId> {
        let result = async {
            let requester = UserId::parse(requester)?;
            let target = ContactTarget::parse(target)?;
            self.applies
                .apply(&requester, &target, message)
                .await
                .map(|apply| apply.uuid)
        }
        .await;
        Reply::from_result("apply_contact", "application sent", result)
    }

    /// Pending applications addressed to a user.
    pub async fn new_contact_list(&self, owner: &str) -> Reply<Vec<PendingApply>> {
        let result = async {
            let owner = ContactTarget::User(UserId::parse(owner)?);
            self.applies.list_pending(&owner).await
        }
        .await;
        Reply::from_result("new_contact_list", "loaded", result)
    }

    /// Pending join applications addressed to a group.
    pub async fn add_group_list(&self, group: &str) -> Reply<Vec<PendingApply>> {
        let result = async {
            let group = ContactTarget::Group(GroupId::parse(group)?);
            self.applies.list_pending(&group).await
        }
        .await;
        Reply::from_result("add_group_list", "loaded", result)
    }

    pub async fn pass_contact_apply(&self, target: &str, requester: &str) -> Reply<()> {
        let result = async {
            let target = ContactTarget::parse(target)?;
            let requester = UserId::parse(requester)?;
            self.applies.pass(&target, &requester).await
        }
        .await;
        Reply::from_result("pass_contact_apply", "application passed", result)
    }

    pub async fn refuse_contact_apply(&self, target: &str, requester: &str) -> Reply<()> {
        let result = async {
            let target = ContactTarget::parse(target)?;
            let requester = UserId::parse(requester)?;
            self.applies.refuse(&target, &requester).await
        }
        .await;
        Reply::from_result("refuse_contact_apply", "application refused", result)
    }

    pub async fn black_apply(&self, target: &str, requester: &str) -> Reply<()> {
        let result = async {
            let target = ContactTarget::parse(target)?;
            let requester = UserId::parse(requester)?;
            self.applies.black(&target, &requester).await
        }
        .await;
        Reply::from_result("black_apply", "application blocked", result)
    }

    // Sessions

    pub async fn open_session(&self, send: &str, receive: &str) -> Reply<SessionId> {
        let result = async {
            let send = UserId::parse(send)?;
            let receive = ContactTarget::parse(receive)?;
            self.sessions.open_session(&send, &receive).await
        }
        .await;
        Reply::from_result("open_session", "session opened", result)
    }

    pub async fn create_session(&self, send: &str, receive: &str) -> Reply<SessionId> {
        let result = async {
            let send = UserId::parse(send)?;
            let receive = ContactTarget::parse(receive)?;
            self.sessions
                .create_session(&send, &receive)
                .await
                .map(|session| session.uuid)
        }
        .await;
        Reply::from_result("create_session", "session created", result)
    }

    pub async fn check_open_session_allowed(&self, send: &str, receive: &str) -> Reply<bool> {
        let result = async {
            let send = UserId::parse(send)?;
            let receive = ContactTarget::parse(receive)?;
            self.sessions
                .check_open_session_allowed(&send, &receive)
                .await
                .map(|()| true)
        }
        .await;
        Reply::from_result("check_open_session_allowed", "session allowed", result)
    }

    pub async fn user_session_list(&self, owner: &str) -> Reply<Vec<UserSessionView>> {
        let result = async {
            let owner = UserId::parse(owner)?;
            self.projections.user_sessions(&owner).await
        }
        .await;
        Reply::from_result("user_session_list", "loaded", result)
    }

    pub async fn group_session_list(&self, owner: &str) -> Reply<Vec<GroupSessionView>> {
        let result = async {
            let owner = UserId::parse(owner)?;
            self.projections.group_sessions(&owner).await
        }
        .await;
        Reply::from_result("group_session_list", "loaded", result)
    }

    pub async fn delete_session(&self, owner: &str, session: &str) -> Reply<()> {
        let result = async {
            let owner = UserId::parse(owner)?;
            let session = SessionId::parse(session)?;
            self.sessions.delete_session(&owner, &session).await
        }
        .await;
        Reply::from_result("delete_session", "session deleted", result)
    }

    // Messages

    pub async fn message_list(&self, user_one: &str, user_two: &str) -> Reply<Vec<MessageRecord>> {
        let result = async {
            let user_one = UserId::parse(user_one)?;
            let user_two = UserId::parse(user_two)?;
            self.messages.message_list(&user_one, &user_two).await
        }
        .await;
        Reply::from_result("message_list", "loaded", result)
    }

    pub async fn group_message_list(&self, group: &str) -> Reply<Vec<MessageRecord>> {
        let result = async {
            let group = GroupId::parse(group)?;
            self.messages.group_message_list(&group).await
        }
        .await;
        Reply::from_result("group_message_list", "loaded", result)
    }

    pub async fn record_message(
        &self,
        sender: &str,
        session: &str,
        content: &str,
    ) -> Reply<MessageRecord> {
        let result = async {
            let sender = UserId::parse(sender)?;
            let session = SessionId::parse(session)?;
            self.messages.record_message(&sender, &session, content).await
        }
        .await;
        Reply::from_result("record_message", "message recorded", result)
    }

    // Users

    pub async fn create_user(&self, params: CreateUserParams) -> Reply<UserId> {
        let result = self.users.create_user(params).await.map(|user| user.uuid);
        Reply::from_result("create_user", "user created", result)
    }

    pub async fn set_users_status(&self, users: &[String], status: UserStatus) -> Reply<()> {
        let result = async {
            let users = user_ids(users)?;
            self.users.set_users_status(&users, status).await
        }
        .await;
        Reply::from_result("set_users_status", "user status updated", result)
    }

    pub async fn purge_users(&self, users: &[String]) -> Reply<PurgeOutcome> {
        let result = async {
            let users = user_ids(users)?;
            self.users.purge_users(&users).await
        }
        .await;
        Reply::from_result("purge_users", "users purged", result)
    }

    pub async fn set_admin(&self, users: &[String], is_admin: bool) -> Reply<u64> {
        let result = async {
            let users = user_ids(users)?;
            self.users.set_admin(&users, is_admin).await
        }
        .await;
        Reply::from_result("set_admin", "admin flag updated", result)
    }
}
