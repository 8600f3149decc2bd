//! Relationship cascades against a real Postgres database.
//!
//! Run with `DATABASE_URL` pointing at a disposable server and `--ignored`.

mod common;

use std::sync::Arc;

use common::ok;
use rapport::application::core::{ChatCore, CoreRepos};
use rapport::application::reply::{CODE_CANNOT_REMOVE_OWNER, CODE_REJECTED};
use rapport::application::repos::{
    AppliesRepo, ContactsRepo, CreateUserParams, GroupsRepo, SessionsRepo,
};
use rapport::domain::ids::{ContactTarget, UserId};
use rapport::domain::types::{AddMode, ContactStatus};
use rapport::infra::db::PostgresRepositories;
use sqlx::PgPool;

async fn user(core: &ChatCore, nickname: &str) -> UserId {
    ok(core
        .create_user(CreateUserParams {
            nickname: nickname.to_string(),
            avatar: String::new(),
            telephone: String::new(),
            email: format!("{nickname}@example.com"),
            signature: String::new(),
            is_admin: false,
        })
        .await)
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn dismiss_cascades_in_one_transaction(pool: PgPool) {
    let repos = Arc::new(PostgresRepositories::new(pool));
    let core = ChatCore::new(CoreRepos::from_backend(repos.clone()), None);

    let owner = user(&core, "owner").await;
    let member = user(&core, "member").await;
    let applicant = user(&core, "applicant").await;
    let group = ok(core
        .create_group(owner.as_str(), "pg", "", "", AddMode::Direct)
        .await);
    ok(core.enter_group_directly(group.as_str(), member.as_str()).await);
    ok(core.apply_contact(applicant.as_str(), group.as_str(), "hi").await);
    ok(core.open_session(member.as_str(), group.as_str()).await);

    let stored = repos.find_group(&group).await.unwrap().expect("group");
    assert_eq!(stored.members, vec![owner.clone(), member.clone()]);
    assert_eq!(stored.member_cnt, 2);

    let reply = core
        .remove_group_members(owner.as_str(), group.as_str(), &[owner.to_string()])
        .await;
    assert_eq!(reply.code, CODE_CANNOT_REMOVE_OWNER);

    ok(core.dismiss_group(owner.as_str(), group.as_str()).await);

    let target = ContactTarget::Group(group.clone());
    assert!(repos.find_group(&group).await.unwrap().is_none());
    assert!(repos.find_group_any(&group).await.unwrap().is_some());
    assert!(repos.find_contact(&member, &target).await.unwrap().is_none());
    assert!(
        repos
            .find_session_between(&member, &target)
            .await
            .unwrap()
            .is_none()
    );
    assert!(repos.find_apply(&applicant, &target).await.unwrap().is_none());
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn blocking_writes_both_edges(pool: PgPool) {
    let repos = Arc::new(PostgresRepositories::new(pool));
    let core = ChatCore::new(CoreRepos::from_backend(repos.clone()), None);

    let alice = user(&core, "alice").await;
    let bob = user(&core, "bob").await;
    ok(core.apply_contact(alice.as_str(), bob.as_str(), "hi").await);
    ok(core.pass_contact_apply(bob.as_str(), alice.as_str()).await);
    ok(core.black_contact(alice.as_str(), bob.as_str()).await);

    let forward = repos
        .find_contact(&alice, &ContactTarget::User(bob.clone()))
        .await
        .unwrap()
        .expect("forward edge");
    let backward = repos
        .find_contact(&bob, &ContactTarget::User(alice.clone()))
        .await
        .unwrap()
        .expect("backward edge");
    assert_eq!(forward.status, ContactStatus::Black);
    assert_eq!(backward.status, ContactStatus::BeBlack);

    let reply = core.apply_contact(bob.as_str(), alice.as_str(), "again").await;
    assert_eq!(reply.code, CODE_REJECTED);
}
