mod common;

use common::{Harness, ids, ok};
use rapport::application::groups::UpdateGroupCommand;
use rapport::application::reply::{CODE_CANNOT_REMOVE_OWNER, CODE_NOT_FOUND, CODE_REJECTED};
use rapport::application::repos::{AppliesRepo, ContactsRepo, SessionsRepo};
use rapport::domain::ids::ContactTarget;
use rapport::domain::types::{AddMode, GroupStatus};

#[tokio::test]
async fn join_and_leave_keep_members_and_edges_in_step() {
    let h = Harness::cached();
    let owner = h.user("owner").await;
    let alice = h.user("alice").await;
    let group = h.group(&owner, "rustaceans", AddMode::Direct).await;

    ok(h.core.enter_group_directly(group.as_str(), alice.as_str()).await);
    let info = ok(h.core.group_info(group.as_str()).await);
    assert_eq!(info.member_cnt, 2);

    let members = ok(h.core.group_member_list(group.as_str()).await);
    let member_ids: Vec<_> = members.iter().map(|m| m.user_id.clone()).collect();
    assert_eq!(member_ids, vec![owner.clone(), alice.clone()]);

    let joined = ok(h.core.load_my_joined_groups(alice.as_str()).await);
    assert_eq!(joined.len(), 1);
    assert_eq!(joined[0].group_id, group);
    assert!(ok(h.core.load_my_joined_groups(owner.as_str()).await).is_empty());

    let again = h.core.enter_group_directly(group.as_str(), alice.as_str()).await;
    assert_eq!(again.code, CODE_REJECTED);

    let session = ok(h.core.open_session(alice.as_str(), group.as_str()).await);
    ok(h.core.leave_group(alice.as_str(), group.as_str()).await);

    let target = ContactTarget::Group(group.clone());
    assert!(h.store.find_contact(&alice, &target).await.unwrap().is_none());
    assert!(
        h.store
            .find_session_between(&alice, &target)
            .await
            .unwrap()
            .is_none()
    );
    assert!(h.store.find_session(&session).await.unwrap().is_none());

    let info = ok(h.core.group_info(group.as_str()).await);
    assert_eq!(info.member_cnt, 1);
    assert!(ok(h.core.load_my_joined_groups(alice.as_str()).await).is_empty());
}

#[tokio::test]
async fn approval_groups_refuse_direct_entry() {
    let h = Harness::cached();
    let owner = h.user("owner").await;
    let bob = h.user("bob").await;
    let group = h.group(&owner, "invite only", AddMode::Approval).await;

    assert_eq!(
        ok(h.core.check_group_add_mode(group.as_str()).await),
        AddMode::Approval
    );
    let reply = h.core.enter_group_directly(group.as_str(), bob.as_str()).await;
    assert_eq!(reply.code, CODE_REJECTED);

    ok(h.core.apply_contact(bob.as_str(), group.as_str(), "let me in").await);
    let pending = ok(h.core.add_group_list(group.as_str()).await);
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].contact_id, bob);
    assert_eq!(pending[0].message, "let me in");

    ok(h.core.pass_contact_apply(group.as_str(), bob.as_str()).await);
    let info = ok(h.core.group_info(group.as_str()).await);
    assert_eq!(info.member_cnt, 2);
    assert!(ok(h.core.add_group_list(group.as_str()).await).is_empty());
}

#[tokio::test]
async fn owner_is_protected() {
    let h = Harness::cached();
    let owner = h.user("owner").await;
    let alice = h.user("alice").await;
    let group = h.group(&owner, "protected", AddMode::Direct).await;
    ok(h.core.enter_group_directly(group.as_str(), alice.as_str()).await);

    let reply = h
        .core
        .remove_group_members(owner.as_str(), group.as_str(), &ids(&[&alice, &owner]))
        .await;
    assert_eq!(reply.code, CODE_CANNOT_REMOVE_OWNER);
    assert!(reply.data.is_none());
    assert_eq!(ok(h.core.group_info(group.as_str()).await).member_cnt, 2);

    let reply = h.core.leave_group(owner.as_str(), group.as_str()).await;
    assert_eq!(reply.code, CODE_REJECTED);

    let reply = h
        .core
        .remove_group_members(alice.as_str(), group.as_str(), &ids(&[&owner]))
        .await;
    assert_eq!(reply.code, CODE_REJECTED);

    let removed = ok(h
        .core
        .remove_group_members(owner.as_str(), group.as_str(), &ids(&[&alice]))
        .await);
    assert_eq!(removed, vec![alice.clone()]);
    assert_eq!(ok(h.core.group_info(group.as_str()).await).member_cnt, 1);
}

#[tokio::test]
async fn dismiss_retracts_every_dependent_row() {
    let h = Harness::cached();
    let owner = h.user("owner").await;
    let member = h.user("member").await;
    let applicant = h.user("applicant").await;
    let group = h.group(&owner, "short lived", AddMode::Direct).await;
    ok(h.core.enter_group_directly(group.as_str(), member.as_str()).await);
    ok(h.core.apply_contact(applicant.as_str(), group.as_str(), "hello").await);
    ok(h.core.open_session(owner.as_str(), group.as_str()).await);
    ok(h.core.open_session(member.as_str(), group.as_str()).await);

    assert_eq!(ok(h.core.load_my_groups(owner.as_str()).await).len(), 1);
    assert_eq!(ok(h.core.group_session_list(member.as_str()).await).len(), 1);

    let reply = h.core.dismiss_group(member.as_str(), group.as_str()).await;
    assert_eq!(reply.code, CODE_REJECTED);
    ok(h.core.dismiss_group(owner.as_str(), group.as_str()).await);

    let target = ContactTarget::Group(group.clone());
    for user in [&owner, &member] {
        assert!(h.store.find_contact(user, &target).await.unwrap().is_none());
        assert!(
            h.store
                .find_session_between(user, &target)
                .await
                .unwrap()
                .is_none()
        );
    }
    assert!(h.store.find_apply(&applicant, &target).await.unwrap().is_none());

    assert!(ok(h.core.load_my_groups(owner.as_str()).await).is_empty());
    assert!(ok(h.core.load_my_joined_groups(member.as_str()).await).is_empty());
    assert!(ok(h.core.group_session_list(member.as_str()).await).is_empty());

    let info = ok(h.core.group_info(group.as_str()).await);
    assert!(info.is_deleted);

    let listed = ok(h.core.group_list().await);
    assert!(listed.iter().any(|entry| entry.uuid == group && entry.is_deleted));

    let reply = h.core.enter_group_directly(group.as_str(), applicant.as_str()).await;
    assert_eq!(reply.code, CODE_NOT_FOUND);
}

#[tokio::test]
async fn profile_updates_keep_unset_fields() {
    let h = Harness::cached();
    let owner = h.user("owner").await;
    let other = h.user("other").await;
    let group = h.group(&owner, "before", AddMode::Direct).await;
    let original = ok(h.core.group_info(group.as_str()).await);

    let reply = h
        .core
        .update_group_info(
            other.as_str(),
            group.as_str(),
            UpdateGroupCommand {
                name: Some("hijacked".to_string()),
                ..Default::default()
            },
        )
        .await;
    assert_eq!(reply.code, CODE_REJECTED);

    ok(h.core
        .update_group_info(
            owner.as_str(),
            group.as_str(),
            UpdateGroupCommand {
                name: Some("after".to_string()),
                add_mode: Some(AddMode::Approval),
                ..Default::default()
            },
        )
        .await);

    let info = ok(h.core.group_info(group.as_str()).await);
    assert_eq!(info.name, "after");
    assert_eq!(info.notice, original.notice);
    assert_eq!(info.add_mode, AddMode::Approval);
    assert_eq!(
        ok(h.core.load_my_groups(owner.as_str()).await)[0].group_name,
        "after"
    );
}

#[tokio::test]
async fn disabled_groups_reject_joins_and_sessions() {
    let h = Harness::cached();
    let owner = h.user("owner").await;
    let carol = h.user("carol").await;
    let group = h.group(&owner, "paused", AddMode::Direct).await;
    ok(h.core.open_session(owner.as_str(), group.as_str()).await);

    ok(h.core
        .set_groups_status(&[group.to_string()], GroupStatus::Disable)
        .await);
    assert_eq!(
        ok(h.core.group_info(group.as_str()).await).status,
        GroupStatus::Disable
    );
    assert!(ok(h.core.group_session_list(owner.as_str()).await).is_empty());

    let reply = h.core.enter_group_directly(group.as_str(), carol.as_str()).await;
    assert_eq!(reply.code, CODE_REJECTED);
    let reply = h
        .core
        .check_open_session_allowed(carol.as_str(), group.as_str())
        .await;
    assert_eq!(reply.code, CODE_REJECTED);

    ok(h.core
        .set_groups_status(&[group.to_string()], GroupStatus::Normal)
        .await);
    ok(h.core.enter_group_directly(group.as_str(), carol.as_str()).await);
}

#[tokio::test]
async fn malformed_ids_are_rejected_before_storage() {
    let h = Harness::cached();
    let reply = h.core.group_info("U123").await;
    assert_eq!(reply.code, CODE_REJECTED);
    let reply = h.core.leave_group("not-an-id", "G123").await;
    assert_eq!(reply.code, CODE_REJECTED);
    let reply = h.core.group_info("G00000000000").await;
    assert_eq!(reply.code, CODE_NOT_FOUND);
}
