mod common;

use std::time::Duration;

use common::{Harness, ok};
use rapport::application::contacts::ContactInfo;
use rapport::application::reply::{CODE_NOT_FOUND, CODE_REJECTED};
use rapport::application::repos::{AppliesRepo, ContactsRepo};
use rapport::domain::ids::{ContactTarget, UserId};
use rapport::domain::types::{AddMode, ApplyStatus, ContactStatus, UserStatus};

#[tokio::test]
async fn reapplying_renews_the_same_application() {
    let h = Harness::cached();
    let alice = h.user("alice").await;
    let bob = h.user("bob").await;

    let target = ContactTarget::User(bob.clone());

    let first = ok(h.core.apply_contact(alice.as_str(), bob.as_str(), "hello").await);
    let before = h
        .store
        .find_apply(&alice, &target)
        .await
        .unwrap()
        .expect("apply stored");
    std::thread::sleep(Duration::from_millis(5));
    let second = ok(h.core.apply_contact(alice.as_str(), bob.as_str(), "hello again").await);
    assert_eq!(first, second);

    let after = h
        .store
        .find_apply(&alice, &target)
        .await
        .unwrap()
        .expect("apply stored");
    assert_eq!(after.uuid, before.uuid);
    assert_eq!(after.status, ApplyStatus::Pending);
    assert_eq!(after.message, "hello again");
    assert!(after.last_apply_at > before.last_apply_at);
    assert_eq!(h.store.list_pending_applies(&target).await.unwrap().len(), 1);

    let pending = ok(h.core.new_contact_list(bob.as_str()).await);
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].apply_id, first);
    assert_eq!(pending[0].message, "hello again");
    assert_eq!(pending[0].contact_name, "alice");

    let reply = h.core.apply_contact(alice.as_str(), alice.as_str(), "me").await;
    assert_eq!(reply.code, CODE_REJECTED);
}

#[tokio::test]
async fn passing_creates_both_edges() {
    let h = Harness::cached();
    let alice = h.user("alice").await;
    let bob = h.user("bob").await;

    assert!(ok(h.core.user_list(alice.as_str()).await).is_empty());
    h.befriend(&alice, &bob).await;

    let alice_contacts = ok(h.core.user_list(alice.as_str()).await);
    assert_eq!(alice_contacts.len(), 1);
    assert_eq!(alice_contacts[0].user_id, bob);
    let bob_contacts = ok(h.core.user_list(bob.as_str()).await);
    assert_eq!(bob_contacts[0].user_id, alice);

    let apply = h
        .store
        .find_apply(&alice, &ContactTarget::User(bob.clone()))
        .await
        .unwrap()
        .expect("apply kept");
    assert_eq!(apply.status, ApplyStatus::Agree);

    let reply = h.core.apply_contact(alice.as_str(), bob.as_str(), "again").await;
    assert_eq!(reply.code, CODE_REJECTED);
    let reply = h.core.pass_contact_apply(bob.as_str(), alice.as_str()).await;
    assert_eq!(reply.code, CODE_REJECTED);
}

#[tokio::test]
async fn refused_and_blocked_applications() {
    let h = Harness::cached();
    let alice = h.user("alice").await;
    let bob = h.user("bob").await;
    let mallory = h.user("mallory").await;

    ok(h.core.apply_contact(alice.as_str(), bob.as_str(), "hi").await);
    ok(h.core.refuse_contact_apply(bob.as_str(), alice.as_str()).await);
    assert!(ok(h.core.new_contact_list(bob.as_str()).await).is_empty());
    let reply = h.core.refuse_contact_apply(bob.as_str(), alice.as_str()).await;
    assert_eq!(reply.code, CODE_REJECTED);

    // A refused application may be filed again.
    ok(h.core.apply_contact(alice.as_str(), bob.as_str(), "please").await);
    assert_eq!(ok(h.core.new_contact_list(bob.as_str()).await).len(), 1);

    let spam = ok(h.core.apply_contact(mallory.as_str(), bob.as_str(), "spam").await);
    ok(h.core.black_apply(bob.as_str(), mallory.as_str()).await);
    let reply = h.core.apply_contact(mallory.as_str(), bob.as_str(), "spam again").await;
    assert_eq!(reply.code, CODE_REJECTED);
    let kept = h
        .store
        .find_apply(&mallory, &ContactTarget::User(bob.clone()))
        .await
        .unwrap()
        .expect("blocked apply kept");
    assert_eq!(kept.uuid, spam);
    assert_eq!(kept.status, ApplyStatus::Black);
    assert_eq!(kept.message, "spam");
    assert_eq!(ok(h.core.new_contact_list(bob.as_str()).await).len(), 1);

    let reply = h.core.black_apply(bob.as_str(), h.user("stranger").await.as_str()).await;
    assert_eq!(reply.code, CODE_NOT_FOUND);
}

#[tokio::test]
async fn blocking_is_asymmetric_and_reversible() {
    let h = Harness::cached();
    let alice = h.user("alice").await;
    let bob = h.user("bob").await;
    h.befriend(&alice, &bob).await;
    ok(h.core.open_session(alice.as_str(), bob.as_str()).await);
    assert_eq!(ok(h.core.user_session_list(alice.as_str()).await).len(), 1);

    ok(h.core.black_contact(alice.as_str(), bob.as_str()).await);
    let edge = |owner: &UserId, other: &UserId| {
        let store = h.store.clone();
        let owner = owner.clone();
        let other = ContactTarget::User(other.clone());
        async move { store.find_contact(&owner, &other).await.unwrap().map(|e| e.status) }
    };
    assert_eq!(edge(&alice, &bob).await, Some(ContactStatus::Black));
    assert_eq!(edge(&bob, &alice).await, Some(ContactStatus::BeBlack));
    assert!(ok(h.core.user_session_list(alice.as_str()).await).is_empty());

    let reply = h.core.black_contact(alice.as_str(), bob.as_str()).await;
    assert_eq!(reply.code, CODE_REJECTED);
    let reply = h
        .core
        .check_open_session_allowed(bob.as_str(), alice.as_str())
        .await;
    assert_eq!(reply.code, CODE_REJECTED);
    let reply = h.core.apply_contact(bob.as_str(), alice.as_str(), "sorry").await;
    assert_eq!(reply.code, CODE_REJECTED);

    ok(h.core.cancel_black_contact(alice.as_str(), bob.as_str()).await);
    assert_eq!(edge(&alice, &bob).await, Some(ContactStatus::Normal));
    assert_eq!(edge(&bob, &alice).await, Some(ContactStatus::Normal));
    assert!(ok(h
        .core
        .check_open_session_allowed(bob.as_str(), alice.as_str())
        .await));

    let reply = h.core.cancel_black_contact(alice.as_str(), bob.as_str()).await;
    assert_eq!(reply.code, CODE_REJECTED);
}

#[tokio::test]
async fn blocking_back_keeps_the_first_block() {
    let h = Harness::cached();
    let alice = h.user("alice").await;
    let bob = h.user("bob").await;
    h.befriend(&alice, &bob).await;
    let edge = |owner: &UserId, other: &UserId| {
        let store = h.store.clone();
        let owner = owner.clone();
        let other = ContactTarget::User(other.clone());
        async move { store.find_contact(&owner, &other).await.unwrap().map(|e| e.status) }
    };

    ok(h.core.black_contact(alice.as_str(), bob.as_str()).await);
    let reply = h.core.black_contact(bob.as_str(), alice.as_str()).await;
    assert_eq!(reply.code, CODE_REJECTED);
    assert_eq!(edge(&alice, &bob).await, Some(ContactStatus::Black));
    assert_eq!(edge(&bob, &alice).await, Some(ContactStatus::BeBlack));

    let reply = h.core.cancel_black_contact(bob.as_str(), alice.as_str()).await;
    assert_eq!(reply.code, CODE_REJECTED);
    assert_eq!(edge(&alice, &bob).await, Some(ContactStatus::Black));

    ok(h.core.cancel_black_contact(alice.as_str(), bob.as_str()).await);
    assert_eq!(edge(&alice, &bob).await, Some(ContactStatus::Normal));
    assert_eq!(edge(&bob, &alice).await, Some(ContactStatus::Normal));
}

#[tokio::test]
async fn deleting_a_contact_removes_both_directions() {
    let h = Harness::cached();
    let alice = h.user("alice").await;
    let bob = h.user("bob").await;
    h.befriend(&alice, &bob).await;
    ok(h.core.open_session(alice.as_str(), bob.as_str()).await);
    ok(h.core.open_session(bob.as_str(), alice.as_str()).await);
    assert_eq!(ok(h.core.user_list(bob.as_str()).await).len(), 1);

    ok(h.core.delete_contact(alice.as_str(), bob.as_str()).await);

    assert!(ok(h.core.user_list(alice.as_str()).await).is_empty());
    assert!(ok(h.core.user_list(bob.as_str()).await).is_empty());
    assert!(ok(h.core.user_session_list(alice.as_str()).await).is_empty());
    assert!(ok(h.core.user_session_list(bob.as_str()).await).is_empty());
    assert!(
        h.store
            .find_apply(&alice, &ContactTarget::User(bob.clone()))
            .await
            .unwrap()
            .is_none()
    );

    let reply = h.core.delete_contact(alice.as_str(), bob.as_str()).await;
    assert_eq!(reply.code, CODE_REJECTED);

    // The pair can become contacts again from scratch.
    h.befriend(&bob, &alice).await;
    assert_eq!(ok(h.core.user_list(alice.as_str()).await).len(), 1);
}

#[tokio::test]
async fn contact_info_describes_users_and_groups() {
    let h = Harness::cached();
    let alice = h.user("alice").await;
    let group = h.group(&alice, "book club", AddMode::Approval).await;

    match ok(h.core.contact_info(alice.as_str()).await) {
        ContactInfo::User {
            contact_id,
            contact_name,
            email,
            ..
        } => {
            assert_eq!(contact_id, alice);
            assert_eq!(contact_name, "alice");
            assert_eq!(email, "alice@example.com");
        }
        other => panic!("expected a user, got {other:?}"),
    }

    match ok(h.core.contact_info(group.as_str()).await) {
        ContactInfo::Group {
            contact_name,
            add_mode,
            member_cnt,
            owner_id,
            ..
        } => {
            assert_eq!(contact_name, "book club");
            assert_eq!(add_mode, AddMode::Approval);
            assert_eq!(member_cnt, 1);
            assert_eq!(owner_id, alice);
        }
        other => panic!("expected a group, got {other:?}"),
    }
}

#[tokio::test]
async fn sessions_and_messages_follow_user_status() {
    let h = Harness::cached();
    let alice = h.user("alice").await;
    let bob = h.user("bob").await;
    h.befriend(&alice, &bob).await;

    let session = ok(h.core.open_session(alice.as_str(), bob.as_str()).await);
    assert_eq!(
        ok(h.core.open_session(alice.as_str(), bob.as_str()).await),
        session
    );
    let listed = ok(h.core.user_session_list(alice.as_str()).await);
    assert_eq!(listed[0].session_id, session);
    assert_eq!(listed[0].username, "bob");

    ok(h.core
        .record_message(alice.as_str(), session.as_str(), "ping")
        .await);
    let reply = h
        .core
        .record_message(bob.as_str(), session.as_str(), "forged")
        .await;
    assert_eq!(reply.code, CODE_REJECTED);
    let history = ok(h.core.message_list(bob.as_str(), alice.as_str()).await);
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].content, "ping");

    let reply = h.core.delete_session(bob.as_str(), session.as_str()).await;
    assert_eq!(reply.code, CODE_REJECTED);

    ok(h.core
        .set_users_status(&[bob.to_string()], UserStatus::Disable)
        .await);
    assert!(ok(h.core.user_session_list(alice.as_str()).await).is_empty());
    let reply = h
        .core
        .check_open_session_allowed(alice.as_str(), bob.as_str())
        .await;
    assert_eq!(reply.code, CODE_REJECTED);

    ok(h.core
        .set_users_status(&[bob.to_string()], UserStatus::Normal)
        .await);
    let reopened = ok(h.core.open_session(alice.as_str(), bob.as_str()).await);
    assert_ne!(reopened, session);
    ok(h.core.delete_session(alice.as_str(), reopened.as_str()).await);
    assert!(ok(h.core.user_session_list(alice.as_str()).await).is_empty());

    // Messages outlive the sessions that carried them.
    assert_eq!(
        ok(h.core.message_list(alice.as_str(), bob.as_str()).await).len(),
        1
    );
}

#[tokio::test]
async fn purging_a_user_dismisses_owned_groups() {
    let h = Harness::cached();
    let owner = h.user("owner").await;
    let member = h.user("member").await;
    let friend = h.user("friend").await;
    let owned = h.group(&owner, "owned", AddMode::Direct).await;
    let joined = h.group(&friend, "joined", AddMode::Direct).await;
    ok(h.core.enter_group_directly(owned.as_str(), member.as_str()).await);
    ok(h.core.enter_group_directly(joined.as_str(), owner.as_str()).await);
    h.befriend(&owner, &friend).await;

    let outcome = ok(h.core.purge_users(&[owner.to_string()]).await);
    assert_eq!(outcome.users_removed, 1);
    assert_eq!(outcome.dismissed_groups, vec![owned.clone()]);
    assert_eq!(outcome.shrunk_groups, vec![joined.clone()]);

    assert!(ok(h.core.group_info(owned.as_str()).await).is_deleted);
    assert_eq!(ok(h.core.group_info(joined.as_str()).await).member_cnt, 1);
    assert!(ok(h.core.user_list(friend.as_str()).await).is_empty());
    assert!(ok(h.core.load_my_joined_groups(member.as_str()).await).is_empty());
    assert!(
        h.store
            .find_contact(&friend, &ContactTarget::User(owner.clone()))
            .await
            .unwrap()
            .is_none()
    );

    assert_eq!(ok(h.core.set_admin(&[friend.to_string()], true).await), 1);
    assert_eq!(ok(h.core.set_admin(&[owner.to_string()], true).await), 0);
}
