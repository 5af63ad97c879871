mod common;

use collab_service::config::{SessionPolicy, SessionScopeKind};
use collab_service::models::{Permission, SessionKey, UserSession};
use collab_service::services::remote::mock::MockRemote;
use collab_service::services::remote::{
    SessionInfo, CREATE_AUTHOR, CREATE_GROUP, CREATE_GROUP_PAD, CREATE_SESSION,
    GET_READ_ONLY_ID, GET_SESSION_INFO, SET_HTML,
};
use collab_service::services::store::{RoomStore, SessionStore};
use collab_service::services::BrokerError;
use common::{TestBroker, NOW, PAD_HOST};

fn writer_setup(harness: &TestBroker) {
    harness.content.add_document("D1", "Roadmap");
    harness.content.add_user("U1", "Ada Lovelace");
    harness.content.grant("D1", "U1", Permission::Read);
    harness.content.grant("D1", "U1", Permission::Write);
}

#[tokio::test]
async fn writer_gets_editable_pad_and_everything_is_created_once() {
    let harness = TestBroker::spawn();
    writer_setup(&harness);
    let document = harness.content.add_document("D1", "Roadmap");
    let user = harness.content.add_user("U1", "Ada Lovelace");

    let access = harness
        .broker
        .acquire_editing_access(Some(&document), &user)
        .await
        .unwrap();

    let room = harness.store.find_room("D1").await.unwrap().unwrap();
    assert!(!access.read_only);
    assert_eq!(
        access.target_url,
        format!("{}/p/{}", PAD_HOST, room.remote_group_pad_id)
    );
    assert_eq!(harness.remote.calls(CREATE_AUTHOR), 1);
    assert_eq!(harness.remote.calls(CREATE_GROUP), 1);
    assert_eq!(harness.remote.calls(CREATE_GROUP_PAD), 1);
    assert_eq!(harness.remote.calls(CREATE_SESSION), 1);
    assert_eq!(harness.remote.calls(GET_READ_ONLY_ID), 0);

    let session = harness
        .store
        .find_session(&SessionKey::for_user("U1"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(session.remote_session_id, access.session_token);
    assert_eq!(session.remote_group_id, room.remote_group_id);
    assert_eq!(session.valid_until, NOW + 86_400);
}

#[tokio::test]
async fn second_access_creates_nothing() {
    let harness = TestBroker::spawn();
    writer_setup(&harness);
    let document = harness.content.add_document("D1", "Roadmap");
    let user = harness.content.add_user("U1", "Ada Lovelace");

    let first = harness
        .broker
        .acquire_editing_access(Some(&document), &user)
        .await
        .unwrap();
    harness.clock.advance(600);
    let second = harness
        .broker
        .acquire_editing_access(Some(&document), &user)
        .await
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(harness.remote.calls(CREATE_AUTHOR), 1);
    assert_eq!(harness.remote.calls(CREATE_GROUP), 1);
    assert_eq!(harness.remote.calls(CREATE_GROUP_PAD), 1);
    assert_eq!(harness.remote.calls(CREATE_SESSION), 1);
    assert_eq!(harness.remote.calls(GET_SESSION_INFO), 1);
}

#[tokio::test]
async fn reader_without_write_gets_read_only_pad() {
    let harness = TestBroker::spawn();
    let document = harness.content.add_document("D1", "Roadmap");
    let user = harness.content.add_user("U2", "Grace Hopper");
    harness.content.grant("D1", "U2", Permission::Read);

    let access = harness
        .broker
        .acquire_editing_access(Some(&document), &user)
        .await
        .unwrap();

    let room = harness.store.find_room("D1").await.unwrap().unwrap();
    let read_only_id = room.remote_read_only_id.expect("read-only id stored");
    assert!(access.read_only);
    assert_eq!(access.target_url, format!("{}/p/{}", PAD_HOST, read_only_id));
    assert_eq!(harness.remote.calls(GET_READ_ONLY_ID), 1);

    harness
        .broker
        .acquire_editing_access(Some(&document), &user)
        .await
        .unwrap();
    assert_eq!(harness.remote.calls(GET_READ_ONLY_ID), 1);
}

#[tokio::test]
async fn missing_document_is_not_found() {
    let harness = TestBroker::spawn();
    let user = harness.content.add_user("U1", "Ada Lovelace");

    let err = harness
        .broker
        .acquire_editing_access(None, &user)
        .await
        .unwrap_err();

    assert!(matches!(err, BrokerError::NotFound(_)));
    assert_eq!(harness.remote.calls(CREATE_AUTHOR), 0);
}

#[tokio::test]
async fn read_denial_propagates_and_creates_nothing() {
    let harness = TestBroker::spawn();
    let document = harness.content.add_document("D1", "Roadmap");
    let user = harness.content.add_user("U3", "Mallory");

    let err = harness
        .broker
        .acquire_editing_access(Some(&document), &user)
        .await
        .unwrap_err();

    assert!(matches!(err, BrokerError::PermissionDenied(_)));
    assert_eq!(harness.remote.calls(CREATE_AUTHOR), 0);
    assert_eq!(harness.store.room_count(), 0);
}

#[tokio::test]
async fn gate_failure_on_write_check_is_not_read_only() {
    let harness = TestBroker::spawn();
    writer_setup(&harness);
    let document = harness.content.add_document("D1", "Roadmap");
    let user = harness.content.add_user("U1", "Ada Lovelace");
    harness.content.go_down();

    let err = harness
        .broker
        .acquire_editing_access(Some(&document), &user)
        .await
        .unwrap_err();

    assert!(matches!(err, BrokerError::RemoteService { .. }));
}

#[tokio::test]
async fn session_with_half_a_day_left_is_reused() {
    let harness = TestBroker::spawn();
    writer_setup(&harness);
    let document = harness.content.add_document("D1", "Roadmap");
    let user = harness.content.add_user("U1", "Ada Lovelace");

    let first = harness
        .broker
        .acquire_editing_access(Some(&document), &user)
        .await
        .unwrap();
    // Minted at NOW with a 24h window; 12h later 43200s remain.
    harness.clock.set(NOW + 43_200);

    let second = harness
        .broker
        .acquire_editing_access(Some(&document), &user)
        .await
        .unwrap();

    assert_eq!(first.session_token, second.session_token);
    assert_eq!(harness.remote.calls(CREATE_SESSION), 1);
}

#[tokio::test]
async fn session_with_an_hour_left_is_renewed_once() {
    let harness = TestBroker::spawn();
    writer_setup(&harness);
    let document = harness.content.add_document("D1", "Roadmap");
    let user = harness.content.add_user("U1", "Ada Lovelace");

    let first = harness
        .broker
        .acquire_editing_access(Some(&document), &user)
        .await
        .unwrap();
    harness.clock.set(NOW + 86_400 - 3_600);

    let renewed = harness
        .broker
        .acquire_editing_access(Some(&document), &user)
        .await
        .unwrap();
    let again = harness
        .broker
        .acquire_editing_access(Some(&document), &user)
        .await
        .unwrap();

    assert_ne!(first.session_token, renewed.session_token);
    assert_eq!(renewed.session_token, again.session_token);
    assert_eq!(harness.remote.calls(CREATE_SESSION), 2);

    let stored = harness
        .store
        .find_session(&SessionKey::for_user("U1"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.remote_session_id, renewed.session_token);
    assert_eq!(stored.valid_until, NOW + 86_400 - 3_600 + 86_400);
}

#[tokio::test]
async fn per_user_session_moves_between_documents() {
    let harness = TestBroker::spawn();
    writer_setup(&harness);
    let d1 = harness.content.add_document("D1", "Roadmap");
    let d2 = harness.content.add_document("D2", "Budget");
    let user = harness.content.add_user("U1", "Ada Lovelace");
    harness.content.grant("D2", "U1", Permission::Read);
    harness.content.grant("D2", "U1", Permission::Write);

    let on_d1 = harness
        .broker
        .acquire_editing_access(Some(&d1), &user)
        .await
        .unwrap();
    let on_d2 = harness
        .broker
        .acquire_editing_access(Some(&d2), &user)
        .await
        .unwrap();

    assert_ne!(on_d1.session_token, on_d2.session_token);
    let d2_room = harness.store.find_room("D2").await.unwrap().unwrap();
    let stored = harness
        .store
        .find_session(&SessionKey::for_user("U1"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.remote_group_id, d2_room.remote_group_id);
    assert_eq!(harness.store.session_count(), 1);
}

#[tokio::test]
async fn per_document_scope_keeps_one_session_per_document() {
    let policy = SessionPolicy {
        scope: SessionScopeKind::UserDocument,
        ..SessionPolicy::default()
    };
    let harness = TestBroker::with_policy(policy, MockRemote::new);
    writer_setup(&harness);
    let d1 = harness.content.add_document("D1", "Roadmap");
    let d2 = harness.content.add_document("D2", "Budget");
    let user = harness.content.add_user("U1", "Ada Lovelace");
    harness.content.grant("D2", "U1", Permission::Read);

    for document in [&d1, &d2, &d1, &d2] {
        harness
            .broker
            .acquire_editing_access(Some(document), &user)
            .await
            .unwrap();
    }

    assert_eq!(harness.remote.calls(CREATE_SESSION), 2);
    assert_eq!(harness.store.session_count(), 2);
}

#[tokio::test]
async fn group_mismatch_tolerated_when_not_required() {
    let policy = SessionPolicy {
        require_group_match: false,
        ..SessionPolicy::default()
    };
    let harness = TestBroker::with_policy(policy, MockRemote::new);
    writer_setup(&harness);
    let document = harness.content.add_document("D1", "Roadmap");
    let user = harness.content.add_user("U1", "Ada Lovelace");

    harness.remote.insert_session(
        "s.elsewhere",
        SessionInfo {
            author_id: "a.x".to_string(),
            group_id: "g.other".to_string(),
            valid_until: NOW + 50_000,
        },
    );
    harness
        .store
        .upsert_session(UserSession::new(
            &SessionKey::for_user("U1"),
            "s.elsewhere",
            "g.other",
            NOW + 50_000,
        ))
        .await
        .unwrap();

    let access = harness
        .broker
        .acquire_editing_access(Some(&document), &user)
        .await
        .unwrap();

    assert_eq!(access.session_token, "s.elsewhere");
    assert_eq!(harness.remote.calls(CREATE_SESSION), 0);
}

#[tokio::test]
async fn remote_failure_surfaces_with_operation() {
    let harness = TestBroker::spawn();
    writer_setup(&harness);
    let document = harness.content.add_document("D1", "Roadmap");
    let user = harness.content.add_user("U1", "Ada Lovelace");
    harness.remote.fail_on(CREATE_GROUP);

    let err = harness
        .broker
        .acquire_editing_access(Some(&document), &user)
        .await
        .unwrap_err();

    match err {
        BrokerError::RemoteService { operation, .. } => assert_eq!(operation, CREATE_GROUP),
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(harness.store.room_count(), 0);
    // The author was already registered and stays.
    assert_eq!(harness.store.author_count(), 1);
}

#[tokio::test]
async fn pad_edits_resolve_to_local_ids() {
    let harness = TestBroker::spawn();
    writer_setup(&harness);
    let document = harness.content.add_document("D1", "Roadmap");
    let user = harness.content.add_user("U1", "Ada Lovelace");

    let access = harness
        .broker
        .acquire_editing_access(Some(&document), &user)
        .await
        .unwrap();
    let room = harness.store.find_room("D1").await.unwrap().unwrap();
    let author = harness.remote.session(&access.session_token).unwrap().author_id;

    let edit = harness
        .broker
        .resolve_pad_edit(&author, &room.remote_group_pad_id)
        .await
        .unwrap();
    assert_eq!(edit.user_id, "U1");
    assert_eq!(edit.document_id, "D1");

    assert!(matches!(
        harness.broker.resolve_pad_edit("a.unknown", &room.remote_group_pad_id).await,
        Err(BrokerError::NotFound(_))
    ));
    assert!(matches!(
        harness.broker.resolve_pad_edit(&author, "g.x$unknown").await,
        Err(BrokerError::NotFound(_))
    ));
    assert_eq!(
        harness.broker.session_holder(&access.session_token).await.unwrap(),
        "U1"
    );
}

#[tokio::test]
async fn template_room_is_seeded_from_parent() {
    let harness = TestBroker::spawn();
    writer_setup(&harness);
    let parent = harness.content.add_document("D1", "Roadmap");
    let user = harness.content.add_user("U1", "Ada Lovelace");
    harness
        .broker
        .acquire_editing_access(Some(&parent), &user)
        .await
        .unwrap();
    let parent_room = harness.store.find_room("D1").await.unwrap().unwrap();
    harness
        .remote
        .set_pad_text(&parent_room.remote_group_pad_id, "Q1: ship it");

    let child = harness.content.add_document("D9", "Roadmap copy");
    let pad_id = harness
        .broker
        .create_room_from_template(&child, "D1")
        .await
        .unwrap();

    assert_eq!(harness.remote.pad_text(&pad_id).as_deref(), Some("Q1: ship it"));
    assert!(matches!(
        harness.broker.create_room_from_template(&child, "D404").await,
        Err(BrokerError::NotFound(_))
    ));
}

#[tokio::test]
async fn template_retry_after_failed_seed_copies_parent_text() {
    let harness = TestBroker::spawn();
    writer_setup(&harness);
    let parent = harness.content.add_document("D1", "Roadmap");
    let user = harness.content.add_user("U1", "Ada Lovelace");
    harness
        .broker
        .acquire_editing_access(Some(&parent), &user)
        .await
        .unwrap();
    let parent_room = harness.store.find_room("D1").await.unwrap().unwrap();
    harness
        .remote
        .set_pad_text(&parent_room.remote_group_pad_id, "Q1: ship it");

    let child = harness.content.add_document("D9", "Roadmap copy");
    harness.remote.fail_on(SET_HTML);
    let err = harness
        .broker
        .create_room_from_template(&child, "D1")
        .await
        .unwrap_err();
    assert!(matches!(err, BrokerError::RemoteService { operation, .. } if operation == SET_HTML));
    assert!(harness.store.find_room("D9").await.unwrap().is_none());

    harness.remote.recover(SET_HTML);
    let pad_id = harness
        .broker
        .create_room_from_template(&child, "D1")
        .await
        .unwrap();

    assert_eq!(harness.remote.pad_text(&pad_id).as_deref(), Some("Q1: ship it"));
    let child_room = harness.store.find_room("D9").await.unwrap().unwrap();
    assert_eq!(child_room.remote_group_pad_id, pad_id);
}
