mod support;

use serde_json::json;

use sp_session::{ClientError, LocalSessionCodec, Method, RevokeOutcome, SessionState};
use sp_store::storage::slots;
use sp_store::KeyValueStore;
use support::{current_session_body, Harness, Reply};

fn other_ids(h: &Harness) -> Vec<String> {
    h.session
        .get_user_data()
        .other_sessions
        .into_iter()
        .map(|s| s.id)
        .collect()
}

#[tokio::test]
async fn decode_stores_current_descriptor() {
    let h = Harness::signed_in().await;
    h.server.on(
        Method::Get,
        "/sessions/current",
        Reply::Sealed(current_session_body()),
    );
    let codec = LocalSessionCodec::new(h.session.clone());

    let record = codec.decode().await.unwrap();

    assert_eq!(record.id, "sess-C");
    assert_eq!(record.geo_location.city.as_deref(), Some("Lagos"));
    assert_eq!(h.session.store().current_session().unwrap(), Some(record));
}

#[tokio::test]
async fn list_replaces_other_sessions() {
    let h = Harness::signed_in().await;
    h.server.on(
        Method::Get,
        "/sessions",
        Reply::Sealed(json!({
            "current": current_session_body(),
            "others": [{ "id": "sess-D", "deviceType": "tablet" }]
        })),
    );
    let codec = LocalSessionCodec::new(h.session.clone());

    let list = codec.list().await.unwrap();

    assert_eq!(list.current.id, "sess-C");
    assert_eq!(other_ids(&h), vec!["sess-D"]);
    assert_eq!(
        h.session.store().current_session().unwrap().unwrap().id,
        "sess-C"
    );
}

#[tokio::test]
async fn revoking_another_session_drops_only_that_entry() {
    let h = Harness::signed_in().await;
    h.server.on(
        Method::Get,
        "/sessions/current",
        Reply::Sealed(current_session_body()),
    );
    h.server.on(Method::Delete, "/sessions/sess-A", Reply::Ack);
    let codec = LocalSessionCodec::new(h.session.clone());

    let outcome = codec.revoke("sess-A").await.unwrap();

    assert_eq!(outcome, RevokeOutcome::Removed);
    assert_eq!(other_ids(&h), vec!["sess-B"]);
    assert_eq!(h.session.state(), SessionState::Authenticated);
    assert_eq!(h.session.get_user_data().authorization(), "tok-1");

    let req = h.server.last_request().unwrap();
    assert_eq!(req.method, Method::Delete);
    assert_eq!(req.bearer.as_deref(), Some("tok-1"));
}

#[tokio::test]
async fn revoking_own_session_signs_out() {
    let h = Harness::signed_in().await;
    h.server.on(
        Method::Get,
        "/sessions/current",
        Reply::Sealed(current_session_body()),
    );
    h.server.on(Method::Delete, "/sessions/sess-C", Reply::Ack);
    let codec = LocalSessionCodec::new(h.session.clone());
    codec.decode().await.unwrap();
    let device = h.session.device().clone();
    let key = *h.session.public_key();

    let outcome = codec.revoke("sess-C").await.unwrap();

    assert_eq!(outcome, RevokeOutcome::SignedOut);
    assert_eq!(h.session.state(), SessionState::Anonymous);
    let data = h.session.get_user_data();
    assert!(!data.is_logged_in());
    assert!(data.authorization().is_empty());
    assert!(data.other_sessions.is_empty());
    assert_eq!(data.device_id, device.device_id);
    assert_eq!(data.client.unwrap().public(), &key);
    assert!(h.storage.get(slots::SESSION_BUNDLE).unwrap().is_none());
    assert!(h.storage.get(slots::SESSION_CURRENT).unwrap().is_none());
    assert!(h.storage.get(slots::DEVICE_ID).unwrap().is_some());
}

#[tokio::test]
async fn failed_revocation_changes_nothing_and_can_retry() {
    let h = Harness::signed_in().await;
    for _ in 0..2 {
        h.server.on(
            Method::Get,
            "/sessions/current",
            Reply::Sealed(current_session_body()),
        );
    }
    h.server.on(
        Method::Delete,
        "/sessions/sess-B",
        Reply::Failure(500, "Try again later"),
    );
    h.server.on(Method::Delete, "/sessions/sess-B", Reply::Ack);
    let codec = LocalSessionCodec::new(h.session.clone());
    let before = h.session.get_user_data();

    match codec.revoke("sess-B").await {
        Err(ClientError::Protocol(message)) => assert_eq!(message, "Try again later"),
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(h.session.get_user_data(), before);
    assert_eq!(h.session.state(), SessionState::Authenticated);
    assert!(h.storage.get(slots::SESSION_CURRENT).unwrap().is_none());

    assert_eq!(codec.revoke("sess-B").await.unwrap(), RevokeOutcome::Removed);
    assert_eq!(other_ids(&h), vec!["sess-A"]);
}

#[tokio::test]
async fn offline_revocation_changes_nothing() {
    let h = Harness::signed_in().await;
    h.server.on(
        Method::Get,
        "/sessions/current",
        Reply::Sealed(current_session_body()),
    );
    h.server.on(Method::Delete, "/sessions/sess-C", Reply::Offline);
    let codec = LocalSessionCodec::new(h.session.clone());
    let before = h.session.get_user_data();

    let err = codec.revoke("sess-C").await.unwrap_err();

    assert!(err.is_retryable());
    assert_eq!(h.session.get_user_data(), before);
    assert!(h.storage.get(slots::SESSION_CURRENT).unwrap().is_none());
    assert_eq!(h.session.state(), SessionState::Authenticated);
}

#[tokio::test]
async fn empty_session_id_is_rejected_locally() {
    let h = Harness::signed_in().await;
    let sent = h.server.request_count();
    let codec = LocalSessionCodec::new(h.session.clone());

    for id in ["", "   "] {
        let err = codec.revoke(id).await.unwrap_err();
        assert!(matches!(err, ClientError::Validation(_)));
    }
    assert_eq!(h.server.request_count(), sent);
}

#[tokio::test]
async fn ids_that_address_other_routes_are_never_sent() {
    let h = Harness::signed_in().await;
    h.server.on(
        Method::Get,
        "/sessions/current",
        Reply::Sealed(current_session_body()),
    );
    let codec = LocalSessionCodec::new(h.session.clone());
    codec.decode().await.unwrap();
    let sent = h.server.request_count();
    let before = h.session.get_user_data();

    for id in [".", "..", " .. ", "current", "../sessions"] {
        let err = codec.revoke(id).await.unwrap_err();
        assert!(matches!(err, ClientError::Validation(_)), "{id:?} accepted");
    }
    assert_eq!(h.server.request_count(), sent);
    assert_eq!(h.session.get_user_data(), before);
    assert_eq!(h.session.state(), SessionState::Authenticated);
}

#[tokio::test]
async fn expired_token_during_revocation_signs_out() {
    let h = Harness::signed_in().await;
    h.server.on(
        Method::Get,
        "/sessions/current",
        Reply::Sealed(current_session_body()),
    );
    h.server
        .on(Method::Delete, "/sessions/sess-A", Reply::Unauthorized);
    let codec = LocalSessionCodec::new(h.session.clone());

    let err = codec.revoke("sess-A").await.unwrap_err();

    assert!(matches!(err, ClientError::SessionExpired));
    assert_eq!(h.session.state(), SessionState::Anonymous);
}
