//! Refresh and replay behaviour of the client against a mock backend.

mod common;

use std::time::Duration;

use campus_client::config::{ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_KEY};
use campus_client::{ApiRequest, AuthStatus, Error, MemorySecureStore, RefreshFailure};
use common::{client_for, seeded_store, stored, token_pair};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// `GET path` answers 401 to the old token (after `delay`) and `body` to the
/// new one.
async fn mount_protected(
    server: &MockServer,
    route: &str,
    delay: Duration,
    body: serde_json::Value,
    old_calls: u64,
    new_calls: u64,
) {
    Mock::given(method("GET"))
        .and(path(route))
        .and(header("authorization", "Bearer a1"))
        .respond_with(ResponseTemplate::new(401).set_delay(delay))
        .expect(old_calls)
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(route))
        .and(header("authorization", "Bearer a2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .expect(new_calls)
        .mount(server)
        .await;
}

async fn mount_refresh(server: &MockServer, response: ResponseTemplate, calls: u64) {
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .and(body_json(serde_json::json!({"refresh_token": "r1"})))
        .respond_with(response)
        .expect(calls)
        .mount(server)
        .await;
}

#[tokio::test]
async fn two_callers_share_one_refresh_and_both_replay() {
    let server = MockServer::start().await;
    mount_protected(
        &server,
        "/courses",
        Duration::from_millis(50),
        serde_json::json!([{"id": 2, "shortname": "MAT101", "fullname": "Matemáticas I"}]),
        1,
        1,
    )
    .await;
    mount_protected(
        &server,
        "/assignments/course/2",
        Duration::from_millis(50),
        serde_json::json!([{"id": 7, "course_id": 2, "name": "Tarea 1"}]),
        1,
        1,
    )
    .await;
    mount_refresh(
        &server,
        ResponseTemplate::new(200)
            .set_body_json(token_pair("a2", "r2"))
            .set_delay(Duration::from_millis(200)),
        1,
    )
    .await;

    let store = seeded_store("a1", "r1");
    let client = client_for(&server, store.clone()).await;

    let (courses, assignments) = tokio::join!(
        client.courses().list(),
        client.assignments().for_course(2)
    );

    assert_eq!(courses.unwrap()[0].shortname, "MAT101");
    assert_eq!(assignments.unwrap()[0].name, "Tarea 1");
    assert_eq!(stored(&store, ACCESS_TOKEN_KEY).await.as_deref(), Some("a2"));
    assert_eq!(stored(&store, REFRESH_TOKEN_KEY).await.as_deref(), Some("r2"));
    assert!(!client.session().is_refreshing());
}

#[tokio::test]
async fn many_concurrent_401s_issue_exactly_one_refresh() {
    let server = MockServer::start().await;
    mount_protected(
        &server,
        "/courses",
        Duration::from_millis(50),
        serde_json::json!([]),
        8,
        8,
    )
    .await;
    mount_refresh(
        &server,
        ResponseTemplate::new(200)
            .set_body_json(token_pair("a2", "r2"))
            .set_delay(Duration::from_millis(100)),
        1,
    )
    .await;

    let client = client_for(&server, seeded_store("a1", "r1")).await;
    let results =
        futures::future::join_all((0..8).map(|_| client.courses().list())).await;

    assert!(results.iter().all(|r| r.as_ref().is_ok_and(Vec::is_empty)));
    assert_eq!(client.session().access_token().as_deref(), Some("a2"));
}

#[tokio::test]
async fn failed_refresh_rejects_every_caller_and_empties_store() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/courses"))
        .respond_with(ResponseTemplate::new(401).set_delay(Duration::from_millis(50)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/courses/2"))
        .respond_with(ResponseTemplate::new(401).set_delay(Duration::from_millis(50)))
        .expect(1)
        .mount(&server)
        .await;
    mount_refresh(
        &server,
        ResponseTemplate::new(400)
            .set_body_json(serde_json::json!({"detail": "Invalid refresh token"}))
            .set_delay(Duration::from_millis(200)),
        1,
    )
    .await;

    let store = seeded_store("a1", "r1");
    let client = client_for(&server, store.clone()).await;
    let mut status = client.subscribe();

    let (list, one) = tokio::join!(client.courses().list(), client.courses().get(2));

    let expected = RefreshFailure::rejected(400, "Invalid refresh token");
    for err in [list.unwrap_err(), one.unwrap_err()] {
        assert!(err.requires_reauth());
        assert!(matches!(err, Error::RefreshFailed(ref f) if *f == expected));
    }

    assert_eq!(stored(&store, ACCESS_TOKEN_KEY).await, None);
    assert_eq!(stored(&store, REFRESH_TOKEN_KEY).await, None);
    assert_eq!(stored(&store, USER_KEY).await, None);
    assert_eq!(*status.borrow_and_update(), AuthStatus::LoggedOut);
    assert!(!client.session().is_refreshing());
}

#[tokio::test]
async fn auth_endpoints_never_trigger_refresh() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/google"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, seeded_store("a1", "r1")).await;

    let err = client.auth().login_with_google("expired").await.unwrap_err();
    assert!(matches!(err, Error::InvalidIdentityToken));

    // A hand-built call to the refresh endpoint is returned untouched.
    let response = client.send(ApiRequest::post("/auth/refresh")).await.unwrap();
    assert_eq!(response.status().as_u16(), 401);

    assert_eq!(client.session().access_token().as_deref(), Some("a1"));
}

#[tokio::test]
async fn replay_is_attempted_only_once() {
    let server = MockServer::start().await;
    // Rejects the old and the new token alike.
    Mock::given(method("GET"))
        .and(path("/courses"))
        .respond_with(ResponseTemplate::new(401))
        .expect(2)
        .mount(&server)
        .await;
    mount_refresh(
        &server,
        ResponseTemplate::new(200).set_body_json(token_pair("a2", "r2")),
        1,
    )
    .await;

    let client = client_for(&server, seeded_store("a1", "r1")).await;
    let err = client.courses().list().await.unwrap_err();
    assert!(matches!(err, Error::Api { status: 401, .. }));
}

#[tokio::test]
async fn unauthenticated_401_without_refresh_token_logs_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/courses"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = client_for(&server, MemorySecureStore::new()).await;
    let err = client.courses().list().await.unwrap_err();
    assert!(matches!(err, Error::RefreshFailed(RefreshFailure { status: None, .. })));
    assert_eq!(client.status(), AuthStatus::LoggedOut);
}

#[tokio::test]
async fn ordinary_failures_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/courses"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = client_for(&server, seeded_store("a1", "r1")).await;
    let err = client.courses().list().await.unwrap_err();
    assert!(matches!(err, Error::Api { status: 500, .. }));
    assert!(!err.requires_reauth());
}

#[tokio::test]
async fn late_401_after_refresh_replays_without_second_exchange() {
    let server = MockServer::start().await;
    // The slow call is answered 401 long after the fast one has refreshed.
    Mock::given(method("GET"))
        .and(path("/courses/2"))
        .and(header("authorization", "Bearer a1"))
        .respond_with(ResponseTemplate::new(401).set_delay(Duration::from_millis(400)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/courses/2"))
        .and(header("authorization", "Bearer a2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": 2, "shortname": "MAT101", "fullname": "Matemáticas I"
        })))
        .expect(1)
        .mount(&server)
        .await;
    mount_protected(&server, "/courses", Duration::ZERO, serde_json::json!([]), 1, 1).await;
    mount_refresh(
        &server,
        ResponseTemplate::new(200).set_body_json(token_pair("a2", "r2")),
        1,
    )
    .await;

    let client = client_for(&server, seeded_store("a1", "r1")).await;
    let (slow, fast) = tokio::join!(client.courses().get(2), client.courses().list());

    assert_eq!(slow.unwrap().id, 2);
    assert!(fast.unwrap().is_empty());
}

#[tokio::test]
async fn logout_while_refreshing_does_not_resurrect_session() {
    let server = MockServer::start().await;
    mount_protected(
        &server,
        "/courses",
        Duration::ZERO,
        serde_json::json!([]),
        1,
        0,
    )
    .await;
    mount_refresh(
        &server,
        ResponseTemplate::new(200)
            .set_body_json(token_pair("a2", "r2"))
            .set_delay(Duration::from_millis(300)),
        1,
    )
    .await;

    let store = seeded_store("a1", "r1");
    let client = client_for(&server, store.clone()).await;

    let pending = tokio::spawn({
        let client = client.clone();
        async move { client.courses().list().await }
    });
    tokio::time::sleep(Duration::from_millis(100)).await;
    client.auth().logout().await;

    let err = pending.await.unwrap().unwrap_err();
    assert!(err.requires_reauth());
    assert_eq!(client.status(), AuthStatus::LoggedOut);
    assert!(client.session().access_token().is_none());
    assert_eq!(stored(&store, ACCESS_TOKEN_KEY).await, None);
    assert_eq!(stored(&store, REFRESH_TOKEN_KEY).await, None);
}
