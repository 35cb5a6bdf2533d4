//! Session behaviour against a mock Feedly server: request shape, token
//! refresh, quota handling and the single-request guard.
//!
//! Run with: cargo test --test session_tests

mod common;

use std::time::Duration;

use chrono::Utc;
use futures_util::StreamExt;
use reqwest::Method;
use serde_json::json;
use tempfile::tempdir;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use feedly_rs::auth::FileAuthStore;
use feedly_rs::prelude::*;

use common::{config, init_logging, mount_profile, session, TOKEN, USER_ID};

fn exhausted(reset_secs: u64) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_json(json!({"id": USER_ID}))
        .insert_header("X-RateLimit-Count", "250")
        .insert_header("X-RateLimit-Limit", "250")
        .insert_header("X-RateLimit-Reset", reset_secs.to_string().as_str())
}

// =============================================================================
// Request shape
// =============================================================================

#[tokio::test]
async fn test_requests_carry_token_and_client_name() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v3/profile"))
        .and(header("authorization", TOKEN))
        .and(query_param("client", "feedly.rust.client"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": USER_ID,
            "fullName": "Test Reader",
            "locale": "en"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let session = session(&server).await;
    let profile = session.user().profile().await.unwrap();

    assert_eq!(profile.id, USER_ID);
    assert_eq!(profile.full_name.as_deref(), Some("Test Reader"));
    assert_eq!(profile.extra.get("locale"), Some(&json!("en")));
}

#[tokio::test]
async fn test_custom_client_name_is_sent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v3/profile"))
        .and(query_param("client", "my-reader"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": USER_ID})))
        .expect(1)
        .mount(&server)
        .await;

    let session =
        FeedlySession::with_token_and_config(TOKEN, config(&server).with_client_name("my-reader"))
            .await
            .unwrap();
    session.user().profile().await.unwrap();
}

#[tokio::test]
async fn test_user_id_is_looked_up_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v3/profile"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "u-42"})))
        .expect(1)
        .mount(&server)
        .await;

    init_logging();
    let session = FeedlySession::with_token_and_config(TOKEN, config(&server))
        .await
        .unwrap();

    assert_eq!(session.user_id().await.unwrap(), "u-42");
    assert_eq!(session.user().id().await.unwrap(), "u-42");
}

#[tokio::test]
async fn test_do_api_request_normalizes_path() {
    let server = MockServer::start().await;
    mount_profile(&server).await;

    let session = session(&server).await;
    let response = session
        .do_api_request(Method::GET, "v3/profile", &[], None)
        .await
        .unwrap();

    assert!(response.status.is_success());
    assert_eq!(response.body.unwrap()["id"], USER_ID);
}

#[tokio::test]
async fn test_do_api_request_rejects_foreign_paths() {
    let server = MockServer::start().await;
    let session = session(&server).await;

    let err = session
        .do_api_request(Method::GET, "/v2/profile", &[], None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_empty_success_body() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/v3/markers"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let session = session(&server).await;
    let body = json!({"action": "markAsRead", "type": "entries", "entryIds": ["e1"]});
    let response = session
        .do_api_request(Method::PUT, "/v3/markers", &[], Some(&body))
        .await
        .unwrap();
    assert!(response.body.is_none());
}

// =============================================================================
// Error mapping
// =============================================================================

#[tokio::test]
async fn test_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v3/profile"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "errorCode": 404,
            "errorMessage": "no such profile"
        })))
        .mount(&server)
        .await;

    let session = session(&server).await;
    match session.user().profile().await {
        Err(Error::NotFound(msg)) => assert_eq!(msg, "no such profile"),
        other => panic!("expected NotFound, got {:?}", other),
    }
}

#[tokio::test]
async fn test_unexpected_status_keeps_error_id() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v3/profile"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "errorCode": 500,
            "errorId": "ap5int-sv2.2024",
            "errorMessage": "internal error"
        })))
        .mount(&server)
        .await;

    let session = session(&server).await;
    let err = session.user().profile().await.unwrap_err();

    assert!(err.is_server_error());
    match err {
        Error::UnexpectedStatus {
            status, error_id, ..
        } => {
            assert_eq!(status, 500);
            assert_eq!(error_id.as_deref(), Some("ap5int-sv2.2024"));
        }
        other => panic!("expected UnexpectedStatus, got {:?}", other),
    }
}

#[tokio::test]
async fn test_invalid_json_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v3/profile"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let session = session(&server).await;
    let err = session.user().profile().await.unwrap_err();
    assert!(err.is_malformed_response());
}

// =============================================================================
// Authentication and refresh
// =============================================================================

#[tokio::test]
async fn test_unauthorized_without_refresh_fails_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v3/profile"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "errorCode": 401,
            "errorMessage": "token expired"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let session = session(&server).await;
    let err = session.user().profile().await.unwrap_err();

    assert!(err.is_auth_error());
    assert!(err.to_string().contains("token expired"));
}

#[tokio::test]
async fn test_unauthorized_refreshes_and_retries() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v3/profile"))
        .and(header("authorization", "old-access"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v3/auth/token"))
        .and(body_partial_json(json!({
            "grant_type": "refresh_token",
            "refresh_token": "refresh-1"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "new-access",
            "refresh_token": "refresh-2",
            "expires_in": 604800
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v3/profile"))
        .and(header("authorization", "new-access"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": USER_ID})))
        .expect(1)
        .mount(&server)
        .await;

    init_logging();
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("access.token"), "old-access\n").unwrap();
    std::fs::write(dir.path().join("refresh.token"), "refresh-1\n").unwrap();

    let store = FileAuthStore::new(dir.path()).unwrap();
    let session = FeedlySession::new(store, config(&server)).await.unwrap();
    let profile = session.user().profile().await.unwrap();

    assert_eq!(profile.id, USER_ID);
    assert_eq!(
        std::fs::read_to_string(dir.path().join("access.token")).unwrap(),
        "new-access"
    );
    assert_eq!(
        std::fs::read_to_string(dir.path().join("refresh.token")).unwrap(),
        "refresh-2"
    );
}

#[tokio::test]
async fn test_second_unauthorized_is_final() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v3/profile"))
        .respond_with(ResponseTemplate::new(401))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v3/auth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "new-access"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("access.token"), "old-access").unwrap();
    std::fs::write(dir.path().join("refresh.token"), "refresh-1").unwrap();

    let store = FileAuthStore::new(dir.path()).unwrap();
    let session = FeedlySession::new(store, config(&server)).await.unwrap();

    let err = session.user().profile().await.unwrap_err();
    assert!(matches!(err, Error::Authentication(_)));
}

#[tokio::test]
async fn test_failed_refresh_keeps_stored_tokens() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v3/profile"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v3/auth/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "errorCode": 400,
            "errorMessage": "invalid refresh token"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("access.token"), "old-access").unwrap();
    std::fs::write(dir.path().join("refresh.token"), "refresh-1").unwrap();

    let store = FileAuthStore::new(dir.path()).unwrap();
    let session = FeedlySession::new(store, config(&server)).await.unwrap();

    let err = session.user().profile().await.unwrap_err();
    assert!(matches!(err, Error::Authentication(_)));
    assert_eq!(
        std::fs::read_to_string(dir.path().join("access.token")).unwrap(),
        "old-access"
    );
}

#[tokio::test]
async fn test_manual_refresh() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v3/auth/token"))
        .and(query_param("client", "feedly.rust.client"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "new-access"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v3/profile"))
        .and(header("authorization", "new-access"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": USER_ID})))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("access.token"), "old-access").unwrap();
    std::fs::write(dir.path().join("refresh.token"), "refresh-1").unwrap();

    let store = FileAuthStore::new(dir.path()).unwrap();
    let session = FeedlySession::new(store, config(&server)).await.unwrap();

    session.refresh_credentials().await.unwrap();
    session.user().profile().await.unwrap();
    // The old refresh token is kept when the exchange does not rotate it
    assert_eq!(
        std::fs::read_to_string(dir.path().join("refresh.token")).unwrap(),
        "refresh-1"
    );
}

#[tokio::test]
async fn test_manual_refresh_on_static_token_is_unsupported() {
    let server = MockServer::start().await;
    let session = session(&server).await;
    assert!(matches!(
        session.refresh_credentials().await,
        Err(Error::RefreshUnsupported)
    ));
}

async fn file_session(server: &MockServer, dir: &std::path::Path) -> FeedlySession {
    init_logging();
    std::fs::write(dir.join("access.token"), "old-access").unwrap();
    std::fs::write(dir.join("refresh.token"), "refresh-1").unwrap();
    let store = FileAuthStore::new(dir).unwrap();
    FeedlySession::new(store, config(server)).await.unwrap()
}

#[tokio::test]
async fn test_refresh_is_not_sent_when_unauthorized_response_exhausts_quota() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v3/profile"))
        .respond_with(
            ResponseTemplate::new(401)
                .insert_header("X-RateLimit-Count", "250")
                .insert_header("X-RateLimit-Limit", "250")
                .insert_header("X-RateLimit-Reset", "600"),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v3/auth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "new-access"
        })))
        .expect(0)
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let session = file_session(&server, dir.path()).await;

    let err = session.user().profile().await.unwrap_err();
    assert!(matches!(err, Error::RateLimited { .. }), "got {:?}", err);
    assert_eq!(
        std::fs::read_to_string(dir.path().join("access.token")).unwrap(),
        "old-access"
    );
}

#[tokio::test]
async fn test_token_response_quota_headers_gate_the_retry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v3/profile"))
        .and(header("authorization", "old-access"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v3/auth/token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"access_token": "new-access"}))
                .insert_header("X-RateLimit-Count", "250")
                .insert_header("X-RateLimit-Limit", "250")
                .insert_header("X-RateLimit-Reset", "600"),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v3/profile"))
        .and(header("authorization", "new-access"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": USER_ID})))
        .expect(0)
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let session = file_session(&server, dir.path()).await;

    let err = session.user().profile().await.unwrap_err();
    assert!(matches!(err, Error::RateLimited { .. }), "got {:?}", err);
    assert_eq!(session.rate_limit().remaining(), Some(0));
    // The exchange itself succeeded, so the new token is kept
    assert_eq!(
        std::fs::read_to_string(dir.path().join("access.token")).unwrap(),
        "new-access"
    );
}

#[tokio::test]
async fn test_manual_refresh_respects_exhausted_quota() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v3/profile"))
        .respond_with(exhausted(600))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v3/auth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "new-access"
        })))
        .expect(0)
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let session = file_session(&server, dir.path()).await;
    session.user().profile().await.unwrap();

    let err = session.refresh_credentials().await.unwrap_err();
    assert!(matches!(err, Error::RateLimited { .. }), "got {:?}", err);
}

#[tokio::test]
async fn test_refresh_succeeds_when_tokens_cannot_be_saved() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v3/auth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "new-access"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v3/profile"))
        .and(header("authorization", "new-access"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": USER_ID})))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let session = file_session(&server, dir.path()).await;
    // A directory where the temp file goes makes every save fail
    std::fs::create_dir(dir.path().join("access.tmp")).unwrap();

    session.refresh_credentials().await.unwrap();
    session.user().profile().await.unwrap();
    assert_eq!(
        std::fs::read_to_string(dir.path().join("access.token")).unwrap(),
        "old-access"
    );
}

// =============================================================================
// Quota
// =============================================================================

#[tokio::test]
async fn test_exhausted_quota_fails_fast_without_sending() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v3/profile"))
        .respond_with(exhausted(600))
        .expect(1)
        .mount(&server)
        .await;

    let session = session(&server).await;
    session.user().profile().await.unwrap();

    let state = session.rate_limit();
    assert_eq!(state.remaining(), Some(0));

    match session.user().profile().await {
        Err(Error::RateLimited { reset_at }) => assert!(reset_at > Utc::now().timestamp()),
        other => panic!("expected RateLimited, got {:?}", other),
    }
}

#[tokio::test]
async fn test_quota_headers_are_tracked() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v3/profile"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"id": USER_ID}))
                .insert_header("X-RateLimit-Count", "40")
                .insert_header("X-RateLimit-Limit", "250")
                .insert_header("X-RateLimit-Reset", "3600"),
        )
        .mount(&server)
        .await;

    let session = session(&server).await;
    assert_eq!(session.rate_limit().remaining(), None);

    let response = session
        .do_api_request(Method::GET, "/v3/profile", &[], None)
        .await
        .unwrap();
    assert_eq!(response.rate_limit.remaining(), Some(210));
    assert_eq!(session.rate_limit().remaining(), Some(210));
}

#[tokio::test]
async fn test_bare_429_locks_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v3/profile"))
        .respond_with(ResponseTemplate::new(429))
        .expect(1)
        .mount(&server)
        .await;

    let session = session(&server).await;
    let err = session.user().profile().await.unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(err.status(), Some(429));

    assert!(matches!(
        session.user().profile().await,
        Err(Error::RateLimited { .. })
    ));
}

#[tokio::test]
async fn test_wait_policy_sends_after_reset() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v3/profile"))
        .respond_with(exhausted(1))
        .expect(2)
        .mount(&server)
        .await;

    init_logging();
    let config = config(&server).with_rate_limit_policy(RateLimitPolicy::WaitUntilReset);
    let session = FeedlySession::with_token_and_config(TOKEN, config)
        .await
        .unwrap();

    session.user().profile().await.unwrap();
    session.user().profile().await.unwrap();
}

// =============================================================================
// Concurrency and lifecycle
// =============================================================================

#[tokio::test]
async fn test_concurrent_request_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v3/profile"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"id": USER_ID}))
                .set_delay(Duration::from_millis(300)),
        )
        .expect(2)
        .mount(&server)
        .await;

    let session = session(&server).await;
    let user = session.user();
    let (first, second) = tokio::join!(user.profile(), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        user.profile().await
    });

    assert!(first.is_ok());
    assert!(matches!(second, Err(Error::ConcurrentRequest)));

    // The guard is released once the first request completes
    session.user().profile().await.unwrap();
}

#[tokio::test]
async fn test_cancelled_request_releases_guard() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v3/profile"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"id": USER_ID}))
                .set_delay(Duration::from_millis(200)),
        )
        .mount(&server)
        .await;

    let session = session(&server).await;
    let user = session.user();
    let cancelled = tokio::time::timeout(Duration::from_millis(20), user.profile()).await;
    assert!(cancelled.is_err());

    session.user().profile().await.unwrap();
}

#[tokio::test]
async fn test_handles_fail_after_close() {
    let server = MockServer::start().await;
    mount_profile(&server).await;

    Mock::given(method("GET"))
        .and(path("/v3/categories"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": format!("user/{}/category/news", USER_ID), "label": "news"}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let session = session(&server).await;
    let user = session.user();
    let categories = user.categories().await.unwrap();
    let news = categories.get("news").unwrap().clone();
    assert!(!session.is_closed());
    session.close();

    assert!(matches!(user.profile().await, Err(Error::SessionClosed)));
    let mut ids = news.stream_ids(StreamOptions::default());
    assert!(matches!(ids.next().await, Some(Err(Error::SessionClosed))));
    // Only the category listing made it out
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}
