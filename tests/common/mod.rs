//! Shared setup for the integration tests.

#![allow(dead_code)]

use std::sync::Once;

use serde_json::json;
use tracing_subscriber::EnvFilter;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use feedly_rs::{ClientConfig, FeedlySession};

pub const TOKEN: &str = "test-token";
pub const USER_ID: &str = "abcd";

static INIT: Once = Once::new();

/// Initialize logging for tests
pub fn init_logging() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// Configuration pointing at the mock server.
pub fn config(server: &MockServer) -> ClientConfig {
    ClientConfig::default().with_api_host(server.uri())
}

/// A session with a fixed token and a known user id.
pub async fn session(server: &MockServer) -> FeedlySession {
    init_logging();
    FeedlySession::with_token_and_config(TOKEN, config(server).with_user_id(USER_ID))
        .await
        .expect("session should open")
}

/// Serve the profile of [`USER_ID`].
pub async fn mount_profile(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/v3/profile"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": USER_ID,
            "email": "reader@example.com",
            "fullName": "Test Reader"
        })))
        .mount(server)
        .await;
}
