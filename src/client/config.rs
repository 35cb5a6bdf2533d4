//! Client configuration options.

use std::time::Duration;

use super::rate_limit::RateLimitPolicy;
use crate::{Error, Result};

/// Default API host.
pub const DEFAULT_API_HOST: &str = "https://feedly.com";

/// Default client name sent with every request.
pub const DEFAULT_CLIENT_NAME: &str = "feedly.rust.client";

/// Configuration for a [`FeedlySession`](crate::FeedlySession).
///
/// # Example
///
/// ```
/// use feedly_rs::{ClientConfig, RateLimitPolicy};
/// use std::time::Duration;
///
/// let config = ClientConfig::default()
///     .with_timeout(Duration::from_secs(30))
///     .with_client_name("my-reader")
///     .with_rate_limit_policy(RateLimitPolicy::WaitUntilReset);
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Scheme and host of the API, without a trailing path
    pub api_host: String,
    /// Request timeout
    pub timeout: Duration,
    /// User-Agent header value
    pub user_agent: String,
    /// Name identifying the application, sent as the `client` query parameter
    pub client_name: String,
    /// Behaviour once the quota is exhausted
    pub rate_limit_policy: RateLimitPolicy,
    /// Known user id; skips the profile lookup when set
    pub user_id: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_host: DEFAULT_API_HOST.to_string(),
            timeout: Duration::from_secs(10),
            user_agent: format!("feedly-rs/{} (Rust)", env!("CARGO_PKG_VERSION")),
            client_name: DEFAULT_CLIENT_NAME.to_string(),
            rate_limit_policy: RateLimitPolicy::default(),
            user_id: None,
        }
    }
}

impl ClientConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Point the client at another host (a proxy or a mock server).
    pub fn with_api_host(mut self, api_host: impl Into<String>) -> Self {
        self.api_host = api_host.into();
        self
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the User-Agent header.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Set the client name. Feedly asks every application to identify itself.
    pub fn with_client_name(mut self, client_name: impl Into<String>) -> Self {
        self.client_name = client_name.into();
        self
    }

    /// Choose between failing fast and waiting when the quota runs out.
    pub fn with_rate_limit_policy(mut self, policy: RateLimitPolicy) -> Self {
        self.rate_limit_policy = policy;
        self
    }

    /// Provide the user id up front.
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// The API host without a trailing slash.
    pub(crate) fn base_url(&self) -> &str {
        self.api_host.trim_end_matches('/')
    }

    /// Check the configuration before a session is built from it.
    pub fn validate(&self) -> Result<()> {
        if self.client_name.trim().is_empty() {
            return Err(Error::Config("you must identify your client".into()));
        }
        let url = url::Url::parse(&self.api_host)?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::Config(format!(
                "unsupported scheme '{}' in api host",
                url.scheme()
            )));
        }
        if self.timeout.is_zero() {
            return Err(Error::Config("timeout must be positive".into()));
        }
        Ok(())
    }
}
