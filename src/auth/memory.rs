//! In-memory credentials without refresh.

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{AuthStore, Credentials};
use crate::Result;

/// A fixed access token held in memory.
///
/// This is what [`FeedlySession::with_token`](crate::FeedlySession::with_token)
/// uses. A `401` on a session backed by `StaticAuth` is final: there is no
/// refresh token to fall back on.
///
/// # Example
///
/// ```
/// use feedly_rs::auth::StaticAuth;
///
/// let auth = StaticAuth::new("A1234...");
/// ```
#[derive(Debug)]
pub struct StaticAuth {
    credentials: RwLock<Credentials>,
}

impl StaticAuth {
    /// Create a store holding the given access token.
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            credentials: RwLock::new(Credentials::new(access_token)),
        }
    }
}

#[async_trait]
impl AuthStore for StaticAuth {
    async fn load(&self) -> Result<Credentials> {
        Ok(self.credentials.read().await.clone())
    }

    async fn save(&self, credentials: &Credentials) -> Result<()> {
        *self.credentials.write().await = credentials.clone();
        Ok(())
    }

    fn name(&self) -> &str {
        "static"
    }
}
