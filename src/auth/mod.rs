//! Credential storage and token refresh.
//!
//! The session never talks to the filesystem or the token endpoint
//! directly. It goes through an [`AuthStore`], which can:
//!
//! 1. **load** the current credentials
//! 2. **save** new credentials
//! 3. **refresh** an expired access token, if the store has that capability
//!
//! Two stores ship with the crate:
//!
//! - [`StaticAuth`] - a fixed access token held in memory, no refresh
//! - [`FileAuthStore`] - `access.token` / `refresh.token` files in a
//!   directory, refreshed through the token exchange endpoint
//!
//! # Example
//!
//! ```no_run
//! use feedly_rs::{ClientConfig, FeedlySession};
//! use feedly_rs::auth::FileAuthStore;
//!
//! # async fn example() -> feedly_rs::Result<()> {
//! let store = FileAuthStore::new(FileAuthStore::default_dir()?)?;
//! let session = FeedlySession::new(store, ClientConfig::default()).await?;
//! # Ok(())
//! # }
//! ```

pub(crate) mod exchange;
mod file;
mod memory;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

pub use exchange::{TokenExchange, TokenResponse};
pub use file::FileAuthStore;
pub use memory::StaticAuth;

use crate::{Error, Result};

/// An access token and, when the store has one, the refresh token that
/// can replace it.
pub struct Credentials {
    access_token: SecretString,
    refresh_token: Option<SecretString>,
}

impl Credentials {
    /// Credentials made of an access token only.
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: SecretString::from(access_token.into()),
            refresh_token: None,
        }
    }

    /// Attach a refresh token.
    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(SecretString::from(refresh_token.into()));
        self
    }

    /// The access token presented on every request.
    pub fn access_token(&self) -> &SecretString {
        &self.access_token
    }

    /// The refresh token, if known.
    pub fn refresh_token(&self) -> Option<&SecretString> {
        self.refresh_token.as_ref()
    }
}

impl Clone for Credentials {
    fn clone(&self) -> Self {
        Self {
            access_token: SecretString::from(self.access_token.expose_secret().to_owned()),
            refresh_token: self
                .refresh_token
                .as_ref()
                .map(|t| SecretString::from(t.expose_secret().to_owned())),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_token", &"[REDACTED]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

/// Persistence and refresh of the session's credentials.
///
/// Refresh is a capability: stores that cannot refresh keep the default
/// implementation, which fails with [`Error::RefreshUnsupported`].
///
/// # Security Notes
///
/// - Never log token values in implementations
/// - Use `#[instrument(skip(credentials))]` when tracing save operations
#[async_trait]
pub trait AuthStore: Send + Sync {
    /// Load the current credentials.
    async fn load(&self) -> Result<Credentials>;

    /// Persist new credentials, replacing the old ones.
    async fn save(&self, credentials: &Credentials) -> Result<()>;

    /// Whether [`AuthStore::refresh`] can ever succeed for this store.
    fn supports_refresh(&self) -> bool {
        false
    }

    /// Exchange the current credentials for a fresh access token.
    ///
    /// On success the new credentials have already been saved. On failure
    /// the stored credentials are left as they were.
    async fn refresh(
        &self,
        current: &Credentials,
        exchange: &TokenExchange,
    ) -> Result<Credentials> {
        let _ = (current, exchange);
        Err(Error::RefreshUnsupported)
    }

    /// Short name used in logs.
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_debug_redacts_tokens() {
        let creds = Credentials::new("super-secret-token").with_refresh_token("refresh-secret");
        let debug_str = format!("{:?}", creds);

        assert!(!debug_str.contains("super-secret-token"));
        assert!(!debug_str.contains("refresh-secret"));
        assert!(debug_str.contains("REDACTED"));
    }

    #[test]
    fn test_credentials_clone() {
        let creds = Credentials::new("a").with_refresh_token("r");
        let copy = creds.clone();
        assert_eq!(copy.access_token().expose_secret(), "a");
        assert_eq!(copy.refresh_token().map(|t| t.expose_secret()), Some("r"));
    }
}
