//! File-based credentials with refresh support.
//!
//! Tokens live as plain text files in one directory:
//! - `access.token` holds the current access token (required)
//! - `refresh.token` holds the refresh token (optional)
//!
//! Writes go through a temp file + rename so a failed write never leaves a
//! truncated token behind. Files are opened per read or write and closed
//! before any network call.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tracing::instrument;

use super::{AuthStore, Credentials, TokenExchange};
use crate::{Error, Result};

/// Access token file name.
const ACCESS_TOKEN_FILE: &str = "access.token";

/// Refresh token file name.
const REFRESH_TOKEN_FILE: &str = "refresh.token";

/// Default auth directory under the user's home.
const CONFIG_DIR: &str = ".config/feedly";

/// Client id/secret accepted for developer tokens.
const DEVELOPER_CLIENT: &str = "feedlydev";

/// File permissions for token files (Unix only): owner read/write.
#[cfg(unix)]
const FILE_MODE: u32 = 0o600;

/// Token storage backed by a directory.
///
/// # Example
///
/// ```no_run
/// use feedly_rs::auth::FileAuthStore;
///
/// # fn example() -> feedly_rs::Result<()> {
/// // ~/.config/feedly/access.token
/// let store = FileAuthStore::new(FileAuthStore::default_dir()?)?;
///
/// // Or a custom directory and OAuth client
/// let store = FileAuthStore::new("/etc/myapp/feedly")?
///     .with_client("my-client-id", "my-client-secret");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct FileAuthStore {
    dir: PathBuf,
    client_id: String,
    client_secret: String,
}

impl FileAuthStore {
    /// Create a store over an existing directory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if `dir` is not a directory.
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        if !dir.is_dir() {
            return Err(Error::Storage(format!(
                "'{}' does not exist or is not a directory",
                dir.display()
            )));
        }

        Ok(Self {
            dir,
            client_id: DEVELOPER_CLIENT.to_string(),
            client_secret: DEVELOPER_CLIENT.to_string(),
        })
    }

    /// Use a specific OAuth client for refresh. The defaults work for
    /// developer tokens.
    pub fn with_client(
        mut self,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        self.client_id = client_id.into();
        self.client_secret = client_secret.into();
        self
    }

    /// `~/.config/feedly`
    pub fn default_dir() -> Result<PathBuf> {
        let home =
            dirs::home_dir().ok_or_else(|| Error::Config("Cannot determine home directory".into()))?;
        Ok(home.join(CONFIG_DIR))
    }

    /// The directory holding the token files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn access_token_path(&self) -> PathBuf {
        self.dir.join(ACCESS_TOKEN_FILE)
    }

    fn refresh_token_path(&self) -> PathBuf {
        self.dir.join(REFRESH_TOKEN_FILE)
    }

    /// Read a token file; a missing or blank file reads as `None`.
    async fn read_token(path: &Path) -> Result<Option<SecretString>> {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(Error::Storage(format!(
                    "Failed to read '{}': {}",
                    path.display(),
                    e
                )))
            }
        };

        let token = content.trim();
        if token.is_empty() {
            return Ok(None);
        }
        Ok(Some(SecretString::from(token.to_string())))
    }

    #[instrument(skip(token))]
    async fn write_token(path: &Path, token: &str) -> Result<()> {
        let temp_path = path.with_extension("tmp");
        tokio::fs::write(&temp_path, token).await.map_err(|e| {
            Error::Storage(format!(
                "Failed to write temp file '{}': {}",
                temp_path.display(),
                e
            ))
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(FILE_MODE);
            tokio::fs::set_permissions(&temp_path, perms)
                .await
                .map_err(|e| {
                    Error::Storage(format!(
                        "Failed to set file permissions on '{}': {}",
                        temp_path.display(),
                        e
                    ))
                })?;
        }

        if let Err(e) = tokio::fs::rename(&temp_path, path).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(Error::Storage(format!(
                "Failed to rename '{}' to '{}': {}",
                temp_path.display(),
                path.display(),
                e
            )));
        }

        Ok(())
    }
}

#[async_trait]
impl AuthStore for FileAuthStore {
    #[instrument(skip(self), fields(dir = %self.dir.display()))]
    async fn load(&self) -> Result<Credentials> {
        let path = self.access_token_path();
        let access = Self::read_token(&path)
            .await?
            .ok_or_else(|| Error::Storage(format!("No access token at '{}'", path.display())))?;

        let mut credentials = Credentials::new(access.expose_secret());
        if let Some(refresh) = Self::read_token(&self.refresh_token_path()).await? {
            credentials = credentials.with_refresh_token(refresh.expose_secret());
        }
        Ok(credentials)
    }

    #[instrument(skip(self, credentials), fields(dir = %self.dir.display()))]
    async fn save(&self, credentials: &Credentials) -> Result<()> {
        Self::write_token(
            &self.access_token_path(),
            credentials.access_token().expose_secret(),
        )
        .await?;

        if let Some(refresh) = credentials.refresh_token() {
            Self::write_token(&self.refresh_token_path(), refresh.expose_secret()).await?;
        }
        Ok(())
    }

    fn supports_refresh(&self) -> bool {
        true
    }

    #[instrument(skip(self, current, exchange), fields(dir = %self.dir.display()))]
    async fn refresh(
        &self,
        current: &Credentials,
        exchange: &TokenExchange,
    ) -> Result<Credentials> {
        let refresh_token = match Self::read_token(&self.refresh_token_path()).await? {
            Some(token) => token,
            None => match current.refresh_token() {
                Some(token) => SecretString::from(token.expose_secret().to_owned()),
                None => return Err(Error::RefreshUnsupported),
            },
        };

        let response = exchange
            .refresh(&refresh_token, &self.client_id, &self.client_secret)
            .await?;

        let rotated = response
            .refresh_token
            .unwrap_or_else(|| refresh_token.expose_secret().to_owned());
        let credentials = Credentials::new(response.access_token).with_refresh_token(rotated);

        // The session keeps the new tokens even when they cannot be written.
        if let Err(e) = self.save(&credentials).await {
            tracing::warn!(error = %e, "could not persist refreshed tokens");
        }
        Ok(credentials)
    }

    fn name(&self) -> &str {
        "file"
    }
}
