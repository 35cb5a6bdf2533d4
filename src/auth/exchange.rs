//! Refresh-token exchange against `POST /v3/auth/token`.

use std::sync::Arc;

use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::client::QuotaGate;
use crate::{Error, Result};

/// Path of the token exchange endpoint.
pub(crate) const TOKEN_PATH: &str = "/v3/auth/token";

/// Client for the token exchange endpoint.
///
/// The session builds one from its own connection pool and hands it to
/// [`AuthStore::refresh`](super::AuthStore::refresh), so stores never need
/// their own HTTP client. The exchange then shares the session's quota:
/// it is refused while the quota is exhausted and its response headers
/// count like any other.
#[derive(Debug, Clone)]
pub struct TokenExchange {
    http: reqwest::Client,
    url: String,
    client_name: String,
    quota: Option<Arc<QuotaGate>>,
}

/// Successful response of the token exchange.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    /// The new access token
    pub access_token: String,
    /// A rotated refresh token, when the service issues one
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Lifetime of the access token in seconds
    #[serde(default)]
    pub expires_in: Option<i64>,
    /// User id the token belongs to
    #[serde(default)]
    pub id: Option<String>,
}

impl TokenExchange {
    /// Create an exchange client for the given API host.
    pub fn new(http: reqwest::Client, api_host: &str, client_name: impl Into<String>) -> Self {
        Self {
            http,
            url: format!("{}{}", api_host.trim_end_matches('/'), TOKEN_PATH),
            client_name: client_name.into(),
            quota: None,
        }
    }

    pub(crate) fn with_quota(mut self, quota: Arc<QuotaGate>) -> Self {
        self.quota = Some(quota);
        self
    }

    /// The full URL of the token endpoint.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Exchange a refresh token for a new access token.
    ///
    /// Every failure, transport errors included, is reported as
    /// [`Error::RefreshFailed`], except an exhausted quota, which is
    /// [`Error::RateLimited`].
    pub async fn refresh(
        &self,
        refresh_token: &SecretString,
        client_id: &str,
        client_secret: &str,
    ) -> Result<TokenResponse> {
        if let Some(quota) = &self.quota {
            quota.acquire().await?;
        }

        let response = self
            .http
            .post(&self.url)
            .query(&[("client", self.client_name.as_str())])
            .json(&serde_json::json!({
                "refresh_token": refresh_token.expose_secret(),
                "grant_type": "refresh_token",
                "client_id": client_id,
                "client_secret": client_secret,
            }))
            .send()
            .await
            .map_err(|e| Error::RefreshFailed(format!("Token exchange request failed: {}", e)))?;

        if let Some(quota) = &self.quota {
            quota.record(response.headers());
            if response.status() == StatusCode::TOO_MANY_REQUESTS {
                return Err(Error::RateLimited {
                    reset_at: quota.lock_out(),
                });
            }
        }

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body: serde_json::Value = response.json().await.unwrap_or_default();
            return Err(Error::RefreshFailed(format!(
                "Token exchange failed ({}): {}",
                status, body
            )));
        }

        response
            .json()
            .await
            .map_err(|e| Error::RefreshFailed(format!("Invalid token exchange response: {}", e)))
    }
}
