//! Session and request execution for the Feedly API.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock as StdRwLock};

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::{Method, StatusCode};
use secrecy::ExposeSecret;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tokio::sync::{OnceCell, RwLock};

use crate::api::{StreamsService, UserService};
use crate::auth::exchange::TOKEN_PATH;
use crate::auth::{AuthStore, Credentials, StaticAuth, TokenExchange};
use crate::models::Profile;
use crate::{Error, Result};

use super::config::ClientConfig;
use super::rate_limit::{QuotaGate, RateLimiterState};

/// Every API path starts with this prefix.
const API_PREFIX: &str = "/v3/";

/// Query parameter identifying the application.
const CLIENT_PARAM: &str = "client";

/// A session against the Feedly API.
///
/// The session owns the connection pool, the credentials, and the quota
/// state. It serves one request at a time: a call made while another is in
/// flight fails with [`Error::ConcurrentRequest`] instead of racing on the
/// shared quota.
///
/// Dropping the session (or calling [`close`](Self::close)) closes it and
/// releases the connection pool, even while handles and streams created
/// from it are still alive. Those then fail with [`Error::SessionClosed`].
///
/// # Example
///
/// ```no_run
/// use feedly_rs::FeedlySession;
/// use feedly_rs::api::Streamable;
///
/// # async fn example() -> feedly_rs::Result<()> {
/// let session = FeedlySession::with_token("A1234...").await?;
///
/// let categories = session.user().categories().await?;
/// for category in categories.iter() {
///     println!("{:?}", category.label());
/// }
///
/// session.close();
/// # Ok(())
/// # }
/// ```
pub struct FeedlySession {
    pub(crate) inner: Arc<SessionInner>,
}

pub(crate) struct SessionInner {
    http: StdRwLock<Option<reqwest::Client>>,
    pub(crate) config: ClientConfig,
    auth: Box<dyn AuthStore>,
    credentials: RwLock<Credentials>,
    quota: Arc<QuotaGate>,
    user_id: OnceCell<String>,
    in_flight: AtomicBool,
    closed: AtomicBool,
}

/// The outcome of a successful [`FeedlySession::do_api_request`].
#[derive(Debug, Clone)]
pub struct ApiResponse {
    /// HTTP status (always a success status)
    pub status: StatusCode,
    /// Parsed JSON body; `None` for an empty body
    pub body: Option<Value>,
    /// Quota state right after this response
    pub rate_limit: RateLimiterState,
}

impl ApiResponse {
    /// Deserialize the body into `T`.
    pub fn json<T: DeserializeOwned>(self) -> Result<T> {
        let body = self.body.ok_or_else(|| {
            Error::MalformedResponse("expected a JSON body, got an empty response".into())
        })?;
        serde_json::from_value(body).map_err(|e| Error::MalformedResponse(e.to_string()))
    }
}

impl FeedlySession {
    /// Open a session, loading credentials from `auth`.
    pub async fn new(auth: impl AuthStore + 'static, config: ClientConfig) -> Result<Self> {
        config.validate()?;

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()?;

        let credentials = auth.load().await?;
        tracing::debug!(store = auth.name(), host = %config.api_host, "opening session");

        Ok(Self {
            inner: Arc::new(SessionInner {
                http: StdRwLock::new(Some(http)),
                user_id: OnceCell::new_with(config.user_id.clone()),
                quota: Arc::new(QuotaGate::new(config.rate_limit_policy)),
                config,
                auth: Box::new(auth),
                credentials: RwLock::new(credentials),
                in_flight: AtomicBool::new(false),
                closed: AtomicBool::new(false),
            }),
        })
    }

    /// Open a session with a fixed access token and default configuration.
    ///
    /// The token cannot be refreshed; an expired token surfaces as
    /// [`Error::Authentication`].
    pub async fn with_token(access_token: impl Into<String>) -> Result<Self> {
        Self::new(StaticAuth::new(access_token), ClientConfig::default()).await
    }

    /// Open a session with a fixed access token and custom configuration.
    pub async fn with_token_and_config(
        access_token: impl Into<String>,
        config: ClientConfig,
    ) -> Result<Self> {
        Self::new(StaticAuth::new(access_token), config).await
    }

    /// The authenticated user: profile, categories and tags.
    pub fn user(&self) -> UserService {
        UserService::new(self.inner.clone())
    }

    /// Arbitrary streams by id, such as feeds.
    pub fn streams(&self) -> StreamsService {
        StreamsService::new(self.inner.clone())
    }

    /// Issue one request against the API.
    ///
    /// `path` is server-relative and must start with `/v3/` (a missing
    /// leading `/` is added). A `401` is answered by one token refresh and
    /// one retry when the auth store can refresh.
    pub async fn do_api_request(
        &self,
        method: Method,
        path: &str,
        params: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<ApiResponse> {
        self.inner.do_api_request(method, path, params, body).await
    }

    /// The user id, looked up from the profile on first use.
    pub async fn user_id(&self) -> Result<String> {
        self.inner.user_id().await
    }

    /// The quota state as last reported by the server.
    pub fn rate_limit(&self) -> RateLimiterState {
        self.inner.quota.snapshot()
    }

    /// Refresh the access token now rather than waiting for a `401`.
    pub async fn refresh_credentials(&self) -> Result<()> {
        self.inner.ensure_open()?;
        let _guard = InFlightGuard::acquire(&self.inner.in_flight)?;
        self.inner.refresh().await
    }

    /// The configuration this session was opened with.
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// `true` once the session has been closed.
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Close the session. Equivalent to dropping it.
    pub fn close(self) {
        drop(self);
    }
}

impl Drop for FeedlySession {
    fn drop(&mut self) {
        if !self.inner.closed.swap(true, Ordering::AcqRel) {
            tracing::debug!("session closed");
        }
        // Handles may keep `inner` alive; the pool goes now regardless.
        self.inner
            .http
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
    }
}

impl std::fmt::Debug for FeedlySession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedlySession")
            .field("config", &self.inner.config)
            .field("auth", &self.inner.auth.name())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl SessionInner {
    pub(crate) fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::SessionClosed);
        }
        Ok(())
    }

    /// The connection pool, or [`Error::SessionClosed`] once released.
    pub(crate) fn http_client(&self) -> Result<reqwest::Client> {
        self.http
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
            .ok_or(Error::SessionClosed)
    }

    pub(crate) async fn do_api_request(
        &self,
        method: Method,
        path: &str,
        params: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<ApiResponse> {
        self.ensure_open()?;
        let path = normalize_path(path)?;
        if method == Method::GET && body.is_some() {
            return Err(Error::InvalidInput(
                "a body is not allowed on GET requests".into(),
            ));
        }

        let _guard = InFlightGuard::acquire(&self.in_flight)?;

        let response = self.send(&method, &path, params, body).await?;
        if response.status() != StatusCode::UNAUTHORIZED || path.starts_with(TOKEN_PATH) {
            return self.handle_response(response).await;
        }

        let reason = error_message(response).await;
        tracing::debug!(path = %path, reason = %reason, "unauthorized, attempting token refresh");
        if !self.auth.supports_refresh() {
            return Err(Error::Authentication(reason));
        }
        if let Err(e) = self.refresh().await {
            tracing::warn!(store = self.auth.name(), error = %e, "token refresh failed");
            if matches!(e, Error::RateLimited { .. } | Error::SessionClosed) {
                return Err(e);
            }
            return Err(Error::Authentication(format!(
                "{}; token refresh failed: {}",
                reason, e
            )));
        }

        let retried = self.send(&method, &path, params, body).await?;
        if retried.status() == StatusCode::UNAUTHORIZED {
            let reason = error_message(retried).await;
            return Err(Error::Authentication(format!(
                "still unauthorized after token refresh: {}",
                reason
            )));
        }
        self.handle_response(retried).await
    }

    /// Refresh the credentials through the auth store.
    async fn refresh(&self) -> Result<()> {
        let current = self.credentials.read().await.clone();
        let exchange = TokenExchange::new(
            self.http_client()?,
            self.config.base_url(),
            self.config.client_name.clone(),
        )
        .with_quota(self.quota.clone());

        let fresh = self.auth.refresh(&current, &exchange).await?;
        *self.credentials.write().await = fresh;
        tracing::info!(store = self.auth.name(), "access token refreshed");
        Ok(())
    }

    /// Gate on the quota, send once, and record the quota headers.
    async fn send(
        &self,
        method: &Method,
        path: &str,
        params: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<reqwest::Response> {
        let http = self.http_client()?;
        self.quota.acquire().await?;

        let url = format!("{}{}", self.config.base_url(), path);
        let headers = self.build_headers().await?;

        let mut request = http
            .request(method.clone(), &url)
            .headers(headers)
            .query(params);
        if !has_client_param(path, params) {
            request = request.query(&[(CLIENT_PARAM, self.config.client_name.as_str())]);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        tracing::debug!(%method, path, "sending request");
        let response = request.send().await?;

        self.quota.record(response.headers());
        Ok(response)
    }

    /// Build request headers with authentication.
    async fn build_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();

        let credentials = self.credentials.read().await;
        let mut token = HeaderValue::from_str(credentials.access_token().expose_secret())
            .map_err(|_| Error::InvalidInput("Invalid token format".to_string()))?;
        token.set_sensitive(true);
        headers.insert(AUTHORIZATION, token);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        Ok(headers)
    }

    /// Turn a response into an [`ApiResponse`] or the matching error.
    async fn handle_response(&self, response: reqwest::Response) -> Result<ApiResponse> {
        let status = response.status();

        if status.is_success() {
            let bytes = response.bytes().await?;
            let body = if bytes.iter().all(u8::is_ascii_whitespace) {
                None
            } else {
                Some(
                    serde_json::from_slice(&bytes)
                        .map_err(|e| Error::MalformedResponse(format!("invalid JSON body: {}", e)))?,
                )
            };
            return Ok(ApiResponse {
                status,
                body,
                rate_limit: self.quota.snapshot(),
            });
        }

        match status {
            StatusCode::TOO_MANY_REQUESTS => Err(Error::RateLimited {
                reset_at: self.quota.lock_out(),
            }),
            StatusCode::UNAUTHORIZED => Err(Error::Authentication(error_message(response).await)),
            StatusCode::NOT_FOUND => Err(Error::NotFound(error_message(response).await)),
            _ => {
                let body: Value = response.json().await.unwrap_or_default();
                Err(Error::from_api_response(status.as_u16(), body))
            }
        }
    }

    /// The user id, looked up from the profile on first use.
    pub(crate) async fn user_id(&self) -> Result<String> {
        self.user_id
            .get_or_try_init(|| async { self.fetch_profile().await.map(|p| p.id) })
            .await
            .cloned()
    }

    pub(crate) async fn fetch_profile(&self) -> Result<Profile> {
        let profile: Profile = self.get("/v3/profile").await?;
        let _ = self.user_id.set(profile.id.clone());
        Ok(profile)
    }

    /// Make a GET request.
    pub(crate) async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.get_with_query(path, &[]).await
    }

    /// Make a GET request with query parameters.
    pub(crate) async fn get_with_query<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T> {
        self.do_api_request(Method::GET, path, params, None)
            .await?
            .json()
    }

    /// Make a PUT request whose response body is not needed.
    pub(crate) async fn put<B: Serialize>(&self, path: &str, body: &B) -> Result<ApiResponse> {
        let body = serde_json::to_value(body)?;
        self.do_api_request(Method::PUT, path, &[], Some(&body))
            .await
    }

    /// Make a POST request.
    pub(crate) async fn post<B: Serialize>(&self, path: &str, body: &B) -> Result<ApiResponse> {
        let body = serde_json::to_value(body)?;
        self.do_api_request(Method::POST, path, &[], Some(&body))
            .await
    }

    /// Make a DELETE request.
    pub(crate) async fn delete(&self, path: &str) -> Result<ApiResponse> {
        self.delete_with_query(path, &[]).await
    }

    /// Make a DELETE request with query parameters.
    pub(crate) async fn delete_with_query(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<ApiResponse> {
        self.do_api_request(Method::DELETE, path, params, None).await
    }
}

/// Marks a request as in flight for as long as it lives, including when
/// the request future is dropped mid-flight.
struct InFlightGuard<'a>(&'a AtomicBool);

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| Error::ConcurrentRequest)?;
        Ok(Self(flag))
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

fn normalize_path(path: &str) -> Result<String> {
    let path = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    };

    if !path.starts_with(API_PREFIX) {
        return Err(Error::InvalidInput(format!(
            "invalid endpoint {}: must start with {}",
            path, API_PREFIX
        )));
    }
    Ok(path)
}

fn has_client_param(path: &str, params: &[(&str, String)]) -> bool {
    params.iter().any(|(k, _)| *k == CLIENT_PARAM)
        || path.contains("?client=")
        || path.contains("&client=")
}

/// Best-effort error text from a failed response.
async fn error_message(response: reqwest::Response) -> String {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    serde_json::from_str::<Value>(&text)
        .ok()
        .and_then(|v| v.get("errorMessage").and_then(Value::as_str).map(String::from))
        .or_else(|| (!text.trim().is_empty()).then(|| text.trim().to_string()))
        .unwrap_or_else(|| status.to_string())
}
