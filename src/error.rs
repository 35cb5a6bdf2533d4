//! Error types for the Feedly API client.
//!
//! This module provides a single error type that covers every failure mode
//! of the client, from transport errors to authentication failures to
//! server-side quota exhaustion.

use serde_json::Value;
use thiserror::Error;

/// A specialized `Result` type for Feedly operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for all Feedly API operations.
///
/// Only one failure is recovered internally: a `401` answered by a
/// successful token refresh. Everything else surfaces to the caller
/// immediately.
#[derive(Error, Debug)]
pub enum Error {
    /// Network-level failure. Not retried by the client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization of a request body failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The credential is invalid and could not be refreshed
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// The auth store has no way to refresh the credential
    #[error("Token refresh is not supported by this auth store")]
    RefreshUnsupported,

    /// The token exchange was attempted and failed
    #[error("Token refresh failed: {0}")]
    RefreshFailed(String),

    /// The quota is exhausted; nothing was sent
    #[error("Rate limited until unix time {reset_at}")]
    RateLimited {
        /// Unix timestamp (seconds) at which the quota resets
        reset_at: i64,
    },

    /// Resource not found (404, or a failed name/id lookup)
    #[error("Not found: {0}")]
    NotFound(String),

    /// The API answered with a non-success status other than 401/404/429
    #[error("Unexpected status {status}: {message}")]
    UnexpectedStatus {
        /// HTTP status code
        status: u16,
        /// Error id reported by the service, if any
        error_id: Option<String>,
        /// Human-readable error message
        message: String,
        /// Raw response body for debugging
        body: Value,
    },

    /// The response body could not be interpreted
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Invalid input provided to a function
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A string that does not have the shape of a stream id
    #[error("Invalid stream id: {0}")]
    InvalidStreamId(String),

    /// Another request is already in flight on this session
    #[error("A request is already in flight on this session")]
    ConcurrentRequest,

    /// The session was closed
    #[error("Session closed")]
    SessionClosed,

    /// Reading or writing persisted credentials failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// URL parsing error
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),
}

impl Error {
    /// Returns `true` if this error is potentially transient and the
    /// operation could be retried by the caller.
    ///
    /// # Example
    ///
    /// ```
    /// use feedly_rs::Error;
    ///
    /// fn handle_error(err: Error) {
    ///     if err.is_retryable() {
    ///         println!("Backing off...");
    ///     }
    /// }
    /// ```
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Http(_) | Error::RateLimited { .. } | Error::ConcurrentRequest => true,
            Error::UnexpectedStatus { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Returns `true` if this is an authentication-related error.
    pub fn is_auth_error(&self) -> bool {
        matches!(
            self,
            Error::Authentication(_) | Error::RefreshUnsupported | Error::RefreshFailed(_)
        )
    }

    /// Returns `true` for responses the client could not use: an unexpected
    /// status or an unparsable body.
    pub fn is_malformed_response(&self) -> bool {
        matches!(
            self,
            Error::UnexpectedStatus { .. } | Error::MalformedResponse(_)
        )
    }

    /// Returns `true` if this error indicates a client-side issue
    /// (invalid input, bad request, etc.).
    pub fn is_client_error(&self) -> bool {
        match self {
            Error::UnexpectedStatus { status, .. } => *status >= 400 && *status < 500,
            Error::InvalidInput(_) | Error::InvalidStreamId(_) | Error::Config(_) => true,
            _ => false,
        }
    }

    /// Returns `true` if this error indicates a server-side issue.
    pub fn is_server_error(&self) -> bool {
        match self {
            Error::UnexpectedStatus { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// The HTTP status behind this error, when there is one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::UnexpectedStatus { status, .. } => Some(*status),
            Error::Http(e) => e.status().map(|s| s.as_u16()),
            Error::RateLimited { .. } => Some(429),
            _ => None,
        }
    }

    /// Create an error from a non-success response body.
    ///
    /// Feedly reports failures as `{"errorCode": .., "errorId": "..",
    /// "errorMessage": ".."}`; any other body is kept verbatim.
    pub(crate) fn from_api_response(status: u16, body: Value) -> Self {
        let error_id = body
            .get("errorId")
            .and_then(|v| v.as_str())
            .map(String::from);

        let message = body
            .get("errorMessage")
            .and_then(|m| m.as_str())
            .map(String::from)
            .unwrap_or_else(|| default_reason(status).to_string());

        Error::UnexpectedStatus {
            status,
            error_id,
            message,
            body,
        }
    }
}

fn default_reason(status: u16) -> &'static str {
    match status {
        400 => "Bad request",
        403 => "Forbidden",
        409 => "Conflict",
        500..=599 => "Server error",
        _ => "Unknown API error",
    }
}
