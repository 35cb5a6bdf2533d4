//! Quota tracking from `X-RateLimit-*` response headers.
//!
//! Feedly reports how many calls were made in the current window
//! (`X-RateLimit-Count`), the window's allowance (`X-RateLimit-Limit`) and
//! the number of seconds until the window resets (`X-RateLimit-Reset`).

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use reqwest::header::HeaderMap;

use crate::{Error, Result};

/// Calls made in the current window.
pub const HEADER_COUNT: &str = "X-RateLimit-Count";

/// Calls allowed in the current window.
pub const HEADER_LIMIT: &str = "X-RateLimit-Limit";

/// Seconds until the window resets.
pub const HEADER_RESET: &str = "X-RateLimit-Reset";

/// How long a bare `429` (one without quota headers) locks the client out.
pub const DEFAULT_LOCKOUT_SECS: i64 = 60;

/// What the session does when the quota is exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RateLimitPolicy {
    /// Fail with [`Error::RateLimited`](crate::Error::RateLimited) without
    /// sending anything.
    #[default]
    FailFast,
    /// Sleep until the reset time, then send.
    WaitUntilReset,
}

/// Remaining quota and reset time, as last reported by the server.
///
/// Both values are unknown until the first response carrying the headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RateLimiterState {
    remaining: Option<u64>,
    reset_at: Option<i64>,
}

impl RateLimiterState {
    /// Requests left in the current window.
    pub fn remaining(&self) -> Option<u64> {
        self.remaining
    }

    /// Unix timestamp (seconds) at which the window resets.
    pub fn reset_at(&self) -> Option<i64> {
        self.reset_at
    }

    /// `true` if no quota is left and the window has not reset yet.
    pub fn is_exhausted_at(&self, now: i64) -> bool {
        match (self.remaining, self.reset_at) {
            (Some(0), Some(reset_at)) => now < reset_at,
            _ => false,
        }
    }

    /// Merge the quota headers of a response.
    ///
    /// Headers that are missing or unparsable keep their previous value.
    /// `remaining` is computed as `limit - count` and never goes below zero.
    pub fn update_from_headers(&mut self, headers: &HeaderMap, now: i64) {
        let count = header_u64(headers, HEADER_COUNT);
        let limit = header_u64(headers, HEADER_LIMIT);
        let reset = header_u64(headers, HEADER_RESET);

        if let (Some(count), Some(limit)) = (count, limit) {
            self.remaining = Some(limit.saturating_sub(count));
        }
        if let Some(reset) = reset {
            self.reset_at = Some(now.saturating_add(i64::try_from(reset).unwrap_or(i64::MAX)));
        }
    }

    /// Lock the client out for `secs` seconds, used when the server answers
    /// `429` without saying when the quota resets.
    pub fn mark_exhausted(&mut self, now: i64, secs: i64) {
        self.remaining = Some(0);
        self.reset_at = Some(now + secs);
    }
}

/// Quota state shared by every request a session sends, the token
/// exchange included.
#[derive(Debug)]
pub(crate) struct QuotaGate {
    state: Mutex<RateLimiterState>,
    policy: RateLimitPolicy,
}

impl QuotaGate {
    pub(crate) fn new(policy: RateLimitPolicy) -> Self {
        Self {
            state: Mutex::new(RateLimiterState::default()),
            policy,
        }
    }

    fn state(&self) -> MutexGuard<'_, RateLimiterState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// The state as last reported by the server.
    pub(crate) fn snapshot(&self) -> RateLimiterState {
        *self.state()
    }

    /// Wait for (or refuse) permission to send one request.
    pub(crate) async fn acquire(&self) -> Result<()> {
        let now = Utc::now().timestamp();
        let state = self.snapshot();
        if !state.is_exhausted_at(now) {
            return Ok(());
        }

        let reset_at = state.reset_at().unwrap_or(now);
        match self.policy {
            RateLimitPolicy::FailFast => Err(Error::RateLimited { reset_at }),
            RateLimitPolicy::WaitUntilReset => {
                let wait = u64::try_from(reset_at - now).unwrap_or(0);
                tracing::debug!(wait_secs = wait, "quota exhausted, waiting for reset");
                tokio::time::sleep(Duration::from_secs(wait)).await;
                Ok(())
            }
        }
    }

    /// Record the quota headers of a response, whatever its status.
    pub(crate) fn record(&self, headers: &HeaderMap) {
        self.state()
            .update_from_headers(headers, Utc::now().timestamp());
    }

    /// Handle a `429`: keep the server's reset time if it gave one,
    /// otherwise lock out for [`DEFAULT_LOCKOUT_SECS`]. Returns the reset time.
    pub(crate) fn lock_out(&self) -> i64 {
        let now = Utc::now().timestamp();
        let mut state = self.state();
        if !state.is_exhausted_at(now) {
            state.mark_exhausted(now, DEFAULT_LOCKOUT_SECS);
        }
        state.reset_at().unwrap_or(now + DEFAULT_LOCKOUT_SECS)
    }
}

fn header_u64(headers: &HeaderMap, name: &str) -> Option<u64> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}
