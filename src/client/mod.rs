//! Session, configuration and pagination for the Feedly API.
//!
//! This module provides the main entry point [`FeedlySession`].
//!
//! # Example
//!
//! ```no_run
//! use feedly_rs::{ClientConfig, FeedlySession, RateLimitPolicy};
//!
//! # async fn example() -> feedly_rs::Result<()> {
//! let config = ClientConfig::default().with_rate_limit_policy(RateLimitPolicy::WaitUntilReset);
//! let session = FeedlySession::with_token_and_config("A1234...", config).await?;
//!
//! let profile = session.user().profile().await?;
//! println!("{:?} ({:?})", profile.full_name, session.rate_limit().remaining());
//! # Ok(())
//! # }
//! ```

mod config;
mod http;
pub mod paginated;
pub mod rate_limit;

pub use config::{ClientConfig, DEFAULT_API_HOST, DEFAULT_CLIENT_NAME};
pub use http::{ApiResponse, FeedlySession};
pub use paginated::{PaginatedStream, StreamOptions, StreamPage, DEFAULT_PAGE_SIZE};
pub use rate_limit::{RateLimitPolicy, RateLimiterState};
pub(crate) use http::SessionInner;
pub(crate) use paginated::PaginatedStreamBuilder;
pub(crate) use rate_limit::QuotaGate;
