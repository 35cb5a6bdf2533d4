//! # feedly-rs
//!
//! An async Rust client for the Feedly cloud API.
//!
//! The crate covers the plumbing every Feedly integration needs:
//!
//! - **Authentication**: pluggable credential stores, with automatic token
//!   refresh on `401` for stores that support it
//! - **Quota**: tracks `X-RateLimit-*` headers and refuses (or waits) once
//!   the quota is exhausted instead of burning requests
//! - **Streams**: lazy, cursor-based reads over categories, tags and feeds
//! - **Resources**: categories and tags listed once and looked up by label
//!   or id; tagging and untagging entries
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use futures_util::StreamExt;
//! use feedly_rs::{FeedlySession, StreamOptions};
//! use feedly_rs::api::Streamable;
//!
//! #[tokio::main]
//! async fn main() -> feedly_rs::Result<()> {
//!     let session = FeedlySession::with_token("A1234...").await?;
//!
//!     let categories = session.user().categories().await?;
//!     let tech = categories.get("Tech")?;
//!
//!     let mut entries = tech.stream_contents(StreamOptions::default().with_max_count(10));
//!     while let Some(entry) = entries.next().await {
//!         println!("{:?}", entry?.title);
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Refreshing Tokens
//!
//! ```rust,no_run
//! use feedly_rs::{ClientConfig, FeedlySession};
//! use feedly_rs::auth::FileAuthStore;
//!
//! #[tokio::main]
//! async fn main() -> feedly_rs::Result<()> {
//!     // Reads ~/.config/feedly/access.token and refresh.token
//!     let store = FileAuthStore::new(FileAuthStore::default_dir()?)?;
//!     let session = FeedlySession::new(store, ClientConfig::default()).await?;
//!
//!     // An expired token is refreshed and written back transparently
//!     let profile = session.user().profile().await?;
//!     println!("{}", profile.id);
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

pub mod api;
pub mod auth;
pub mod client;
pub mod error;
pub mod models;

// Re-export primary types at crate root for convenience
pub use error::{Error, Result};
pub use models::{Entry, EntryId, NewEnterpriseTag, Profile, StreamId};
pub use client::{
    ApiResponse, ClientConfig, FeedlySession, PaginatedStream, RateLimitPolicy,
    RateLimiterState, StreamOptions,
};

/// Prelude module for convenient imports.
///
/// ```rust
/// use feedly_rs::prelude::*;
/// ```
pub mod prelude {
    pub use crate::api::{Category, Feed, ResourceCollection, StreamHandle, Streamable, Tag};
    pub use crate::auth::{AuthStore, Credentials, FileAuthStore, StaticAuth};
    pub use crate::client::{
        ClientConfig, FeedlySession, PaginatedStream, RateLimitPolicy, StreamOptions,
    };
    pub use crate::error::{Error, Result};
    pub use crate::models::{
        Annotation, Entry, EntryId, EntryTag, NewEnterpriseTag, Profile, StreamId, StreamInfo,
        StreamSource,
    };
}
