//! Primitive types and newtypes for type-safe API interactions.
//!
//! This module provides strongly-typed wrappers around string identifiers
//! to prevent mixing up different kinds of ids at compile time.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Error, Result};

/// Source prefix of streams owned by a single user.
pub const STREAM_SOURCE_USER: &str = "user";

/// Source prefix of streams owned by a team.
pub const STREAM_SOURCE_ENTERPRISE: &str = "enterprise";

/// Source prefix of feed streams.
pub const STREAM_SOURCE_FEED: &str = "feed";

/// A stream identifier such as `user/{userId}/category/{name}`.
///
/// The client treats stream ids as opaque tokens. Parsing only splits out
/// the parts needed to build handles and index collections.
///
/// # Example
///
/// ```
/// use feedly_rs::StreamId;
///
/// let id = StreamId::user_category("abcd", "gaming");
/// assert_eq!(id.as_str(), "user/abcd/category/gaming");
/// assert_eq!(id.content_id(), Some("gaming"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StreamId(String);

/// Where a stream comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamSource {
    /// `user/...`
    User,
    /// `enterprise/...`
    Enterprise,
    /// `feed/...`
    Feed,
    /// Anything else the service may return
    Unknown,
}

impl StreamId {
    /// Wrap a raw stream id without validating it.
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Parse a stream id, rejecting user and enterprise ids that are
    /// missing their `source/owner/kind/content` parts.
    pub fn parse(s: impl Into<String>) -> Result<Self> {
        let id = Self(s.into());
        match id.source() {
            StreamSource::User | StreamSource::Enterprise => {
                if id.0.split('/').count() < 4 || id.content_id().map_or(true, str::is_empty) {
                    return Err(Error::InvalidStreamId(id.0));
                }
            }
            StreamSource::Feed => {
                if id.0.len() <= STREAM_SOURCE_FEED.len() + 1 {
                    return Err(Error::InvalidStreamId(id.0));
                }
            }
            StreamSource::Unknown => {
                if id.0.is_empty() {
                    return Err(Error::InvalidStreamId(id.0));
                }
            }
        }
        Ok(id)
    }

    /// `user/{user_id}/category/{name}`
    pub fn user_category(user_id: &str, name: &str) -> Self {
        Self(format!("{STREAM_SOURCE_USER}/{user_id}/category/{name}"))
    }

    /// `user/{user_id}/tag/{name}`
    pub fn user_tag(user_id: &str, name: &str) -> Self {
        Self(format!("{STREAM_SOURCE_USER}/{user_id}/tag/{name}"))
    }

    /// `enterprise/{team}/category/{uuid}`
    pub fn enterprise_category(team: &str, id: &str) -> Self {
        Self(format!("{STREAM_SOURCE_ENTERPRISE}/{team}/category/{id}"))
    }

    /// `enterprise/{team}/tag/{uuid}`
    pub fn enterprise_tag(team: &str, id: &str) -> Self {
        Self(format!("{STREAM_SOURCE_ENTERPRISE}/{team}/tag/{id}"))
    }

    /// `feed/{url}`
    pub fn feed(url: &str) -> Self {
        Self(format!("{STREAM_SOURCE_FEED}/{url}"))
    }

    /// Get the stream id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The source this stream belongs to.
    pub fn source(&self) -> StreamSource {
        match self.0.split('/').next() {
            Some(STREAM_SOURCE_USER) => StreamSource::User,
            Some(STREAM_SOURCE_ENTERPRISE) => StreamSource::Enterprise,
            Some(STREAM_SOURCE_FEED) => StreamSource::Feed,
            _ => StreamSource::Unknown,
        }
    }

    /// The owner segment: a user id or a team name.
    pub fn source_id(&self) -> Option<&str> {
        match self.source() {
            StreamSource::User | StreamSource::Enterprise => self.0.split('/').nth(1),
            _ => None,
        }
    }

    /// The kind segment, typically `category` or `tag`.
    pub fn kind(&self) -> Option<&str> {
        match self.source() {
            StreamSource::User | StreamSource::Enterprise => self.0.split('/').nth(2),
            _ => None,
        }
    }

    /// Everything after `source/owner/kind/`.
    ///
    /// For user streams this is plain text such as `gaming` or
    /// `global.saved` and may itself contain slashes. Enterprise streams
    /// yield a UUID, feed streams their URL.
    pub fn content_id(&self) -> Option<&str> {
        match self.source() {
            StreamSource::User | StreamSource::Enterprise => {
                self.0.splitn(4, '/').nth(3)
            }
            StreamSource::Feed => self.0.split_once('/').map(|(_, url)| url),
            StreamSource::Unknown => None,
        }
    }

    /// `true` for `.../category/...` ids.
    pub fn is_category(&self) -> bool {
        self.kind() == Some("category")
    }

    /// `true` for `.../tag/...` ids.
    pub fn is_tag(&self) -> bool {
        self.kind() == Some("tag")
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for StreamId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<String> for StreamId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for StreamId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A strongly-typed entry (article) id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(String);

impl EntryId {
    /// Create a new entry id.
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the entry id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for EntryId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<String> for EntryId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for EntryId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_stream_parts() {
        let id = StreamId::parse("user/abcd/tag/global.saved").unwrap();
        assert_eq!(id.source(), StreamSource::User);
        assert_eq!(id.source_id(), Some("abcd"));
        assert_eq!(id.kind(), Some("tag"));
        assert_eq!(id.content_id(), Some("global.saved"));
        assert!(id.is_tag());
        assert!(!id.is_category());
    }

    #[test]
    fn test_content_id_keeps_slashes() {
        let id = StreamId::new("user/abcd/category/news/world");
        assert_eq!(id.content_id(), Some("news/world"));
    }

    #[test]
    fn test_enterprise_stream_parts() {
        let id = StreamId::enterprise_category("acme", "bbbbbbbb-3333-4444-1111-aaaaaaaaaaaa");
        assert_eq!(id.source(), StreamSource::Enterprise);
        assert_eq!(id.source_id(), Some("acme"));
        assert!(id.is_category());
        assert_eq!(id.content_id(), Some("bbbbbbbb-3333-4444-1111-aaaaaaaaaaaa"));
    }

    #[test]
    fn test_feed_stream() {
        let id = StreamId::feed("https://blog.rust-lang.org/feed.xml");
        assert_eq!(id.source(), StreamSource::Feed);
        assert_eq!(id.content_id(), Some("https://blog.rust-lang.org/feed.xml"));
        assert_eq!(id.kind(), None);
    }

    #[test]
    fn test_parse_rejects_short_ids() {
        assert!(StreamId::parse("user/abcd/category").is_err());
        assert!(StreamId::parse("user/abcd/category/").is_err());
        assert!(StreamId::parse("feed/").is_err());
        assert!(StreamId::parse("").is_err());
        assert!(StreamId::parse("topic/rust").is_ok());
    }

    #[test]
    fn test_entry_id_display() {
        let id = EntryId::new("gRtwnDeqCDpZ42bXE9Sp7dNhm4R6NsipqFVbXn2XpDA=_13fb9d6f274:2ac9c5:f5718180");
        assert_eq!(id.to_string(), id.as_str());
    }
}
