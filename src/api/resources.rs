//! Stream handles: categories, tags and arbitrary streams.

use std::sync::Arc;

use futures_util::TryStreamExt;
use serde_json::json;

use crate::client::{PaginatedStream, PaginatedStreamBuilder, SessionInner, StreamOptions};
use crate::models::{Entry, EntryId, StreamId, StreamSource};
use crate::{Error, Result};

/// Path of the entry-id listing endpoint.
const STREAM_IDS_PATH: &str = "/v3/streams/ids";

/// Path of the entry-contents listing endpoint.
const STREAM_CONTENTS_PATH: &str = "/v3/streams/contents";

/// Path of the team tag endpoint.
pub(crate) const ENTERPRISE_TAGS_PATH: &str = "/v3/enterprise/tags";

/// Entries per batch when tagging or untagging many entries.
pub const TAG_BATCH_SIZE: usize = 50;

/// HTTP status returned when some entries of a tag batch no longer exist.
const STATUS_CONFLICT: u16 = 409;

/// Percent-encode one path segment. Everything but unreserved characters
/// is escaped, so `/`, `,` and spaces never split or rename the segment.
pub(crate) fn encode_segment(segment: &str) -> String {
    urlencoding::encode(segment).into_owned()
}

/// A readable stream, bound to the session that created it.
///
/// Handles are cheap to clone and hold no state besides the id. They stop
/// working once the session is closed.
#[derive(Clone)]
pub struct StreamHandle {
    inner: Arc<SessionInner>,
    id: StreamId,
}

impl StreamHandle {
    pub(crate) fn new(inner: Arc<SessionInner>, id: StreamId) -> Self {
        Self { inner, id }
    }

    pub(crate) fn session(&self) -> &Arc<SessionInner> {
        &self.inner
    }

    /// The stream id.
    pub fn id(&self) -> &StreamId {
        &self.id
    }
}

impl std::fmt::Debug for StreamHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("StreamHandle").field(&self.id).finish()
    }
}

/// Anything whose entries can be read as a stream.
///
/// # Example
///
/// ```no_run
/// use futures_util::TryStreamExt;
/// use feedly_rs::{FeedlySession, StreamOptions};
/// use feedly_rs::api::Streamable;
///
/// # async fn example(session: FeedlySession) -> feedly_rs::Result<()> {
/// let feed = session.streams().feed("https://blog.rust-lang.org/feed.xml");
/// let ids: Vec<_> = feed
///     .stream_ids(StreamOptions::default().with_max_count(10))
///     .try_collect()
///     .await?;
/// # Ok(())
/// # }
/// ```
pub trait Streamable {
    /// The underlying handle.
    fn handle(&self) -> &StreamHandle;

    /// Display name, when the server provided one.
    fn label(&self) -> Option<&str> {
        None
    }

    /// The stream id.
    fn stream_id(&self) -> &StreamId {
        self.handle().id()
    }

    /// Lazily list entry ids.
    fn stream_ids(&self, options: StreamOptions) -> PaginatedStream<EntryId> {
        let handle = self.handle();
        PaginatedStreamBuilder::new(
            handle.inner.clone(),
            STREAM_IDS_PATH,
            handle.id.clone(),
            options,
        )
        .build()
    }

    /// Lazily list full entries.
    fn stream_contents(&self, options: StreamOptions) -> PaginatedStream<Entry> {
        let handle = self.handle();
        PaginatedStreamBuilder::new(
            handle.inner.clone(),
            STREAM_CONTENTS_PATH,
            handle.id.clone(),
            options,
        )
        .build()
    }
}

impl Streamable for StreamHandle {
    fn handle(&self) -> &StreamHandle {
        self
    }
}

/// A user or enterprise category.
#[derive(Debug, Clone)]
pub struct Category {
    stream: StreamHandle,
    label: Option<String>,
}

impl Category {
    pub(crate) fn new(stream: StreamHandle, label: Option<String>) -> Self {
        Self { stream, label }
    }
}

impl Streamable for Category {
    fn handle(&self) -> &StreamHandle {
        &self.stream
    }

    fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }
}

/// A user or enterprise tag. Besides reading, entries can be tagged and
/// untagged.
#[derive(Debug, Clone)]
pub struct Tag {
    stream: StreamHandle,
    label: Option<String>,
}

impl Tag {
    pub(crate) fn new(stream: StreamHandle, label: Option<String>) -> Self {
        Self { stream, label }
    }

    fn path(&self) -> String {
        format!("/v3/tags/{}", encode_segment(self.stream.id.as_str()))
    }

    /// Apply this tag to one entry.
    pub async fn tag_entry(&self, entry_id: &EntryId) -> Result<()> {
        self.stream
            .session()
            .put(&self.path(), &json!({ "entryId": entry_id }))
            .await?;
        Ok(())
    }

    /// Apply this tag to many entries, in batches of [`TAG_BATCH_SIZE`].
    ///
    /// A `409` on a batch (some entries no longer exist) is logged and
    /// skipped; any other error stops at the failing batch.
    pub async fn tag_entries(&self, entry_ids: &[EntryId]) -> Result<()> {
        let path = self.path();
        for batch in entry_ids.chunks(TAG_BATCH_SIZE) {
            let result = self
                .stream
                .session()
                .put(&path, &json!({ "entryIds": batch }))
                .await;
            match result {
                Ok(_) => {}
                Err(e) if e.status() == Some(STATUS_CONFLICT) => {
                    tracing::warn!(tag = %self.stream.id, batch = batch.len(), "conflict while tagging, skipping batch");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Remove this tag from many entries, in batches of [`TAG_BATCH_SIZE`].
    pub async fn untag_entries(&self, entry_ids: &[EntryId]) -> Result<()> {
        let path = self.path();
        for batch in entry_ids.chunks(TAG_BATCH_SIZE) {
            let ids = batch
                .iter()
                .map(|id| encode_segment(id.as_str()))
                .collect::<Vec<_>>()
                .join(",");
            self.stream
                .session()
                .delete(&format!("{}/{}", path, ids))
                .await?;
        }
        Ok(())
    }

    /// Remove this tag from one entry.
    pub async fn untag_entry(&self, entry_id: &EntryId) -> Result<()> {
        self.untag_entries(std::slice::from_ref(entry_id)).await
    }

    /// Remove this tag from every entry the tag stream yields under
    /// `options`, and return how many entries were untagged.
    ///
    /// Not reversible. On a team tag this also removes teammates' tagging.
    /// Ids are collected first, so `max_count` bounds the work.
    pub async fn untag_all(&self, options: StreamOptions) -> Result<usize> {
        let ids: Vec<EntryId> = self.stream_ids(options).try_collect().await?;
        if ids.is_empty() {
            return Ok(0);
        }
        tracing::info!(tag = %self.stream.id, entries = ids.len(), "untagging all entries");
        self.untag_entries(&ids).await?;
        Ok(ids.len())
    }

    /// Archive a team tag. It stays readable but is no longer listed.
    pub async fn archive(&self) -> Result<()> {
        let path = self.enterprise_path()?;
        self.stream.session().delete(&path).await?;
        Ok(())
    }

    /// Permanently delete a team tag. Every entry is untagged and the tag
    /// is removed from all members' subscriptions. Not reversible.
    pub async fn delete(&self) -> Result<()> {
        let path = self.enterprise_path()?;
        self.stream
            .session()
            .delete_with_query(&path, &[("deleteContent", "true".to_string())])
            .await?;
        Ok(())
    }

    fn enterprise_path(&self) -> Result<String> {
        if self.stream.id.source() != StreamSource::Enterprise {
            return Err(Error::InvalidStreamId(format!(
                "'{}' is not a team tag",
                self.stream.id
            )));
        }
        Ok(format!(
            "{}/{}",
            ENTERPRISE_TAGS_PATH,
            encode_segment(self.stream.id.as_str())
        ))
    }
}

impl Streamable for Tag {
    fn handle(&self) -> &StreamHandle {
        &self.stream
    }

    fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }
}

/// A feed, identified by its URL (`feed/{url}`).
#[derive(Debug, Clone)]
pub struct Feed {
    stream: StreamHandle,
}

impl Feed {
    pub(crate) fn new(stream: StreamHandle) -> Self {
        Self { stream }
    }

    /// The feed URL.
    pub fn url(&self) -> &str {
        self.stream.id.content_id().unwrap_or_default()
    }
}

impl Streamable for Feed {
    fn handle(&self) -> &StreamHandle {
        &self.stream
    }
}

/// Require a stream id of a given kind.
pub(crate) fn expect_kind(id: &StreamId, kind: &str) -> Result<()> {
    match id.kind() {
        Some(k) if k == kind => Ok(()),
        _ => Err(Error::InvalidStreamId(format!(
            "expected a {} id, got '{}'",
            kind, id
        ))),
    }
}
