//! Continuation-based pagination over Feedly streams.
//!
//! Stream endpoints return one page at a time together with an opaque
//! `continuation` cursor. [`PaginatedStream`] hides the cursor: it fetches
//! the next page only when the buffered one has been consumed, stops once
//! the server stops returning a cursor, and never yields more than the
//! requested maximum.

use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use chrono::{DateTime, Utc};
use futures_util::Stream;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::http::SessionInner;
use crate::models::StreamId;
use crate::{Error, Result};

/// Default number of items requested per page.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Default ranking hint.
pub const DEFAULT_RANKED: &str = "newest";

/// Consecutive empty pages (each still carrying a cursor) after which the
/// stream gives up with [`Error::MalformedResponse`].
pub const MAX_CONSECUTIVE_EMPTY_PAGES: u32 = 3;

/// One page of a stream endpoint.
///
/// `/v3/streams/ids` lists items under `ids`, `/v3/streams/contents` under
/// `items`.
#[derive(Debug, Deserialize)]
pub struct StreamPage<T> {
    /// The items in this page.
    #[serde(alias = "ids", default = "Vec::new")]
    pub items: Vec<T>,
    /// Cursor for the next page; absent on the last page.
    #[serde(default)]
    pub continuation: Option<String>,
}

/// Options controlling a stream read.
///
/// # Example
///
/// ```
/// use feedly_rs::StreamOptions;
///
/// let options = StreamOptions::default()
///     .with_max_count(100)
///     .with_count(50)
///     .unread_only(true);
/// assert!(options.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamOptions {
    /// Upper bound on items yielded; `None` reads to the end of the stream
    pub max_count: Option<u64>,
    /// Items requested per page
    pub count: u32,
    /// Ordering hint passed to the server as-is
    pub ranked: String,
    /// Only unread entries
    pub unread_only: bool,
    /// Only entries newer than this instant
    pub newer_than: Option<DateTime<Utc>>,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            max_count: None,
            count: DEFAULT_PAGE_SIZE,
            ranked: DEFAULT_RANKED.to_string(),
            unread_only: false,
            newer_than: None,
        }
    }
}

impl StreamOptions {
    /// Default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop after `max_count` items.
    pub fn with_max_count(mut self, max_count: u64) -> Self {
        self.max_count = Some(max_count);
        self
    }

    /// Request `count` items per page.
    pub fn with_count(mut self, count: u32) -> Self {
        self.count = count;
        self
    }

    /// Set the ranking hint, e.g. `"oldest"`.
    pub fn with_ranked(mut self, ranked: impl Into<String>) -> Self {
        self.ranked = ranked.into();
        self
    }

    /// Restrict to unread entries.
    pub fn unread_only(mut self, unread_only: bool) -> Self {
        self.unread_only = unread_only;
        self
    }

    /// Restrict to entries newer than `since`.
    pub fn newer_than(mut self, since: DateTime<Utc>) -> Self {
        self.newer_than = Some(since);
        self
    }

    /// Reject options no request could be built from.
    pub fn validate(&self) -> Result<()> {
        if self.count == 0 {
            return Err(Error::InvalidInput("page size must be at least 1".into()));
        }
        Ok(())
    }

    /// Query parameters shared by every page, without `count` and
    /// `continuation`.
    pub(crate) fn to_query(&self, stream_id: &StreamId) -> Vec<(&'static str, String)> {
        let mut query = vec![
            ("streamId", stream_id.to_string()),
            ("ranked", self.ranked.clone()),
        ];
        if self.unread_only {
            query.push(("unreadOnly", "true".to_string()));
        }
        if let Some(since) = self.newer_than {
            query.push(("newerThan", since.timestamp_millis().to_string()));
        }
        query
    }
}

type BoxFuture<'a, T> = Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

type FetchPage<T> =
    Box<dyn Fn(Option<String>, u32) -> BoxFuture<'static, Result<StreamPage<T>>> + Send + Sync>;

/// A stream that lazily walks a Feedly stream page by page.
///
/// The first error ends the stream: it is yielded once and every later poll
/// returns `None`. Dropping the stream abandons the read without side
/// effects.
///
/// # Example
///
/// ```no_run
/// use futures_util::StreamExt;
/// use feedly_rs::{FeedlySession, StreamOptions};
/// use feedly_rs::api::Streamable;
///
/// # async fn example(session: FeedlySession) -> feedly_rs::Result<()> {
/// let category = session.user().category("Tech").await?;
/// let mut entries = category.stream_contents(StreamOptions::default().with_max_count(50));
///
/// while let Some(entry) = entries.next().await {
///     let entry = entry?;
///     println!("{:?}", entry.title);
/// }
/// # Ok(())
/// # }
/// ```
pub struct PaginatedStream<T> {
    fetch_page: Option<FetchPage<T>>,
    buffer: VecDeque<T>,
    cursor: Option<String>,
    /// The last page carried no cursor.
    exhausted: bool,
    max_count: Option<u64>,
    page_size: u32,
    produced: u64,
    empty_pages: u32,
    pages_fetched: u32,
    pending_fetch: Option<BoxFuture<'static, Result<StreamPage<T>>>>,
    pending_error: Option<Error>,
    done: bool,
}

impl<T> PaginatedStream<T> {
    /// Create a stream from a page fetcher.
    ///
    /// `fetch_page` receives the cursor (`None` for the first page) and the
    /// number of items to request.
    pub fn new<F>(page_size: u32, max_count: Option<u64>, fetch_page: F) -> Self
    where
        F: Fn(Option<String>, u32) -> BoxFuture<'static, Result<StreamPage<T>>>
            + Send
            + Sync
            + 'static,
    {
        Self {
            fetch_page: Some(Box::new(fetch_page)),
            buffer: VecDeque::new(),
            cursor: None,
            exhausted: false,
            max_count,
            page_size,
            produced: 0,
            empty_pages: 0,
            pages_fetched: 0,
            pending_fetch: None,
            pending_error: None,
            done: false,
        }
    }

    /// A stream that yields `error` and ends without fetching anything.
    pub(crate) fn failed(error: Error) -> Self {
        Self {
            fetch_page: None,
            buffer: VecDeque::new(),
            cursor: None,
            exhausted: true,
            max_count: None,
            page_size: 0,
            produced: 0,
            empty_pages: 0,
            pages_fetched: 0,
            pending_fetch: None,
            pending_error: Some(error),
            done: false,
        }
    }

    /// Items yielded so far.
    pub fn produced(&self) -> u64 {
        self.produced
    }

    /// Pages fetched so far.
    pub fn pages_fetched(&self) -> u32 {
        self.pages_fetched
    }

    fn remaining_budget(&self) -> Option<u64> {
        self.max_count.map(|max| max.saturating_sub(self.produced))
    }

    fn next_page_size(&self) -> u32 {
        match self.remaining_budget() {
            Some(remaining) => u32::try_from(remaining.min(u64::from(self.page_size)))
                .unwrap_or(self.page_size),
            None => self.page_size,
        }
    }

    fn accept_page(&mut self, page: StreamPage<T>) -> Result<()> {
        self.pages_fetched += 1;
        self.cursor = page.continuation.filter(|c| !c.is_empty());
        self.exhausted = self.cursor.is_none();

        if page.items.is_empty() {
            if !self.exhausted {
                self.empty_pages += 1;
                if self.empty_pages >= MAX_CONSECUTIVE_EMPTY_PAGES {
                    return Err(Error::MalformedResponse(format!(
                        "{} consecutive empty pages with a continuation",
                        self.empty_pages
                    )));
                }
                tracing::debug!(empty_pages = self.empty_pages, "empty page with continuation");
            }
            return Ok(());
        }

        self.empty_pages = 0;
        let mut items = page.items;
        if let Some(remaining) = self.remaining_budget() {
            items.truncate(usize::try_from(remaining).unwrap_or(usize::MAX));
        }
        self.buffer.extend(items);
        Ok(())
    }
}

impl<T> Stream for PaginatedStream<T> {
    type Item = Result<T>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;

        loop {
            if let Some(err) = this.pending_error.take() {
                this.done = true;
                this.buffer.clear();
                return Poll::Ready(Some(Err(err)));
            }
            if this.done {
                return Poll::Ready(None);
            }

            if let Some(item) = this.buffer.pop_front() {
                this.produced += 1;
                return Poll::Ready(Some(Ok(item)));
            }

            if let Some(fut) = this.pending_fetch.as_mut() {
                match fut.as_mut().poll(cx) {
                    Poll::Pending => return Poll::Pending,
                    Poll::Ready(result) => {
                        this.pending_fetch = None;
                        if let Err(e) = result.and_then(|page| this.accept_page(page)) {
                            this.pending_error = Some(e);
                        }
                        continue;
                    }
                }
            }

            let size = this.next_page_size();
            if this.exhausted || size == 0 {
                this.done = true;
                return Poll::Ready(None);
            }

            match this.fetch_page.as_ref() {
                Some(fetch) => this.pending_fetch = Some(fetch(this.cursor.clone(), size)),
                None => this.done = true,
            }
        }
    }
}

impl<T> Unpin for PaginatedStream<T> {}

impl<T> std::fmt::Debug for PaginatedStream<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaginatedStream")
            .field("cursor", &self.cursor)
            .field("produced", &self.produced)
            .field("max_count", &self.max_count)
            .field("buffered", &self.buffer.len())
            .field("done", &self.done)
            .finish()
    }
}

/// Builds a [`PaginatedStream`] over one of the stream endpoints.
pub(crate) struct PaginatedStreamBuilder<T> {
    inner: Arc<SessionInner>,
    path: &'static str,
    stream_id: StreamId,
    options: StreamOptions,
    _marker: std::marker::PhantomData<T>,
}

impl<T: DeserializeOwned + Send + 'static> PaginatedStreamBuilder<T> {
    pub(crate) fn new(
        inner: Arc<SessionInner>,
        path: &'static str,
        stream_id: StreamId,
        options: StreamOptions,
    ) -> Self {
        Self {
            inner,
            path,
            stream_id,
            options,
            _marker: std::marker::PhantomData,
        }
    }

    pub(crate) fn build(self) -> PaginatedStream<T> {
        if let Err(e) = self.options.validate() {
            return PaginatedStream::failed(e);
        }

        let inner = self.inner;
        let path = self.path;
        let base_query = self.options.to_query(&self.stream_id);

        PaginatedStream::new(self.options.count, self.options.max_count, move |cursor, count| {
            let inner = inner.clone();
            let mut query = base_query.clone();

            Box::pin(async move {
                query.push(("count", count.to_string()));
                if let Some(cursor) = cursor {
                    query.push(("continuation", cursor));
                }
                tracing::debug!(path, count, "fetching stream page");
                inner.get_with_query::<StreamPage<T>>(path, &query).await
            })
        })
    }
}
