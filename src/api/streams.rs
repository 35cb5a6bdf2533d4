//! Handles on arbitrary streams.

use std::sync::Arc;

use super::resources::{Feed, StreamHandle};
use crate::client::SessionInner;
use crate::models::StreamId;

/// Service for streams addressed directly by id.
///
/// # Example
///
/// ```no_run
/// use feedly_rs::StreamOptions;
/// use feedly_rs::api::Streamable;
///
/// # async fn example(session: feedly_rs::FeedlySession) {
/// let stream = session.streams().stream("user/abcd/category/global.all");
/// let ids = stream.stream_ids(StreamOptions::default().with_max_count(5));
/// # }
/// ```
pub struct StreamsService {
    inner: Arc<SessionInner>,
}

impl StreamsService {
    pub(crate) fn new(inner: Arc<SessionInner>) -> Self {
        Self { inner }
    }

    /// A handle on any stream id. The id is passed to the server as-is.
    pub fn stream(&self, id: impl Into<StreamId>) -> StreamHandle {
        StreamHandle::new(self.inner.clone(), id.into())
    }

    /// A handle on the feed at `url`.
    pub fn feed(&self, url: &str) -> Feed {
        Feed::new(StreamHandle::new(self.inner.clone(), StreamId::feed(url)))
    }
}

impl std::fmt::Debug for StreamsService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamsService").finish_non_exhaustive()
    }
}
