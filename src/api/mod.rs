//! Service and handle types for Feedly resources.
//!
//! Services hang off the session ([`FeedlySession::user`](crate::FeedlySession::user),
//! [`FeedlySession::streams`](crate::FeedlySession::streams)) and hand out
//! handles. Every handle readable as a stream implements [`Streamable`].

mod collection;
mod resources;
mod streams;
mod user;

pub use collection::ResourceCollection;
pub use resources::{Category, Feed, StreamHandle, Streamable, Tag, TAG_BATCH_SIZE};
pub use streams::StreamsService;
pub use user::UserService;
