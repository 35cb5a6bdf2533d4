//! Lookup tables over category and tag listings.

use std::collections::HashMap;

use super::resources::Streamable;
use crate::{Error, Result};

/// A list of handles indexed by label and by id.
///
/// [`get`](Self::get) accepts a label (`"Tech"`), a full stream id
/// (`"user/abcd/category/tech"`), or the trailing part of one (`"tech"`, or
/// an enterprise UUID). Labels are tried first.
///
/// # Example
///
/// ```no_run
/// # async fn example(session: feedly_rs::FeedlySession) -> feedly_rs::Result<()> {
/// let categories = session.user().categories().await?;
/// let tech = categories.get("Tech")?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ResourceCollection<H> {
    handles: Vec<H>,
    by_name: HashMap<String, usize>,
    by_id: HashMap<String, usize>,
}

impl<H: Streamable> ResourceCollection<H> {
    /// Index `handles`. When two handles share a key the first one wins.
    pub fn new(handles: Vec<H>) -> Self {
        let mut by_name = HashMap::new();
        let mut by_id = HashMap::new();

        for (index, handle) in handles.iter().enumerate() {
            if let Some(label) = handle.label() {
                by_name.entry(label.to_string()).or_insert(index);
            }
            let id = handle.stream_id();
            by_id.entry(id.to_string()).or_insert(index);
            if let Some(content_id) = id.content_id() {
                by_id.entry(content_id.to_string()).or_insert(index);
            }
        }

        Self {
            handles,
            by_name,
            by_id,
        }
    }

    /// Look a handle up by label, then by id.
    pub fn get(&self, key: &str) -> Result<&H> {
        self.by_name
            .get(key)
            .or_else(|| self.by_id.get(key))
            .map(|&index| &self.handles[index])
            .ok_or_else(|| Error::NotFound(format!("no stream named or identified by '{}'", key)))
    }

    /// `true` if [`get`](Self::get) would find `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.by_name.contains_key(key) || self.by_id.contains_key(key)
    }

    /// Labels of the handles that have one.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.handles.iter().filter_map(Streamable::label)
    }
}

impl<H> ResourceCollection<H> {
    /// Iterate over the handles in server order.
    pub fn iter(&self) -> std::slice::Iter<'_, H> {
        self.handles.iter()
    }

    /// Number of handles.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// `true` if the listing was empty.
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Take the handles out.
    pub fn into_vec(self) -> Vec<H> {
        self.handles
    }
}

impl<H> IntoIterator for ResourceCollection<H> {
    type Item = H;
    type IntoIter = std::vec::IntoIter<H>;

    fn into_iter(self) -> Self::IntoIter {
        self.handles.into_iter()
    }
}

impl<'a, H> IntoIterator for &'a ResourceCollection<H> {
    type Item = &'a H;
    type IntoIter = std::slice::Iter<'a, H>;

    fn into_iter(self) -> Self::IntoIter {
        self.handles.iter()
    }
}
