//! The authenticated user: profile, categories and tags.

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::TryStreamExt;
use serde_json::{json, Value};

use super::collection::ResourceCollection;
use super::resources::{
    encode_segment, expect_kind, Category, StreamHandle, Streamable, Tag, ENTERPRISE_TAGS_PATH,
};
use crate::client::{SessionInner, StreamOptions};
use crate::models::{Entry, EntryId, NewEnterpriseTag, Profile, StreamId, StreamInfo};
use crate::{Error, Result};

/// Path of the annotation endpoint.
const ANNOTATIONS_PATH: &str = "/v3/annotations";

/// Service for the authenticated user's own resources.
///
/// # Example
///
/// ```no_run
/// # async fn example(session: feedly_rs::FeedlySession) -> feedly_rs::Result<()> {
/// let user = session.user();
/// println!("Hello, {:?}!", user.profile().await?.full_name);
///
/// for tag in user.tags().await?.names() {
///     println!("tag: {}", tag);
/// }
/// # Ok(())
/// # }
/// ```
pub struct UserService {
    inner: Arc<SessionInner>,
}

impl UserService {
    pub(crate) fn new(inner: Arc<SessionInner>) -> Self {
        Self { inner }
    }

    /// The user id. Fetched from the profile once, then cached.
    pub async fn id(&self) -> Result<String> {
        self.inner.user_id().await
    }

    /// Get the user's profile.
    pub async fn profile(&self) -> Result<Profile> {
        self.inner.fetch_profile().await
    }

    /// List the user's categories.
    pub async fn categories(&self) -> Result<ResourceCollection<Category>> {
        let infos = self.list("/v3/categories").await?;
        Ok(self.collect(infos, Category::new))
    }

    /// List the user's tags.
    pub async fn tags(&self) -> Result<ResourceCollection<Tag>> {
        let infos = self.list("/v3/tags").await?;
        Ok(self.collect(infos, Tag::new))
    }

    /// List the team categories (enterprise accounts only).
    pub async fn enterprise_categories(&self) -> Result<ResourceCollection<Category>> {
        let infos = self.list("/v3/enterprise/collections").await?;
        Ok(self.collect(infos, Category::new))
    }

    /// List the team tags (enterprise accounts only).
    pub async fn enterprise_tags(&self) -> Result<ResourceCollection<Tag>> {
        let infos = self.list("/v3/enterprise/tags").await?;
        Ok(self.collect(infos, Tag::new))
    }

    /// Look up a team category by name, id or content id (its UUID).
    pub async fn enterprise_category(&self, key: &str) -> Result<Category> {
        Ok(self.enterprise_categories().await?.get(key)?.clone())
    }

    /// Look up a team tag by name, id or content id (its UUID).
    pub async fn enterprise_tag(&self, key: &str) -> Result<Tag> {
        Ok(self.enterprise_tags().await?.get(key)?.clone())
    }

    /// Create a team tag and return a handle on it.
    ///
    /// When `emailSettings` is given it must set `includeFollowers`.
    pub async fn create_enterprise_tag(&self, tag: &NewEnterpriseTag) -> Result<Tag> {
        if let Some(settings) = tag.settings.get("emailSettings") {
            if settings.get("includeFollowers").and_then(Value::as_bool) != Some(true) {
                return Err(Error::InvalidInput(
                    "emailSettings must set includeFollowers".into(),
                ));
            }
        }

        let created: Vec<StreamInfo> = self.inner.post(ENTERPRISE_TAGS_PATH, tag).await?.json()?;
        let info = created.into_iter().next().ok_or_else(|| {
            Error::MalformedResponse("tag creation returned no tag".into())
        })?;
        tracing::info!(tag = %info.id, "created team tag");
        Ok(Tag::new(StreamHandle::new(self.inner.clone(), info.id), info.label))
    }

    /// Leave a comment on an entry.
    pub async fn annotate_entry(&self, entry_id: &EntryId, comment: &str) -> Result<()> {
        let body = json!({
            "comment": comment,
            "entryId": entry_id,
            "emailMentions": [],
            "slackMentions": [],
        });
        self.inner.post(ANNOTATIONS_PATH, &body).await?;
        Ok(())
    }

    /// Delete every annotation this user made on the entries `stream`
    /// yields under `options`. Returns how many were deleted.
    ///
    /// Not reversible.
    pub async fn delete_annotations<S: Streamable>(
        &self,
        stream: &S,
        options: StreamOptions,
    ) -> Result<usize> {
        let user_id = self.id().await?;
        let entries: Vec<Entry> = stream.stream_contents(options).try_collect().await?;

        let own: Vec<String> = entries
            .iter()
            .flat_map(Entry::annotations)
            .filter(|a| a.author.as_deref() == Some(user_id.as_str()))
            .map(|a| a.id)
            .collect();
        for id in &own {
            self.inner
                .delete(&format!("{}/{}", ANNOTATIONS_PATH, encode_segment(id)))
                .await?;
        }
        Ok(own.len())
    }

    /// Remove every named tag this user applied to the entries `stream`
    /// yields under `options`, personal and team tags alike. Returns how
    /// many (entry, tag) pairs were removed.
    ///
    /// Not reversible.
    pub async fn remove_own_tags<S: Streamable>(
        &self,
        stream: &S,
        options: StreamOptions,
    ) -> Result<usize> {
        let user_id = self.id().await?;
        let entries: Vec<Entry> = stream.stream_contents(options).try_collect().await?;

        let mut by_tag: HashMap<StreamId, Vec<EntryId>> = HashMap::new();
        for entry in &entries {
            for tag in entry.tags() {
                let named = tag.label.as_deref().is_some_and(|l| !l.is_empty());
                if named && tag.tagged_by() == Some(user_id.as_str()) {
                    by_tag.entry(tag.id).or_default().push(entry.id.clone());
                }
            }
        }

        let mut removed = 0;
        for (tag_id, entry_ids) in by_tag {
            let tag = Tag::new(StreamHandle::new(self.inner.clone(), tag_id), None);
            tag.untag_entries(&entry_ids).await?;
            removed += entry_ids.len();
        }
        Ok(removed)
    }

    /// A handle on `user/{id}/category/{name}`, without listing categories.
    ///
    /// The category need not exist yet; reading a missing one fails with
    /// [`Error::NotFound`](crate::Error::NotFound).
    pub async fn category(&self, name: &str) -> Result<Category> {
        let id = StreamId::user_category(&self.id().await?, name);
        expect_kind(&id, "category")?;
        Ok(Category::new(
            StreamHandle::new(self.inner.clone(), id),
            Some(name.to_string()),
        ))
    }

    /// A handle on `user/{id}/tag/{name}`, without listing tags.
    pub async fn tag(&self, name: &str) -> Result<Tag> {
        let id = StreamId::user_tag(&self.id().await?, name);
        expect_kind(&id, "tag")?;
        Ok(Tag::new(
            StreamHandle::new(self.inner.clone(), id),
            Some(name.to_string()),
        ))
    }

    /// The "Saved for later" tag.
    pub async fn saved(&self) -> Result<Tag> {
        self.tag("global.saved").await
    }

    async fn list(&self, path: &str) -> Result<Vec<StreamInfo>> {
        self.inner.get(path).await
    }

    fn collect<H, F>(&self, infos: Vec<StreamInfo>, make: F) -> ResourceCollection<H>
    where
        H: super::Streamable,
        F: Fn(StreamHandle, Option<String>) -> H,
    {
        let handles = infos
            .into_iter()
            .map(|info| make(StreamHandle::new(self.inner.clone(), info.id), info.label))
            .collect();
        ResourceCollection::new(handles)
    }
}

impl std::fmt::Debug for UserService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserService").finish_non_exhaustive()
    }
}
