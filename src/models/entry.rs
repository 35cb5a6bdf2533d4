//! Entry (article) and stream listing models.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::primitives::{EntryId, StreamId, StreamSource};

/// A stream entry as returned by `GET /v3/streams/contents`.
///
/// Entry bodies are large and vary by source; the client types the id and
/// title and leaves the rest as JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entry {
    /// Entry id
    pub id: EntryId,
    /// Title, if the source provides one
    #[serde(default)]
    pub title: Option<String>,
    /// All other fields
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Entry {
    /// Look up an untyped field.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Publication time in milliseconds since the epoch.
    pub fn published(&self) -> Option<i64> {
        self.fields.get("published").and_then(Value::as_i64)
    }

    /// Ids of the tags already applied to this entry.
    pub fn tag_ids(&self) -> Vec<StreamId> {
        self.fields
            .get("tags")
            .and_then(Value::as_array)
            .map(|tags| {
                tags.iter()
                    .filter_map(|t| t.get("id").and_then(Value::as_str))
                    .map(StreamId::from)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The tags applied to this entry, with who applied them when known.
    pub fn tags(&self) -> Vec<EntryTag> {
        self.array_field("tags")
    }

    /// Annotations (highlights and comments) left on this entry.
    pub fn annotations(&self) -> Vec<Annotation> {
        self.array_field("annotations")
    }

    fn array_field<T: serde::de::DeserializeOwned>(&self, name: &str) -> Vec<T> {
        self.fields
            .get(name)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| serde_json::from_value(item.clone()).ok())
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// A tag as embedded in an entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryTag {
    /// Tag stream id
    pub id: StreamId,
    /// Tag name; empty for system tags
    #[serde(default)]
    pub label: Option<String>,
    /// User who applied an enterprise tag
    #[serde(default)]
    pub added_by: Option<String>,
}

impl EntryTag {
    /// The user who applied this tag: `addedBy` for team tags, the owner
    /// segment for personal ones.
    pub fn tagged_by(&self) -> Option<&str> {
        match self.id.source() {
            StreamSource::Enterprise => self.added_by.as_deref(),
            _ => self.id.source_id(),
        }
    }
}

/// An annotation on an entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Annotation {
    /// Annotation id
    pub id: String,
    /// User id of the author
    #[serde(default)]
    pub author: Option<String>,
    /// Comment text
    #[serde(default)]
    pub comment: Option<String>,
}

/// A team tag to create with
/// [`UserService::create_enterprise_tag`](crate::api::UserService::create_enterprise_tag).
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEnterpriseTag {
    /// Tag name
    pub label: String,
    /// Optional description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Any other settings, such as `emailSettings` or `permissions`
    #[serde(flatten)]
    pub settings: Map<String, Value>,
}

impl NewEnterpriseTag {
    /// A tag with only a label.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Default::default()
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set an extra setting by its API name.
    pub fn with_setting(mut self, name: impl Into<String>, value: Value) -> Self {
        self.settings.insert(name.into(), value);
        self
    }
}

/// A category or tag as listed by `/v3/categories`, `/v3/tags` and their
/// enterprise counterparts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamInfo {
    /// Full stream id
    pub id: StreamId,
    /// Human-readable name
    #[serde(default)]
    pub label: Option<String>,
    /// Optional description
    #[serde(default)]
    pub description: Option<String>,
}
