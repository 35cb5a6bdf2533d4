//! User profile model.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The authenticated user's profile, as returned by `GET /v3/profile`.
///
/// Only the fields the client relies on are typed; everything else is kept
/// in [`Profile::extra`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    /// User id, used to build `user/{id}/...` stream ids
    pub id: String,
    /// Email address
    #[serde(default)]
    pub email: Option<String>,
    /// Display name
    #[serde(default)]
    pub full_name: Option<String>,
    /// Team name, present for enterprise users
    #[serde(default)]
    pub enterprise_name: Option<String>,
    /// Remaining profile fields, untouched
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Profile {
    /// `true` if the user belongs to a team.
    pub fn is_enterprise(&self) -> bool {
        self.enterprise_name.is_some()
    }
}
