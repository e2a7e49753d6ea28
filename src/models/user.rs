//! User-related models

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Row of the `user_profiles` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub username: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

impl UserProfile {
    /// Display name, falling back to the username.
    pub fn label(&self) -> &str {
        match self.display_name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => &self.username,
        }
    }

    /// Whether `query` names this user (username, display name, or id).
    pub fn matches(&self, query: &str) -> bool {
        let q = query.trim_start_matches('@');
        self.username.eq_ignore_ascii_case(q)
            || self
                .display_name
                .as_deref()
                .is_some_and(|d| d.eq_ignore_ascii_case(q))
            || self.id.to_string() == q
    }
}
