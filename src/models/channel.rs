//! Channel-related models

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{ModelError, RecordId};

/// Channel entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub id: RecordId,
    pub workspace_id: RecordId,
    /// Unique within the workspace.
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_private: bool,
    #[serde(default)]
    pub members: BTreeSet<Uuid>,
}

impl Channel {
    pub fn is_member(&self, user: Uuid) -> bool {
        self.members.contains(&user)
    }
}

/// Normalize a user-entered channel name: trimmed, lowercased, spaces to dashes.
pub fn normalize_channel_name(raw: &str) -> Result<String, ModelError> {
    let trimmed = raw.trim().trim_start_matches('#').trim();
    if trimmed.is_empty() {
        return Err(ModelError::EmptyChannelName);
    }
    Ok(trimmed.to_lowercase().replace(' ', "-"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_channel_name() {
        assert_eq!(normalize_channel_name("  Random Stuff ").unwrap(), "random-stuff");
        assert_eq!(normalize_channel_name("#General").unwrap(), "general");
        assert_eq!(
            normalize_channel_name("   "),
            Err(ModelError::EmptyChannelName)
        );
    }
}
