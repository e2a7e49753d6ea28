//! Message-related models

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{ModelError, RecordId};

/// Unordered pair of users in a direct-message thread.
///
/// Stored sorted so that `(a, b)` and `(b, a)` name the same thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DmPair {
    low: Uuid,
    high: Uuid,
}

impl DmPair {
    pub fn new(a: Uuid, b: Uuid) -> Self {
        if a <= b {
            Self { low: a, high: b }
        } else {
            Self { low: b, high: a }
        }
    }

    pub fn users(&self) -> (Uuid, Uuid) {
        (self.low, self.high)
    }

    pub fn contains(&self, user: Uuid) -> bool {
        self.low == user || self.high == user
    }

    /// The participant that is not `me`. For a self-DM this is `me`.
    pub fn other(&self, me: Uuid) -> Uuid {
        if self.low == me {
            self.high
        } else {
            self.low
        }
    }
}

/// Where a message was posted: a channel, or a direct-message thread.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Target {
    Channel(RecordId),
    Direct(DmPair),
}

impl Target {
    /// Build a target from the nullable `channel_id` / `recipient_id` columns.
    ///
    /// Exactly one must be set.
    pub fn from_columns(
        id: &RecordId,
        author: Uuid,
        channel_id: Option<RecordId>,
        recipient_id: Option<Uuid>,
    ) -> Result<Self, ModelError> {
        match (channel_id, recipient_id) {
            (Some(channel), None) => Ok(Target::Channel(channel)),
            (None, Some(recipient)) => Ok(Target::Direct(DmPair::new(author, recipient))),
            (Some(_), Some(_)) => Err(ModelError::AmbiguousTarget { id: id.clone() }),
            (None, None) => Err(ModelError::MissingTarget { id: id.clone() }),
        }
    }

    pub fn direct(a: Uuid, b: Uuid) -> Self {
        Target::Direct(DmPair::new(a, b))
    }

    pub fn channel_id(&self) -> Option<&RecordId> {
        match self {
            Target::Channel(id) => Some(id),
            Target::Direct(_) => None,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Channel(id) => write!(f, "channel {}", id),
            Target::Direct(pair) => write!(f, "dm {}:{}", pair.low, pair.high),
        }
    }
}

/// Users who reacted with one emoji, in the order they reacted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionGroup {
    pub emoji: String,
    pub user_ids: Vec<Uuid>,
}

/// Reactions on a message, grouped by emoji in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reactions {
    groups: Vec<ReactionGroup>,
}

impl Reactions {
    /// Record `user` reacting with `emoji`. Returns false if already present.
    pub fn insert(&mut self, emoji: &str, user: Uuid) -> bool {
        match self.groups.iter_mut().find(|g| g.emoji == emoji) {
            Some(group) => {
                if group.user_ids.contains(&user) {
                    return false;
                }
                group.user_ids.push(user);
            }
            None => self.groups.push(ReactionGroup {
                emoji: emoji.to_string(),
                user_ids: vec![user],
            }),
        }
        true
    }

    /// Remove `user`'s `emoji` reaction. Empty groups are dropped.
    pub fn remove(&mut self, emoji: &str, user: Uuid) -> bool {
        let Some(pos) = self.groups.iter().position(|g| g.emoji == emoji) else {
            return false;
        };
        let group = &mut self.groups[pos];
        let before = group.user_ids.len();
        group.user_ids.retain(|u| *u != user);
        let removed = group.user_ids.len() != before;
        if group.user_ids.is_empty() {
            self.groups.remove(pos);
        }
        removed
    }

    pub fn has_reacted(&self, emoji: &str, user: Uuid) -> bool {
        self.groups
            .iter()
            .any(|g| g.emoji == emoji && g.user_ids.contains(&user))
    }

    pub fn groups(&self) -> &[ReactionGroup] {
        &self.groups
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Position of a message in its conversation's total order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Cursor {
    pub created_at: DateTime<Utc>,
    pub id: RecordId,
}

/// Chat message
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub id: RecordId,
    pub author_id: Uuid,
    /// Resolved display name; `None` when the profile lookup found nothing.
    pub author_name: Option<String>,
    pub target: Target,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub reactions: Reactions,
}

impl Message {
    pub fn cursor(&self) -> Cursor {
        Cursor {
            created_at: self.created_at,
            id: self.id.clone(),
        }
    }

    pub fn author_label(&self) -> &str {
        self.author_name.as_deref().unwrap_or("Unknown User")
    }
}

/// Conversation order: creation time, then identifier ascending.
pub fn chronological(a: &Message, b: &Message) -> Ordering {
    a.created_at
        .cmp(&b.created_at)
        .then_with(|| a.id.cmp(&b.id))
}

pub fn sort_chronological(messages: &mut [Message]) {
    messages.sort_by(chronological);
}

pub fn is_chronological(messages: &[Message]) -> bool {
    messages
        .windows(2)
        .all(|w| chronological(&w[0], &w[1]) != Ordering::Greater)
}

/// Human-friendly age of a timestamp relative to `now`.
///
/// Anything older than a day (or in the future) gets an absolute date.
pub fn format_message_time(created_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let diff = now.signed_duration_since(created_at);
    if diff.num_seconds() < 0 || diff.num_days() > 0 {
        return created_at.format("%m/%d/%Y %I:%M %p").to_string();
    }
    let secs = diff.num_seconds();
    if secs > 3600 {
        format!("{}h ago", secs / 3600)
    } else if secs > 60 {
        format!("{}m ago", secs / 60)
    } else {
        "just now".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn msg(id: i64, secs: i64) -> Message {
        Message {
            id: RecordId::Int(id),
            author_id: Uuid::nil(),
            author_name: None,
            target: Target::Channel(RecordId::Int(1)),
            body: format!("m{}", id),
            created_at: Utc.timestamp_opt(secs, 0).unwrap(),
            reactions: Reactions::default(),
        }
    }

    #[test]
    fn test_target_requires_exactly_one_column() {
        let id = RecordId::Int(1);
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        assert_eq!(
            Target::from_columns(&id, a, Some(RecordId::Int(3)), None).unwrap(),
            Target::Channel(RecordId::Int(3))
        );
        assert_eq!(
            Target::from_columns(&id, a, None, Some(b)).unwrap(),
            Target::direct(b, a)
        );
        assert_eq!(
            Target::from_columns(&id, a, Some(RecordId::Int(3)), Some(b)),
            Err(ModelError::AmbiguousTarget { id: id.clone() })
        );
        assert_eq!(
            Target::from_columns(&id, a, None, None),
            Err(ModelError::MissingTarget { id })
        );
    }

    #[test]
    fn test_dm_pair_is_unordered() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert_eq!(DmPair::new(a, b), DmPair::new(b, a));
        assert_eq!(DmPair::new(a, b).other(a), b);
        assert_eq!(DmPair::new(a, b).other(b), a);
        assert!(DmPair::new(a, b).contains(b));
    }

    #[test]
    fn test_sort_breaks_ties_by_id() {
        let mut msgs = vec![msg(3, 10), msg(1, 20), msg(2, 10)];
        sort_chronological(&mut msgs);
        let ids: Vec<_> = msgs.iter().map(|m| m.id.clone()).collect();
        assert_eq!(
            ids,
            vec![RecordId::Int(2), RecordId::Int(3), RecordId::Int(1)]
        );
        assert!(is_chronological(&msgs));
        msgs.swap(0, 1);
        assert!(!is_chronological(&msgs));
    }

    #[test]
    fn test_reactions_group_in_first_seen_order() {
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let mut r = Reactions::default();

        assert!(r.insert("👍", alice));
        assert!(r.insert("❤️", bob));
        assert!(r.insert("👍", bob));
        assert!(!r.insert("👍", alice));

        assert_eq!(r.groups()[0].emoji, "👍");
        assert_eq!(r.groups()[0].user_ids, vec![alice, bob]);
        assert!(r.has_reacted("❤️", bob));

        assert!(r.remove("❤️", bob));
        assert!(!r.remove("❤️", bob));
        assert_eq!(r.groups().len(), 1);
    }

    #[test]
    fn test_format_message_time() {
        let now = Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap();
        assert_eq!(format_message_time(now, now), "just now");
        assert_eq!(
            format_message_time(now - chrono::Duration::minutes(5), now),
            "5m ago"
        );
        assert_eq!(
            format_message_time(now - chrono::Duration::hours(3), now),
            "3h ago"
        );
        assert_eq!(
            format_message_time(now - chrono::Duration::days(2), now),
            "01/13/2024 12:00 PM"
        );
    }
}
