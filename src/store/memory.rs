//! In-process store used by `demo` mode and as the test double.
//!
//! Applies the same visibility rules the backend's row-level policies do:
//! channel messages are readable by members only, DMs by their two parties.

use std::collections::{BTreeSet, VecDeque};
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use super::{RemoteStore, StoreError, StoreResult};
use crate::models::{
    sort_chronological, Channel, Message, RecordId, Reactions, Target, UserProfile,
};

/// Workspace every demo channel lives in.
pub const DEMO_WORKSPACE: i64 = 1;

#[derive(Default)]
struct Inner {
    profiles: Vec<UserProfile>,
    channels: Vec<Channel>,
    messages: Vec<Message>,
    next_id: i64,
    /// Errors returned by the next calls, one per call, before any real work.
    scripted_failures: VecDeque<StoreError>,
    session_expired: bool,
}

impl Inner {
    fn next_id(&mut self) -> RecordId {
        self.next_id += 1;
        RecordId::Int(self.next_id)
    }

    fn check(&mut self) -> StoreResult<()> {
        if let Some(err) = self.scripted_failures.pop_front() {
            return Err(err);
        }
        if self.session_expired {
            return Err(StoreError::Unauthorized("JWT expired".to_string()));
        }
        Ok(())
    }

    fn name_of(&self, user: Uuid) -> Option<String> {
        self.profiles
            .iter()
            .find(|p| p.id == user)
            .map(|p| p.label().to_string())
    }

    fn can_read(&self, me: Uuid, target: &Target) -> StoreResult<()> {
        match target {
            Target::Channel(id) => {
                let channel = self
                    .channels
                    .iter()
                    .find(|c| &c.id == id)
                    .ok_or_else(|| StoreError::NotFound(format!("channel {}", id)))?;
                if channel.is_private && !channel.is_member(me) {
                    return Err(StoreError::Unauthorized(format!(
                        "not a member of #{}",
                        channel.name
                    )));
                }
                Ok(())
            }
            Target::Direct(pair) if pair.contains(me) => Ok(()),
            Target::Direct(_) => Err(StoreError::Unauthorized(
                "direct message between other users".to_string(),
            )),
        }
    }
}

/// Shared in-memory conversation store.
pub struct MemoryStore {
    me: Uuid,
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new(me: UserProfile) -> Self {
        let id = me.id;
        let inner = Inner {
            profiles: vec![me],
            ..Inner::default()
        };
        Self {
            me: id,
            inner: Mutex::new(inner),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn add_profile(&self, profile: UserProfile) {
        self.lock().profiles.push(profile);
    }

    /// Create a public channel in the demo workspace with the given members.
    pub fn add_channel(&self, name: &str, members: &[Uuid]) -> RecordId {
        let mut inner = self.lock();
        let id = inner.next_id();
        inner.channels.push(Channel {
            id: id.clone(),
            workspace_id: RecordId::Int(DEMO_WORKSPACE),
            name: name.to_string(),
            description: None,
            is_private: false,
            members: members.iter().copied().collect::<BTreeSet<_>>(),
        });
        id
    }

    #[cfg(test)]
    pub fn remove_channel(&self, id: &RecordId) {
        let mut inner = self.lock();
        inner.channels.retain(|c| &c.id != id);
        inner.messages.retain(|m| m.target.channel_id() != Some(id));
    }

    /// Insert a message authored by anyone, bypassing access checks.
    pub fn insert_message(
        &self,
        target: Target,
        author: Uuid,
        body: &str,
        created_at: DateTime<Utc>,
    ) -> RecordId {
        let mut inner = self.lock();
        let id = inner.next_id();
        let author_name = inner.name_of(author);
        inner.messages.push(Message {
            id: id.clone(),
            author_id: author,
            author_name,
            target,
            body: body.to_string(),
            created_at,
            reactions: Reactions::default(),
        });
        id
    }

    /// Make the next call fail with `err`. Calls queue in order.
    #[cfg(test)]
    pub fn fail_next(&self, err: StoreError) {
        self.lock().scripted_failures.push_back(err);
    }

    /// Every subsequent call fails with `Unauthorized` until `renew_session`.
    #[cfg(test)]
    pub fn expire_session(&self) {
        self.lock().session_expired = true;
    }

    #[cfg(test)]
    pub fn renew_session(&self) {
        self.lock().session_expired = false;
    }

    /// Seeded store for offline demos: a `#general` channel, a `#random`
    /// channel, and a DM thread with two demo users.
    pub fn demo() -> Self {
        let me = UserProfile {
            id: Uuid::new_v4(),
            username: "you".to_string(),
            display_name: Some("You".to_string()),
            avatar_url: None,
            status: Some("online".to_string()),
        };
        let alex = UserProfile {
            id: Uuid::new_v4(),
            username: "alex".to_string(),
            display_name: Some("Alex Johnson".to_string()),
            avatar_url: None,
            status: Some("online".to_string()),
        };
        let sarah = UserProfile {
            id: Uuid::new_v4(),
            username: "sarah".to_string(),
            display_name: Some("Sarah Chen".to_string()),
            avatar_url: None,
            status: Some("online".to_string()),
        };
        let (me_id, alex_id, sarah_id) = (me.id, alex.id, sarah.id);

        let store = Self::new(me);
        store.add_profile(alex);
        store.add_profile(sarah);

        let now = Utc::now();
        let general = store.add_channel("general", &[me_id, alex_id, sarah_id]);
        store.add_channel("random", &[me_id, sarah_id]);

        store.insert_message(
            Target::Channel(general.clone()),
            sarah_id,
            "Morning all! Standup notes are in the doc.",
            now - Duration::minutes(42),
        );
        let first = store.insert_message(
            Target::Channel(general),
            alex_id,
            "Thanks Sarah. Deploy is scheduled for 3pm.",
            now - Duration::minutes(17),
        );
        {
            let mut inner = store.lock();
            if let Some(m) = inner.messages.iter_mut().find(|m| m.id == first) {
                m.reactions.insert("👍", sarah_id);
            }
        }

        store.insert_message(
            Target::direct(me_id, alex_id),
            alex_id,
            "Hey! Welcome to the Slack clone! 👋",
            now - Duration::hours(2),
        );
        store.insert_message(
            Target::direct(me_id, alex_id),
            alex_id,
            "This is a demo conversation to show how messaging works. Try sending me a message!",
            now - Duration::hours(2) + Duration::minutes(1),
        );

        store
    }
}

impl RemoteStore for MemoryStore {
    fn current_user(&self) -> Uuid {
        self.me
    }

    async fn list_messages(&self, target: &Target) -> StoreResult<Vec<Message>> {
        let mut inner = self.lock();
        inner.check()?;
        inner.can_read(self.me, target)?;
        let mut out: Vec<Message> = inner
            .messages
            .iter()
            .filter(|m| &m.target == target)
            .cloned()
            .collect();
        sort_chronological(&mut out);
        Ok(out)
    }

    async fn send_message(&self, target: &Target, body: &str) -> StoreResult<Message> {
        {
            let mut inner = self.lock();
            inner.check()?;
            inner.can_read(self.me, target)?;
        }
        let body = body.trim();
        let id = self.insert_message(target.clone(), self.me, body, Utc::now());
        let inner = self.lock();
        inner
            .messages
            .iter()
            .find(|m| m.id == id)
            .cloned()
            .ok_or_else(|| StoreError::Decode("inserted message vanished".to_string()))
    }

    async fn list_channels(&self, workspace: &RecordId) -> StoreResult<Vec<Channel>> {
        let mut inner = self.lock();
        inner.check()?;
        Ok(inner
            .channels
            .iter()
            .filter(|c| &c.workspace_id == workspace && c.is_member(self.me))
            .cloned()
            .collect())
    }

    async fn list_users(&self) -> StoreResult<Vec<UserProfile>> {
        let mut inner = self.lock();
        inner.check()?;
        Ok(inner
            .profiles
            .iter()
            .filter(|p| p.id != self.me)
            .cloned()
            .collect())
    }

    async fn add_reaction(&self, message_id: &RecordId, emoji: &str, user: Uuid) -> StoreResult<()> {
        let mut inner = self.lock();
        inner.check()?;
        let msg = inner
            .messages
            .iter_mut()
            .find(|m| &m.id == message_id)
            .ok_or_else(|| StoreError::NotFound(format!("message {}", message_id)))?;
        // Duplicate reactions hit the unique constraint upstream; treat as done.
        msg.reactions.insert(emoji, user);
        Ok(())
    }

    async fn remove_reaction(
        &self,
        message_id: &RecordId,
        emoji: &str,
        user: Uuid,
    ) -> StoreResult<()> {
        let mut inner = self.lock();
        inner.check()?;
        if let Some(msg) = inner.messages.iter_mut().find(|m| &m.id == message_id) {
            msg.reactions.remove(emoji, user);
        }
        Ok(())
    }
}
