//! Polling synchronization of the active conversation.
//!
//! `SyncLoop` holds the conversation cursor and the identifier sequence of
//! the last list handed to the renderer. Each `poll()` re-fetches the whole
//! conversation and reports whether the display needs replacing. The timer
//! that drives it lives in `runner`.

pub mod runner;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::models::{is_chronological, sort_chronological, Cursor, Message, RecordId, Target};
use crate::store::{RemoteStore, StoreError};

pub use runner::{spawn, SyncEvent, SyncHandle};

/// Default refresh period.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Loop state: paused, or armed on one conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    Polling(Target),
}

/// Why polling stopped on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PauseReason {
    /// Session expired or access denied; the user must sign in again.
    Unauthorized,
    /// The conversation disappeared; the UI should pick another one.
    TargetGone(Target),
}

/// Result of one poll.
#[derive(Debug, Clone)]
pub enum PollOutcome {
    /// No active conversation; nothing fetched.
    Idle,
    /// Fetched list has the same identifier sequence as what is displayed.
    Unchanged,
    /// Replace the display with this list.
    Updated(Arc<[Message]>),
    /// Fetch failed; display kept, retried next tick.
    Skipped(StoreError),
    /// Fetch failed in a way that moved the loop to `Idle`.
    Paused(PauseReason),
}

/// Sync loop core, independent of any timer.
pub struct SyncLoop<S> {
    store: Arc<S>,
    state: SyncState,
    /// Identifier sequence of the list last reported as `Updated`.
    displayed: Option<Vec<RecordId>>,
    last_seen: HashMap<Target, Cursor>,
}

impl<S: RemoteStore> SyncLoop<S> {
    /// Build a loop, already polling `target` if one is given.
    pub fn new(store: Arc<S>, target: Option<Target>) -> Self {
        let state = match target {
            Some(t) => SyncState::Polling(t),
            None => SyncState::Idle,
        };
        Self {
            store,
            state,
            displayed: None,
            last_seen: HashMap::new(),
        }
    }

    pub fn target(&self) -> Option<&Target> {
        match &self.state {
            SyncState::Polling(t) => Some(t),
            SyncState::Idle => None,
        }
    }

    pub fn is_polling(&self) -> bool {
        matches!(self.state, SyncState::Polling(_))
    }

    /// Switch to `target`. The next successful poll always reports `Updated`.
    pub fn select(&mut self, target: Target) {
        tracing::debug!("Sync target -> {}", target);
        self.state = SyncState::Polling(target);
        self.displayed = None;
    }

    /// Navigate away / sign out.
    pub fn stop(&mut self) {
        if self.is_polling() {
            tracing::debug!("Sync loop idle");
        }
        self.state = SyncState::Idle;
        self.displayed = None;
    }

    /// Newest message seen so far in `target`, if any.
    pub fn last_seen(&self, target: &Target) -> Option<&Cursor> {
        self.last_seen.get(target)
    }

    /// Fetch the active conversation and decide whether to re-render.
    pub async fn poll(&mut self) -> PollOutcome {
        self.fetch(false).await
    }

    /// Like `poll`, but report `Updated` even if the identifiers match.
    pub async fn refresh(&mut self) -> PollOutcome {
        self.fetch(true).await
    }

    async fn fetch(&mut self, force: bool) -> PollOutcome {
        let Some(target) = self.target().cloned() else {
            return PollOutcome::Idle;
        };

        let mut messages = match self.store.list_messages(&target).await {
            Ok(m) => m,
            Err(StoreError::Unauthorized(reason)) => {
                tracing::warn!("Polling {} unauthorized: {}", target, reason);
                self.stop();
                return PollOutcome::Paused(PauseReason::Unauthorized);
            }
            Err(StoreError::NotFound(reason)) => {
                tracing::warn!("Polling {} target gone: {}", target, reason);
                self.stop();
                return PollOutcome::Paused(PauseReason::TargetGone(target));
            }
            Err(e) => return PollOutcome::Skipped(e),
        };

        if !is_chronological(&messages) {
            tracing::debug!("Store returned {} out of order; sorting", target);
            sort_chronological(&mut messages);
        }

        self.advance_last_seen(&target, &messages);

        let ids: Vec<RecordId> = messages.iter().map(|m| m.id.clone()).collect();
        if !force && self.displayed.as_ref() == Some(&ids) {
            return PollOutcome::Unchanged;
        }

        tracing::debug!("{} now has {} messages", target, ids.len());
        self.displayed = Some(ids);
        PollOutcome::Updated(messages.into())
    }

    fn advance_last_seen(&mut self, target: &Target, messages: &[Message]) {
        let Some(newest) = messages.last().map(Message::cursor) else {
            return;
        };
        match self.last_seen.get_mut(target) {
            Some(seen) if *seen >= newest => {}
            Some(seen) => *seen = newest,
            None => {
                self.last_seen.insert(target.clone(), newest);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Channel, UserProfile};
    use crate::store::{MemoryStore, StoreResult};
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    fn setup() -> (Arc<MemoryStore>, Target, Uuid) {
        let me = UserProfile {
            id: Uuid::new_v4(),
            username: "me".to_string(),
            display_name: None,
            avatar_url: None,
            status: None,
        };
        let me_id = me.id;
        let store = Arc::new(MemoryStore::new(me));
        let ch = store.add_channel("c", &[me_id]);
        let target = Target::Channel(ch);
        store.insert_message(target.clone(), me_id, "m1", Utc.timestamp_opt(1, 0).unwrap());
        store.insert_message(target.clone(), me_id, "m2", Utc.timestamp_opt(2, 0).unwrap());
        (store, target, me_id)
    }

    /// Store that returns a fixed list exactly as given, in any order.
    struct Unordered(Vec<Message>);

    impl RemoteStore for Unordered {
        fn current_user(&self) -> Uuid {
            Uuid::nil()
        }

        async fn list_messages(&self, _: &Target) -> StoreResult<Vec<Message>> {
            Ok(self.0.clone())
        }

        async fn send_message(&self, _: &Target, _: &str) -> StoreResult<Message> {
            Err(StoreError::Rejected {
                status: 405,
                message: "read-only".into(),
            })
        }

        async fn list_channels(&self, _: &RecordId) -> StoreResult<Vec<Channel>> {
            Ok(Vec::new())
        }

        async fn list_users(&self) -> StoreResult<Vec<UserProfile>> {
            Ok(Vec::new())
        }

        async fn add_reaction(&self, _: &RecordId, _: &str, _: Uuid) -> StoreResult<()> {
            Ok(())
        }

        async fn remove_reaction(&self, _: &RecordId, _: &str, _: Uuid) -> StoreResult<()> {
            Ok(())
        }
    }

    fn message_at(id: i64, target: &Target, secs: i64) -> Message {
        Message {
            id: RecordId::Int(id),
            author_id: Uuid::nil(),
            author_name: None,
            target: target.clone(),
            body: format!("m{}", id),
            created_at: Utc.timestamp_opt(secs, 0).unwrap(),
            reactions: Default::default(),
        }
    }

    fn bodies(list: &[Message]) -> Vec<&str> {
        list.iter().map(|m| m.body.as_str()).collect()
    }

    #[tokio::test]
    async fn test_idle_loop_fetches_nothing() {
        let (store, _, _) = setup();
        let mut sync = SyncLoop::new(store, None);
        assert!(matches!(sync.poll().await, PollOutcome::Idle));
        assert!(!sync.is_polling());
    }

    #[tokio::test]
    async fn test_unchanged_poll_signals_no_rerender() {
        let (store, target, _) = setup();
        let mut sync = SyncLoop::new(store, Some(target));

        match sync.poll().await {
            PollOutcome::Updated(list) => assert_eq!(bodies(&list), vec!["m1", "m2"]),
            other => panic!("expected Updated, got {:?}", other),
        }
        assert!(matches!(sync.poll().await, PollOutcome::Unchanged));
        assert!(matches!(sync.poll().await, PollOutcome::Unchanged));
    }

    #[tokio::test]
    async fn test_sent_message_appears_on_next_poll() {
        let (store, target, _) = setup();
        let mut sync = SyncLoop::new(Arc::clone(&store), Some(target.clone()));
        sync.poll().await;

        store.send_message(&target, "m3").await.unwrap();
        match sync.poll().await {
            PollOutcome::Updated(list) => assert_eq!(bodies(&list), vec!["m1", "m2", "m3"]),
            other => panic!("expected Updated, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_network_failure_skips_tick() {
        let (store, target, _) = setup();
        let mut sync = SyncLoop::new(Arc::clone(&store), Some(target.clone()));
        sync.poll().await;

        store.fail_next(StoreError::NetworkUnavailable("offline".into()));
        assert!(matches!(
            sync.poll().await,
            PollOutcome::Skipped(StoreError::NetworkUnavailable(_))
        ));
        assert_eq!(sync.target(), Some(&target));
        // Display untouched, so the recovered poll has nothing new to show.
        assert!(matches!(sync.poll().await, PollOutcome::Unchanged));
    }

    #[tokio::test]
    async fn test_expired_session_pauses() {
        let (store, target, _) = setup();
        let mut sync = SyncLoop::new(Arc::clone(&store), Some(target));
        sync.poll().await;

        store.expire_session();
        assert!(matches!(
            sync.poll().await,
            PollOutcome::Paused(PauseReason::Unauthorized)
        ));
        assert!(!sync.is_polling());
        assert!(matches!(sync.poll().await, PollOutcome::Idle));
    }

    #[tokio::test]
    async fn test_deleted_channel_pauses_with_target() {
        let (store, target, _) = setup();
        let mut sync = SyncLoop::new(Arc::clone(&store), Some(target.clone()));
        if let Some(id) = target.channel_id() {
            store.remove_channel(id);
        }
        match sync.poll().await {
            PollOutcome::Paused(PauseReason::TargetGone(t)) => assert_eq!(t, target),
            other => panic!("expected TargetGone, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_select_forces_fresh_render() {
        let (store, target, me) = setup();
        let mut sync = SyncLoop::new(Arc::clone(&store), Some(target.clone()));
        sync.poll().await;

        let dm = Target::direct(me, Uuid::new_v4());
        sync.select(dm);
        assert!(matches!(sync.poll().await, PollOutcome::Updated(_)));

        sync.select(target);
        assert!(matches!(sync.poll().await, PollOutcome::Updated(_)));
    }

    #[tokio::test]
    async fn test_refresh_reports_reaction_change() {
        let (store, target, me) = setup();
        let mut sync = SyncLoop::new(Arc::clone(&store), Some(target.clone()));
        let first = match sync.poll().await {
            PollOutcome::Updated(list) => list[0].id.clone(),
            other => panic!("expected Updated, got {:?}", other),
        };

        store.add_reaction(&first, "👍", me).await.unwrap();
        assert!(matches!(sync.poll().await, PollOutcome::Unchanged));
        match sync.refresh().await {
            PollOutcome::Updated(list) => assert!(list[0].reactions.has_reacted("👍", me)),
            other => panic!("expected Updated, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_out_of_order_rows_are_sorted() {
        let target = Target::Channel(RecordId::Int(1));
        let store = Unordered(vec![
            message_at(10, &target, 5),
            message_at(2, &target, 2),
            message_at(1, &target, 1),
            message_at(3, &target, 5),
        ]);
        let mut sync = SyncLoop::new(Arc::new(store), Some(target.clone()));

        match sync.poll().await {
            // Equal timestamps fall back to numeric id order.
            PollOutcome::Updated(list) => {
                assert_eq!(bodies(&list), vec!["m1", "m2", "m3", "m10"])
            }
            other => panic!("expected Updated, got {:?}", other),
        }
        assert_eq!(
            sync.last_seen(&target).map(|c| c.id.clone()),
            Some(RecordId::Int(10))
        );
        // Same rows in the same scrambled order compare equal after sorting.
        assert!(matches!(sync.poll().await, PollOutcome::Unchanged));
    }

    #[tokio::test]
    async fn test_last_seen_is_monotonic() {
        let (store, target, me) = setup();
        let mut sync = SyncLoop::new(Arc::clone(&store), Some(target.clone()));
        sync.poll().await;
        let seen = sync.last_seen(&target).cloned().unwrap();
        assert_eq!(seen.created_at, Utc.timestamp_opt(2, 0).unwrap());

        // A backdated insert must not move the marker backwards.
        store.insert_message(target.clone(), me, "old", Utc.timestamp_opt(0, 0).unwrap());
        sync.poll().await;
        assert_eq!(sync.last_seen(&target), Some(&seen));
    }
}
