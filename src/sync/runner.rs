//! Timer task driving a `SyncLoop`.
//!
//! Uses an mpsc channel pair like the UI backend does: the UI sends
//! `SyncCommand` values, and the task sends `SyncEvent` values back. The
//! task is the only writer of the display state, and each event carries a
//! complete immutable list, so the renderer never sees a half-replaced one.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{self, MissedTickBehavior};

use super::{PauseReason, PollOutcome, SyncLoop};
use crate::models::{Cursor, Message, Target};
use crate::store::RemoteStore;

/// Commands sent from the UI to the sync task.
#[derive(Debug)]
pub enum SyncCommand {
    /// Start (or switch) polling this conversation.
    Select(Target),
    /// Pause polling.
    Stop,
    /// Poll now and re-emit even if nothing was added.
    Refresh,
}

/// Notifications from the sync task to the UI.
#[derive(Debug, Clone)]
pub enum SyncEvent {
    /// Replace the displayed list for `target`.
    Messages {
        target: Target,
        messages: Arc<[Message]>,
        /// Newest message of `target` seen by earlier polls. Everything in
        /// `messages` after it is new.
        seen_before: Option<Cursor>,
    },
    /// Session is no longer valid; polling is paused.
    Unauthorized,
    /// The conversation no longer exists; polling is paused.
    TargetGone(Target),
}

/// UI-side handle to a running sync task.
///
/// Dropping the handle closes the command channel, which ends the task.
pub struct SyncHandle {
    cmd_tx: mpsc::UnboundedSender<SyncCommand>,
    event_rx: mpsc::UnboundedReceiver<SyncEvent>,
}

impl SyncHandle {
    fn send(&self, cmd: SyncCommand) {
        if self.cmd_tx.send(cmd).is_err() {
            tracing::error!("Sync task gone -- command dropped");
        }
    }

    pub fn select(&self, target: Target) {
        self.send(SyncCommand::Select(target));
    }

    pub fn stop(&self) {
        self.send(SyncCommand::Stop);
    }

    pub fn refresh(&self) {
        self.send(SyncCommand::Refresh);
    }

    /// Next event. `None` once the task has exited.
    ///
    /// Designed to be used inside `tokio::select!`.
    pub async fn recv(&mut self) -> Option<SyncEvent> {
        self.event_rx.recv().await
    }
}

/// Start polling on a background task.
///
/// If `sync` already has a target the first poll runs immediately.
pub fn spawn<S: RemoteStore>(sync: SyncLoop<S>, period: Duration) -> SyncHandle {
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let (event_tx, event_rx) = mpsc::unbounded_channel();

    tokio::spawn(run(sync, period, cmd_rx, event_tx));

    SyncHandle { cmd_tx, event_rx }
}

async fn run<S: RemoteStore>(
    mut sync: SyncLoop<S>,
    period: Duration,
    mut cmd_rx: mpsc::UnboundedReceiver<SyncCommand>,
    event_tx: mpsc::UnboundedSender<SyncEvent>,
) {
    let mut ticker = time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        let seen_before = sync.target().and_then(|t| sync.last_seen(t)).cloned();
        let outcome = tokio::select! {
            cmd = cmd_rx.recv() => match cmd {
                Some(SyncCommand::Select(target)) => {
                    sync.select(target);
                    ticker.reset_immediately();
                    continue;
                }
                Some(SyncCommand::Stop) => {
                    sync.stop();
                    continue;
                }
                Some(SyncCommand::Refresh) => sync.refresh().await,
                None => break,
            },
            _ = ticker.tick(), if sync.is_polling() => sync.poll().await,
        };

        let target = sync.target().cloned();
        let event = match outcome {
            PollOutcome::Updated(messages) => match target {
                Some(target) => SyncEvent::Messages {
                    target,
                    messages,
                    seen_before,
                },
                None => continue,
            },
            PollOutcome::Paused(PauseReason::Unauthorized) => SyncEvent::Unauthorized,
            PollOutcome::Paused(PauseReason::TargetGone(t)) => SyncEvent::TargetGone(t),
            PollOutcome::Skipped(e) => {
                tracing::debug!("Poll skipped, retrying next tick: {}", e);
                continue;
            }
            PollOutcome::Idle | PollOutcome::Unchanged => continue,
        };

        if event_tx.send(event).is_err() {
            break;
        }
    }

    tracing::debug!("Sync task exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserProfile;
    use crate::store::{MemoryStore, StoreError};
    use chrono::Utc;
    use uuid::Uuid;

    const PERIOD: Duration = Duration::from_secs(5);

    fn setup() -> (Arc<MemoryStore>, Target) {
        let me = UserProfile {
            id: Uuid::new_v4(),
            username: "me".to_string(),
            display_name: None,
            avatar_url: None,
            status: None,
        };
        let me_id = me.id;
        let store = Arc::new(MemoryStore::new(me));
        let target = Target::Channel(store.add_channel("c", &[me_id]));
        store.insert_message(target.clone(), me_id, "m1", Utc::now());
        (store, target)
    }

    async fn next_within(handle: &mut SyncHandle, d: Duration) -> Option<SyncEvent> {
        time::timeout(d, handle.recv()).await.ok().flatten()
    }

    #[tokio::test(start_paused = true)]
    async fn test_emits_only_when_list_changes() {
        let (store, target) = setup();
        let mut handle = spawn(SyncLoop::new(Arc::clone(&store), Some(target.clone())), PERIOD);

        match next_within(&mut handle, Duration::from_millis(10)).await {
            Some(SyncEvent::Messages { messages, .. }) => assert_eq!(messages.len(), 1),
            other => panic!("expected first list, got {:?}", other),
        }

        // Several ticks with no change: nothing emitted.
        assert!(next_within(&mut handle, PERIOD * 3).await.is_none());

        store.send_message(&target, "m2").await.unwrap();
        match next_within(&mut handle, PERIOD + Duration::from_secs(1)).await {
            Some(SyncEvent::Messages { messages, .. }) => assert_eq!(messages.len(), 2),
            other => panic!("expected updated list, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_events_carry_previous_marker() {
        let (store, target) = setup();
        let mut handle = spawn(SyncLoop::new(Arc::clone(&store), Some(target.clone())), PERIOD);

        let first = match next_within(&mut handle, Duration::from_millis(10)).await {
            Some(SyncEvent::Messages {
                messages,
                seen_before,
                ..
            }) => {
                assert_eq!(seen_before, None);
                messages[0].cursor()
            }
            other => panic!("expected first list, got {:?}", other),
        };

        store.send_message(&target, "m2").await.unwrap();
        match next_within(&mut handle, PERIOD + Duration::from_secs(1)).await {
            Some(SyncEvent::Messages {
                messages,
                seen_before,
                ..
            }) => {
                assert_eq!(seen_before, Some(first.clone()));
                let fresh: Vec<&str> = messages
                    .iter()
                    .filter(|m| Some(m.cursor()) > seen_before)
                    .map(|m| m.body.as_str())
                    .collect();
                assert_eq!(fresh, vec!["m2"]);
            }
            other => panic!("expected updated list, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_network_errors_are_silent() {
        let (store, target) = setup();
        store.fail_next(StoreError::NetworkUnavailable("offline".into()));
        let mut handle = spawn(SyncLoop::new(Arc::clone(&store), Some(target)), PERIOD);

        // First tick fails silently; the second succeeds.
        assert!(next_within(&mut handle, Duration::from_secs(1)).await.is_none());
        assert!(matches!(
            next_within(&mut handle, PERIOD).await,
            Some(SyncEvent::Messages { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unauthorized_pauses_until_reselected() {
        let (store, target) = setup();
        let mut handle = spawn(SyncLoop::new(Arc::clone(&store), Some(target.clone())), PERIOD);
        assert!(next_within(&mut handle, Duration::from_millis(10)).await.is_some());

        store.expire_session();
        assert!(matches!(
            next_within(&mut handle, PERIOD * 2).await,
            Some(SyncEvent::Unauthorized)
        ));
        // Idle: no further polling, so no further events.
        assert!(next_within(&mut handle, PERIOD * 4).await.is_none());

        store.renew_session();
        handle.select(target);
        assert!(matches!(
            next_within(&mut handle, Duration::from_millis(10)).await,
            Some(SyncEvent::Messages { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_and_refresh() {
        let (store, target) = setup();
        let mut handle = spawn(SyncLoop::new(Arc::clone(&store), None), PERIOD);
        assert!(next_within(&mut handle, PERIOD * 2).await.is_none());

        handle.select(target.clone());
        assert!(next_within(&mut handle, Duration::from_millis(10)).await.is_some());

        handle.refresh();
        match next_within(&mut handle, Duration::from_millis(10)).await {
            Some(SyncEvent::Messages { target: t, .. }) => assert_eq!(t, target),
            other => panic!("expected refreshed list, got {:?}", other),
        }

        handle.stop();
        store.send_message(&target, "unseen").await.unwrap();
        assert!(next_within(&mut handle, PERIOD * 3).await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_deleted_target_reported() {
        let (store, target) = setup();
        let mut handle = spawn(SyncLoop::new(Arc::clone(&store), Some(target.clone())), PERIOD);
        assert!(next_within(&mut handle, Duration::from_millis(10)).await.is_some());

        if let Some(id) = target.channel_id() {
            store.remove_channel(id);
        }
        match next_within(&mut handle, PERIOD * 2).await {
            Some(SyncEvent::TargetGone(t)) => assert_eq!(t, target),
            other => panic!("expected TargetGone, got {:?}", other),
        }
    }
}
