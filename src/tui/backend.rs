//! Async backend: runs one-shot store calls for the UI.
//!
//! Uses an mpsc channel pair. The UI sends `BackendCommand` values, and a
//! background tokio task executes them against the store and sends
//! `BackendResponse` values back. Polling of the open conversation is not
//! done here; that is the sync task's job.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::models::{Channel, Message, RecordId, Target, UserProfile};
use crate::store::{RemoteStore, StoreResult};

/// Commands sent from the UI to the backend.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCommand {
    LoadChannels,
    LoadUsers,
    Send { target: Target, body: String },
    React {
        message_id: RecordId,
        emoji: String,
        add: bool,
    },
}

/// Responses from the backend to the UI.
#[derive(Debug)]
pub enum BackendResponse {
    Channels(StoreResult<Vec<Channel>>),
    Users(StoreResult<Vec<UserProfile>>),
    Sent {
        target: Target,
        result: StoreResult<Message>,
    },
    Reacted(StoreResult<()>),
}

/// UI-side handle for the backend task.
pub struct Backend {
    cmd_tx: mpsc::UnboundedSender<BackendCommand>,
    resp_rx: mpsc::UnboundedReceiver<BackendResponse>,
}

impl Backend {
    /// Start the backend over `store`, scoped to `workspace`.
    pub fn start<S: RemoteStore>(store: Arc<S>, workspace: RecordId) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (resp_tx, resp_rx) = mpsc::unbounded_channel();

        tokio::spawn(backend_loop(store, workspace, cmd_rx, resp_tx));

        Self { cmd_tx, resp_rx }
    }

    /// Send a command to the backend (non-blocking).
    pub fn send(&self, cmd: BackendCommand) {
        if self.cmd_tx.send(cmd).is_err() {
            tracing::error!("Backend channel closed -- command dropped");
        }
    }

    /// Next response. Designed to be used inside `tokio::select!`.
    pub async fn recv(&mut self) -> Option<BackendResponse> {
        self.resp_rx.recv().await
    }
}

async fn backend_loop<S: RemoteStore>(
    store: Arc<S>,
    workspace: RecordId,
    mut cmd_rx: mpsc::UnboundedReceiver<BackendCommand>,
    resp_tx: mpsc::UnboundedSender<BackendResponse>,
) {
    while let Some(cmd) = cmd_rx.recv().await {
        let store = Arc::clone(&store);
        let workspace = workspace.clone();
        let resp_tx = resp_tx.clone();

        // Each command runs on its own task so a slow send does not hold up
        // the channel list.
        tokio::spawn(async move {
            let resp = match cmd {
                BackendCommand::LoadChannels => {
                    BackendResponse::Channels(store.list_channels(&workspace).await)
                }
                BackendCommand::LoadUsers => BackendResponse::Users(store.list_users().await),
                BackendCommand::Send { target, body } => {
                    let result = store.send_message(&target, &body).await;
                    BackendResponse::Sent { target, result }
                }
                BackendCommand::React {
                    message_id,
                    emoji,
                    add,
                } => {
                    let me = store.current_user();
                    let result = if add {
                        store.add_reaction(&message_id, &emoji, me).await
                    } else {
                        store.remove_reaction(&message_id, &emoji, me).await
                    };
                    BackendResponse::Reacted(result)
                }
            };
            let _ = resp_tx.send(resp);
        });
    }
}
