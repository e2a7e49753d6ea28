//! Remote data store seam
//!
//! The sync loop and the UI talk to the backend only through `RemoteStore`.
//! Authorization happens server-side; the store just surfaces the outcome.

pub mod memory;

use std::future::Future;

use uuid::Uuid;

use crate::models::{Channel, Message, RecordId, Target, UserProfile};

pub use memory::MemoryStore;

/// Failures surfaced by a `RemoteStore`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Session expired or a row-level policy denied the request.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// The requested target no longer exists (or is no longer visible).
    #[error("not found: {0}")]
    NotFound(String),
    /// Transport failure, timeout, or server-side 5xx.
    #[error("network unavailable: {0}")]
    NetworkUnavailable(String),
    /// Any other non-success response.
    #[error("request rejected (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },
    /// The response body did not match the expected shape.
    #[error("malformed response: {0}")]
    Decode(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Queries and writes against the conversation store.
pub trait RemoteStore: Send + Sync + 'static {
    /// The session user every call is made on behalf of.
    fn current_user(&self) -> Uuid;

    /// All messages for `target`, in conversation order.
    fn list_messages(
        &self,
        target: &Target,
    ) -> impl Future<Output = StoreResult<Vec<Message>>> + Send;

    /// Post `body` to `target` as the session user.
    fn send_message(
        &self,
        target: &Target,
        body: &str,
    ) -> impl Future<Output = StoreResult<Message>> + Send;

    /// Channels in `workspace` the session user belongs to, with member sets.
    fn list_channels(
        &self,
        workspace: &RecordId,
    ) -> impl Future<Output = StoreResult<Vec<Channel>>> + Send;

    /// Every profile except the session user's.
    fn list_users(&self) -> impl Future<Output = StoreResult<Vec<UserProfile>>> + Send;

    fn add_reaction(
        &self,
        message_id: &RecordId,
        emoji: &str,
        user: Uuid,
    ) -> impl Future<Output = StoreResult<()>> + Send;

    fn remove_reaction(
        &self,
        message_id: &RecordId,
        emoji: &str,
        user: Uuid,
    ) -> impl Future<Output = StoreResult<()>> + Send;
}
