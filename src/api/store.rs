//! `RemoteStore` over the Supabase REST API

use uuid::Uuid;

use super::client::SupabaseClient;
use super::{channels, messages, reactions, users};
use crate::models::{Channel, Message, RecordId, Target, UserProfile};
use crate::store::{RemoteStore, StoreResult};

impl RemoteStore for SupabaseClient {
    fn current_user(&self) -> Uuid {
        self.user_id()
    }

    async fn list_messages(&self, target: &Target) -> StoreResult<Vec<Message>> {
        messages::list(self, target).await
    }

    async fn send_message(&self, target: &Target, body: &str) -> StoreResult<Message> {
        messages::send(self, target, body).await
    }

    async fn list_channels(&self, workspace: &RecordId) -> StoreResult<Vec<Channel>> {
        channels::list_joined(self, workspace).await
    }

    async fn list_users(&self) -> StoreResult<Vec<UserProfile>> {
        users::list_others(self).await
    }

    async fn add_reaction(&self, message_id: &RecordId, emoji: &str, user: Uuid) -> StoreResult<()> {
        reactions::add(self, message_id, emoji, user).await
    }

    async fn remove_reaction(
        &self,
        message_id: &RecordId,
        emoji: &str,
        user: Uuid,
    ) -> StoreResult<()> {
        reactions::remove(self, message_id, emoji, user).await
    }
}
