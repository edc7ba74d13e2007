//! Infrastructure traits, used for DI on higher levels

use crate::infrastructure::entities;
use crate::infrastructure::entities::{GenerationTask, Sender, SubscriptionTier};
use async_trait::async_trait;
use std::time::Duration;

#[async_trait]
pub trait ChatRepository: Send + Sync {
    async fn list_chatrooms(&self, user_id: i64) -> Result<Vec<entities::Chatroom>, ()>;

    async fn create_chatroom(&self, user_id: i64, name: &str)
    -> Result<entities::Chatroom, ()>;

    /// Fetches a chatroom only if it belongs to the given user.
    async fn find_chatroom(
        &self,
        user_id: i64,
        chatroom_id: i64,
    ) -> Result<Option<entities::Chatroom>, ()>;

    /// All messages of a chatroom, oldest first.
    async fn list_messages(&self, chatroom_id: i64) -> Result<Vec<entities::Message>, ()>;

    /// Appends a message row; the store assigns id and creation timestamp.
    async fn append_message(
        &self,
        chatroom_id: i64,
        sender: Sender,
        content: &str,
    ) -> Result<entities::Message, ()>;

    /// The newest message of a chatroom written by the given sender.
    async fn latest_message_from(
        &self,
        chatroom_id: i64,
        sender: Sender,
    ) -> Result<Option<entities::Message>, ()>;

    /// A missing user row reads as the metered tier.
    async fn user_tier(&self, user_id: i64) -> Result<SubscriptionTier, ()>;

    /// Tier updates come from the billing collaborator, not from the request
    /// path.
    async fn set_user_tier(&self, user_id: i64, tier: SubscriptionTier) -> Result<(), ()>;
}

/// Durable FIFO of generation tasks.
///
/// Push appends to the tail, pop atomically takes the head. At-most-once:
/// there is no ack or visibility timeout, a popped task is gone even if its
/// consumer crashes.
#[async_trait]
pub trait TaskQueue: Send + Sync {
    async fn push(&self, task: &GenerationTask) -> Result<(), ()>;

    /// Returns `None` when the queue is empty. Concurrent consumers never
    /// receive the same task twice.
    async fn pop(&self) -> Result<Option<GenerationTask>, ()>;
}

/// Expiring key/value store for usage counters and response caches.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, ()>;

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), ()>;

    /// Missing, expired or non-numeric entries read as 0.
    async fn get_counter(&self, key: &str) -> Result<i64, ()>;

    /// Atomic increment. An expired counter restarts at 1; the expiry is
    /// refreshed either way. Returns the new count.
    async fn incr(&self, key: &str, ttl: Duration) -> Result<i64, ()>;
}
