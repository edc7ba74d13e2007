//! DI "Interfaces"

use crate::infrastructure::entities;
use async_trait::async_trait;

/// Result of posting a user message and waiting for its generated reply.
#[derive(Debug)]
pub enum PostOutcome {
    /// A reply newer than the posted message was persisted within the
    /// deadline. The reply may carry the failure sentinel; sentinel replies
    /// are surfaced like any other and are never charged against the quota.
    Replied {
        message_id: i64,
        reply: entities::Message,
    },
    /// The deadline elapsed with no qualifying reply. The task stays in
    /// flight; there is no token to resume waiting for it.
    Queued,
    /// The reply was generated and persisted but the user's daily ceiling is
    /// reached, so it is not surfaced and no further usage is charged.
    QuotaExceeded,
    ChatroomNotFound,
}

#[async_trait]
pub trait ChatService: Send + Sync {
    /// Lists the user's chatrooms, serving from the short-lived list cache
    /// when possible. The bool is true on a cache hit.
    async fn list_chatrooms(&self, user_id: i64) -> Result<(Vec<entities::Chatroom>, bool), ()>;

    async fn create_chatroom(&self, user_id: i64, name: String)
    -> Result<entities::Chatroom, ()>;

    /// `None` if the chatroom does not exist or belongs to someone else.
    async fn get_chatroom(
        &self,
        user_id: i64,
        chatroom_id: i64,
    ) -> Result<Option<entities::Chatroom>, ()>;

    /// `None` if the chatroom is not the caller's.
    async fn list_messages(
        &self,
        user_id: i64,
        chatroom_id: i64,
    ) -> Result<Option<Vec<entities::Message>>, ()>;

    /// The full request path: persist the user message, enqueue a generation
    /// task, wait up to the poll deadline for the reply, then apply quota
    /// accounting. `Err` means the queue or store was unreachable.
    async fn post_message(
        &self,
        user_id: i64,
        chatroom_id: i64,
        content: String,
    ) -> Result<PostOutcome, ()>;

    async fn subscription_tier(&self, user_id: i64) -> Result<entities::SubscriptionTier, ()>;
}

/// Seam to the external text-generation provider.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> anyhow::Result<String>;
}
