//! Database entities and the queue task record

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Chatroom {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[repr(u8)]
pub enum Sender {
    User = 1,
    Ai = 2,
}

impl Sender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sender::User => "user",
            Sender::Ai => "ai",
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct Message {
    pub id: i64,
    pub chatroom_id: i64,
    pub sender: Sender,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionTier {
    Basic,
    Pro,
}

impl SubscriptionTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionTier::Basic => "basic",
            SubscriptionTier::Pro => "pro",
        }
    }

    /// Unknown tier strings read as the metered tier.
    pub fn from_db(value: &str) -> Self {
        match value {
            "pro" => SubscriptionTier::Pro,
            _ => SubscriptionTier::Basic,
        }
    }
}

/// One unit of queued work: a user message awaiting a generated reply.
///
/// Lives only inside the task queue, serialized as a JSON object with exactly
/// these fields. Once popped it has no identity of its own and is never
/// re-enqueued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationTask {
    pub chatroom_id: i64,
    pub user_id: i64,
    pub message_id: i64,
    pub content: String,
}
