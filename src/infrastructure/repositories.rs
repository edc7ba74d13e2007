//! DB Repository abstractions

use crate::infrastructure::database::DatabaseConnection;
use crate::infrastructure::entities::{Chatroom, Message, Sender, SubscriptionTier};
use crate::infrastructure::traits::ChatRepository;
use async_trait::async_trait;
use chrono::Utc;
use di::{Ref, injectable};
use log::error;

#[injectable(ChatRepository)]
pub struct DbChatRepository {
    connection: Ref<DatabaseConnection>,
}

impl DbChatRepository {
    pub fn with_connection(connection: Ref<DatabaseConnection>) -> Self {
        DbChatRepository { connection }
    }
}

#[async_trait]
impl ChatRepository for DbChatRepository {
    async fn list_chatrooms(&self, user_id: i64) -> Result<Vec<Chatroom>, ()> {
        sqlx::query_as(
            "SELECT * FROM chatrooms WHERE user_id = ? ORDER BY datetime(created_at) ASC",
        )
        .bind(user_id)
        .fetch_all(&**self.connection)
        .await
        .map_err(|e| error!("{e}"))
    }

    async fn create_chatroom(&self, user_id: i64, name: &str) -> Result<Chatroom, ()> {
        sqlx::query_as(
            "INSERT INTO chatrooms (user_id, name, created_at) VALUES (?, ?, ?) RETURNING *",
        )
        .bind(user_id)
        .bind(name)
        .bind(Utc::now())
        .fetch_one(&**self.connection)
        .await
        .map_err(|e| error!("{e}"))
    }

    async fn find_chatroom(
        &self,
        user_id: i64,
        chatroom_id: i64,
    ) -> Result<Option<Chatroom>, ()> {
        sqlx::query_as("SELECT * FROM chatrooms WHERE id = ? AND user_id = ?")
            .bind(chatroom_id)
            .bind(user_id)
            .fetch_optional(&**self.connection)
            .await
            .map_err(|e| error!("{e}"))
    }

    async fn list_messages(&self, chatroom_id: i64) -> Result<Vec<Message>, ()> {
        sqlx::query_as(
            "SELECT * FROM messages WHERE chatroom_id = ? ORDER BY datetime(created_at) ASC, id ASC",
        )
        .bind(chatroom_id)
        .fetch_all(&**self.connection)
        .await
        .map_err(|e| error!("{e}"))
    }

    async fn append_message(
        &self,
        chatroom_id: i64,
        sender: Sender,
        content: &str,
    ) -> Result<Message, ()> {
        sqlx::query_as(
            "INSERT INTO messages (chatroom_id, sender, content, created_at) VALUES (?, ?, ?, ?) RETURNING *",
        )
        .bind(chatroom_id)
        .bind(sender)
        .bind(content)
        .bind(Utc::now())
        .fetch_one(&**self.connection)
        .await
        .map_err(|e| error!("{e}"))
    }

    async fn latest_message_from(
        &self,
        chatroom_id: i64,
        sender: Sender,
    ) -> Result<Option<Message>, ()> {
        sqlx::query_as(
            "SELECT * FROM messages WHERE chatroom_id = ? AND sender = ? ORDER BY datetime(created_at) DESC, id DESC LIMIT 1",
        )
        .bind(chatroom_id)
        .bind(sender)
        .fetch_optional(&**self.connection)
        .await
        .map_err(|e| error!("{e}"))
    }

    async fn user_tier(&self, user_id: i64) -> Result<SubscriptionTier, ()> {
        let tier: Option<(String,)> = sqlx::query_as("SELECT tier FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&**self.connection)
            .await
            .map_err(|e| error!("{e}"))?;

        Ok(tier
            .map(|(t,)| SubscriptionTier::from_db(&t))
            .unwrap_or(SubscriptionTier::Basic))
    }

    async fn set_user_tier(&self, user_id: i64, tier: SubscriptionTier) -> Result<(), ()> {
        sqlx::query("UPDATE users SET tier = ? WHERE id = ?")
            .bind(tier.as_str())
            .bind(user_id)
            .execute(&**self.connection)
            .await
            .map(|_| ())
            .map_err(|e| error!("{e}"))
    }
}
