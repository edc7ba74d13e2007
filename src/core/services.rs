//! Implementations for the service the app needs.
//!

use crate::core::traits::{ChatService, PostOutcome};
use crate::core::waiter::{self, PollPolicy, ReplyOutcome};
use crate::core::{quota, worker};
use crate::infrastructure::entities::{Chatroom, GenerationTask, Message, Sender, SubscriptionTier};
use crate::infrastructure::traits::{CacheStore, ChatRepository, TaskQueue};
use async_trait::async_trait;
use di::{Ref, injectable};
use log::warn;
use std::time::Duration;

const CHATROOM_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

fn chatroom_cache_key(user_id: i64) -> String {
    format!("chatrooms:{user_id}")
}

#[injectable(ChatService)]
pub struct MyChatService {
    repo: Ref<dyn ChatRepository>,
    queue: Ref<dyn TaskQueue>,
    cache: Ref<dyn CacheStore>,
}

impl MyChatService {
    pub fn with_parts(
        repo: Ref<dyn ChatRepository>,
        queue: Ref<dyn TaskQueue>,
        cache: Ref<dyn CacheStore>,
    ) -> Self {
        MyChatService { repo, queue, cache }
    }
}

#[async_trait]
impl ChatService for MyChatService {
    async fn list_chatrooms(&self, user_id: i64) -> Result<(Vec<Chatroom>, bool), ()> {
        let key = chatroom_cache_key(user_id);

        if let Some(cached) = self.cache.get(&key).await? {
            match serde_json::from_str(&cached) {
                Ok(chatrooms) => return Ok((chatrooms, true)),
                Err(e) => warn!("discarding unreadable chatroom cache entry: {e}"),
            }
        }

        let chatrooms = self.repo.list_chatrooms(user_id).await?;

        if let Ok(encoded) = serde_json::to_string(&chatrooms) {
            self.cache.set_ex(&key, &encoded, CHATROOM_CACHE_TTL).await?;
        }

        Ok((chatrooms, false))
    }

    async fn create_chatroom(&self, user_id: i64, name: String) -> Result<Chatroom, ()> {
        self.repo.create_chatroom(user_id, &name).await
    }

    async fn get_chatroom(
        &self,
        user_id: i64,
        chatroom_id: i64,
    ) -> Result<Option<Chatroom>, ()> {
        self.repo.find_chatroom(user_id, chatroom_id).await
    }

    async fn list_messages(
        &self,
        user_id: i64,
        chatroom_id: i64,
    ) -> Result<Option<Vec<Message>>, ()> {
        if self.repo.find_chatroom(user_id, chatroom_id).await?.is_none() {
            return Ok(None);
        }

        self.repo.list_messages(chatroom_id).await.map(Some)
    }

    async fn post_message(
        &self,
        user_id: i64,
        chatroom_id: i64,
        content: String,
    ) -> Result<PostOutcome, ()> {
        let Some(chatroom) = self.repo.find_chatroom(user_id, chatroom_id).await? else {
            return Ok(PostOutcome::ChatroomNotFound);
        };

        let user_message = self
            .repo
            .append_message(chatroom.id, Sender::User, &content)
            .await?;

        self.queue
            .push(&GenerationTask {
                chatroom_id: chatroom.id,
                user_id,
                message_id: user_message.id,
                content,
            })
            .await?;

        let policy = PollPolicy::from_env();
        let outcome =
            waiter::await_reply(&*self.repo, chatroom.id, user_message.created_at, &policy)
                .await?;

        match outcome {
            ReplyOutcome::Queued => Ok(PostOutcome::Queued),
            ReplyOutcome::Ready(reply) => {
                // Sentinel replies are surfaced but never charged.
                if worker::is_failure_reply(&reply.content) {
                    return Ok(PostOutcome::Replied {
                        message_id: user_message.id,
                        reply,
                    });
                }

                let tier = self.repo.user_tier(user_id).await?;
                match quota::charge(&*self.cache, user_id, tier).await? {
                    quota::QuotaDecision::Allowed => Ok(PostOutcome::Replied {
                        message_id: user_message.id,
                        reply,
                    }),
                    quota::QuotaDecision::Exceeded => Ok(PostOutcome::QuotaExceeded),
                }
            }
        }
    }

    async fn subscription_tier(&self, user_id: i64) -> Result<SubscriptionTier, ()> {
        self.repo.user_tier(user_id).await
    }
}
