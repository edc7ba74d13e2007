//! Generation worker
//!
//! A single long-lived loop that drains the task queue one task at a time:
//! pop, assemble context from the chatroom, call the provider, persist
//! exactly one assistant reply. Provider failures become a sentinel reply so
//! a popped task always produces a message row; only a failed persist stops
//! the loop (the surrounding deployment restarts the process).

use crate::core::traits::TextGenerator;
use crate::infrastructure::entities::{GenerationTask, Sender};
use crate::infrastructure::traits::{ChatRepository, TaskQueue};
use anyhow::anyhow;
use di::Ref;
use log::{error, info};
use std::time::Duration;
use tokio::time::{sleep, timeout};

/// Fixed prefix that marks a persisted reply as a provider failure.
pub const FAILURE_PREFIX: &str = "[assistant error";
pub const FAILURE_SENTINEL: &str = "[assistant error: could not get a response]";

const EMPTY_QUEUE_BACKOFF: Duration = Duration::from_secs(1);
const GENERATION_TIMEOUT: Duration = Duration::from_secs(30);

pub fn is_failure_reply(content: &str) -> bool {
    content.starts_with(FAILURE_PREFIX)
}

pub struct GenerationWorker {
    queue: Ref<dyn TaskQueue>,
    repo: Ref<dyn ChatRepository>,
    generator: Ref<dyn TextGenerator>,
}

impl GenerationWorker {
    pub fn new(
        queue: Ref<dyn TaskQueue>,
        repo: Ref<dyn ChatRepository>,
        generator: Ref<dyn TextGenerator>,
    ) -> Self {
        GenerationWorker {
            queue,
            repo,
            generator,
        }
    }

    /// Runs forever under normal operation. Returns only on a persistence
    /// failure.
    pub async fn run(self) -> anyhow::Result<()> {
        info!("generation worker started");

        loop {
            if !self.step().await? {
                sleep(EMPTY_QUEUE_BACKOFF).await;
            }
        }
    }

    /// Processes at most one task. `Ok(false)` means the queue was empty.
    pub async fn step(&self) -> anyhow::Result<bool> {
        let task = self
            .queue
            .pop()
            .await
            .map_err(|_| anyhow!("task queue unreachable"))?;

        let Some(task) = task else {
            return Ok(false);
        };

        let prompt = self.build_context(&task).await?;

        let reply = match timeout(GENERATION_TIMEOUT, self.generator.generate(&prompt)).await {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                error!("generation failed for chatroom {}: {e}", task.chatroom_id);
                FAILURE_SENTINEL.to_owned()
            }
            Err(_) => {
                error!("generation timed out for chatroom {}", task.chatroom_id);
                FAILURE_SENTINEL.to_owned()
            }
        };

        // This write must happen for every popped task; losing it would leave
        // the waiter with nothing to find.
        self.repo
            .append_message(task.chatroom_id, Sender::Ai, &reply)
            .await
            .map_err(|_| anyhow!("failed to persist assistant reply"))?;

        info!("assistant reply saved for chatroom {}", task.chatroom_id);
        Ok(true)
    }

    /// Context policy: the newest user message of the task's chatroom, not
    /// the task's own content. A user message posted after the task was
    /// enqueued wins over the one that triggered it.
    async fn build_context(&self, task: &GenerationTask) -> anyhow::Result<String> {
        let last_user_message = self
            .repo
            .latest_message_from(task.chatroom_id, Sender::User)
            .await
            .map_err(|_| anyhow!("failed to load chatroom history"))?;

        Ok(match last_user_message {
            Some(message) => format!("user: {}", message.content),
            None => String::new(),
        })
    }
}
