//! Reply completion waiter
//!
//! Runs inside the request handler after the task is enqueued: polls the
//! message store for an assistant reply written after the originating user
//! message, up to a hard deadline of `attempts * interval`. Each waiter
//! sleeps only its own task, so concurrent requests never block each other.

use crate::infrastructure::entities::{Message, Sender};
use crate::infrastructure::traits::ChatRepository;
use chrono::{DateTime, Utc};
use std::str::FromStr;
use std::time::Duration;
use tokio::time::sleep;

const DEFAULT_POLL_INTERVAL_MS: u64 = 500;
const DEFAULT_POLL_ATTEMPTS: u32 = 40;

#[derive(Debug, Clone)]
pub struct PollPolicy {
    pub interval: Duration,
    pub attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        PollPolicy {
            interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            attempts: DEFAULT_POLL_ATTEMPTS,
        }
    }
}

impl PollPolicy {
    pub fn from_env() -> Self {
        let interval_ms = std::env::var("REPLY_POLL_INTERVAL_MS")
            .ok()
            .and_then(|s| u64::from_str(&s).ok())
            .unwrap_or(DEFAULT_POLL_INTERVAL_MS);
        let attempts = std::env::var("REPLY_POLL_ATTEMPTS")
            .ok()
            .and_then(|s| u32::from_str(&s).ok())
            .unwrap_or(DEFAULT_POLL_ATTEMPTS);

        PollPolicy {
            interval: Duration::from_millis(interval_ms),
            attempts,
        }
    }
}

#[derive(Debug)]
pub enum ReplyOutcome {
    Ready(Message),
    Queued,
}

/// Polls for an assistant reply created strictly after `after`.
///
/// Timestamps are the only causal link between a user message and its reply;
/// there is no task-to-reply key, so a reply to a concurrent message in the
/// same chatroom satisfies the check too.
pub async fn await_reply(
    repo: &dyn ChatRepository,
    chatroom_id: i64,
    after: DateTime<Utc>,
    policy: &PollPolicy,
) -> Result<ReplyOutcome, ()> {
    for _ in 0..policy.attempts {
        if let Some(reply) = repo.latest_message_from(chatroom_id, Sender::Ai).await? {
            if reply.created_at > after {
                return Ok(ReplyOutcome::Ready(reply));
            }
        }

        sleep(policy.interval).await;
    }

    Ok(ReplyOutcome::Queued)
}
