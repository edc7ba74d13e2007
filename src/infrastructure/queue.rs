//! SQLite-backed task queue
//!
//! One named FIFO per `queue` value, one JSON-encoded task per row. The
//! autoincrement id is the queue order; popping deletes the head row in a
//! single statement, so concurrent consumers get disjoint tasks.

use crate::infrastructure::database::DatabaseConnection;
use crate::infrastructure::entities::GenerationTask;
use crate::infrastructure::traits::TaskQueue;
use async_trait::async_trait;
use chrono::Utc;
use di::{Ref, injectable};
use log::error;

pub const TASK_QUEUE_NAME: &str = "generation_message_queue";

#[injectable(TaskQueue)]
pub struct SqliteTaskQueue {
    connection: Ref<DatabaseConnection>,
}

impl SqliteTaskQueue {
    pub fn with_connection(connection: Ref<DatabaseConnection>) -> Self {
        SqliteTaskQueue { connection }
    }
}

#[async_trait]
impl TaskQueue for SqliteTaskQueue {
    async fn push(&self, task: &GenerationTask) -> Result<(), ()> {
        let payload = serde_json::to_string(task).map_err(|e| error!("{e}"))?;

        sqlx::query("INSERT INTO task_queue (queue, payload, created_at) VALUES (?, ?, ?)")
            .bind(TASK_QUEUE_NAME)
            .bind(payload)
            .bind(Utc::now())
            .execute(&**self.connection)
            .await
            .map(|_| ())
            .map_err(|e| error!("{e}"))
    }

    async fn pop(&self) -> Result<Option<GenerationTask>, ()> {
        let popped: Option<(String,)> = sqlx::query_as(
            "DELETE FROM task_queue WHERE id = \
             (SELECT id FROM task_queue WHERE queue = ? ORDER BY id ASC LIMIT 1) \
             RETURNING payload",
        )
        .bind(TASK_QUEUE_NAME)
        .fetch_optional(&**self.connection)
        .await
        .map_err(|e| error!("{e}"))?;

        match popped {
            None => Ok(None),
            Some((payload,)) => serde_json::from_str(&payload)
                .map(Some)
                .map_err(|e| error!("malformed task payload: {e}")),
        }
    }
}
