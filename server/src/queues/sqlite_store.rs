//! SQLite implementation of the QueueStorage trait

use crate::error::{GatewayError, GatewayResult, ResourceKind};
use crate::queues::{new_message_id, new_pop_receipt, MessageReceipt, QueueStorage, ReceivedMessage};
use crate::sqlite::{format_timestamp, parse_timestamp, SqliteHandle};
use async_trait::async_trait;
use chrono::Utc;
use log::{debug, info};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::time::Duration;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS queues (
        name TEXT PRIMARY KEY,
        created_at TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS queue_messages (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        message_id TEXT NOT NULL UNIQUE,
        queue TEXT NOT NULL,
        body TEXT NOT NULL,
        inserted_at TEXT NOT NULL,
        visible_at INTEGER NOT NULL,
        pop_receipt TEXT,
        dequeue_count INTEGER NOT NULL DEFAULT 0
    );
    CREATE INDEX IF NOT EXISTS idx_queue_messages_visible ON queue_messages(queue, visible_at, seq);
";

/// SQLite implementation of QueueStorage. Visibility is a millisecond
/// timestamp; a message is visible once `visible_at <= now`.
pub struct SQLiteQueueStore {
    db: SqliteHandle,
}

impl SQLiteQueueStore {
    pub fn open(path: &Path, wal_mode: bool) -> GatewayResult<Self> {
        Self::with_handle(SqliteHandle::open(path, wal_mode)?)
    }

    pub fn in_memory() -> GatewayResult<Self> {
        Self::with_handle(SqliteHandle::in_memory()?)
    }

    fn with_handle(db: SqliteHandle) -> GatewayResult<Self> {
        db.run_blocking(|conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })?;
        Ok(Self { db })
    }
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

fn require_queue(conn: &Connection, queue: &str) -> GatewayResult<()> {
    let exists: Option<i64> = conn
        .query_row("SELECT 1 FROM queues WHERE name = ?1", params![queue], |row| row.get(0))
        .optional()?;
    match exists {
        Some(_) => Ok(()),
        None => Err(GatewayError::not_found(ResourceKind::Queue, queue)),
    }
}

fn stale_receipt(queue: &str, message_id: &str) -> GatewayError {
    GatewayError::not_found(ResourceKind::Message, format!("{}/{}", queue, message_id))
}

#[async_trait]
impl QueueStorage for SQLiteQueueStore {
    async fn create_queue_if_not_exists(&self, queue: &str) -> GatewayResult<bool> {
        let queue = queue.to_string();
        self.db
            .run(move |conn| {
                let changed = conn.execute(
                    "INSERT OR IGNORE INTO queues (name, created_at) VALUES (?1, ?2)",
                    params![queue, format_timestamp(&Utc::now())],
                )?;
                if changed > 0 {
                    info!("Created queue {}", queue);
                }
                Ok(changed > 0)
            })
            .await
    }

    async fn queue_exists(&self, queue: &str) -> GatewayResult<bool> {
        let queue = queue.to_string();
        self.db
            .run(move |conn| match require_queue(conn, &queue) {
                Ok(()) => Ok(true),
                Err(e) if e.is_not_found() => Ok(false),
                Err(e) => Err(e),
            })
            .await
    }

    async fn list_queues(&self) -> GatewayResult<Vec<String>> {
        self.db
            .run(|conn| {
                let mut stmt = conn.prepare("SELECT name FROM queues ORDER BY name")?;
                let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
                let mut queues = Vec::new();
                for row in rows {
                    queues.push(row?);
                }
                Ok(queues)
            })
            .await
    }

    async fn send_message(&self, queue: &str, text: &str) -> GatewayResult<MessageReceipt> {
        let queue = queue.to_string();
        let text = text.to_string();
        self.db
            .run(move |conn| {
                require_queue(conn, &queue)?;
                let receipt = MessageReceipt {
                    message_id: new_message_id(),
                    inserted_on: Utc::now(),
                };
                conn.execute(
                    "INSERT INTO queue_messages (message_id, queue, body, inserted_at, visible_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        receipt.message_id,
                        queue,
                        text,
                        format_timestamp(&receipt.inserted_on),
                        receipt.inserted_on.timestamp_millis()
                    ],
                )?;
                debug!("Queued message {} on {}", receipt.message_id, queue);
                Ok(receipt)
            })
            .await
    }

    async fn receive_message(
        &self,
        queue: &str,
        visibility_timeout: Duration,
    ) -> GatewayResult<Option<ReceivedMessage>> {
        let queue = queue.to_string();
        let lease_millis = i64::try_from(visibility_timeout.as_millis()).unwrap_or(i64::MAX);
        self.db
            .run(move |conn| {
                let tx = conn.transaction()?;
                require_queue(&tx, &queue)?;

                let now = now_millis();
                let candidate: Option<(i64, String, String, u32, String)> = tx
                    .query_row(
                        "SELECT seq, message_id, body, dequeue_count, inserted_at
                         FROM queue_messages
                         WHERE queue = ?1 AND visible_at <= ?2
                         ORDER BY seq LIMIT 1",
                        params![queue, now],
                        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)),
                    )
                    .optional()?;

                let Some((seq, message_id, text, dequeue_count, inserted_at)) = candidate else {
                    return Ok(None);
                };

                let pop_receipt = new_pop_receipt();
                tx.execute(
                    "UPDATE queue_messages
                     SET visible_at = ?1, pop_receipt = ?2, dequeue_count = dequeue_count + 1
                     WHERE seq = ?3",
                    params![now.saturating_add(lease_millis), pop_receipt, seq],
                )?;
                tx.commit()?;

                debug!("Leased message {} on {} (delivery {})", message_id, queue, dequeue_count + 1);
                Ok(Some(ReceivedMessage {
                    message_id,
                    pop_receipt,
                    text,
                    dequeue_count: dequeue_count + 1,
                    inserted_on: parse_timestamp(&inserted_at)?,
                }))
            })
            .await
    }

    async fn delete_message(&self, queue: &str, message_id: &str, pop_receipt: &str) -> GatewayResult<()> {
        let queue = queue.to_string();
        let message_id = message_id.to_string();
        let pop_receipt = pop_receipt.to_string();
        self.db
            .run(move |conn| {
                require_queue(conn, &queue)?;
                let removed = conn.execute(
                    "DELETE FROM queue_messages WHERE queue = ?1 AND message_id = ?2 AND pop_receipt = ?3",
                    params![queue, message_id, pop_receipt],
                )?;
                if removed == 0 {
                    return Err(stale_receipt(&queue, &message_id));
                }
                debug!("Deleted message {} from {}", message_id, queue);
                Ok(())
            })
            .await
    }

    async fn release_message(&self, queue: &str, message_id: &str, pop_receipt: &str) -> GatewayResult<()> {
        let queue = queue.to_string();
        let message_id = message_id.to_string();
        let pop_receipt = pop_receipt.to_string();
        self.db
            .run(move |conn| {
                require_queue(conn, &queue)?;
                let released = conn.execute(
                    "UPDATE queue_messages SET visible_at = ?1, pop_receipt = NULL
                     WHERE queue = ?2 AND message_id = ?3 AND pop_receipt = ?4",
                    params![now_millis(), queue, message_id, pop_receipt],
                )?;
                if released == 0 {
                    return Err(stale_receipt(&queue, &message_id));
                }
                debug!("Released message {} on {}", message_id, queue);
                Ok(())
            })
            .await
    }

    async fn approximate_message_count(&self, queue: &str) -> GatewayResult<u64> {
        let queue = queue.to_string();
        self.db
            .run(move |conn| {
                require_queue(conn, &queue)?;
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM queue_messages WHERE queue = ?1",
                    params![queue],
                    |row| row.get(0),
                )?;
                Ok(count as u64)
            })
            .await
    }
}
