//! Message Queue Storage Layer
//!
//! Queues hold opaque string payloads. A receive hides the message for a
//! visibility timeout and hands out a pop receipt; only the holder of the
//! current receipt can delete or release it. A message whose lease runs out
//! becomes visible again, so delivery is at-least-once.

pub mod config;
pub mod mock_store;
pub mod sqlite_store;

#[cfg(test)]
mod comprehensive_test;

use crate::error::GatewayResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Largest payload accepted by `send_message`
pub const MAX_MESSAGE_BYTES: usize = 64 * 1024;

/// Visibility timeout used by receive-and-delete
pub const DEFAULT_VISIBILITY_TIMEOUT: Duration = Duration::from_secs(30);

/// Acknowledgement returned by a send
#[derive(Debug, Clone, PartialEq)]
pub struct MessageReceipt {
    pub message_id: String,
    pub inserted_on: DateTime<Utc>,
}

/// A message handed out by a receive, together with its lease
#[derive(Debug, Clone, PartialEq)]
pub struct ReceivedMessage {
    pub message_id: String,
    /// Receipt of this delivery; superseded by the next receive of the message
    pub pop_receipt: String,
    pub text: String,
    /// Number of times the message has been handed out, this delivery included
    pub dequeue_count: u32,
    pub inserted_on: DateTime<Utc>,
}

/// Trait defining the queue storage interface
#[async_trait]
pub trait QueueStorage: Send + Sync {
    /// Create a queue; returns `true` when it did not exist before
    async fn create_queue_if_not_exists(&self, queue: &str) -> GatewayResult<bool>;

    async fn queue_exists(&self, queue: &str) -> GatewayResult<bool>;

    async fn list_queues(&self) -> GatewayResult<Vec<String>>;

    /// Append a message to the tail of the queue
    async fn send_message(&self, queue: &str, text: &str) -> GatewayResult<MessageReceipt>;

    /// Lease the oldest visible message, hiding it for `visibility_timeout`
    async fn receive_message(&self, queue: &str, visibility_timeout: Duration)
        -> GatewayResult<Option<ReceivedMessage>>;

    /// Delete a leased message. Fails with `NotFound` when the receipt is no
    /// longer current.
    async fn delete_message(&self, queue: &str, message_id: &str, pop_receipt: &str) -> GatewayResult<()>;

    /// Give up a lease so the message is visible again right away
    async fn release_message(&self, queue: &str, message_id: &str, pop_receipt: &str) -> GatewayResult<()>;

    /// Number of messages in the queue, visible or leased
    async fn approximate_message_count(&self, queue: &str) -> GatewayResult<u64>;
}

pub(crate) fn new_message_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

pub(crate) fn new_pop_receipt() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}
