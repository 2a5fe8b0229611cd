//! Mock implementation of QueueStorage trait for testing

use crate::error::{GatewayError, GatewayResult, ResourceKind};
use crate::queues::{new_message_id, new_pop_receipt, MessageReceipt, QueueStorage, ReceivedMessage};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

struct MockMessage {
    message_id: String,
    text: String,
    inserted_on: DateTime<Utc>,
    visible_at: DateTime<Utc>,
    pop_receipt: Option<String>,
    dequeue_count: u32,
}

/// In-memory QueueStorage; messages are kept in send order
pub struct MockQueueStore {
    queues: Arc<Mutex<HashMap<String, VecDeque<MockMessage>>>>,
}

impl MockQueueStore {
    pub fn new() -> Self {
        Self {
            queues: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Payloads currently stored in a queue, oldest first
    pub fn peek_all(&self, queue: &str) -> Vec<String> {
        self.queues
            .lock()
            .map(|q| {
                q.get(queue)
                    .map(|messages| messages.iter().map(|m| m.text.clone()).collect())
                    .unwrap_or_default()
            })
            .unwrap_or_default()
    }

    fn lock(&self) -> GatewayResult<MutexGuard<'_, HashMap<String, VecDeque<MockMessage>>>> {
        self.queues
            .lock()
            .map_err(|_| GatewayError::transient_msg("mock queue store lock poisoned"))
    }
}

impl Default for MockQueueStore {
    fn default() -> Self {
        Self::new()
    }
}

fn queue_mut<'a>(
    queues: &'a mut HashMap<String, VecDeque<MockMessage>>,
    queue: &str,
) -> GatewayResult<&'a mut VecDeque<MockMessage>> {
    queues
        .get_mut(queue)
        .ok_or_else(|| GatewayError::not_found(ResourceKind::Queue, queue))
}

fn position_of(messages: &VecDeque<MockMessage>, queue: &str, message_id: &str, pop_receipt: &str) -> GatewayResult<usize> {
    messages
        .iter()
        .position(|m| m.message_id == message_id && m.pop_receipt.as_deref() == Some(pop_receipt))
        .ok_or_else(|| GatewayError::not_found(ResourceKind::Message, format!("{}/{}", queue, message_id)))
}

#[async_trait]
impl QueueStorage for MockQueueStore {
    async fn create_queue_if_not_exists(&self, queue: &str) -> GatewayResult<bool> {
        let mut queues = self.lock()?;
        if queues.contains_key(queue) {
            return Ok(false);
        }
        queues.insert(queue.to_string(), VecDeque::new());
        Ok(true)
    }

    async fn queue_exists(&self, queue: &str) -> GatewayResult<bool> {
        Ok(self.lock()?.contains_key(queue))
    }

    async fn list_queues(&self) -> GatewayResult<Vec<String>> {
        let mut names: Vec<String> = self.lock()?.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn send_message(&self, queue: &str, text: &str) -> GatewayResult<MessageReceipt> {
        let mut queues = self.lock()?;
        let messages = queue_mut(&mut queues, queue)?;
        let now = Utc::now();
        let receipt = MessageReceipt {
            message_id: new_message_id(),
            inserted_on: now,
        };
        messages.push_back(MockMessage {
            message_id: receipt.message_id.clone(),
            text: text.to_string(),
            inserted_on: now,
            visible_at: now,
            pop_receipt: None,
            dequeue_count: 0,
        });
        Ok(receipt)
    }

    async fn receive_message(
        &self,
        queue: &str,
        visibility_timeout: Duration,
    ) -> GatewayResult<Option<ReceivedMessage>> {
        let mut queues = self.lock()?;
        let messages = queue_mut(&mut queues, queue)?;
        let now = Utc::now();
        let Some(message) = messages.iter_mut().find(|m| m.visible_at <= now) else {
            return Ok(None);
        };

        // leases past the representable range saturate, as in the SQLite store
        let visible_at = chrono::Duration::from_std(visibility_timeout)
            .ok()
            .and_then(|lease| now.checked_add_signed(lease))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        let pop_receipt = new_pop_receipt();
        message.visible_at = visible_at;
        message.pop_receipt = Some(pop_receipt.clone());
        message.dequeue_count += 1;

        Ok(Some(ReceivedMessage {
            message_id: message.message_id.clone(),
            pop_receipt,
            text: message.text.clone(),
            dequeue_count: message.dequeue_count,
            inserted_on: message.inserted_on,
        }))
    }

    async fn delete_message(&self, queue: &str, message_id: &str, pop_receipt: &str) -> GatewayResult<()> {
        let mut queues = self.lock()?;
        let messages = queue_mut(&mut queues, queue)?;
        let index = position_of(messages, queue, message_id, pop_receipt)?;
        messages.remove(index);
        Ok(())
    }

    async fn release_message(&self, queue: &str, message_id: &str, pop_receipt: &str) -> GatewayResult<()> {
        let mut queues = self.lock()?;
        let messages = queue_mut(&mut queues, queue)?;
        let index = position_of(messages, queue, message_id, pop_receipt)?;
        let message = &mut messages[index];
        message.visible_at = Utc::now();
        message.pop_receipt = None;
        Ok(())
    }

    async fn approximate_message_count(&self, queue: &str) -> GatewayResult<u64> {
        let mut queues = self.lock()?;
        Ok(queue_mut(&mut queues, queue)?.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_queue_basic_operations() {
        let store = MockQueueStore::new();
        store.create_queue_if_not_exists("welcome-emails").await.unwrap();
        store.send_message("welcome-emails", "a").await.unwrap();
        store.send_message("welcome-emails", "b").await.unwrap();
        assert_eq!(store.peek_all("welcome-emails"), vec!["a", "b"]);

        let msg = store
            .receive_message("welcome-emails", Duration::from_secs(30))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(msg.text, "a");
        store
            .delete_message("welcome-emails", &msg.message_id, &msg.pop_receipt)
            .await
            .unwrap();
        assert_eq!(store.peek_all("welcome-emails"), vec!["b"]);
    }

    #[tokio::test]
    async fn test_mock_queue_unknown_receipt() {
        let store = MockQueueStore::new();
        store.create_queue_if_not_exists("stock-updates").await.unwrap();
        let err = store
            .delete_message("stock-updates", "nope", "nope")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_mock_queue_huge_lease_saturates() {
        let store = MockQueueStore::new();
        store.create_queue_if_not_exists("order-notifications").await.unwrap();
        store.send_message("order-notifications", "a").await.unwrap();

        let huge = Duration::from_millis(i64::MAX as u64);
        let msg = store
            .receive_message("order-notifications", huge)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(msg.text, "a");
        assert!(store
            .receive_message("order-notifications", Duration::from_secs(u64::MAX))
            .await
            .unwrap()
            .is_none());
        assert_eq!(store.approximate_message_count("order-notifications").await.unwrap(), 1);
    }
}
