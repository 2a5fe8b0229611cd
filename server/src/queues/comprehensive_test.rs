//! Exercises every queue backend through the QueueStorage trait

#[cfg(test)]
mod integration_tests {
    use crate::queues::config::{QueueBackend, QueueConfig};
    use crate::queues::QueueStorage;
    use std::sync::Arc;
    use std::time::Duration;

    fn stores(dir: &tempfile::TempDir) -> Vec<(&'static str, Arc<dyn QueueStorage>)> {
        let sqlite = QueueConfig {
            backend: QueueBackend::SQLite,
            db_path: dir.path().join("queues.db").to_string_lossy().into_owned(),
            wal_mode: false,
            ..QueueConfig::default()
        };
        let mock = QueueConfig {
            backend: QueueBackend::Mock,
            ..QueueConfig::default()
        };
        vec![
            ("sqlite", sqlite.create_store().unwrap()),
            ("mock", mock.create_store().unwrap()),
        ]
    }

    #[tokio::test]
    async fn test_expired_lease_is_redelivered() {
        let dir = tempfile::tempdir().unwrap();
        for (name, store) in stores(&dir) {
            store.create_queue_if_not_exists("order-notifications").await.unwrap();
            store.send_message("order-notifications", "payload").await.unwrap();

            let first = store
                .receive_message("order-notifications", Duration::from_millis(50))
                .await
                .unwrap()
                .unwrap();
            assert!(
                store
                    .receive_message("order-notifications", Duration::from_millis(50))
                    .await
                    .unwrap()
                    .is_none(),
                "{}: leased message must be hidden",
                name
            );

            tokio::time::sleep(Duration::from_millis(120)).await;

            let second = store
                .receive_message("order-notifications", Duration::from_secs(30))
                .await
                .unwrap()
                .unwrap();
            assert_eq!(second.message_id, first.message_id, "{}", name);
            assert_eq!(second.dequeue_count, 2, "{}", name);

            let stale = store
                .delete_message("order-notifications", &first.message_id, &first.pop_receipt)
                .await
                .unwrap_err();
            assert!(stale.is_not_found(), "{}: stale receipt", name);

            store
                .delete_message("order-notifications", &second.message_id, &second.pop_receipt)
                .await
                .unwrap();
            assert_eq!(store.approximate_message_count("order-notifications").await.unwrap(), 0);
        }
    }

    #[tokio::test]
    async fn test_queues_are_isolated() {
        let dir = tempfile::tempdir().unwrap();
        for (name, store) in stores(&dir) {
            store.create_queue_if_not_exists("stock-updates").await.unwrap();
            store.create_queue_if_not_exists("welcome-emails").await.unwrap();
            store.send_message("stock-updates", "s").await.unwrap();

            assert!(
                store
                    .receive_message("welcome-emails", Duration::from_secs(1))
                    .await
                    .unwrap()
                    .is_none(),
                "{}",
                name
            );
            assert_eq!(store.list_queues().await.unwrap(), vec!["stock-updates", "welcome-emails"]);
        }
    }
}
