//! Configuration for queue storage backends

use crate::error::GatewayResult;
use crate::queues::{mock_store::MockQueueStore, sqlite_store::SQLiteQueueStore, QueueStorage};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::sync::Arc;

/// Available queue storage backends
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueBackend {
    SQLite,
    Mock,
}

impl Default for QueueBackend {
    fn default() -> Self {
        QueueBackend::SQLite
    }
}

impl std::str::FromStr for QueueBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sqlite" => Ok(QueueBackend::SQLite),
            "mock" => Ok(QueueBackend::Mock),
            _ => Err(format!("Unknown queue backend: {}", s)),
        }
    }
}

/// Configuration for queue storage
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub backend: QueueBackend,
    pub db_path: String,
    pub wal_mode: bool,
    /// Lease used by receive-and-delete, in seconds
    pub visibility_timeout_secs: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            backend: QueueBackend::default(),
            db_path: "./data/queues.db".to_string(),
            wal_mode: true,
            visibility_timeout_secs: 30,
        }
    }
}

impl QueueConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Override fields from `QUEUE_BACKEND` and `QUEUE_DB_FILE`
    pub fn apply_env(&mut self) {
        if let Ok(backend_str) = env::var("QUEUE_BACKEND") {
            match backend_str.parse::<QueueBackend>() {
                Ok(backend) => {
                    info!("Using queue backend from environment: {:?}", backend);
                    self.backend = backend;
                }
                Err(e) => warn!("Invalid queue backend in environment: {}. Keeping {:?}.", e, self.backend),
            }
        }

        if let Ok(path) = env::var("QUEUE_DB_FILE") {
            info!("Using queue database path from environment: {}", path);
            self.db_path = path;
        }
    }

    pub fn visibility_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.visibility_timeout_secs)
    }

    /// Create a queue storage instance based on the configuration
    pub fn create_store(&self) -> GatewayResult<Arc<dyn QueueStorage>> {
        match self.backend {
            QueueBackend::SQLite => {
                info!("Creating SQLite queue store at {}", self.db_path);
                let store = SQLiteQueueStore::open(&PathBuf::from(&self.db_path), self.wal_mode)?;
                Ok(Arc::new(store))
            }
            QueueBackend::Mock => {
                info!("Creating Mock queue store");
                Ok(Arc::new(MockQueueStore::new()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_queue_backend_from_str() {
        assert_eq!("SQLITE".parse::<QueueBackend>().unwrap(), QueueBackend::SQLite);
        assert_eq!("mock".parse::<QueueBackend>().unwrap(), QueueBackend::Mock);
        assert!("kafka".parse::<QueueBackend>().is_err());
    }

    #[test]
    #[serial]
    fn test_queue_config_from_env() {
        env::set_var("QUEUE_BACKEND", "mock");
        env::set_var("QUEUE_DB_FILE", "/tmp/q.db");
        let config = QueueConfig::from_env();
        assert_eq!(config.backend, QueueBackend::Mock);
        assert_eq!(config.db_path, "/tmp/q.db");
        env::remove_var("QUEUE_BACKEND");
        env::remove_var("QUEUE_DB_FILE");

        let config = QueueConfig::from_env();
        assert_eq!(config.backend, QueueBackend::SQLite);
        assert_eq!(config.visibility_timeout().as_secs(), 30);
    }
}
