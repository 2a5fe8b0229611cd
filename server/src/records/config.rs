//! Configuration for record storage backends

use crate::error::GatewayResult;
use crate::records::{mock_store::MockRecordStore, sqlite_store::SQLiteRecordStore, RecordStorage};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::sync::Arc;

/// Available record storage backends
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordBackend {
    SQLite,
    Mock,
}

impl Default for RecordBackend {
    fn default() -> Self {
        RecordBackend::SQLite
    }
}

impl std::str::FromStr for RecordBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sqlite" => Ok(RecordBackend::SQLite),
            "mock" => Ok(RecordBackend::Mock),
            _ => Err(format!("Unknown record backend: {}", s)),
        }
    }
}

/// Configuration for record storage
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordConfig {
    pub backend: RecordBackend,
    /// Database file path
    pub db_path: String,
    /// Enable WAL mode
    pub wal_mode: bool,
}

impl Default for RecordConfig {
    fn default() -> Self {
        Self {
            backend: RecordBackend::default(),
            db_path: "./data/records.db".to_string(),
            wal_mode: true,
        }
    }
}

impl RecordConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Override fields from `RECORD_BACKEND` and `RECORD_DB_FILE`
    pub fn apply_env(&mut self) {
        match env::var("RECORD_BACKEND") {
            Ok(backend_str) => match backend_str.parse::<RecordBackend>() {
                Ok(backend) => {
                    info!("Using record backend from environment: {:?}", backend);
                    self.backend = backend;
                }
                Err(e) => {
                    warn!("Invalid record backend in environment: {}. Keeping {:?}.", e, self.backend);
                }
            },
            Err(_) => {}
        }

        if let Ok(path) = env::var("RECORD_DB_FILE") {
            info!("Using record database path from environment: {}", path);
            self.db_path = path;
        }
    }

    /// Create a record storage instance based on the configuration
    pub fn create_store(&self) -> GatewayResult<Arc<dyn RecordStorage>> {
        match self.backend {
            RecordBackend::SQLite => {
                info!("Creating SQLite record store at {}", self.db_path);
                let store = SQLiteRecordStore::open(&PathBuf::from(&self.db_path), self.wal_mode)?;
                Ok(Arc::new(store))
            }
            RecordBackend::Mock => {
                info!("Creating Mock record store");
                Ok(Arc::new(MockRecordStore::new()))
            }
        }
    }
}
