//! Configuration for blob storage backends

use crate::blobs::{local_store::LocalBlobStore, mock_store::MockBlobStore, BlobStorage};
use crate::error::GatewayResult;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::env;
use std::sync::Arc;

/// Available blob storage backends
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlobBackend {
    Local,
    Mock,
}

impl Default for BlobBackend {
    fn default() -> Self {
        BlobBackend::Local
    }
}

impl std::str::FromStr for BlobBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" | "localfs" | "fs" => Ok(BlobBackend::Local),
            "mock" => Ok(BlobBackend::Mock),
            _ => Err(format!("Unknown blob storage backend: {}", s)),
        }
    }
}

/// Configuration for blob storage
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BlobConfig {
    pub backend: BlobBackend,
    /// Base path for blob files
    pub base_path: String,
    /// Prefix of the URLs handed out for public blobs
    pub public_base_url: String,
}

impl Default for BlobConfig {
    fn default() -> Self {
        Self {
            backend: BlobBackend::default(),
            base_path: "./data/blobs".to_string(),
            public_base_url: "http://127.0.0.1:10000/retailstore".to_string(),
        }
    }
}

impl BlobConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Override fields from `BLOB_BACKEND`, `BLOB_DIRECTORY` and `BLOB_PUBLIC_BASE_URL`
    pub fn apply_env(&mut self) {
        if let Ok(backend_str) = env::var("BLOB_BACKEND") {
            match backend_str.parse::<BlobBackend>() {
                Ok(backend) => {
                    info!("Using blob storage backend from environment: {:?}", backend);
                    self.backend = backend;
                }
                Err(e) => warn!("Invalid blob storage backend in environment: {}. Keeping {:?}.", e, self.backend),
            }
        }
        if let Ok(dir) = env::var("BLOB_DIRECTORY") {
            info!("Using blob directory from environment: {}", dir);
            self.base_path = dir;
        }
        if let Ok(url) = env::var("BLOB_PUBLIC_BASE_URL") {
            self.public_base_url = url;
        }
    }

    /// Create a blob storage instance based on the configuration
    pub fn create_store(&self) -> GatewayResult<Arc<dyn BlobStorage>> {
        match self.backend {
            BlobBackend::Local => {
                info!("Creating local blob storage backend");
                Ok(Arc::new(LocalBlobStore::new(&self.base_path, self.public_base_url.clone())?))
            }
            BlobBackend::Mock => {
                info!("Creating Mock blob storage backend");
                Ok(Arc::new(MockBlobStore::new()))
            }
        }
    }
}
