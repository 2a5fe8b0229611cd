//! Configuration for file share backends

use crate::error::GatewayResult;
use crate::shares::{local_store::LocalFileShareStore, mock_store::MockFileShareStore, FileShareStorage};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::env;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShareBackend {
    Local,
    Mock,
}

impl Default for ShareBackend {
    fn default() -> Self {
        ShareBackend::Local
    }
}

impl std::str::FromStr for ShareBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" | "localfs" | "fs" => Ok(ShareBackend::Local),
            "mock" => Ok(ShareBackend::Mock),
            _ => Err(format!("Unknown file share backend: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShareConfig {
    pub backend: ShareBackend,
    pub base_path: String,
}

impl Default for ShareConfig {
    fn default() -> Self {
        Self {
            backend: ShareBackend::default(),
            base_path: "./data/shares".to_string(),
        }
    }
}

impl ShareConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Override fields from `SHARE_BACKEND` and `SHARE_DIRECTORY`
    pub fn apply_env(&mut self) {
        if let Ok(backend_str) = env::var("SHARE_BACKEND") {
            match backend_str.parse::<ShareBackend>() {
                Ok(backend) => {
                    info!("Using file share backend from environment: {:?}", backend);
                    self.backend = backend;
                }
                Err(e) => warn!("Invalid file share backend in environment: {}. Keeping {:?}.", e, self.backend),
            }
        }
        if let Ok(dir) = env::var("SHARE_DIRECTORY") {
            info!("Using file share directory from environment: {}", dir);
            self.base_path = dir;
        }
    }

    pub fn create_store(&self) -> GatewayResult<Arc<dyn FileShareStorage>> {
        match self.backend {
            ShareBackend::Local => {
                info!("Creating local file share backend");
                Ok(Arc::new(LocalFileShareStore::new(&self.base_path)?))
            }
            ShareBackend::Mock => {
                info!("Creating Mock file share backend");
                Ok(Arc::new(MockFileShareStore::new()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_share_config_from_env() {
        env::set_var("SHARE_BACKEND", "MOCK");
        env::set_var("SHARE_DIRECTORY", "/srv/shares");
        let config = ShareConfig::from_env();
        assert_eq!(config.backend, ShareBackend::Mock);
        assert_eq!(config.base_path, "/srv/shares");
        env::remove_var("SHARE_BACKEND");
        env::remove_var("SHARE_DIRECTORY");

        assert_eq!(ShareConfig::from_env().backend, ShareBackend::Local);
    }
}
