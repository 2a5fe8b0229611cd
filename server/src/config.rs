//! Application Configuration
//!
//! Configuration is read from a YAML file with sensible defaults for every
//! missing section, then individual fields can be overridden from the
//! environment (see each family's `apply_env`).

use crate::blobs::config::BlobConfig;
use crate::error::{GatewayError, GatewayResult};
use crate::provisioning::ProvisioningPlan;
use crate::queues::config::QueueConfig;
use crate::records::config::RecordConfig;
use crate::shares::config::ShareConfig;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;

/// Default configuration file, relative to the working directory
pub const DEFAULT_CONFIG_FILE: &str = "gateway.yaml";

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub records: RecordConfig,
    pub blobs: BlobConfig,
    pub queues: QueueConfig,
    pub shares: ShareConfig,
    /// Resources created before the gateway is handed out
    pub provisioning: ProvisioningPlan,
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Path to the log4rs configuration file
    pub config_file: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            config_file: "gateway_log.yaml".to_string(),
        }
    }
}

impl AppConfig {
    /// Load from `GATEWAY_CONFIG` (or `gateway.yaml`), then apply environment overrides
    pub fn load() -> GatewayResult<Self> {
        let path = env::var("GATEWAY_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        let mut config = Self::load_from(Path::new(&path))?;
        config.apply_env();
        Ok(config)
    }

    /// Load from a file, falling back to defaults when it does not exist
    pub fn load_from(path: &Path) -> GatewayResult<Self> {
        if !path.exists() {
            warn!("Config file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        let config = Self::from_yaml(&content)
            .map_err(|e| GatewayError::invalid(format!("{}: {}", path.display(), e)))?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(content)
    }

    /// Apply every family's environment overrides
    pub fn apply_env(&mut self) {
        self.records.apply_env();
        self.blobs.apply_env();
        self.queues.apply_env();
        self.shares.apply_env();
    }

    /// All-mock configuration, for tests and dry runs
    pub fn mock() -> Self {
        use crate::blobs::config::BlobBackend;
        use crate::queues::config::QueueBackend;
        use crate::records::config::RecordBackend;
        use crate::shares::config::ShareBackend;

        let mut config = Self::default();
        config.records.backend = RecordBackend::Mock;
        config.blobs.backend = BlobBackend::Mock;
        config.queues.backend = QueueBackend::Mock;
        config.shares.backend = ShareBackend::Mock;
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blobs::config::BlobBackend;
    use crate::records::config::RecordBackend;
    use serial_test::serial;

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = r#"
records:
  backend: mock
blobs:
  public_base_url: "https://cdn.example.com/store"
logging:
  config_file: custom_log.yaml
"#;
        let config = AppConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.records.backend, RecordBackend::Mock);
        assert_eq!(config.records.db_path, "./data/records.db");
        assert_eq!(config.blobs.backend, BlobBackend::Local);
        assert_eq!(config.blobs.public_base_url, "https://cdn.example.com/store");
        assert_eq!(config.logging.config_file, "custom_log.yaml");
        assert_eq!(config.provisioning, ProvisioningPlan::retail());
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load_from(&dir.path().join("absent.yaml")).unwrap();
        assert_eq!(config.logging.config_file, "gateway_log.yaml");
        assert_eq!(config.queues.visibility_timeout_secs, 30);
    }

    #[test]
    fn test_malformed_file_is_invalid_input() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gateway.yaml");
        fs::write(&path, "records: [unterminated").unwrap();
        let err = AppConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, GatewayError::InvalidInput(_)));
    }

    #[test]
    #[serial]
    fn test_env_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gateway.yaml");
        fs::write(&path, "records:\n  backend: sqlite\n").unwrap();

        env::set_var("GATEWAY_CONFIG", &path);
        env::set_var("RECORD_BACKEND", "mock");
        let config = AppConfig::load().unwrap();
        assert_eq!(config.records.backend, RecordBackend::Mock);

        env::remove_var("GATEWAY_CONFIG");
        env::remove_var("RECORD_BACKEND");
    }
}
