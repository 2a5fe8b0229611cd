//! Blob Storage Layer Abstraction
//!
//! Blobs are opaque byte payloads addressed by container and name. Containers
//! carry a public access class that decides whether anonymous readers may
//! resolve the URLs handed out for their blobs.

pub mod config;
pub mod local_store;
pub mod mock_store;

#[cfg(test)]
mod comprehensive_test;

use crate::error::GatewayResult;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Anonymous read access granted on a container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublicAccess {
    /// No anonymous access
    Private,
    /// Anonymous read of individual blobs
    Blob,
    /// Anonymous read and listing
    Container,
}

impl Default for PublicAccess {
    fn default() -> Self {
        PublicAccess::Private
    }
}

/// Properties recorded when a blob is written
#[derive(Debug, Clone, PartialEq)]
pub struct BlobProperties {
    pub container: String,
    pub name: String,
    pub size: u64,
    /// Hex encoded MD5 of the content
    pub content_md5: String,
    pub last_modified: DateTime<Utc>,
}

pub(crate) fn content_md5(data: &[u8]) -> String {
    hex::encode(md5::compute(data).0)
}

/// Trait defining the blob storage interface
#[async_trait]
pub trait BlobStorage: Send + Sync {
    /// Create a container; returns `true` when it did not exist before. The
    /// access class of an existing container is left untouched.
    async fn create_container_if_not_exists(&self, container: &str, access: PublicAccess) -> GatewayResult<bool>;

    async fn container_exists(&self, container: &str) -> GatewayResult<bool>;

    async fn list_containers(&self) -> GatewayResult<Vec<String>>;

    /// Access class of an existing container
    async fn container_access(&self, container: &str) -> GatewayResult<PublicAccess>;

    /// Write a blob, replacing any previous content under the same name
    async fn put_blob(&self, container: &str, name: &str, data: Bytes) -> GatewayResult<BlobProperties>;

    async fn get_blob(&self, container: &str, name: &str) -> GatewayResult<Bytes>;

    /// Delete a blob; returns whether it existed
    async fn delete_blob_if_exists(&self, container: &str, name: &str) -> GatewayResult<bool>;

    /// Resolvable location of a blob
    fn blob_url(&self, container: &str, name: &str) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_md5_is_hex() {
        assert_eq!(content_md5(b""), "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(content_md5(b"hello").len(), 32);
    }

    #[test]
    fn test_public_access_serde() {
        let yaml = serde_yaml::to_string(&PublicAccess::Blob).unwrap();
        assert_eq!(yaml.trim(), "blob");
        let parsed: PublicAccess = serde_yaml::from_str("private").unwrap();
        assert_eq!(parsed, PublicAccess::Private);
    }
}
