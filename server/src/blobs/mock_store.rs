//! Mock blob storage implementation for testing

use crate::blobs::{content_md5, BlobProperties, BlobStorage, PublicAccess};
use crate::error::{GatewayError, GatewayResult, ResourceKind};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

struct MockContainer {
    access: PublicAccess,
    blobs: HashMap<String, Bytes>,
}

/// A mock blob storage implementation that keeps containers in memory
pub struct MockBlobStore {
    containers: Arc<Mutex<HashMap<String, MockContainer>>>,
}

impl MockBlobStore {
    pub fn new() -> Self {
        Self {
            containers: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Number of blobs in a container (useful for testing)
    pub fn blob_count(&self, container: &str) -> usize {
        self.containers
            .lock()
            .map(|c| c.get(container).map(|c| c.blobs.len()).unwrap_or(0))
            .unwrap_or(0)
    }

    fn lock(&self) -> GatewayResult<MutexGuard<'_, HashMap<String, MockContainer>>> {
        self.containers
            .lock()
            .map_err(|_| GatewayError::transient_msg("mock blob store lock poisoned"))
    }
}

impl Default for MockBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

fn container_mut<'a>(
    containers: &'a mut HashMap<String, MockContainer>,
    container: &str,
) -> GatewayResult<&'a mut MockContainer> {
    containers
        .get_mut(container)
        .ok_or_else(|| GatewayError::not_found(ResourceKind::Container, container))
}

#[async_trait]
impl BlobStorage for MockBlobStore {
    async fn create_container_if_not_exists(&self, container: &str, access: PublicAccess) -> GatewayResult<bool> {
        let mut containers = self.lock()?;
        if containers.contains_key(container) {
            return Ok(false);
        }
        containers.insert(
            container.to_string(),
            MockContainer {
                access,
                blobs: HashMap::new(),
            },
        );
        Ok(true)
    }

    async fn container_exists(&self, container: &str) -> GatewayResult<bool> {
        Ok(self.lock()?.contains_key(container))
    }

    async fn list_containers(&self) -> GatewayResult<Vec<String>> {
        let mut names: Vec<String> = self.lock()?.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn container_access(&self, container: &str) -> GatewayResult<PublicAccess> {
        let mut containers = self.lock()?;
        Ok(container_mut(&mut containers, container)?.access)
    }

    async fn put_blob(&self, container: &str, name: &str, data: Bytes) -> GatewayResult<BlobProperties> {
        let mut containers = self.lock()?;
        let target = container_mut(&mut containers, container)?;
        let properties = BlobProperties {
            container: container.to_string(),
            name: name.to_string(),
            size: data.len() as u64,
            content_md5: content_md5(&data),
            last_modified: Utc::now(),
        };
        target.blobs.insert(name.to_string(), data);
        Ok(properties)
    }

    async fn get_blob(&self, container: &str, name: &str) -> GatewayResult<Bytes> {
        let mut containers = self.lock()?;
        container_mut(&mut containers, container)?
            .blobs
            .get(name)
            .cloned()
            .ok_or_else(|| GatewayError::not_found(ResourceKind::Blob, format!("{}/{}", container, name)))
    }

    async fn delete_blob_if_exists(&self, container: &str, name: &str) -> GatewayResult<bool> {
        let mut containers = self.lock()?;
        Ok(container_mut(&mut containers, container)?.blobs.remove(name).is_some())
    }

    fn blob_url(&self, container: &str, name: &str) -> String {
        format!("memory://{}/{}", container, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_blob_store_basic_operations() {
        let store = MockBlobStore::new();
        store
            .create_container_if_not_exists("payment-proofs", PublicAccess::Private)
            .await
            .unwrap();

        store
            .put_blob("payment-proofs", "p.pdf", Bytes::from_static(b"%PDF"))
            .await
            .unwrap();
        assert_eq!(store.blob_count("payment-proofs"), 1);
        assert_eq!(store.get_blob("payment-proofs", "p.pdf").await.unwrap(), Bytes::from_static(b"%PDF"));

        assert!(store.delete_blob_if_exists("payment-proofs", "p.pdf").await.unwrap());
        assert_eq!(store.blob_count("payment-proofs"), 0);
        assert_eq!(store.blob_url("payment-proofs", "p.pdf"), "memory://payment-proofs/p.pdf");
    }
}
