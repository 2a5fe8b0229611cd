//! Local filesystem blob storage implementation
//!
//! Layout under the base path:
//!
//! ```text
//! <base>/<container>/<blob>            blob content
//! <base>/<container>.container.json    container properties
//! <base>/.tmp/                         staging area for atomic writes
//! ```

use crate::blobs::{content_md5, BlobProperties, BlobStorage, PublicAccess};
use crate::error::{GatewayError, GatewayResult, ResourceKind};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;

const STAGING_DIR: &str = ".tmp";
const CONTAINER_SUFFIX: &str = ".container.json";

#[derive(Debug, Serialize, Deserialize)]
struct ContainerProperties {
    access: PublicAccess,
    created_at: DateTime<Utc>,
}

/// Blob storage backed by plain files
pub struct LocalBlobStore {
    base_path: PathBuf,
    public_base_url: String,
}

impl LocalBlobStore {
    pub fn new(base_path: impl Into<PathBuf>, public_base_url: impl Into<String>) -> GatewayResult<Self> {
        let base_path = base_path.into();
        std::fs::create_dir_all(base_path.join(STAGING_DIR))?;
        info!("Using blob directory: {}", base_path.display());
        Ok(Self {
            base_path,
            public_base_url: public_base_url.into(),
        })
    }

    fn container_dir(&self, container: &str) -> PathBuf {
        self.base_path.join(container)
    }

    fn container_file(&self, container: &str) -> PathBuf {
        self.base_path.join(format!("{}{}", container, CONTAINER_SUFFIX))
    }

    async fn require_container(&self, container: &str) -> GatewayResult<()> {
        if fs::try_exists(self.container_file(container)).await? {
            Ok(())
        } else {
            Err(GatewayError::not_found(ResourceKind::Container, container))
        }
    }
}

/// Write through a staging file and rename, so readers never see a partial blob
pub(crate) async fn write_atomically(staging_root: &Path, target: &Path, data: &[u8]) -> GatewayResult<()> {
    let staging = staging_root.join(uuid::Uuid::new_v4().to_string());
    fs::write(&staging, data).await?;
    if let Err(e) = fs::rename(&staging, target).await {
        let _ = fs::remove_file(&staging).await;
        return Err(e.into());
    }
    Ok(())
}

#[async_trait]
impl BlobStorage for LocalBlobStore {
    async fn create_container_if_not_exists(&self, container: &str, access: PublicAccess) -> GatewayResult<bool> {
        let marker = self.container_file(container);
        fs::create_dir_all(self.container_dir(container)).await?;
        if fs::try_exists(&marker).await? {
            return Ok(false);
        }

        let properties = ContainerProperties {
            access,
            created_at: Utc::now(),
        };
        let body = serde_json::to_vec_pretty(&properties)?;
        write_atomically(&self.base_path.join(STAGING_DIR), &marker, &body).await?;
        info!("Created container {} with {:?} access", container, access);
        Ok(true)
    }

    async fn container_exists(&self, container: &str) -> GatewayResult<bool> {
        Ok(fs::try_exists(self.container_file(container)).await?)
    }

    async fn list_containers(&self) -> GatewayResult<Vec<String>> {
        let mut names = Vec::new();
        let mut entries = fs::read_dir(&self.base_path).await?;
        while let Some(entry) = entries.next_entry().await? {
            let file_name = entry.file_name();
            if let Some(name) = file_name.to_str().and_then(|n| n.strip_suffix(CONTAINER_SUFFIX)) {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    async fn container_access(&self, container: &str) -> GatewayResult<PublicAccess> {
        match fs::read(self.container_file(container)).await {
            Ok(raw) => {
                let properties: ContainerProperties = serde_json::from_slice(&raw)?;
                Ok(properties.access)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(GatewayError::not_found(ResourceKind::Container, container))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn put_blob(&self, container: &str, name: &str, data: Bytes) -> GatewayResult<BlobProperties> {
        self.require_container(container).await?;
        let target = self.container_dir(container).join(name);
        write_atomically(&self.base_path.join(STAGING_DIR), &target, &data).await?;
        debug!("Wrote blob {}/{} ({} bytes)", container, name, data.len());

        Ok(BlobProperties {
            container: container.to_string(),
            name: name.to_string(),
            size: data.len() as u64,
            content_md5: content_md5(&data),
            last_modified: Utc::now(),
        })
    }

    async fn get_blob(&self, container: &str, name: &str) -> GatewayResult<Bytes> {
        self.require_container(container).await?;
        match fs::read(self.container_dir(container).join(name)).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(GatewayError::not_found(ResourceKind::Blob, format!("{}/{}", container, name)))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete_blob_if_exists(&self, container: &str, name: &str) -> GatewayResult<bool> {
        self.require_container(container).await?;
        match fs::remove_file(self.container_dir(container).join(name)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn blob_url(&self, container: &str, name: &str) -> String {
        format!("{}/{}/{}", self.public_base_url.trim_end_matches('/'), container, name)
    }
}
