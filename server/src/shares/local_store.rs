//! Local filesystem file share implementation
//!
//! Each share is a directory under the base path; its directories and files
//! map one to one onto the filesystem.

use crate::blobs::local_store::write_atomically;
use crate::error::{GatewayError, GatewayResult, ResourceKind};
use crate::shares::{file_path, FileProperties, FileShareStorage};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use log::{debug, info};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;

const STAGING_DIR: &str = ".tmp";

pub struct LocalFileShareStore {
    base_path: PathBuf,
}

impl LocalFileShareStore {
    pub fn new(base_path: impl Into<PathBuf>) -> GatewayResult<Self> {
        let base_path = base_path.into();
        std::fs::create_dir_all(base_path.join(STAGING_DIR))?;
        info!("Using file share directory: {}", base_path.display());
        Ok(Self { base_path })
    }

    fn share_dir(&self, share: &str) -> PathBuf {
        self.base_path.join(share)
    }

    fn directory_path(&self, share: &str, directory: &str) -> PathBuf {
        if directory.is_empty() {
            self.share_dir(share)
        } else {
            self.share_dir(share).join(directory)
        }
    }

    async fn require_share(&self, share: &str) -> GatewayResult<()> {
        if is_dir(&self.share_dir(share)).await? {
            Ok(())
        } else {
            Err(GatewayError::not_found(ResourceKind::Share, share))
        }
    }

    async fn require_directory(&self, share: &str, directory: &str) -> GatewayResult<()> {
        self.require_share(share).await?;
        if is_dir(&self.directory_path(share, directory)).await? {
            Ok(())
        } else {
            Err(GatewayError::not_found(ResourceKind::Directory, format!("{}/{}", share, directory)))
        }
    }
}

async fn is_dir(path: &Path) -> GatewayResult<bool> {
    match fs::metadata(path).await {
        Ok(meta) => Ok(meta.is_dir()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

async fn list_subdirectories(path: &Path) -> GatewayResult<Vec<String>> {
    let mut names = Vec::new();
    let mut entries = fs::read_dir(path).await?;
    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_dir() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            if name != STAGING_DIR {
                names.push(name.to_string());
            }
        }
    }
    names.sort();
    Ok(names)
}

#[async_trait]
impl FileShareStorage for LocalFileShareStore {
    async fn create_share_if_not_exists(&self, share: &str) -> GatewayResult<bool> {
        let path = self.share_dir(share);
        if is_dir(&path).await? {
            return Ok(false);
        }
        fs::create_dir_all(&path).await?;
        info!("Created file share {}", share);
        Ok(true)
    }

    async fn share_exists(&self, share: &str) -> GatewayResult<bool> {
        is_dir(&self.share_dir(share)).await
    }

    async fn list_shares(&self) -> GatewayResult<Vec<String>> {
        list_subdirectories(&self.base_path).await
    }

    async fn create_directory_if_not_exists(&self, share: &str, directory: &str) -> GatewayResult<bool> {
        self.require_share(share).await?;
        if directory.is_empty() {
            return Ok(false);
        }
        let path = self.directory_path(share, directory);
        if is_dir(&path).await? {
            return Ok(false);
        }
        fs::create_dir_all(&path).await?;
        info!("Created directory {}/{}", share, directory);
        Ok(true)
    }

    async fn directory_exists(&self, share: &str, directory: &str) -> GatewayResult<bool> {
        self.require_share(share).await?;
        is_dir(&self.directory_path(share, directory)).await
    }

    async fn list_directories(&self, share: &str) -> GatewayResult<Vec<String>> {
        self.require_share(share).await?;
        list_subdirectories(&self.share_dir(share)).await
    }

    async fn upload_file(
        &self,
        share: &str,
        directory: &str,
        file_name: &str,
        data: Bytes,
    ) -> GatewayResult<FileProperties> {
        self.require_directory(share, directory).await?;
        let target = self.directory_path(share, directory).join(file_name);
        write_atomically(&self.base_path.join(STAGING_DIR), &target, &data).await?;
        debug!("Wrote file {} ({} bytes)", file_path(share, directory, file_name), data.len());

        Ok(FileProperties {
            share: share.to_string(),
            directory: directory.to_string(),
            name: file_name.to_string(),
            size: data.len() as u64,
            last_modified: Utc::now(),
        })
    }

    async fn download_file(&self, share: &str, directory: &str, file_name: &str) -> GatewayResult<Bytes> {
        self.require_directory(share, directory).await?;
        match fs::read(self.directory_path(share, directory).join(file_name)).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(GatewayError::not_found(ResourceKind::File, file_path(share, directory, file_name)))
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_local_share_layout() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFileShareStore::new(dir.path()).unwrap();

        assert!(store.create_share_if_not_exists("contracts").await.unwrap());
        assert!(store.create_directory_if_not_exists("contracts", "payments").await.unwrap());
        assert!(!store.create_directory_if_not_exists("contracts", "").await.unwrap());

        store
            .upload_file("contracts", "payments", "proof.pdf", Bytes::from_static(b"%PDF-1.4"))
            .await
            .unwrap();
        assert!(dir.path().join("contracts").join("payments").join("proof.pdf").exists());

        // staging area is not a share
        assert_eq!(store.list_shares().await.unwrap(), vec!["contracts"]);
        assert_eq!(store.list_directories("contracts").await.unwrap(), vec!["payments"]);
    }

    #[tokio::test]
    async fn test_upload_into_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFileShareStore::new(dir.path()).unwrap();
        store.create_share_if_not_exists("contracts").await.unwrap();
        let err = store
            .upload_file("contracts", "invoices", "a.pdf", Bytes::from_static(b"x"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
