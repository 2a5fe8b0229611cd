//! File Share Storage Layer
//!
//! A share is a named root holding directories and files. Files keep the name
//! they were uploaded with; an empty directory name addresses the share root.

pub mod config;
pub mod local_store;
pub mod mock_store;

#[cfg(test)]
mod comprehensive_test;

use crate::error::GatewayResult;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};

/// Properties recorded when a file is written
#[derive(Debug, Clone, PartialEq)]
pub struct FileProperties {
    pub share: String,
    pub directory: String,
    pub name: String,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
}

/// Trait defining the file share interface
#[async_trait]
pub trait FileShareStorage: Send + Sync {
    /// Create a share; returns `true` when it did not exist before
    async fn create_share_if_not_exists(&self, share: &str) -> GatewayResult<bool>;

    async fn share_exists(&self, share: &str) -> GatewayResult<bool>;

    async fn list_shares(&self) -> GatewayResult<Vec<String>>;

    /// Create a directory directly under the share root. The root itself
    /// (`""`) always exists, so this returns `false` for it.
    async fn create_directory_if_not_exists(&self, share: &str, directory: &str) -> GatewayResult<bool>;

    async fn directory_exists(&self, share: &str, directory: &str) -> GatewayResult<bool>;

    async fn list_directories(&self, share: &str) -> GatewayResult<Vec<String>>;

    /// Write a file, replacing any previous content under the same name
    async fn upload_file(&self, share: &str, directory: &str, file_name: &str, data: Bytes)
        -> GatewayResult<FileProperties>;

    async fn download_file(&self, share: &str, directory: &str, file_name: &str) -> GatewayResult<Bytes>;
}

/// Display path of a file for error messages
pub(crate) fn file_path(share: &str, directory: &str, file_name: &str) -> String {
    if directory.is_empty() {
        format!("{}/{}", share, file_name)
    } else {
        format!("{}/{}/{}", share, directory, file_name)
    }
}
