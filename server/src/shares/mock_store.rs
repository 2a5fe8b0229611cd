//! Mock file share implementation for testing

use crate::error::{GatewayError, GatewayResult, ResourceKind};
use crate::shares::{file_path, FileProperties, FileShareStorage};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

/// Files of one share, keyed by directory ("" is the root) then file name
type MockShare = BTreeMap<String, HashMap<String, Bytes>>;

pub struct MockFileShareStore {
    shares: Arc<Mutex<HashMap<String, MockShare>>>,
}

impl MockFileShareStore {
    pub fn new() -> Self {
        Self {
            shares: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn lock(&self) -> GatewayResult<MutexGuard<'_, HashMap<String, MockShare>>> {
        self.shares
            .lock()
            .map_err(|_| GatewayError::transient_msg("mock file share lock poisoned"))
    }
}

impl Default for MockFileShareStore {
    fn default() -> Self {
        Self::new()
    }
}

fn share_mut<'a>(shares: &'a mut HashMap<String, MockShare>, share: &str) -> GatewayResult<&'a mut MockShare> {
    shares
        .get_mut(share)
        .ok_or_else(|| GatewayError::not_found(ResourceKind::Share, share))
}

fn directory_mut<'a>(
    shares: &'a mut HashMap<String, MockShare>,
    share: &str,
    directory: &str,
) -> GatewayResult<&'a mut HashMap<String, Bytes>> {
    share_mut(shares, share)?
        .get_mut(directory)
        .ok_or_else(|| GatewayError::not_found(ResourceKind::Directory, format!("{}/{}", share, directory)))
}

#[async_trait]
impl FileShareStorage for MockFileShareStore {
    async fn create_share_if_not_exists(&self, share: &str) -> GatewayResult<bool> {
        let mut shares = self.lock()?;
        if shares.contains_key(share) {
            return Ok(false);
        }
        let mut root = MockShare::new();
        root.insert(String::new(), HashMap::new());
        shares.insert(share.to_string(), root);
        Ok(true)
    }

    async fn share_exists(&self, share: &str) -> GatewayResult<bool> {
        Ok(self.lock()?.contains_key(share))
    }

    async fn list_shares(&self) -> GatewayResult<Vec<String>> {
        let mut names: Vec<String> = self.lock()?.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn create_directory_if_not_exists(&self, share: &str, directory: &str) -> GatewayResult<bool> {
        let mut shares = self.lock()?;
        let target = share_mut(&mut shares, share)?;
        if target.contains_key(directory) {
            return Ok(false);
        }
        target.insert(directory.to_string(), HashMap::new());
        Ok(true)
    }

    async fn directory_exists(&self, share: &str, directory: &str) -> GatewayResult<bool> {
        let mut shares = self.lock()?;
        Ok(share_mut(&mut shares, share)?.contains_key(directory))
    }

    async fn list_directories(&self, share: &str) -> GatewayResult<Vec<String>> {
        let mut shares = self.lock()?;
        Ok(share_mut(&mut shares, share)?
            .keys()
            .filter(|d| !d.is_empty())
            .cloned()
            .collect())
    }

    async fn upload_file(
        &self,
        share: &str,
        directory: &str,
        file_name: &str,
        data: Bytes,
    ) -> GatewayResult<FileProperties> {
        let mut shares = self.lock()?;
        let files = directory_mut(&mut shares, share, directory)?;
        let properties = FileProperties {
            share: share.to_string(),
            directory: directory.to_string(),
            name: file_name.to_string(),
            size: data.len() as u64,
            last_modified: Utc::now(),
        };
        files.insert(file_name.to_string(), data);
        Ok(properties)
    }

    async fn download_file(&self, share: &str, directory: &str, file_name: &str) -> GatewayResult<Bytes> {
        let mut shares = self.lock()?;
        directory_mut(&mut shares, share, directory)?
            .get(file_name)
            .cloned()
            .ok_or_else(|| GatewayError::not_found(ResourceKind::File, file_path(share, directory, file_name)))
    }
}
