//! The storage gateway: the single value the application layer talks to.
//!
//! Construction is two-phase. Backends are created from configuration, then
//! the provisioning plan is run against them; only when that succeeds is a
//! [`StorageGateway`] handed out.

use crate::blobs::{mock_store::MockBlobStore, BlobStorage, PublicAccess};
use crate::config::AppConfig;
use crate::error::{GatewayError, GatewayResult};
use crate::naming::{base_file_name, extension, validate_key, validate_resource_name, validate_segment};
use crate::provisioning::{ProvisioningPlan, ProvisioningReport, Provisioner};
use crate::queues::{
    mock_store::MockQueueStore, MessageReceipt, QueueStorage, ReceivedMessage, DEFAULT_VISIBILITY_TIMEOUT,
    MAX_MESSAGE_BYTES,
};
use crate::records::{from_stored, mock_store::MockRecordStore, to_properties, Record, RecordStorage};
use crate::shares::{mock_store::MockFileShareStore, FileShareStorage};
use crate::upload::UploadedFile;
use bytes::Bytes;
use chrono::Utc;
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;

/// One handle per storage family, shared for the lifetime of the gateway
#[derive(Clone)]
pub struct StorageBackends {
    pub records: Arc<dyn RecordStorage>,
    pub blobs: Arc<dyn BlobStorage>,
    pub queues: Arc<dyn QueueStorage>,
    pub shares: Arc<dyn FileShareStorage>,
}

impl StorageBackends {
    /// Create the backends named in the configuration
    pub fn from_config(config: &AppConfig) -> GatewayResult<Self> {
        Ok(Self {
            records: config.records.create_store()?,
            blobs: config.blobs.create_store()?,
            queues: config.queues.create_store()?,
            shares: config.shares.create_store()?,
        })
    }

    /// In-memory backends for every family
    pub fn mock() -> Self {
        Self {
            records: Arc::new(MockRecordStore::new()),
            blobs: Arc::new(MockBlobStore::new()),
            queues: Arc::new(MockQueueStore::new()),
            shares: Arc::new(MockFileShareStore::new()),
        }
    }
}

/// Tag log lines of the current operation with the resource it touches
fn tag(family: &str, name: &str) {
    log_mdc::insert("resource", format!("{}:{}", family, name));
}

#[derive(Clone)]
pub struct StorageGateway {
    backends: StorageBackends,
    visibility_timeout: Duration,
    report: Arc<ProvisioningReport>,
}

impl StorageGateway {
    /// Build backends from `config`, provision them, and return the ready gateway
    pub async fn connect(config: &AppConfig) -> GatewayResult<Self> {
        info!("Connecting storage gateway");
        let backends = StorageBackends::from_config(config)
            .map_err(|e| GatewayError::initialization("storage backends", e))?;
        let mut gateway = Self::with_backends(backends, &config.provisioning).await?;
        gateway.visibility_timeout = config.queues.visibility_timeout();
        Ok(gateway)
    }

    /// Provision `plan` against already constructed backends
    pub async fn with_backends(backends: StorageBackends, plan: &ProvisioningPlan) -> GatewayResult<Self> {
        let report = Provisioner::new(&backends, plan).run().await?;
        Ok(Self {
            backends,
            visibility_timeout: DEFAULT_VISIBILITY_TIMEOUT,
            report: Arc::new(report),
        })
    }

    /// A gateway over in-memory backends with the retail layout provisioned
    pub async fn for_testing() -> GatewayResult<Self> {
        Self::with_backends(StorageBackends::mock(), &ProvisioningPlan::retail()).await
    }

    pub fn backends(&self) -> &StorageBackends {
        &self.backends
    }

    /// What provisioning did when this gateway was constructed
    pub fn provisioning_report(&self) -> &ProvisioningReport {
        &self.report
    }

    // Records

    /// Every record of `T`'s table, in no particular order
    pub async fn list_all<T: Record>(&self) -> GatewayResult<Vec<T>> {
        let table = T::table_name();
        tag("table", &table);
        let entities = self.backends.records.query_all(&table).await?;
        debug!("Loaded {} records from {}", entities.len(), table);
        entities.into_iter().map(from_stored).collect()
    }

    /// Fetch one record; `None` when the keys do not exist
    pub async fn get<T: Record>(&self, partition_key: &str, row_key: &str) -> GatewayResult<Option<T>> {
        validate_key("partition key", partition_key)?;
        validate_key("row key", row_key)?;
        let table = T::table_name();
        tag("table", &table);
        match self.backends.records.get_entity(&table, partition_key, row_key).await? {
            Some(entity) => Ok(Some(from_stored(entity)?)),
            None => {
                debug!("No record {}/{} in {}", partition_key, row_key, table);
                Ok(None)
            }
        }
    }

    /// Insert a new record and return it with its assigned version
    pub async fn insert<T: Record>(&self, mut record: T) -> GatewayResult<T> {
        validate_key("partition key", record.partition_key())?;
        validate_key("row key", record.row_key())?;
        let table = T::table_name();
        tag("table", &table);

        let properties = to_properties(&record)?;
        let stored = self
            .backends
            .records
            .insert_entity(&table, record.partition_key(), record.row_key(), properties)
            .await?;
        debug!("Inserted {}/{} into {}", stored.partition_key, stored.row_key, table);

        let meta = record.meta_mut();
        meta.version = Some(stored.version);
        meta.last_modified = Some(stored.last_modified);
        Ok(record)
    }

    /// Replace a record whose version still matches the stored one
    pub async fn update<T: Record>(&self, mut record: T) -> GatewayResult<T> {
        validate_key("partition key", record.partition_key())?;
        validate_key("row key", record.row_key())?;
        let table = T::table_name();
        tag("table", &table);

        let Some(version) = record.version().cloned() else {
            warn!(
                "Update of {}/{} in {} carries no version",
                record.partition_key(),
                record.row_key(),
                table
            );
            return Err(GatewayError::VersionConflict {
                table: table.into_owned(),
                partition_key: record.partition_key().to_string(),
                row_key: record.row_key().to_string(),
            });
        };

        let properties = to_properties(&record)?;
        let stored = self
            .backends
            .records
            .update_entity(&table, record.partition_key(), record.row_key(), properties, &version)
            .await?;
        debug!("Updated {}/{} in {}", stored.partition_key, stored.row_key, table);

        let meta = record.meta_mut();
        meta.version = Some(stored.version);
        meta.last_modified = Some(stored.last_modified);
        Ok(record)
    }

    /// Delete a record. Deleting one that does not exist succeeds.
    pub async fn delete<T: Record>(&self, partition_key: &str, row_key: &str) -> GatewayResult<()> {
        validate_key("partition key", partition_key)?;
        validate_key("row key", row_key)?;
        let table = T::table_name();
        tag("table", &table);
        let existed = self.backends.records.delete_entity(&table, partition_key, row_key).await?;
        if !existed {
            debug!("Delete of absent record {}/{} in {}", partition_key, row_key, table);
        }
        Ok(())
    }

    // Blobs

    /// Store an image under a fresh unique name and return its URL
    pub async fn upload_image(&self, file: &UploadedFile, container: &str) -> GatewayResult<String> {
        validate_resource_name("container", container)?;
        tag("container", container);
        let original = base_file_name(&file.file_name)?;
        let name = format!("{}{}", uuid::Uuid::new_v4(), extension(&original).unwrap_or_default());

        self.backends
            .blobs
            .create_container_if_not_exists(container, PublicAccess::Blob)
            .await?;
        let properties = self.backends.blobs.put_blob(container, &name, file.content.clone()).await?;
        info!("Uploaded image {} as {}/{} ({} bytes)", original, container, name, properties.size);
        Ok(self.backends.blobs.blob_url(container, &name))
    }

    /// Store a private file under a timestamped name and return that name
    pub async fn upload_file(&self, file: &UploadedFile, container: &str) -> GatewayResult<String> {
        validate_resource_name("container", container)?;
        tag("container", container);
        let original = base_file_name(&file.file_name)?;
        let name = format!("{}_{}", Utc::now().format("%Y%m%d_%H%M%S"), original);

        self.backends
            .blobs
            .create_container_if_not_exists(container, PublicAccess::Private)
            .await?;
        let properties = self.backends.blobs.put_blob(container, &name, file.content.clone()).await?;
        info!("Uploaded file {}/{} ({} bytes)", container, name, properties.size);
        Ok(name)
    }

    /// Delete a blob if present; absence is success
    pub async fn delete_blob(&self, name: &str, container: &str) -> GatewayResult<()> {
        validate_resource_name("container", container)?;
        validate_segment("blob", name)?;
        tag("container", container);
        if self.backends.blobs.delete_blob_if_exists(container, name).await? {
            info!("Deleted blob {}/{}", container, name);
        } else {
            debug!("Blob {}/{} was already gone", container, name);
        }
        Ok(())
    }

    pub async fn download_blob(&self, name: &str, container: &str) -> GatewayResult<Bytes> {
        validate_resource_name("container", container)?;
        validate_segment("blob", name)?;
        tag("container", container);
        self.backends.blobs.get_blob(container, name).await
    }

    // File shares

    /// Store a file under its original name in `share/directory`, creating
    /// both when missing. An empty directory is the share root.
    pub async fn upload_to_share(&self, file: &UploadedFile, share: &str, directory: &str) -> GatewayResult<String> {
        validate_resource_name("share", share)?;
        if !directory.is_empty() {
            validate_segment("directory", directory)?;
        }
        tag("share", share);
        let file_name = base_file_name(&file.file_name)?;

        self.backends.shares.create_share_if_not_exists(share).await?;
        self.backends.shares.create_directory_if_not_exists(share, directory).await?;
        let properties = self
            .backends
            .shares
            .upload_file(share, directory, &file_name, file.content.clone())
            .await?;
        info!("Uploaded {} to share {} ({} bytes)", file_name, share, properties.size);
        Ok(file_name)
    }

    pub async fn download_from_share(&self, share: &str, file_name: &str, directory: &str) -> GatewayResult<Bytes> {
        validate_resource_name("share", share)?;
        if !directory.is_empty() {
            validate_segment("directory", directory)?;
        }
        validate_segment("file", file_name)?;
        tag("share", share);
        self.backends.shares.download_file(share, directory, file_name).await
    }

    // Queues

    /// Append a message to a queue
    pub async fn send(&self, queue: &str, payload: &str) -> GatewayResult<MessageReceipt> {
        validate_resource_name("queue", queue)?;
        if payload.len() > MAX_MESSAGE_BYTES {
            return Err(GatewayError::invalid(format!(
                "message of {} bytes exceeds the {} byte limit",
                payload.len(),
                MAX_MESSAGE_BYTES
            )));
        }
        tag("queue", queue);
        let receipt = self.backends.queues.send_message(queue, payload).await?;
        debug!("Sent message {} to {}", receipt.message_id, queue);
        Ok(receipt)
    }

    /// Take one visible message and delete it; `None` when the queue is empty
    pub async fn receive(&self, queue: &str) -> GatewayResult<Option<String>> {
        let Some(message) = self.receive_leased(queue, self.visibility_timeout).await? else {
            return Ok(None);
        };
        self.acknowledge(queue, &message).await?;
        Ok(Some(message.text))
    }

    /// Lease one visible message without deleting it
    pub async fn receive_leased(
        &self,
        queue: &str,
        visibility_timeout: Duration,
    ) -> GatewayResult<Option<ReceivedMessage>> {
        validate_resource_name("queue", queue)?;
        tag("queue", queue);
        let message = self.backends.queues.receive_message(queue, visibility_timeout).await?;
        if let Some(message) = &message {
            debug!(
                "Received message {} from {} (delivery {})",
                message.message_id, queue, message.dequeue_count
            );
        }
        Ok(message)
    }

    /// Delete a leased message
    pub async fn acknowledge(&self, queue: &str, message: &ReceivedMessage) -> GatewayResult<()> {
        validate_resource_name("queue", queue)?;
        tag("queue", queue);
        self.backends
            .queues
            .delete_message(queue, &message.message_id, &message.pop_receipt)
            .await
    }

    /// Return a leased message to the queue for immediate redelivery
    pub async fn abandon(&self, queue: &str, message: &ReceivedMessage) -> GatewayResult<()> {
        validate_resource_name("queue", queue)?;
        tag("queue", queue);
        self.backends
            .queues
            .release_message(queue, &message.message_id, &message.pop_receipt)
            .await
    }

    pub async fn approximate_message_count(&self, queue: &str) -> GatewayResult<u64> {
        validate_resource_name("queue", queue)?;
        self.backends.queues.approximate_message_count(queue).await
    }
}
