// src/lib.rs

pub mod blobs;
pub mod config;
pub mod error;
pub mod gateway;
pub mod messages;
pub mod model;
pub mod naming;
pub mod provisioning;
pub mod queues;
pub mod records;
pub mod service;
pub mod shares;
pub mod sqlite;
pub mod upload;

pub use config::AppConfig;
pub use error::{GatewayError, GatewayResult, ResourceKind};
pub use gateway::{StorageBackends, StorageGateway};
pub use provisioning::{ProvisioningPlan, ProvisioningReport, Provisioner};
pub use records::{EntityMeta, Record, Version};
pub use upload::UploadedFile;
