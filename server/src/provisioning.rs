//! Idempotent bootstrap of every table, container, queue and share the
//! application relies on.
//!
//! The plan is plain data (and can be loaded from YAML); the [`Provisioner`]
//! walks it against a set of backends and reports what it had to create.

use crate::blobs::PublicAccess;
use crate::error::{GatewayError, GatewayResult};
use crate::gateway::StorageBackends;
use crate::naming::{validate_resource_name, validate_segment, validate_table_name};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const CUSTOMERS_TABLE: &str = "Customers";
pub const PRODUCTS_TABLE: &str = "Products";
pub const ORDERS_TABLE: &str = "Orders";

pub const PRODUCT_IMAGES_CONTAINER: &str = "product-images";
pub const PAYMENT_PROOFS_CONTAINER: &str = "payment-proofs";

pub const ORDER_NOTIFICATIONS_QUEUE: &str = "order-notifications";
pub const STOCK_UPDATES_QUEUE: &str = "stock-updates";
pub const WELCOME_EMAILS_QUEUE: &str = "welcome-emails";

pub const CONTRACTS_SHARE: &str = "contracts";
pub const PAYMENTS_DIRECTORY: &str = "payments";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerSpec {
    pub name: String,
    #[serde(default)]
    pub access: PublicAccess,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShareSpec {
    pub name: String,
    #[serde(default)]
    pub directories: Vec<String>,
}

/// Everything that must exist before the gateway is handed out
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvisioningPlan {
    pub tables: Vec<String>,
    pub containers: Vec<ContainerSpec>,
    pub queues: Vec<String>,
    pub shares: Vec<ShareSpec>,
}

impl Default for ProvisioningPlan {
    fn default() -> Self {
        Self::retail()
    }
}

impl ProvisioningPlan {
    /// Layout used by the retail back office
    pub fn retail() -> Self {
        Self {
            tables: vec![
                CUSTOMERS_TABLE.to_string(),
                PRODUCTS_TABLE.to_string(),
                ORDERS_TABLE.to_string(),
            ],
            containers: vec![
                ContainerSpec {
                    name: PRODUCT_IMAGES_CONTAINER.to_string(),
                    access: PublicAccess::Blob,
                },
                ContainerSpec {
                    name: PAYMENT_PROOFS_CONTAINER.to_string(),
                    access: PublicAccess::Private,
                },
            ],
            queues: vec![
                ORDER_NOTIFICATIONS_QUEUE.to_string(),
                STOCK_UPDATES_QUEUE.to_string(),
                WELCOME_EMAILS_QUEUE.to_string(),
            ],
            shares: vec![ShareSpec {
                name: CONTRACTS_SHARE.to_string(),
                directories: vec![PAYMENTS_DIRECTORY.to_string()],
            }],
        }
    }

    /// An empty plan provisions nothing
    pub fn empty() -> Self {
        Self {
            tables: Vec::new(),
            containers: Vec::new(),
            queues: Vec::new(),
            shares: Vec::new(),
        }
    }

    /// Check every name before anything is created
    pub fn validate(&self) -> GatewayResult<()> {
        for table in &self.tables {
            validate_table_name(table).map_err(|e| GatewayError::initialization(Resource::Table(table), e))?;
        }
        for container in &self.containers {
            validate_resource_name("container", &container.name)
                .map_err(|e| GatewayError::initialization(Resource::Container(&container.name), e))?;
        }
        for queue in &self.queues {
            validate_resource_name("queue", queue).map_err(|e| GatewayError::initialization(Resource::Queue(queue), e))?;
        }
        for share in &self.shares {
            validate_resource_name("share", &share.name)
                .map_err(|e| GatewayError::initialization(Resource::Share(&share.name), e))?;
            for directory in &share.directories {
                validate_segment("directory", directory).map_err(|e| {
                    GatewayError::initialization(Resource::Directory(&share.name, directory), e)
                })?;
            }
        }
        Ok(())
    }
}

/// Label of a provisioned resource, e.g. `queue stock-updates`
enum Resource<'a> {
    Table(&'a str),
    Container(&'a str),
    Queue(&'a str),
    Share(&'a str),
    Directory(&'a str, &'a str),
}

impl fmt::Display for Resource<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resource::Table(name) => write!(f, "table {}", name),
            Resource::Container(name) => write!(f, "container {}", name),
            Resource::Queue(name) => write!(f, "queue {}", name),
            Resource::Share(name) => write!(f, "share {}", name),
            Resource::Directory(share, dir) => write!(f, "directory {}/{}", share, dir),
        }
    }
}

impl From<Resource<'_>> for String {
    fn from(resource: Resource<'_>) -> Self {
        resource.to_string()
    }
}

/// Outcome of a provisioning run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProvisioningReport {
    /// Resources this run created
    pub created: Vec<String>,
    /// Resources that were already in place
    pub existing: Vec<String>,
}

impl ProvisioningReport {
    fn record(&mut self, resource: Resource<'_>, created: bool) {
        let label = resource.to_string();
        if created {
            info!("Provisioned {}", label);
            self.created.push(label);
        } else {
            debug!("{} already exists", label);
            self.existing.push(label);
        }
    }

    /// Whether nothing was there before this run
    pub fn is_fresh(&self) -> bool {
        self.existing.is_empty()
    }

    pub fn total(&self) -> usize {
        self.created.len() + self.existing.len()
    }
}

/// Walks a [`ProvisioningPlan`] against a set of backends
pub struct Provisioner<'a> {
    backends: &'a StorageBackends,
    plan: &'a ProvisioningPlan,
}

impl<'a> Provisioner<'a> {
    pub fn new(backends: &'a StorageBackends, plan: &'a ProvisioningPlan) -> Self {
        Self { backends, plan }
    }

    /// Create whatever is missing. Safe to call repeatedly; any failure is
    /// reported as `InitializationFailure` naming the resource.
    pub async fn run(&self) -> GatewayResult<ProvisioningReport> {
        self.plan.validate()?;
        let mut report = ProvisioningReport::default();

        for table in &self.plan.tables {
            let created = self
                .backends
                .records
                .create_table_if_not_exists(table)
                .await
                .map_err(|e| GatewayError::initialization(Resource::Table(table), e))?;
            report.record(Resource::Table(table), created);
        }

        for container in &self.plan.containers {
            let created = self
                .backends
                .blobs
                .create_container_if_not_exists(&container.name, container.access)
                .await
                .map_err(|e| GatewayError::initialization(Resource::Container(&container.name), e))?;
            report.record(Resource::Container(&container.name), created);
        }

        for queue in &self.plan.queues {
            let created = self
                .backends
                .queues
                .create_queue_if_not_exists(queue)
                .await
                .map_err(|e| GatewayError::initialization(Resource::Queue(queue), e))?;
            report.record(Resource::Queue(queue), created);
        }

        for share in &self.plan.shares {
            let created = self
                .backends
                .shares
                .create_share_if_not_exists(&share.name)
                .await
                .map_err(|e| GatewayError::initialization(Resource::Share(&share.name), e))?;
            report.record(Resource::Share(&share.name), created);

            for directory in &share.directories {
                let created = self
                    .backends
                    .shares
                    .create_directory_if_not_exists(&share.name, directory)
                    .await
                    .map_err(|e| GatewayError::initialization(Resource::Directory(&share.name, directory), e))?;
                report.record(Resource::Directory(&share.name, directory), created);
            }
        }

        info!(
            "Provisioning finished: {} created, {} already present",
            report.created.len(),
            report.existing.len()
        );
        Ok(report)
    }
}
