//! Order placement and payment.
//!
//! An order touches two records (the product's stock and the order itself)
//! and there are no cross-record transactions. Placement is therefore made
//! idempotent on the caller-chosen order id and compensates the stock when
//! the order cannot be written.

use crate::error::{GatewayError, GatewayResult, ResourceKind};
use crate::gateway::StorageGateway;
use crate::messages::OrderNotification;
use crate::model::{Customer, Order, OrderStatus, Product};
use crate::naming::extension;
use crate::provisioning::{CONTRACTS_SHARE, CUSTOMERS_TABLE, ORDERS_TABLE, PAYMENTS_DIRECTORY, PRODUCTS_TABLE};
use crate::records::Version;
use crate::service::publish;
use crate::upload::UploadedFile;
use log::{error, info, warn};

/// Attempts at a conditional stock change before giving up
const MAX_STOCK_ATTEMPTS: usize = 5;

/// What the caller submits to place an order
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRequest {
    /// Caller-chosen id; resubmitting the same id places the order once
    pub order_id: String,
    pub customer_id: String,
    pub product_id: String,
    pub quantity: u32,
}

#[derive(Clone)]
pub struct OrderService {
    gateway: StorageGateway,
}

fn order_not_found(order_id: &str) -> GatewayError {
    GatewayError::not_found(ResourceKind::Record, format!("{}/{}", ORDERS_TABLE, order_id))
}

impl OrderService {
    pub fn new(gateway: StorageGateway) -> Self {
        Self { gateway }
    }

    pub async fn get(&self, order_id: &str) -> GatewayResult<Option<Order>> {
        self.gateway.get(ORDERS_TABLE, order_id).await
    }

    pub async fn list(&self) -> GatewayResult<Vec<Order>> {
        self.gateway.list_all().await
    }

    /// Orders still waiting for a payment proof
    pub async fn pending(&self) -> GatewayResult<Vec<Order>> {
        let orders: Vec<Order> = self.gateway.list_all().await?;
        Ok(orders
            .into_iter()
            .filter(|o| o.status == OrderStatus::Pending)
            .collect())
    }

    /// Reserve stock and write the order. Submitting an id that already
    /// exists returns the stored order without touching stock again.
    pub async fn place_order(&self, request: &OrderRequest) -> GatewayResult<Order> {
        if request.quantity == 0 {
            return Err(GatewayError::invalid("quantity must be at least 1"));
        }
        if let Some(existing) = self.get(&request.order_id).await? {
            info!("Order {} was already placed", request.order_id);
            return Ok(existing);
        }

        let product = self.adjust_stock(&request.product_id, -i64::from(request.quantity)).await?;

        let mut order = Order::new(
            request.order_id.clone(),
            request.product_id.clone(),
            request.customer_id.clone(),
            request.quantity,
        );
        order.total_price = product.price * f64::from(request.quantity);

        match self.gateway.insert(order).await {
            Ok(order) => {
                info!(
                    "Placed order {} for {} x {}",
                    order.meta.row_key, order.quantity, order.product_id
                );
                Ok(order)
            }
            Err(e) if e.is_conflict() => {
                // duplicate placement; the first one holds the reservation
                self.restore_stock(request).await;
                warn!("Order {} was placed concurrently", request.order_id);
                self.get(&request.order_id).await?.ok_or(e)
            }
            Err(e) => match self.get(&request.order_id).await {
                // the write may have landed before the failure was reported
                Ok(Some(order)) => {
                    warn!("Order {} was stored despite error: {}", request.order_id, e);
                    Ok(order)
                }
                Ok(None) => {
                    self.restore_stock(request).await;
                    Err(e)
                }
                Err(lookup) => {
                    error!(
                        "Could not tell whether order {} was stored, keeping its stock reserved: {}",
                        request.order_id, lookup
                    );
                    Err(e)
                }
            },
        }
    }

    async fn restore_stock(&self, request: &OrderRequest) {
        if let Err(restore) = self.adjust_stock(&request.product_id, i64::from(request.quantity)).await {
            error!(
                "Could not restore {} units of {} after failed order {}: {}",
                request.quantity, request.product_id, request.order_id, restore
            );
        }
    }

    /// Apply `delta` to a product's stock with a conditional update, reloading
    /// and retrying on version conflicts. Stock never goes below zero.
    async fn adjust_stock(&self, product_id: &str, delta: i64) -> GatewayResult<Product> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let mut product: Product = self.gateway.get(PRODUCTS_TABLE, product_id).await?.ok_or_else(|| {
                GatewayError::not_found(ResourceKind::Record, format!("{}/{}", PRODUCTS_TABLE, product_id))
            })?;

            let remaining = product.stock_available + delta;
            if remaining < 0 {
                return Err(GatewayError::invalid(format!(
                    "not enough stock for {}: {} available",
                    product_id, product.stock_available
                )));
            }
            product.stock_available = remaining;

            match self.gateway.update(product).await {
                Ok(product) => return Ok(product),
                Err(e) if e.is_version_conflict() && attempt < MAX_STOCK_ATTEMPTS => {
                    warn!("Stock of {} changed concurrently, retrying ({})", product_id, attempt);
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Store a PDF payment proof in the contracts share, mark the order
    /// completed and notify the order queue.
    pub async fn complete_payment(&self, order_id: &str, proof: &UploadedFile) -> GatewayResult<Order> {
        if extension(&proof.file_name).as_deref() != Some(".pdf") {
            return Err(GatewayError::invalid("only PDF files are accepted as payment proof"));
        }
        let mut order = self.get(order_id).await?.ok_or_else(|| order_not_found(order_id))?;

        let file_name = self
            .gateway
            .upload_to_share(proof, CONTRACTS_SHARE, PAYMENTS_DIRECTORY)
            .await?;

        order.status = OrderStatus::Completed;
        order.proof_of_payment = Some(file_name);
        let order = self.gateway.update(order).await?;

        let customer_name = match self.gateway.get::<Customer>(CUSTOMERS_TABLE, &order.customer_id).await? {
            Some(customer) => customer.user_name,
            None => order.customer_id.clone(),
        };
        publish(
            &self.gateway,
            &OrderNotification {
                order_id: order.meta.row_key.clone(),
                customer_name,
                total_price: order.total_price,
                status: order.status,
                proof_url: order.proof_of_payment.clone(),
            },
        )
        .await?;
        info!("Payment for order {} completed", order_id);
        Ok(order)
    }

    /// Overwrite an order's status regardless of concurrent edits
    pub async fn set_status(&self, order_id: &str, status: OrderStatus) -> GatewayResult<Order> {
        let mut order = self.get(order_id).await?.ok_or_else(|| order_not_found(order_id))?;
        order.status = status;
        order.meta.version = Some(Version::any());
        self.gateway.update(order).await
    }
}
