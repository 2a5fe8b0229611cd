//! Application workflows built on the storage gateway.
//!
//! Each service owns a clone of the [`StorageGateway`] and combines record,
//! blob, share and queue operations the way the back office uses them.

pub mod catalog_service;
pub mod customer_service;
pub mod order_service;

use crate::error::GatewayResult;
use crate::gateway::StorageGateway;
use crate::messages::QueuePayload;
use crate::model::{Customer, Order, Product};
use log::debug;

/// Number of products shown on the dashboard
pub const FEATURED_PRODUCT_COUNT: usize = 5;

/// Send a payload document to its queue
pub(crate) async fn publish<P: QueuePayload>(gateway: &StorageGateway, message: &P) -> GatewayResult<()> {
    let payload = message.to_payload()?;
    gateway.send(P::QUEUE, &payload).await?;
    debug!("Published message to {}", P::QUEUE);
    Ok(())
}

/// Landing page summary
#[derive(Debug, Clone)]
pub struct Dashboard {
    pub customer_count: usize,
    pub product_count: usize,
    pub order_count: usize,
    pub featured_products: Vec<Product>,
}

/// Load the three tables concurrently and summarise them
pub async fn dashboard(gateway: &StorageGateway) -> GatewayResult<Dashboard> {
    let (customers, products, orders) = futures::try_join!(
        gateway.list_all::<Customer>(),
        gateway.list_all::<Product>(),
        gateway.list_all::<Order>()
    )?;

    Ok(Dashboard {
        customer_count: customers.len(),
        product_count: products.len(),
        order_count: orders.len(),
        featured_products: products.into_iter().take(FEATURED_PRODUCT_COUNT).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_dashboard_caps_featured_products() {
        let gateway = StorageGateway::for_testing().await.unwrap();
        for i in 0..7 {
            gateway
                .insert(Product::new(format!("p{}", i), format!("Product {}", i), 1.0, 20))
                .await
                .unwrap();
        }
        gateway.insert(Customer::new("c1", "a@b.com")).await.unwrap();

        let summary = dashboard(&gateway).await.unwrap();
        assert_eq!(summary.product_count, 7);
        assert_eq!(summary.customer_count, 1);
        assert_eq!(summary.order_count, 0);
        assert_eq!(summary.featured_products.len(), FEATURED_PRODUCT_COUNT);
    }
}
