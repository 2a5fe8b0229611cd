//! Product catalogue: records in `Products`, images in `product-images`

use crate::error::{GatewayError, GatewayResult, ResourceKind};
use crate::gateway::StorageGateway;
use crate::messages::StockUpdate;
use crate::model::Product;
use crate::provisioning::{PRODUCTS_TABLE, PRODUCT_IMAGES_CONTAINER};
use crate::service::publish;
use crate::upload::UploadedFile;
use log::{info, warn};

/// Stock level below which a stock update is queued
pub const LOW_STOCK_THRESHOLD: i64 = 10;

#[derive(Clone)]
pub struct CatalogService {
    gateway: StorageGateway,
}

/// Blob name at the end of an image URL
fn image_blob_name(url: &str) -> Option<&str> {
    url.rsplit('/').next().filter(|name| !name.is_empty())
}

impl CatalogService {
    pub fn new(gateway: StorageGateway) -> Self {
        Self { gateway }
    }

    /// Store a new product, uploading its image first when one is given
    pub async fn create_product(&self, mut product: Product, image: Option<&UploadedFile>) -> GatewayResult<Product> {
        if product.meta.partition_key.is_empty() {
            product.meta.partition_key = PRODUCTS_TABLE.to_string();
        }
        if product.meta.row_key.is_empty() {
            product.meta.row_key = uuid::Uuid::new_v4().to_string();
        }
        if let Some(image) = image {
            product.image_url = Some(self.gateway.upload_image(image, PRODUCT_IMAGES_CONTAINER).await?);
        }

        let product = self.gateway.insert(product).await?;
        info!("Created product {} ({})", product.meta.row_key, product.product_name);
        Ok(product)
    }

    /// Conditional update of a product. A new image replaces the old one.
    /// When stock ends up below [`LOW_STOCK_THRESHOLD`] a stock update is queued.
    pub async fn update_product(&self, mut product: Product, image: Option<&UploadedFile>) -> GatewayResult<Product> {
        let (uploaded, previous_image) = match image {
            Some(image) => {
                let url = self.gateway.upload_image(image, PRODUCT_IMAGES_CONTAINER).await?;
                (Some(url.clone()), product.image_url.replace(url))
            }
            None => (None, None),
        };

        let product = match self.gateway.update(product).await {
            Ok(product) => product,
            Err(e) => {
                // the record still points at the previous image
                if let Some(url) = uploaded {
                    self.discard_image(&url).await;
                }
                return Err(e);
            }
        };

        if let Some(url) = previous_image {
            self.discard_image(&url).await;
        }

        if product.stock_available < LOW_STOCK_THRESHOLD {
            publish(
                &self.gateway,
                &StockUpdate {
                    product_id: product.meta.row_key.clone(),
                    product_name: product.product_name.clone(),
                    current_stock: product.stock_available,
                },
            )
            .await?;
        }
        Ok(product)
    }

    async fn discard_image(&self, url: &str) {
        if let Some(name) = image_blob_name(url) {
            if let Err(e) = self.gateway.delete_blob(name, PRODUCT_IMAGES_CONTAINER).await {
                warn!("Could not remove image {}: {}", name, e);
            }
        }
    }

    /// Remove a product and its image
    pub async fn delete_product(&self, product_id: &str) -> GatewayResult<()> {
        let Some(product) = self.gateway.get::<Product>(PRODUCTS_TABLE, product_id).await? else {
            return Ok(());
        };
        self.gateway.delete::<Product>(PRODUCTS_TABLE, product_id).await?;
        if let Some(name) = product.image_url.as_deref().and_then(image_blob_name) {
            self.gateway.delete_blob(name, PRODUCT_IMAGES_CONTAINER).await?;
        }
        info!("Deleted product {}", product_id);
        Ok(())
    }

    pub async fn get_product(&self, product_id: &str) -> GatewayResult<Product> {
        self.gateway
            .get(PRODUCTS_TABLE, product_id)
            .await?
            .ok_or_else(|| GatewayError::not_found(ResourceKind::Record, format!("{}/{}", PRODUCTS_TABLE, product_id)))
    }

    pub async fn list_products(&self) -> GatewayResult<Vec<Product>> {
        self.gateway.list_all().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::QueuePayload;

    async fn service() -> (StorageGateway, CatalogService) {
        let gateway = StorageGateway::for_testing().await.unwrap();
        (gateway.clone(), CatalogService::new(gateway))
    }

    #[tokio::test]
    async fn test_create_with_image() {
        let (gateway, catalog) = service().await;
        let image = UploadedFile::new("mug.PNG", &b"png"[..]);
        let product = catalog
            .create_product(Product::new("", "Mug", 4.5, 30), Some(&image))
            .await
            .unwrap();

        let url = product.image_url.clone().unwrap();
        assert!(url.starts_with("memory://product-images/") && url.ends_with(".png"));
        let name = image_blob_name(&url).unwrap();
        assert_eq!(
            gateway.download_blob(name, PRODUCT_IMAGES_CONTAINER).await.unwrap(),
            bytes::Bytes::from_static(b"png")
        );
    }

    #[tokio::test]
    async fn test_low_stock_queues_update() {
        let (gateway, catalog) = service().await;
        let mut product = catalog
            .create_product(Product::new("p1", "Kettle", 20.0, 50), None)
            .await
            .unwrap();

        product.stock_available = 12;
        let mut product = catalog.update_product(product, None).await.unwrap();
        assert!(gateway.receive("stock-updates").await.unwrap().is_none());

        product.stock_available = 3;
        catalog.update_product(product, None).await.unwrap();
        let text = gateway.receive("stock-updates").await.unwrap().unwrap();
        let update = StockUpdate::from_payload(&text).unwrap();
        assert_eq!(update.product_id, "p1");
        assert_eq!(update.current_stock, 3);
    }

    #[tokio::test]
    async fn test_stale_update_queues_nothing() {
        let (gateway, catalog) = service().await;
        let original = catalog
            .create_product(Product::new("p1", "Kettle", 20.0, 50), None)
            .await
            .unwrap();
        let mut first = original.clone();
        first.stock_available = 40;
        catalog.update_product(first, None).await.unwrap();

        let mut stale = original;
        stale.stock_available = 1;
        assert!(catalog.update_product(stale, None).await.unwrap_err().is_version_conflict());
        assert_eq!(gateway.approximate_message_count("stock-updates").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_delete_removes_image() {
        let (gateway, catalog) = service().await;
        let image = UploadedFile::new("lamp.jpg", &b"jpg"[..]);
        let product = catalog
            .create_product(Product::new("p9", "Lamp", 9.0, 5), Some(&image))
            .await
            .unwrap();
        let url = product.image_url.unwrap();

        catalog.delete_product("p9").await.unwrap();
        assert!(catalog.get_product("p9").await.unwrap_err().is_not_found());
        let name = image_blob_name(&url).unwrap();
        assert!(gateway
            .download_blob(name, PRODUCT_IMAGES_CONTAINER)
            .await
            .unwrap_err()
            .is_not_found());

        // already gone
        catalog.delete_product("p9").await.unwrap();
    }
}
