//! Customer registration and maintenance

use crate::error::GatewayResult;
use crate::gateway::StorageGateway;
use crate::messages::WelcomeEmail;
use crate::model::Customer;
use crate::provisioning::CUSTOMERS_TABLE;
use crate::service::publish;
use log::info;

#[derive(Clone)]
pub struct CustomerService {
    gateway: StorageGateway,
}

impl CustomerService {
    pub fn new(gateway: StorageGateway) -> Self {
        Self { gateway }
    }

    /// Store a new customer and queue their welcome email. Missing keys are
    /// filled in: the `Customers` partition and a random row key.
    pub async fn register(&self, mut customer: Customer) -> GatewayResult<Customer> {
        if customer.meta.partition_key.is_empty() {
            customer.meta.partition_key = CUSTOMERS_TABLE.to_string();
        }
        if customer.meta.row_key.is_empty() {
            customer.meta.row_key = uuid::Uuid::new_v4().to_string();
        }

        let customer = self.gateway.insert(customer).await?;
        info!("Registered customer {}", customer.meta.row_key);

        publish(
            &self.gateway,
            &WelcomeEmail {
                customer_id: customer.meta.row_key.clone(),
                email: customer.email.clone(),
                first_name: customer.first_name.clone(),
            },
        )
        .await?;
        Ok(customer)
    }

    pub async fn get(&self, customer_id: &str) -> GatewayResult<Option<Customer>> {
        self.gateway.get(CUSTOMERS_TABLE, customer_id).await
    }

    pub async fn list(&self) -> GatewayResult<Vec<Customer>> {
        self.gateway.list_all().await
    }

    /// Conditional update; fails with `VersionConflict` on a stale copy
    pub async fn update(&self, customer: Customer) -> GatewayResult<Customer> {
        self.gateway.update(customer).await
    }

    pub async fn delete(&self, customer_id: &str) -> GatewayResult<()> {
        self.gateway.delete::<Customer>(CUSTOMERS_TABLE, customer_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::QueuePayload;

    #[tokio::test]
    async fn test_register_assigns_keys_and_queues_email() {
        let gateway = StorageGateway::for_testing().await.unwrap();
        let service = CustomerService::new(gateway.clone());

        let mut customer = Customer::default();
        customer.first_name = "Ada".to_string();
        customer.email = "ada@example.com".to_string();
        customer.user_name = "ada".to_string();

        let stored = service.register(customer).await.unwrap();
        assert_eq!(stored.meta.partition_key, "Customers");
        assert!(!stored.meta.row_key.is_empty());
        assert!(stored.meta.version.is_some());

        let text = gateway.receive("welcome-emails").await.unwrap().unwrap();
        let email = WelcomeEmail::from_payload(&text).unwrap();
        assert_eq!(email.customer_id, stored.meta.row_key);
        assert_eq!(email.first_name, "Ada");
    }

    #[tokio::test]
    async fn test_duplicate_registration_sends_nothing() {
        let gateway = StorageGateway::for_testing().await.unwrap();
        let service = CustomerService::new(gateway.clone());
        service.register(Customer::new("c1", "a@b.com")).await.unwrap();
        assert!(gateway.receive("welcome-emails").await.unwrap().is_some());

        let err = service.register(Customer::new("c1", "a@b.com")).await.unwrap_err();
        assert!(err.is_conflict());
        assert!(gateway.receive("welcome-emails").await.unwrap().is_none());
    }
}
