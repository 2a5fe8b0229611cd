//! Queue payloads produced by the application workflows.
//!
//! The gateway treats payloads as opaque text; these are the JSON documents
//! the workflows put on each queue.

use crate::error::GatewayResult;
use crate::model::OrderStatus;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A document that travels as a queue message
pub trait QueuePayload: Serialize + DeserializeOwned {
    /// Queue the document is sent to
    const QUEUE: &'static str;

    fn to_payload(&self) -> GatewayResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    fn from_payload(text: &str) -> GatewayResult<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WelcomeEmail {
    pub customer_id: String,
    pub email: String,
    pub first_name: String,
}

impl QueuePayload for WelcomeEmail {
    const QUEUE: &'static str = crate::provisioning::WELCOME_EMAILS_QUEUE;
}

/// Sent when a product's stock drops below the low-stock threshold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StockUpdate {
    pub product_id: String,
    pub product_name: String,
    pub current_stock: i64,
}

impl QueuePayload for StockUpdate {
    const QUEUE: &'static str = crate::provisioning::STOCK_UPDATES_QUEUE;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct OrderNotification {
    pub order_id: String,
    pub customer_name: String,
    pub total_price: f64,
    pub status: OrderStatus,
    pub proof_url: Option<String>,
}

impl QueuePayload for OrderNotification {
    const QUEUE: &'static str = crate::provisioning::ORDER_NOTIFICATIONS_QUEUE;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_welcome_email_wire_names() {
        let message = WelcomeEmail {
            customer_id: "c1".to_string(),
            email: "a@b.com".to_string(),
            first_name: "Ada".to_string(),
        };
        assert_eq!(
            message.to_payload().unwrap(),
            r#"{"CustomerId":"c1","Email":"a@b.com","FirstName":"Ada"}"#
        );
    }

    #[test]
    fn test_order_notification_parses() {
        let text = r#"{"OrderId":"o1","CustomerName":"Ada","TotalPrice":12.5,"Status":"Completed","ProofUrl":"proof.pdf"}"#;
        let parsed = OrderNotification::from_payload(text).unwrap();
        assert_eq!(parsed.status, OrderStatus::Completed);
        assert_eq!(parsed.proof_url.as_deref(), Some("proof.pdf"));
        assert!(StockUpdate::from_payload("not json").is_err());
    }
}
