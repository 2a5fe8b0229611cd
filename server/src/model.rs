//! Business records of the retail back office

use crate::provisioning::{CUSTOMERS_TABLE, ORDERS_TABLE, PRODUCTS_TABLE};
use crate::records::{EntityMeta, Record};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Customer {
    #[serde(skip)]
    pub meta: EntityMeta,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub user_name: String,
    #[serde(default)]
    pub shipping_address: String,
}

impl Customer {
    pub fn new(row_key: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            meta: EntityMeta::new(CUSTOMERS_TABLE, row_key),
            email: email.into(),
            ..Self::default()
        }
    }

    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }
}

impl Record for Customer {
    fn table_name() -> Cow<'static, str> {
        Cow::Borrowed(CUSTOMERS_TABLE)
    }

    fn meta(&self) -> &EntityMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut EntityMeta {
        &mut self.meta
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Product {
    #[serde(skip)]
    pub meta: EntityMeta,
    pub product_name: String,
    #[serde(default)]
    pub description: String,
    pub price: f64,
    pub stock_available: i64,
    /// Public URL of the product image, if one was uploaded
    #[serde(default)]
    pub image_url: Option<String>,
}

impl Product {
    pub fn new(row_key: impl Into<String>, product_name: impl Into<String>, price: f64, stock_available: i64) -> Self {
        Self {
            meta: EntityMeta::new(PRODUCTS_TABLE, row_key),
            product_name: product_name.into(),
            price,
            stock_available,
            ..Self::default()
        }
    }
}

impl Record for Product {
    fn table_name() -> Cow<'static, str> {
        Cow::Borrowed(PRODUCTS_TABLE)
    }

    fn meta(&self) -> &EntityMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut EntityMeta {
        &mut self.meta
    }
}

/// Lifecycle of an order
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Cancelled,
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::Processing => "Processing",
            OrderStatus::Completed => "Completed",
            OrderStatus::Cancelled => "Cancelled",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(OrderStatus::Pending),
            "processing" => Ok(OrderStatus::Processing),
            "completed" => Ok(OrderStatus::Completed),
            "cancelled" | "canceled" => Ok(OrderStatus::Cancelled),
            _ => Err(format!("Unknown order status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Order {
    #[serde(skip)]
    pub meta: EntityMeta,
    /// Row key of the ordered product
    #[serde(rename = "ProductID")]
    pub product_id: String,
    /// Row key of the ordering customer
    pub customer_id: String,
    pub order_date: DateTime<Utc>,
    pub quantity: u32,
    pub total_price: f64,
    #[serde(default)]
    pub status: OrderStatus,
    /// Name of the payment proof in the contracts share
    #[serde(default)]
    pub proof_of_payment: Option<String>,
}

impl Order {
    pub fn new(row_key: impl Into<String>, product_id: impl Into<String>, customer_id: impl Into<String>, quantity: u32) -> Self {
        Self {
            meta: EntityMeta::new(ORDERS_TABLE, row_key),
            product_id: product_id.into(),
            customer_id: customer_id.into(),
            order_date: Utc::now(),
            quantity,
            total_price: 0.0,
            status: OrderStatus::Pending,
            proof_of_payment: None,
        }
    }
}

impl Record for Order {
    fn table_name() -> Cow<'static, str> {
        Cow::Borrowed(ORDERS_TABLE)
    }

    fn meta(&self) -> &EntityMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut EntityMeta {
        &mut self.meta
    }
}
