use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;
use vendo_core::error::StoreError;

use crate::models::{Order, OrderItem, OrderStatus};

/// Write model for a new order. Status is not part of it: every backend
/// creates orders as PENDING, whatever the caller sent over the wire.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub total_amount: Decimal,
    pub total_items: i32,
    pub items: Vec<NewOrderItem>,
}

#[derive(Debug, Clone)]
pub struct NewOrderItem {
    pub product_id: Uuid,
    pub quantity: i32,
    pub price: Decimal,
}

/// Write model for the paid reconciliation.
#[derive(Debug, Clone)]
pub struct PaymentRecord {
    pub external_charge_id: String,
    pub receipt_url: String,
    pub paid_at: DateTime<Utc>,
}

/// An order with its owned items, as read back from the store.
#[derive(Debug, Clone)]
pub struct OrderRecord {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

/// Storage port for order data access.
///
/// Implementations own transaction discipline: `create_order` and
/// `record_payment` must be atomic, all child rows or none.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Persist an order and all of its items in one transaction.
    async fn create_order(&self, new_order: NewOrder) -> Result<OrderRecord, StoreError>;

    async fn get_order(&self, id: Uuid) -> Result<Option<OrderRecord>, StoreError>;

    /// Count orders, optionally restricted to one status.
    async fn count_orders(&self, status: Option<OrderStatus>) -> Result<i64, StoreError>;

    /// Fetch a slice of orders in stable insertion order, with the same
    /// optional status filter as `count_orders`.
    async fn list_orders(
        &self,
        status: Option<OrderStatus>,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<Order>, StoreError>;

    /// Overwrite the status column. Fails with `StoreError::NotFound` when
    /// no such order exists.
    async fn update_status(&self, id: Uuid, status: OrderStatus) -> Result<Order, StoreError>;

    /// Apply the paid transition and create the receipt in one transaction.
    /// The receipt insert is a no-op when one already exists.
    async fn record_payment(&self, id: Uuid, payment: PaymentRecord) -> Result<Order, StoreError>;
}
