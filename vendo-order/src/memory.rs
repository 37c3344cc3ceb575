use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;
use vendo_core::error::StoreError;

use crate::models::{Order, OrderItem, OrderReceipt, OrderStatus};
use crate::repository::{NewOrder, OrderRecord, OrderRepository, PaymentRecord};

struct Entry {
    order: Order,
    items: Vec<OrderItem>,
    receipts: Vec<OrderReceipt>,
}

/// In-memory implementation of the storage port.
///
/// Backs the unit and integration tests and local wiring; the semantics
/// mirror the Postgres backend, including insertion-order listing and the
/// insert-if-absent receipt.
#[derive(Default)]
pub struct MemoryOrderRepository {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    sequence: Vec<Uuid>,
    entries: HashMap<Uuid, Entry>,
}

impl MemoryOrderRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Receipts recorded for an order. Test observability only; the port
    /// exposes no receipt reads.
    pub async fn receipts(&self, order_id: Uuid) -> Vec<OrderReceipt> {
        let inner = self.inner.read().await;
        inner
            .entries
            .get(&order_id)
            .map(|entry| entry.receipts.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl OrderRepository for MemoryOrderRepository {
    async fn create_order(&self, new_order: NewOrder) -> Result<OrderRecord, StoreError> {
        let now = Utc::now();
        let order_id = Uuid::new_v4();
        let order = Order {
            id: order_id,
            total_amount: new_order.total_amount,
            total_items: new_order.total_items,
            status: OrderStatus::Pending,
            paid: false,
            paid_at: None,
            external_charge_id: None,
            created_at: now,
            updated_at: now,
        };
        let items: Vec<OrderItem> = new_order
            .items
            .into_iter()
            .map(|item| OrderItem {
                id: Uuid::new_v4(),
                order_id,
                product_id: item.product_id,
                quantity: item.quantity,
                price: item.price,
            })
            .collect();

        let mut inner = self.inner.write().await;
        inner.sequence.push(order_id);
        inner.entries.insert(
            order_id,
            Entry {
                order: order.clone(),
                items: items.clone(),
                receipts: Vec::new(),
            },
        );

        Ok(OrderRecord { order, items })
    }

    async fn get_order(&self, id: Uuid) -> Result<Option<OrderRecord>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.entries.get(&id).map(|entry| OrderRecord {
            order: entry.order.clone(),
            items: entry.items.clone(),
        }))
    }

    async fn count_orders(&self, status: Option<OrderStatus>) -> Result<i64, StoreError> {
        let inner = self.inner.read().await;
        let count = inner
            .entries
            .values()
            .filter(|entry| status.map_or(true, |s| entry.order.status == s))
            .count();
        Ok(count as i64)
    }

    async fn list_orders(
        &self,
        status: Option<OrderStatus>,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<Order>, StoreError> {
        let inner = self.inner.read().await;
        let orders = inner
            .sequence
            .iter()
            .filter_map(|id| inner.entries.get(id))
            .filter(|entry| status.map_or(true, |s| entry.order.status == s))
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .map(|entry| entry.order.clone())
            .collect();
        Ok(orders)
    }

    async fn update_status(&self, id: Uuid, status: OrderStatus) -> Result<Order, StoreError> {
        let mut inner = self.inner.write().await;
        let entry = inner.entries.get_mut(&id).ok_or(StoreError::NotFound)?;
        entry.order.status = status;
        entry.order.updated_at = Utc::now();
        Ok(entry.order.clone())
    }

    async fn record_payment(&self, id: Uuid, payment: PaymentRecord) -> Result<Order, StoreError> {
        let mut inner = self.inner.write().await;
        let entry = inner.entries.get_mut(&id).ok_or(StoreError::NotFound)?;
        entry.order.status = OrderStatus::Paid;
        entry.order.paid = true;
        entry.order.paid_at = Some(payment.paid_at);
        entry.order.external_charge_id = Some(payment.external_charge_id);
        entry.order.updated_at = Utc::now();
        if entry.receipts.is_empty() {
            entry.receipts.push(OrderReceipt {
                id: Uuid::new_v4(),
                order_id: id,
                receipt_url: payment.receipt_url,
                created_at: Utc::now(),
            });
        }
        Ok(entry.order.clone())
    }
}
