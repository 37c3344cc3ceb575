use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;
use vendo_core::error::StoreError;
use vendo_order::models::{Order, OrderItem, OrderStatus};
use vendo_order::repository::{NewOrder, OrderRecord, OrderRepository, PaymentRecord};

/// Postgres implementation of the order storage port.
pub struct PgOrderRepository {
    pool: PgPool,
}

impl PgOrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// Internal structs for type-safe querying
#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    total_amount: Decimal,
    total_items: i32,
    status: String,
    paid: bool,
    paid_at: Option<DateTime<Utc>>,
    external_charge_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct OrderItemRow {
    id: Uuid,
    order_id: Uuid,
    product_id: Uuid,
    quantity: i32,
    price: Decimal,
}

impl TryFrom<OrderRow> for Order {
    type Error = StoreError;

    fn try_from(row: OrderRow) -> Result<Self, StoreError> {
        let status = OrderStatus::parse(&row.status).ok_or_else(|| {
            StoreError::Backend(format!("unknown status value in store: {}", row.status).into())
        })?;
        Ok(Order {
            id: row.id,
            total_amount: row.total_amount,
            total_items: row.total_items,
            status,
            paid: row.paid,
            paid_at: row.paid_at,
            external_charge_id: row.external_charge_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl From<OrderItemRow> for OrderItem {
    fn from(row: OrderItemRow) -> Self {
        OrderItem {
            id: row.id,
            order_id: row.order_id,
            product_id: row.product_id,
            quantity: row.quantity,
            price: row.price,
        }
    }
}

fn backend(err: sqlx::Error) -> StoreError {
    StoreError::Backend(Box::new(err))
}

const ORDER_COLUMNS: &str =
    "id, total_amount, total_items, status, paid, paid_at, external_charge_id, created_at, updated_at";

#[async_trait]
impl OrderRepository for PgOrderRepository {
    async fn create_order(&self, new_order: NewOrder) -> Result<OrderRecord, StoreError> {
        let order_id = Uuid::new_v4();
        let mut tx = self.pool.begin().await.map_err(backend)?;

        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "INSERT INTO orders (id, total_amount, total_items, status) \
             VALUES ($1, $2, $3, $4) RETURNING {ORDER_COLUMNS}"
        ))
        .bind(order_id)
        .bind(new_order.total_amount)
        .bind(new_order.total_items)
        .bind(OrderStatus::Pending.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(backend)?;

        let mut items = Vec::with_capacity(new_order.items.len());
        for item in new_order.items {
            let item_row = sqlx::query_as::<_, OrderItemRow>(
                "INSERT INTO order_items (id, order_id, product_id, quantity, price) \
                 VALUES ($1, $2, $3, $4, $5) \
                 RETURNING id, order_id, product_id, quantity, price",
            )
            .bind(Uuid::new_v4())
            .bind(order_id)
            .bind(item.product_id)
            .bind(item.quantity)
            .bind(item.price)
            .fetch_one(&mut *tx)
            .await
            .map_err(backend)?;
            items.push(OrderItem::from(item_row));
        }

        tx.commit().await.map_err(backend)?;

        Ok(OrderRecord {
            order: Order::try_from(row)?,
            items,
        })
    }

    async fn get_order(&self, id: Uuid) -> Result<Option<OrderRecord>, StoreError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let item_rows = sqlx::query_as::<_, OrderItemRow>(
            "SELECT id, order_id, product_id, quantity, price \
             FROM order_items WHERE order_id = $1 ORDER BY id",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        Ok(Some(OrderRecord {
            order: Order::try_from(row)?,
            items: item_rows.into_iter().map(OrderItem::from).collect(),
        }))
    }

    async fn count_orders(&self, status: Option<OrderStatus>) -> Result<i64, StoreError> {
        let count = match status {
            Some(status) => {
                sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM orders WHERE status = $1")
                    .bind(status.as_str())
                    .fetch_one(&self.pool)
                    .await
            }
            None => {
                sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM orders")
                    .fetch_one(&self.pool)
                    .await
            }
        }
        .map_err(backend)?;
        Ok(count)
    }

    async fn list_orders(
        &self,
        status: Option<OrderStatus>,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<Order>, StoreError> {
        let rows = match status {
            Some(status) => {
                sqlx::query_as::<_, OrderRow>(&format!(
                    "SELECT {ORDER_COLUMNS} FROM orders WHERE status = $1 \
                     ORDER BY created_at, id LIMIT $2 OFFSET $3"
                ))
                .bind(status.as_str())
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query_as::<_, OrderRow>(&format!(
                    "SELECT {ORDER_COLUMNS} FROM orders \
                     ORDER BY created_at, id LIMIT $1 OFFSET $2"
                ))
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(backend)?;

        rows.into_iter().map(Order::try_from).collect()
    }

    async fn update_status(&self, id: Uuid, status: OrderStatus) -> Result<Order, StoreError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "UPDATE orders SET status = $1, updated_at = NOW() \
             WHERE id = $2 RETURNING {ORDER_COLUMNS}"
        ))
        .bind(status.as_str())
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?
        .ok_or(StoreError::NotFound)?;

        Order::try_from(row)
    }

    async fn record_payment(&self, id: Uuid, payment: PaymentRecord) -> Result<Order, StoreError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;

        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "UPDATE orders SET status = $1, paid = TRUE, paid_at = $2, \
             external_charge_id = $3, updated_at = NOW() \
             WHERE id = $4 RETURNING {ORDER_COLUMNS}"
        ))
        .bind(OrderStatus::Paid.as_str())
        .bind(payment.paid_at)
        .bind(&payment.external_charge_id)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(backend)?
        .ok_or(StoreError::NotFound)?;

        sqlx::query(
            "INSERT INTO order_receipts (id, order_id, receipt_url) VALUES ($1, $2, $3) \
             ON CONFLICT (order_id) DO NOTHING",
        )
        .bind(Uuid::new_v4())
        .bind(id)
        .bind(&payment.receipt_url)
        .execute(&mut *tx)
        .await
        .map_err(backend)?;

        tx.commit().await.map_err(backend)?;

        Order::try_from(row)
    }
}
