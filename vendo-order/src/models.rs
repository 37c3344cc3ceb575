use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Order status in the lifecycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    Paid,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 4] = [
        OrderStatus::Pending,
        OrderStatus::Paid,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Paid => "PAID",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(OrderStatus::Pending),
            "PAID" => Some(OrderStatus::Paid),
            "DELIVERED" => Some(OrderStatus::Delivered),
            "CANCELLED" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }

    /// Whether `next` is a legal transition from this status.
    ///
    /// Legal edges: PENDING→PAID, PENDING→CANCELLED, PAID→DELIVERED,
    /// PAID→CANCELLED. Everything else, self-transitions included, is
    /// rejected.
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Paid) | (Pending, Cancelled) | (Paid, Delivered) | (Paid, Cancelled)
        )
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted purchase order. Totals are computed server-side from the
/// catalog snapshot at creation time, never taken from client input.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: Uuid,
    pub total_amount: Decimal,
    pub total_items: i32,
    pub status: OrderStatus,
    pub paid: bool,
    pub paid_at: Option<DateTime<Utc>>,
    pub external_charge_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A line belonging to exactly one order. `price` is the catalog price in
/// effect when the order was created and is immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub price: Decimal,
}

/// Receipt recorded on the paid transition, at most one per order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderReceipt {
    pub id: Uuid,
    pub order_id: Uuid,
    pub receipt_url: String,
    pub created_at: DateTime<Utc>,
}

/// An order line annotated with the catalog display name for the caller's
/// convenience. The name is joined in at create/read time, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HydratedItem {
    pub product_id: Uuid,
    pub quantity: i32,
    pub price: Decimal,
    pub name: String,
}

/// An order together with its name-annotated items, as returned by the
/// create and find-one operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HydratedOrder {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<HydratedItem>,
}
