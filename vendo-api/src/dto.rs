use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;
use vendo_order::models::OrderStatus;
use vendo_order::service::{CreateOrder, OrderLine, PaidEvent};

/// Order-creation request as it arrives on the wire.
///
/// `status` and per-item `price` are accepted in shape for compatibility
/// with older callers, but their values never reach the store: status is
/// server-assigned and prices come from the catalog snapshot.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderDto {
    pub items: Vec<CreateOrderItemDto>,
    #[serde(default)]
    pub status: Option<OrderStatus>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderItemDto {
    pub product_id: Uuid,
    pub quantity: i32,
    #[serde(default)]
    pub price: Option<Decimal>,
}

impl CreateOrderDto {
    pub fn validate(&self) -> Result<(), String> {
        if self.items.is_empty() {
            return Err("items must not be empty".to_string());
        }
        for (idx, item) in self.items.iter().enumerate() {
            if item.quantity <= 0 {
                return Err(format!("items[{idx}].quantity must be a positive integer"));
            }
        }
        Ok(())
    }

    /// Whether the caller sent fields this service refuses to trust.
    pub fn carries_client_overrides(&self) -> bool {
        self.status.is_some() || self.items.iter().any(|item| item.price.is_some())
    }

    pub fn into_request(self) -> CreateOrder {
        CreateOrder {
            items: self
                .items
                .into_iter()
                .map(|item| OrderLine {
                    product_id: item.product_id,
                    quantity: item.quantity,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct OrderPaginationDto {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub status: Option<OrderStatus>,
}

fn default_page() -> u32 {
    1
}

fn default_limit() -> u32 {
    10
}

impl OrderPaginationDto {
    pub fn validate(&self) -> Result<(), String> {
        if self.page == 0 {
            return Err("page must be a positive integer".to_string());
        }
        if self.limit == 0 {
            return Err("limit must be a positive integer".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct FindOneDto {
    pub id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct ChangeOrderStatusDto {
    pub id: Uuid,
    pub status: OrderStatus,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaidOrderDto {
    pub order_id: Uuid,
    pub external_charge_id: String,
    pub receipt_url: String,
}

impl PaidOrderDto {
    pub fn into_event(self) -> PaidEvent {
        PaidEvent {
            order_id: self.order_id,
            external_charge_id: self.external_charge_id,
            receipt_url: self.receipt_url,
        }
    }
}
