use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::messaging::TransportError;

/// One priced line forwarded to the payment collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentLineItem {
    pub name: String,
    pub price: Decimal,
    pub quantity: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentSessionRequest {
    pub order_id: Uuid,
    pub currency: String,
    pub items: Vec<PaymentLineItem>,
}

/// Port to the external payment service.
///
/// The session handle is whatever the gateway issues; it passes through this
/// service untouched. The paid notification arrives later on the inbound
/// side, not through this port.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_session(
        &self,
        request: PaymentSessionRequest,
    ) -> Result<Value, TransportError>;
}
