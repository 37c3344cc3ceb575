use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;
use vendo_core::catalog::{CatalogProduct, ProductCatalog};
use vendo_core::messaging::{MessageBus, TransportError};
use vendo_core::payment::{PaymentGateway, PaymentSessionRequest};

use crate::subjects;

/// Typed client for the product-catalog collaborator.
pub struct BusProductCatalog {
    bus: Arc<dyn MessageBus>,
}

impl BusProductCatalog {
    pub fn new(bus: Arc<dyn MessageBus>) -> Self {
        Self { bus }
    }
}

#[async_trait]
impl ProductCatalog for BusProductCatalog {
    async fn validate_products(&self, ids: &[Uuid]) -> Result<Vec<CatalogProduct>, TransportError> {
        debug!(count = ids.len(), "validating products against the catalog");
        let reply = self
            .bus
            .request(subjects::VALIDATE_PRODUCTS, json!({ "ids": ids }))
            .await?;
        let reply = ensure_ok(reply)?;
        serde_json::from_value(reply).map_err(|err| TransportError::MalformedReply(err.to_string()))
    }
}

/// Typed client for the payment collaborator.
pub struct BusPaymentGateway {
    bus: Arc<dyn MessageBus>,
}

impl BusPaymentGateway {
    pub fn new(bus: Arc<dyn MessageBus>) -> Self {
        Self { bus }
    }
}

#[async_trait]
impl PaymentGateway for BusPaymentGateway {
    async fn create_session(
        &self,
        request: PaymentSessionRequest,
    ) -> Result<Value, TransportError> {
        debug!(order_id = %request.order_id, "opening payment session");
        let payload = serde_json::to_value(&request)
            .map_err(|err| TransportError::MalformedReply(err.to_string()))?;
        let reply = self
            .bus
            .request(subjects::CREATE_PAYMENT_SESSION, payload)
            .await?;
        ensure_ok(reply)
    }
}

/// Collaborators answer errors inside the reply envelope; surface those as
/// transport-level failures so callers treat them like any other outage.
fn ensure_ok(reply: Value) -> Result<Value, TransportError> {
    if let Some(err) = reply.get("error") {
        let message = err
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unspecified error")
            .to_string();
        return Err(TransportError::ErrorReply(message));
    }
    Ok(reply)
}
