use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::messaging::TransportError;

/// A product record as the catalog collaborator reports it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogProduct {
    pub id: Uuid,
    pub name: String,
    pub price: Decimal,
}

/// Port to the external product-catalog service.
///
/// The catalog is authoritative for product existence, price and display
/// name. A reply may be a subset of the requested ids; missing ids signal
/// invalid references.
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    async fn validate_products(&self, ids: &[Uuid]) -> Result<Vec<CatalogProduct>, TransportError>;
}
