pub mod catalog;
pub mod error;
pub mod messaging;
pub mod payment;

pub use catalog::{CatalogProduct, ProductCatalog};
pub use error::{OrderError, RemoteError, StoreError};
pub use messaging::{MessageBus, TransportError};
pub use payment::{PaymentGateway, PaymentLineItem, PaymentSessionRequest};
