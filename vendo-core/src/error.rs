use serde::{Deserialize, Serialize};

/// Failure raised by a storage backend implementing the order port.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    #[error("storage backend error: {0}")]
    Backend(Box<dyn std::error::Error + Send + Sync>),
}

/// Domain-level failure taxonomy for the order lifecycle.
///
/// Every variant maps to a status code so the boundary can emit a uniform
/// remote shape. Internal causes are logged at translation time and never
/// carried in the message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OrderError {
    #[error("{0}")]
    InvalidReference(String),

    #[error("Illegal status transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    DependencyUnavailable(String),

    #[error("Invalid data provided")]
    InvalidData,

    #[error("Internal server error")]
    Internal,
}

impl OrderError {
    pub fn status(&self) -> u16 {
        match self {
            OrderError::InvalidReference(_) => 400,
            OrderError::InvalidTransition { .. } => 409,
            OrderError::NotFound(_) => 404,
            OrderError::DependencyUnavailable(_) => 503,
            OrderError::InvalidData => 400,
            OrderError::Internal => 500,
        }
    }

    /// Translate a store-layer failure into the domain taxonomy.
    ///
    /// A "record missing on update" condition is client-addressable and
    /// becomes a 400-class error; anything else is logged with its cause and
    /// replaced with a sanitized internal error.
    pub fn from_store(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => OrderError::InvalidData,
            StoreError::Backend(cause) => {
                tracing::error!(error = %cause, "store operation failed");
                OrderError::Internal
            }
        }
    }
}

/// The uniform error shape every operation surfaces to the transport layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteError {
    pub status: u16,
    pub message: String,
}

impl From<OrderError> for RemoteError {
    fn from(err: OrderError) -> Self {
        Self {
            status: err.status(),
            message: err.to_string(),
        }
    }
}

impl std::fmt::Display for RemoteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.status)
    }
}
