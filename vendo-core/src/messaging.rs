use async_trait::async_trait;
use serde_json::Value;

/// Failure of the underlying message transport.
///
/// The lifecycle core does not distinguish between these: a collaborator
/// that cannot be reached is unavailable, whatever the mechanism.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("no responder for subject {0}")]
    NoResponder(String),

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("malformed reply: {0}")]
    MalformedReply(String),

    #[error("collaborator replied with an error: {0}")]
    ErrorReply(String),
}

/// Request/reply and fire-and-forget messaging to the rest of the mesh.
///
/// Implementations carry the wire concerns (delivery, timeouts, encoding of
/// the reply envelope); callers see JSON payloads only.
#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Send a request on `subject` and wait for the reply payload.
    async fn request(&self, subject: &str, payload: Value) -> Result<Value, TransportError>;

    /// Publish a notification on `subject` without waiting for a reply.
    async fn notify(&self, subject: &str, payload: Value) -> Result<(), TransportError>;
}
