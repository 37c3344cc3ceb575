use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde_json::Value;
use vendo_core::messaging::{MessageBus, TransportError};

type BoxedReply = Pin<Box<dyn Future<Output = Value> + Send>>;
type Responder = Arc<dyn Fn(Value) -> BoxedReply + Send + Sync>;

/// In-process loopback implementation of the message transport.
///
/// Subjects map to registered responders; `request` awaits the responder's
/// reply, `notify` delivers without one. Used by the local binary and the
/// integration tests; a broker-backed implementation plugs in behind the
/// same trait.
#[derive(Default)]
pub struct InProcessBus {
    responders: RwLock<HashMap<String, Responder>>,
}

impl InProcessBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a responder for `subject`, replacing any previous one.
    pub fn subscribe<F, Fut>(&self, subject: &str, handler: F)
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Value> + Send + 'static,
    {
        let responder: Responder = Arc::new(move |payload| Box::pin(handler(payload)));
        self.responders
            .write()
            .unwrap()
            .insert(subject.to_string(), responder);
    }

    fn responder(&self, subject: &str) -> Option<Responder> {
        self.responders.read().unwrap().get(subject).cloned()
    }
}

#[async_trait]
impl MessageBus for InProcessBus {
    async fn request(&self, subject: &str, payload: Value) -> Result<Value, TransportError> {
        let responder = self
            .responder(subject)
            .ok_or_else(|| TransportError::NoResponder(subject.to_string()))?;
        Ok(responder(payload).await)
    }

    async fn notify(&self, subject: &str, payload: Value) -> Result<(), TransportError> {
        // Notifications to a subject nobody listens on are dropped, as on a
        // real broker.
        if let Some(responder) = self.responder(subject) {
            responder(payload).await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn request_reaches_the_registered_responder() {
        let bus = InProcessBus::new();
        bus.subscribe("echo", |payload| async move { payload });

        let reply = bus.request("echo", json!({"ping": true})).await.unwrap();
        assert_eq!(reply, json!({"ping": true}));
    }

    #[tokio::test]
    async fn request_without_responder_is_a_transport_error() {
        let bus = InProcessBus::new();
        let err = bus.request("nowhere", json!({})).await.unwrap_err();
        assert!(matches!(err, TransportError::NoResponder(_)));
    }

    #[tokio::test]
    async fn notify_without_responder_is_dropped() {
        let bus = InProcessBus::new();
        assert!(bus.notify("nowhere", json!({})).await.is_ok());
    }
}
