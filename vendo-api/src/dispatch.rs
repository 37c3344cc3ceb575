use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::debug;
use vendo_core::error::{OrderError, RemoteError};
use vendo_order::models::HydratedOrder;
use vendo_order::service::OrderService;

use crate::bus::InProcessBus;
use crate::dto::{
    ChangeOrderStatusDto, CreateOrderDto, FindOneDto, OrderPaginationDto, PaidOrderDto,
};
use crate::subjects;

/// Routes inbound message subjects to lifecycle operations.
///
/// Payload decoding and shape validation happen here; everything past this
/// point works with domain types. Every failure leaves as the uniform
/// `RemoteError` shape.
pub struct Dispatcher {
    service: Arc<OrderService>,
}

impl Dispatcher {
    pub fn new(service: Arc<OrderService>) -> Self {
        Self { service }
    }

    pub async fn handle(&self, subject: &str, payload: Value) -> Result<Value, RemoteError> {
        match subject {
            subjects::ORDER_CREATE => self.create(payload).await,
            subjects::ORDER_FIND_ALL => self.find_all(payload).await,
            subjects::ORDER_FIND_ONE => self.find_one(payload).await,
            subjects::ORDER_CHANGE_STATUS => self.change_status(payload).await,
            subjects::ORDER_CREATE_PAYMENT_SESSION => self.create_payment_session(payload).await,
            subjects::ORDER_PAID => self.paid(payload).await,
            _ => Err(RemoteError {
                status: 400,
                message: format!("Unknown command {subject}"),
            }),
        }
    }

    async fn create(&self, payload: Value) -> Result<Value, RemoteError> {
        let dto: CreateOrderDto = decode(payload)?;
        dto.validate().map_err(bad_request)?;
        if dto.carries_client_overrides() {
            debug!("client-supplied status/price ignored; the server assigns both");
        }
        let order = self.service.create(dto.into_request()).await?;
        encode(order)
    }

    async fn find_all(&self, payload: Value) -> Result<Value, RemoteError> {
        let dto: OrderPaginationDto = decode(payload)?;
        dto.validate().map_err(bad_request)?;
        let page = self.service.find_all(dto.page, dto.limit, dto.status).await?;
        encode(page)
    }

    async fn find_one(&self, payload: Value) -> Result<Value, RemoteError> {
        let dto: FindOneDto = decode(payload)?;
        let order = self.service.find_one(dto.id).await?;
        encode(order)
    }

    async fn change_status(&self, payload: Value) -> Result<Value, RemoteError> {
        let dto: ChangeOrderStatusDto = decode(payload)?;
        let order = self.service.change_status(dto.id, dto.status).await?;
        encode(order)
    }

    async fn create_payment_session(&self, payload: Value) -> Result<Value, RemoteError> {
        let order: HydratedOrder = decode(payload)?;
        let session = self.service.create_payment_session(&order).await?;
        Ok(session)
    }

    async fn paid(&self, payload: Value) -> Result<Value, RemoteError> {
        let dto: PaidOrderDto = decode(payload)?;
        let order = self.service.reconcile_paid(dto.into_event()).await?;
        encode(order)
    }
}

/// Bind the dispatcher's subjects on the bus. Success replies carry the
/// payload; failures carry an `{"error": {status, message}}` envelope.
pub fn serve(bus: &InProcessBus, dispatcher: Arc<Dispatcher>) {
    for subject in [
        subjects::ORDER_CREATE,
        subjects::ORDER_FIND_ALL,
        subjects::ORDER_FIND_ONE,
        subjects::ORDER_CHANGE_STATUS,
        subjects::ORDER_CREATE_PAYMENT_SESSION,
        subjects::ORDER_PAID,
    ] {
        let dispatcher = dispatcher.clone();
        bus.subscribe(subject, move |payload| {
            let dispatcher = dispatcher.clone();
            async move {
                match dispatcher.handle(subject, payload).await {
                    Ok(reply) => reply,
                    Err(err) => json!({ "error": err }),
                }
            }
        });
    }
}

fn decode<T: DeserializeOwned>(payload: Value) -> Result<T, RemoteError> {
    serde_json::from_value(payload).map_err(|err| RemoteError {
        status: 400,
        message: err.to_string(),
    })
}

fn encode<T: Serialize>(value: T) -> Result<Value, RemoteError> {
    serde_json::to_value(value).map_err(|_| OrderError::Internal.into())
}

fn bad_request(message: String) -> RemoteError {
    RemoteError {
        status: 400,
        message,
    }
}
