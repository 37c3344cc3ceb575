use std::sync::Arc;

use anyhow::Context;
use serde_json::{json, Value};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;
use vendo_api::bus::InProcessBus;
use vendo_api::clients::{BusPaymentGateway, BusProductCatalog};
use vendo_api::dispatch::{serve, Dispatcher};
use vendo_api::subjects;
use vendo_core::messaging::MessageBus;
use vendo_order::service::OrderService;
use vendo_store::{Config, DbClient, PgOrderRepository};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vendo=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    let db = DbClient::new(&config.database.url)
        .await
        .context("Failed to connect to Postgres")?;
    db.migrate().await.context("Failed to run migrations")?;

    let bus = Arc::new(InProcessBus::new());
    let (keyboard, mouse) = seed_demo_collaborators(&bus);

    let repo = Arc::new(PgOrderRepository::new(db.pool.clone()));
    let catalog = Arc::new(BusProductCatalog::new(bus.clone()));
    let payments = Arc::new(BusPaymentGateway::new(bus.clone()));
    let service = Arc::new(OrderService::new(
        repo,
        catalog,
        payments,
        config.payment.currency.clone(),
    ));
    serve(bus.as_ref(), Arc::new(Dispatcher::new(service)));

    tracing::info!("order service wired, running sample flow");
    run_sample_flow(bus.as_ref(), keyboard, mouse).await?;

    Ok(())
}

/// Stand-in catalog and payment responders on the loopback bus, playing the
/// roles the real collaborators would over a broker.
fn seed_demo_collaborators(bus: &InProcessBus) -> (Uuid, Uuid) {
    let keyboard = Uuid::new_v4();
    let mouse = Uuid::new_v4();
    let products = json!([
        { "id": keyboard, "name": "Keyboard", "price": 10 },
        { "id": mouse, "name": "Mouse", "price": 5 }
    ]);

    bus.subscribe(subjects::VALIDATE_PRODUCTS, move |payload| {
        let products = products.clone();
        async move {
            let ids: Vec<Uuid> =
                serde_json::from_value(payload["ids"].clone()).unwrap_or_default();
            let matching: Vec<Value> = products
                .as_array()
                .into_iter()
                .flatten()
                .filter(|product| {
                    product["id"]
                        .as_str()
                        .and_then(|id| Uuid::parse_str(id).ok())
                        .map_or(false, |id| ids.contains(&id))
                })
                .cloned()
                .collect();
            Value::Array(matching)
        }
    });

    bus.subscribe(subjects::CREATE_PAYMENT_SESSION, |payload| async move {
        json!({
            "id": "cs_demo_1",
            "url": "https://payments.local/cs_demo_1",
            "orderId": payload["orderId"],
        })
    });

    (keyboard, mouse)
}

async fn run_sample_flow(bus: &InProcessBus, keyboard: Uuid, mouse: Uuid) -> anyhow::Result<()> {
    let created = bus
        .request(
            subjects::ORDER_CREATE,
            json!({
                "items": [
                    { "productId": keyboard, "quantity": 2 },
                    { "productId": mouse, "quantity": 1 }
                ]
            }),
        )
        .await?;
    tracing::info!(order = %created, "order created");

    let order_id = created["id"]
        .as_str()
        .context("create reply carries no order id")?
        .to_string();

    let fetched = bus
        .request(subjects::ORDER_FIND_ONE, json!({ "id": order_id }))
        .await?;
    tracing::info!(order = %fetched, "order fetched");

    let session = bus
        .request(subjects::ORDER_CREATE_PAYMENT_SESSION, fetched)
        .await?;
    tracing::info!(session = %session, "payment session opened");

    bus.notify(
        subjects::ORDER_PAID,
        json!({
            "orderId": order_id,
            "externalChargeId": "ch_demo_1",
            "receiptUrl": "https://payments.local/receipts/ch_demo_1"
        }),
    )
    .await?;

    let paid = bus
        .request(subjects::ORDER_FIND_ONE, json!({ "id": order_id }))
        .await?;
    tracing::info!(order = %paid, "order after paid notification");

    let page = bus
        .request(subjects::ORDER_FIND_ALL, json!({ "page": 1, "limit": 10 }))
        .await?;
    tracing::info!(page = %page, "order listing");

    Ok(())
}
