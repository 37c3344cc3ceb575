use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;
use vendo_core::catalog::{CatalogProduct, ProductCatalog};
use vendo_core::error::OrderError;
use vendo_core::messaging::TransportError;
use vendo_core::payment::{PaymentGateway, PaymentLineItem, PaymentSessionRequest};

use crate::models::{HydratedItem, HydratedOrder, Order, OrderStatus};
use crate::repository::{NewOrder, NewOrderItem, OrderRecord, OrderRepository, PaymentRecord};

/// Order-creation request: a non-empty sequence of product/quantity lines.
/// Prices and status are never part of it; the catalog and the server own
/// those.
#[derive(Debug, Clone)]
pub struct CreateOrder {
    pub items: Vec<OrderLine>,
}

#[derive(Debug, Clone)]
pub struct OrderLine {
    pub product_id: Uuid,
    pub quantity: i32,
}

/// Inbound paid notification from the payment collaborator.
#[derive(Debug, Clone)]
pub struct PaidEvent {
    pub order_id: Uuid,
    pub external_charge_id: String,
    pub receipt_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total_records: i64,
    pub last_page: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PagedOrders {
    pub data: Vec<Order>,
    pub pagination: Pagination,
}

/// Orchestrates the order lifecycle against the storage port and the two
/// external collaborators. Holds no mutable state of its own; concurrent
/// invocations are independent.
pub struct OrderService {
    repo: Arc<dyn OrderRepository>,
    catalog: Arc<dyn ProductCatalog>,
    payments: Arc<dyn PaymentGateway>,
    currency: String,
}

impl OrderService {
    pub fn new(
        repo: Arc<dyn OrderRepository>,
        catalog: Arc<dyn ProductCatalog>,
        payments: Arc<dyn PaymentGateway>,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            repo,
            catalog,
            payments,
            currency: currency.into(),
        }
    }

    /// Validate the referenced products, price the order from the catalog
    /// snapshot, persist it atomically, and return it hydrated with the
    /// catalog display names.
    pub async fn create(&self, request: CreateOrder) -> Result<HydratedOrder, OrderError> {
        let ids = distinct_ids(request.items.iter().map(|line| line.product_id));
        let products = self
            .catalog
            .validate_products(&ids)
            .await
            .map_err(|err| unavailable("Product catalog", err))?;
        let by_id: HashMap<Uuid, &CatalogProduct> =
            products.iter().map(|p| (p.id, p)).collect();

        let mut missing = Vec::new();
        let mut total_amount = Decimal::ZERO;
        let mut total_items = 0i32;
        let mut new_items = Vec::with_capacity(request.items.len());
        for line in &request.items {
            match by_id.get(&line.product_id) {
                Some(product) => {
                    total_amount += product.price * Decimal::from(line.quantity);
                    total_items += line.quantity;
                    new_items.push(NewOrderItem {
                        product_id: line.product_id,
                        quantity: line.quantity,
                        price: product.price,
                    });
                }
                None => missing.push(line.product_id.to_string()),
            }
        }
        if !missing.is_empty() {
            return Err(OrderError::InvalidReference(format!(
                "Some products were not found in the catalog: {}",
                missing.join(", ")
            )));
        }

        let record = self
            .repo
            .create_order(NewOrder {
                total_amount,
                total_items,
                items: new_items,
            })
            .await
            .map_err(OrderError::from_store)?;

        tracing::info!(order_id = %record.order.id, total_amount = %record.order.total_amount, "order created");
        hydrate(record, &products)
    }

    /// Paginated listing, optionally filtered by status. A page past the end
    /// yields an empty data set with the correct pagination block.
    pub async fn find_all(
        &self,
        page: u32,
        limit: u32,
        status: Option<OrderStatus>,
    ) -> Result<PagedOrders, OrderError> {
        let total_records = self
            .repo
            .count_orders(status)
            .await
            .map_err(OrderError::from_store)?;
        let limit_rows = i64::from(limit);
        let last_page = (total_records + limit_rows - 1) / limit_rows;
        let offset = i64::from(page.saturating_sub(1)) * limit_rows;
        let data = self
            .repo
            .list_orders(status, offset, limit_rows)
            .await
            .map_err(OrderError::from_store)?;

        Ok(PagedOrders {
            data,
            pagination: Pagination {
                page,
                limit,
                total_records,
                last_page,
            },
        })
    }

    /// Fetch one order and re-resolve its items' display names against the
    /// catalog. Names are never persisted, so every read depends on the
    /// catalog being reachable.
    pub async fn find_one(&self, id: Uuid) -> Result<HydratedOrder, OrderError> {
        let record = self
            .repo
            .get_order(id)
            .await
            .map_err(OrderError::from_store)?
            .ok_or_else(|| OrderError::NotFound(format!("Order with id {id} not found")))?;

        let ids = distinct_ids(record.items.iter().map(|item| item.product_id));
        let products = self
            .catalog
            .validate_products(&ids)
            .await
            .map_err(|err| unavailable("Product catalog", err))?;
        hydrate(record, &products)
    }

    /// Apply a status transition, enforcing the legal-edges table.
    pub async fn change_status(
        &self,
        id: Uuid,
        status: OrderStatus,
    ) -> Result<Order, OrderError> {
        let record = self
            .repo
            .get_order(id)
            .await
            .map_err(OrderError::from_store)?
            .ok_or_else(|| OrderError::NotFound(format!("Order with id {id} not found")))?;

        let current = record.order.status;
        if !current.can_transition_to(status) {
            return Err(OrderError::InvalidTransition {
                from: current.to_string(),
                to: status.to_string(),
            });
        }

        self.repo
            .update_status(id, status)
            .await
            .map_err(OrderError::from_store)
    }

    /// Open a payment session for a hydrated order. The gateway's session
    /// handle is returned as-is.
    pub async fn create_payment_session(
        &self,
        order: &HydratedOrder,
    ) -> Result<Value, OrderError> {
        let request = PaymentSessionRequest {
            order_id: order.order.id,
            currency: self.currency.clone(),
            items: order
                .items
                .iter()
                .map(|item| PaymentLineItem {
                    name: item.name.clone(),
                    price: item.price,
                    quantity: item.quantity,
                })
                .collect(),
        };
        self.payments
            .create_session(request)
            .await
            .map_err(|err| unavailable("Payment gateway", err))
    }

    /// Reconcile an asynchronous paid notification: mark the order paid,
    /// store the charge id, and record the receipt atomically. Safe under
    /// at-least-once delivery.
    pub async fn reconcile_paid(&self, event: PaidEvent) -> Result<Order, OrderError> {
        tracing::info!(
            order_id = %event.order_id,
            charge_id = %event.external_charge_id,
            "paid notification received"
        );

        let record = self
            .repo
            .get_order(event.order_id)
            .await
            .map_err(OrderError::from_store)?;
        let Some(record) = record else {
            tracing::warn!(order_id = %event.order_id, "paid notification for unknown order");
            return Err(OrderError::InvalidData);
        };

        let order = record.order;
        if order.status == OrderStatus::Paid
            && order.external_charge_id.as_deref() == Some(event.external_charge_id.as_str())
        {
            tracing::info!(order_id = %order.id, "duplicate paid notification, already applied");
            return Ok(order);
        }

        self.repo
            .record_payment(
                event.order_id,
                PaymentRecord {
                    external_charge_id: event.external_charge_id,
                    receipt_url: event.receipt_url,
                    paid_at: Utc::now(),
                },
            )
            .await
            .map_err(OrderError::from_store)
    }
}

fn distinct_ids(ids: impl Iterator<Item = Uuid>) -> Vec<Uuid> {
    let mut seen = Vec::new();
    for id in ids {
        if !seen.contains(&id) {
            seen.push(id);
        }
    }
    seen
}

fn unavailable(collaborator: &str, err: TransportError) -> OrderError {
    tracing::warn!(error = %err, "{collaborator} call failed");
    OrderError::DependencyUnavailable(format!("{collaborator} is unavailable"))
}

/// Join catalog display names onto an order record. The catalog is
/// authoritative: an item whose product is absent from the reply fails the
/// whole operation.
fn hydrate(record: OrderRecord, products: &[CatalogProduct]) -> Result<HydratedOrder, OrderError> {
    let by_id: HashMap<Uuid, &CatalogProduct> = products.iter().map(|p| (p.id, p)).collect();
    let mut items = Vec::with_capacity(record.items.len());
    for item in record.items {
        let product = by_id.get(&item.product_id).ok_or_else(|| {
            OrderError::InvalidReference(format!(
                "Some products were not found in the catalog: {}",
                item.product_id
            ))
        })?;
        items.push(HydratedItem {
            product_id: item.product_id,
            quantity: item.quantity,
            price: item.price,
            name: product.name.clone(),
        });
    }
    Ok(HydratedOrder {
        order: record.order,
        items,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::memory::MemoryOrderRepository;

    struct StubCatalog {
        products: Vec<CatalogProduct>,
        down: AtomicBool,
    }

    impl StubCatalog {
        fn new(products: Vec<CatalogProduct>) -> Self {
            Self {
                products,
                down: AtomicBool::new(false),
            }
        }

        fn set_down(&self, down: bool) {
            self.down.store(down, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl ProductCatalog for StubCatalog {
        async fn validate_products(
            &self,
            ids: &[Uuid],
        ) -> Result<Vec<CatalogProduct>, TransportError> {
            if self.down.load(Ordering::SeqCst) {
                return Err(TransportError::Timeout);
            }
            Ok(self
                .products
                .iter()
                .filter(|p| ids.contains(&p.id))
                .cloned()
                .collect())
        }
    }

    struct StubGateway {
        down: AtomicBool,
        requests: Mutex<Vec<PaymentSessionRequest>>,
    }

    impl StubGateway {
        fn new() -> Self {
            Self {
                down: AtomicBool::new(false),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl PaymentGateway for StubGateway {
        async fn create_session(
            &self,
            request: PaymentSessionRequest,
        ) -> Result<Value, TransportError> {
            if self.down.load(Ordering::SeqCst) {
                return Err(TransportError::Connection("refused".into()));
            }
            self.requests.lock().unwrap().push(request);
            Ok(json!({
                "id": "cs_test_1",
                "url": "https://pay.example/cs_test_1"
            }))
        }
    }

    struct Fixture {
        service: OrderService,
        repo: Arc<MemoryOrderRepository>,
        catalog: Arc<StubCatalog>,
        gateway: Arc<StubGateway>,
        p1: Uuid,
        p2: Uuid,
    }

    fn fixture() -> Fixture {
        let p1 = Uuid::new_v4();
        let p2 = Uuid::new_v4();
        let catalog = Arc::new(StubCatalog::new(vec![
            CatalogProduct {
                id: p1,
                name: "Keyboard".into(),
                price: Decimal::from(10),
            },
            CatalogProduct {
                id: p2,
                name: "Mouse".into(),
                price: Decimal::from(5),
            },
        ]));
        let gateway = Arc::new(StubGateway::new());
        let repo = Arc::new(MemoryOrderRepository::new());
        let service = OrderService::new(
            repo.clone(),
            catalog.clone(),
            gateway.clone(),
            "usd",
        );
        Fixture {
            service,
            repo,
            catalog,
            gateway,
            p1,
            p2,
        }
    }

    fn two_line_request(fx: &Fixture) -> CreateOrder {
        CreateOrder {
            items: vec![
                OrderLine {
                    product_id: fx.p1,
                    quantity: 2,
                },
                OrderLine {
                    product_id: fx.p2,
                    quantity: 1,
                },
            ],
        }
    }

    #[tokio::test]
    async fn create_prices_from_the_catalog_snapshot() {
        let fx = fixture();
        let order = fx.service.create(two_line_request(&fx)).await.unwrap();

        assert_eq!(order.order.total_amount, Decimal::from(25));
        assert_eq!(order.order.total_items, 3);
        assert_eq!(order.order.status, OrderStatus::Pending);
        assert!(!order.order.paid);
        assert!(order.order.paid_at.is_none());

        assert_eq!(order.items.len(), 2);
        assert_eq!(order.items[0].price, Decimal::from(10));
        assert_eq!(order.items[0].name, "Keyboard");
        assert_eq!(order.items[1].price, Decimal::from(5));
        assert_eq!(order.items[1].name, "Mouse");
    }

    #[tokio::test]
    async fn create_rejects_unknown_products_without_persisting() {
        let fx = fixture();
        let ghost = Uuid::new_v4();
        let request = CreateOrder {
            items: vec![
                OrderLine {
                    product_id: fx.p1,
                    quantity: 1,
                },
                OrderLine {
                    product_id: ghost,
                    quantity: 4,
                },
            ],
        };

        let err = fx.service.create(request).await.unwrap_err();
        assert!(matches!(err, OrderError::InvalidReference(_)));
        assert!(err.to_string().contains(&ghost.to_string()));
        assert_eq!(fx.repo.count_orders(None).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn create_fails_fast_when_catalog_is_down() {
        let fx = fixture();
        fx.catalog.set_down(true);

        let err = fx.service.create(two_line_request(&fx)).await.unwrap_err();
        assert!(matches!(err, OrderError::DependencyUnavailable(_)));
        assert_eq!(err.status(), 503);
        assert_eq!(fx.repo.count_orders(None).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn find_all_past_the_last_page_is_empty_not_an_error() {
        let fx = fixture();
        for _ in 0..5 {
            fx.service.create(two_line_request(&fx)).await.unwrap();
        }

        let page = fx.service.find_all(2, 10, None).await.unwrap();
        assert!(page.data.is_empty());
        assert_eq!(page.pagination.page, 2);
        assert_eq!(page.pagination.limit, 10);
        assert_eq!(page.pagination.total_records, 5);
        assert_eq!(page.pagination.last_page, 1);
    }

    #[tokio::test]
    async fn find_all_slices_in_insertion_order() {
        let fx = fixture();
        let mut created = Vec::new();
        for _ in 0..5 {
            created.push(fx.service.create(two_line_request(&fx)).await.unwrap());
        }

        let page = fx.service.find_all(2, 2, None).await.unwrap();
        assert_eq!(page.pagination.last_page, 3);
        assert_eq!(page.data.len(), 2);
        assert_eq!(page.data[0].id, created[2].order.id);
        assert_eq!(page.data[1].id, created[3].order.id);
    }

    #[tokio::test]
    async fn find_all_filters_by_status() {
        let fx = fixture();
        let mut ids = Vec::new();
        for _ in 0..3 {
            ids.push(fx.service.create(two_line_request(&fx)).await.unwrap().order.id);
        }
        fx.service
            .change_status(ids[1], OrderStatus::Cancelled)
            .await
            .unwrap();

        let cancelled = fx
            .service
            .find_all(1, 10, Some(OrderStatus::Cancelled))
            .await
            .unwrap();
        assert_eq!(cancelled.pagination.total_records, 1);
        assert_eq!(cancelled.data.len(), 1);
        assert_eq!(cancelled.data[0].id, ids[1]);

        let pending = fx
            .service
            .find_all(1, 10, Some(OrderStatus::Pending))
            .await
            .unwrap();
        assert_eq!(pending.pagination.total_records, 2);
    }

    #[tokio::test]
    async fn find_all_on_an_empty_store() {
        let fx = fixture();
        let page = fx.service.find_all(1, 10, None).await.unwrap();
        assert!(page.data.is_empty());
        assert_eq!(page.pagination.total_records, 0);
        assert_eq!(page.pagination.last_page, 0);
    }

    #[tokio::test]
    async fn find_one_rehydrates_names_from_the_catalog() {
        let fx = fixture();
        let created = fx.service.create(two_line_request(&fx)).await.unwrap();

        let fetched = fx.service.find_one(created.order.id).await.unwrap();
        assert_eq!(fetched.order.id, created.order.id);
        let names: Vec<&str> = fetched.items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["Keyboard", "Mouse"]);
    }

    #[tokio::test]
    async fn find_one_unknown_id_is_not_found() {
        let fx = fixture();
        let id = Uuid::new_v4();
        let err = fx.service.find_one(id).await.unwrap_err();
        assert_eq!(
            err,
            OrderError::NotFound(format!("Order with id {id} not found"))
        );
        assert_eq!(err.status(), 404);
    }

    #[tokio::test]
    async fn find_one_breaks_when_catalog_is_down() {
        let fx = fixture();
        let created = fx.service.create(two_line_request(&fx)).await.unwrap();

        fx.catalog.set_down(true);
        let err = fx.service.find_one(created.order.id).await.unwrap_err();
        assert!(matches!(err, OrderError::DependencyUnavailable(_)));
    }

    #[tokio::test]
    async fn change_status_walks_legal_edges() {
        let fx = fixture();
        let id = fx.service.create(two_line_request(&fx)).await.unwrap().order.id;

        let order = fx.service.change_status(id, OrderStatus::Paid).await.unwrap();
        assert_eq!(order.status, OrderStatus::Paid);

        let order = fx
            .service
            .change_status(id, OrderStatus::Delivered)
            .await
            .unwrap();
        assert_eq!(order.status, OrderStatus::Delivered);
    }

    #[tokio::test]
    async fn change_status_rejects_illegal_edges() {
        let fx = fixture();
        let id = fx.service.create(two_line_request(&fx)).await.unwrap().order.id;

        let err = fx
            .service
            .change_status(id, OrderStatus::Delivered)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            OrderError::InvalidTransition {
                from: "PENDING".into(),
                to: "DELIVERED".into(),
            }
        );
        assert_eq!(err.status(), 409);

        let err = fx
            .service
            .change_status(id, OrderStatus::Pending)
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::InvalidTransition { .. }));

        // the store kept the original status
        let order = fx.service.find_one(id).await.unwrap();
        assert_eq!(order.order.status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn change_status_on_a_missing_order() {
        let fx = fixture();
        let err = fx
            .service
            .change_status(Uuid::new_v4(), OrderStatus::Paid)
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::NotFound(_)));
    }

    #[tokio::test]
    async fn payment_session_forwards_named_priced_lines() {
        let fx = fixture();
        let order = fx.service.create(two_line_request(&fx)).await.unwrap();

        let session = fx.service.create_payment_session(&order).await.unwrap();
        assert_eq!(session["id"], "cs_test_1");

        let requests = fx.gateway.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        let request = &requests[0];
        assert_eq!(request.order_id, order.order.id);
        assert_eq!(request.currency, "usd");
        assert_eq!(request.items.len(), 2);
        assert_eq!(request.items[0].name, "Keyboard");
        assert_eq!(request.items[0].price, Decimal::from(10));
        assert_eq!(request.items[0].quantity, 2);
    }

    #[tokio::test]
    async fn payment_session_fails_when_gateway_is_down() {
        let fx = fixture();
        let order = fx.service.create(two_line_request(&fx)).await.unwrap();

        fx.gateway.down.store(true, Ordering::SeqCst);
        let err = fx.service.create_payment_session(&order).await.unwrap_err();
        assert!(matches!(err, OrderError::DependencyUnavailable(_)));
    }

    #[tokio::test]
    async fn reconcile_paid_marks_the_order_and_records_one_receipt() {
        let fx = fixture();
        let id = fx.service.create(two_line_request(&fx)).await.unwrap().order.id;

        let event = PaidEvent {
            order_id: id,
            external_charge_id: "ch_123".into(),
            receipt_url: "https://pay.example/receipts/ch_123".into(),
        };
        let order = fx.service.reconcile_paid(event.clone()).await.unwrap();
        assert_eq!(order.status, OrderStatus::Paid);
        assert!(order.paid);
        assert!(order.paid_at.is_some());
        assert_eq!(order.external_charge_id.as_deref(), Some("ch_123"));

        let receipts = fx.repo.receipts(id).await;
        assert_eq!(receipts.len(), 1);
        assert_eq!(receipts[0].receipt_url, "https://pay.example/receipts/ch_123");
    }

    #[tokio::test]
    async fn reconcile_paid_is_idempotent_under_redelivery() {
        let fx = fixture();
        let id = fx.service.create(two_line_request(&fx)).await.unwrap().order.id;

        let event = PaidEvent {
            order_id: id,
            external_charge_id: "ch_123".into(),
            receipt_url: "https://pay.example/receipts/ch_123".into(),
        };
        let first = fx.service.reconcile_paid(event.clone()).await.unwrap();
        let second = fx.service.reconcile_paid(event).await.unwrap();

        assert_eq!(second.status, OrderStatus::Paid);
        assert_eq!(second.paid_at, first.paid_at);
        assert_eq!(fx.repo.receipts(id).await.len(), 1);
    }

    #[tokio::test]
    async fn reconcile_paid_for_an_unknown_order() {
        let fx = fixture();
        let err = fx
            .service
            .reconcile_paid(PaidEvent {
                order_id: Uuid::new_v4(),
                external_charge_id: "ch_404".into(),
                receipt_url: "https://pay.example/receipts/ch_404".into(),
            })
            .await
            .unwrap_err();
        assert_eq!(err, OrderError::InvalidData);
        assert_eq!(err.to_string(), "Invalid data provided");
    }
}
