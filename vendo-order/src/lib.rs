pub mod memory;
pub mod models;
pub mod repository;
pub mod service;

pub use memory::MemoryOrderRepository;
pub use models::{HydratedItem, HydratedOrder, Order, OrderItem, OrderReceipt, OrderStatus};
pub use repository::{NewOrder, NewOrderItem, OrderRecord, OrderRepository, PaymentRecord};
pub use service::{CreateOrder, OrderLine, OrderService, PagedOrders, Pagination, PaidEvent};
