pub mod bus;
pub mod clients;
pub mod dispatch;
pub mod dto;

/// Message subjects this service serves and consumes.
pub mod subjects {
    // Served
    pub const ORDER_CREATE: &str = "order.create";
    pub const ORDER_FIND_ALL: &str = "order.findAll";
    pub const ORDER_FIND_ONE: &str = "order.findOne";
    pub const ORDER_CHANGE_STATUS: &str = "order.changeStatus";
    pub const ORDER_CREATE_PAYMENT_SESSION: &str = "order.createPaymentSession";
    pub const ORDER_PAID: &str = "order.paid";

    // Consumed from collaborators
    pub const VALIDATE_PRODUCTS: &str = "validate_products";
    pub const CREATE_PAYMENT_SESSION: &str = "create_payment_session";
}
