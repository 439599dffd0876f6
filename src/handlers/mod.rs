//! HTTP handlers. Each one validates the request, calls the engine,
//! and lets `AppError` map the failure.

pub mod cart;
pub mod couriers;
pub mod health;
pub mod orders;
pub mod payments;

pub use cart::{get_cart, upsert_cart_line};
pub use couriers::update_courier_status;
pub use health::{health_check, metrics_endpoint, readiness_check};
pub use orders::{
    advance_order_status, get_order, list_customer_orders, list_vendor_orders, place_order,
};
pub use payments::open_payment;
