use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::error::AppError;
use crate::models::{Cart, Courier, Food, Offer, Order, OrderStatus, Transaction, Vendor};

/// Result of the confirm-if-open compare-and-set on a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmOutcome {
    /// The transaction was OPEN and is now CONFIRMED against the order.
    Confirmed,
    /// Already CONFIRMED against this same order. Safe to treat as success.
    AlreadyConfirmed,
    /// No longer OPEN and not ours: confirmed against a different order,
    /// or failed in the meantime.
    Conflict,
    /// No transaction with that id.
    Missing,
}

/// Fields a status transition may update alongside the status itself.
#[derive(Debug, Clone)]
pub struct StatusUpdate {
    pub from: OrderStatus,
    pub to: OrderStatus,
    pub remarks: Option<String>,
    pub ready_minutes: Option<u32>,
}

#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Fetch the foods for the given ids. Missing ids are simply absent
    /// from the result; callers decide whether that is an error.
    async fn resolve_foods(&self, food_ids: &[String]) -> Result<Vec<Food>, AppError>;
    async fn find_vendor(&self, vendor_id: &str) -> Result<Option<Vendor>, AppError>;
}

#[async_trait]
pub trait OfferStore: Send + Sync {
    async fn find_offer(&self, offer_id: &str) -> Result<Option<Offer>, AppError>;
}

#[async_trait]
pub trait CartStore: Send + Sync {
    async fn find_cart(&self, customer_id: &str) -> Result<Option<Cart>, AppError>;

    /// Write a cart guarded by its version counter. `expected_version`
    /// `None` inserts a fresh cart (fails if one already exists);
    /// `Some(v)` replaces the cart only while its stored version is
    /// still `v`, bumping it to `v + 1`. Returns false when the guard
    /// does not hold.
    async fn put_cart(&self, cart: &Cart, expected_version: Option<i64>)
        -> Result<bool, AppError>;
}

#[async_trait]
pub trait TransactionStore: Send + Sync {
    async fn insert_transaction(&self, txn: &Transaction) -> Result<(), AppError>;
    async fn find_transaction(&self, transaction_id: &str)
        -> Result<Option<Transaction>, AppError>;

    /// Atomically move an OPEN transaction to CONFIRMED, binding it to
    /// the given order and vendor. At most one caller can win.
    async fn confirm_transaction(
        &self,
        transaction_id: &str,
        order_id: &str,
        vendor_id: &str,
    ) -> Result<ConfirmOutcome, AppError>;
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn insert_order(&self, order: &Order) -> Result<(), AppError>;
    async fn find_order(&self, order_id: &str) -> Result<Option<Order>, AppError>;
    async fn list_orders_by_customer(&self, customer_id: &str) -> Result<Vec<Order>, AppError>;
    async fn list_orders_by_vendor(&self, vendor_id: &str) -> Result<Vec<Order>, AppError>;

    /// Apply a status transition only while the stored status still
    /// equals `update.from`. Returns false if another writer got there
    /// first.
    async fn update_order_status(
        &self,
        order_id: &str,
        update: &StatusUpdate,
    ) -> Result<bool, AppError>;

    /// Record the courier carrying this order. Returns false when the
    /// order is missing, already has a courier, or is past the point
    /// of accepting one.
    async fn bind_courier(&self, order_id: &str, courier_id: &str) -> Result<bool, AppError>;

    /// Remove an order outright. Placement uses this to roll back an
    /// insert whose follow-up steps definitively failed.
    async fn delete_order(&self, order_id: &str) -> Result<(), AppError>;

    /// All orders created inside the window, oldest first. Feed for the
    /// reconciliation sweep.
    async fn list_orders_created_between(
        &self,
        created_after: DateTime<Utc>,
        created_before: DateTime<Utc>,
    ) -> Result<Vec<Order>, AppError>;

    /// Orders still waiting for a courier inside the window. The sweep
    /// re-enqueues these so assignment jobs lost to a restart are not
    /// lost forever.
    async fn list_unassigned_orders(
        &self,
        created_after: DateTime<Utc>,
        created_before: DateTime<Utc>,
    ) -> Result<Vec<Order>, AppError>;
}

#[async_trait]
pub trait CourierStore: Send + Sync {
    async fn find_courier(&self, courier_id: &str) -> Result<Option<Courier>, AppError>;

    /// Couriers eligible for assignment in a service area.
    async fn list_assignable_couriers(&self, pincode: &str) -> Result<Vec<Courier>, AppError>;

    /// Claim a courier for an order: available becomes busy and the
    /// order id is stamped, atomically. Returns false if the courier
    /// was grabbed by someone else in between.
    async fn claim_courier(&self, courier_id: &str, order_id: &str) -> Result<bool, AppError>;

    /// Release a courier from an order. Only releases if the courier is
    /// still bound to that exact order.
    async fn release_courier(&self, courier_id: &str, order_id: &str) -> Result<bool, AppError>;

    /// Courier-initiated availability and position update.
    async fn set_courier_status(
        &self,
        courier_id: &str,
        available: bool,
        lat: f64,
        lng: f64,
    ) -> Result<bool, AppError>;
}

/// Handles to every store, shared across services and handlers.
#[derive(Clone)]
pub struct Stores {
    pub catalog: Arc<dyn CatalogStore>,
    pub offers: Arc<dyn OfferStore>,
    pub carts: Arc<dyn CartStore>,
    pub transactions: Arc<dyn TransactionStore>,
    pub orders: Arc<dyn OrderStore>,
    pub couriers: Arc<dyn CourierStore>,
}
