use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;

use crate::error::AppError;
use crate::models::{
    Cart, Courier, Food, Offer, Order, Transaction, TransactionStatus, Vendor,
};
use crate::services::stores::{
    CartStore, CatalogStore, ConfirmOutcome, CourierStore, OfferStore, OrderStore, StatusUpdate,
    Stores, TransactionStore,
};

/// In-process store used for local runs and the test suite. The
/// compare-and-set operations take the shard lock via `get_mut` and
/// never await while holding it, so they are as atomic as the Mongo
/// equivalents.
#[derive(Default)]
pub struct MemoryStore {
    foods: DashMap<String, Food>,
    vendors: DashMap<String, Vendor>,
    offers: DashMap<String, Offer>,
    carts: DashMap<String, Cart>,
    transactions: DashMap<String, Transaction>,
    orders: DashMap<String, Order>,
    couriers: DashMap<String, Courier>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bundle one shared instance behind every store trait.
    pub fn stores(self: &Arc<Self>) -> Stores {
        Stores {
            catalog: self.clone(),
            offers: self.clone(),
            carts: self.clone(),
            transactions: self.clone(),
            orders: self.clone(),
            couriers: self.clone(),
        }
    }

    pub fn seed_food(&self, food: Food) {
        self.foods.insert(food.food_id.clone(), food);
    }

    pub fn seed_vendor(&self, vendor: Vendor) {
        self.vendors.insert(vendor.vendor_id.clone(), vendor);
    }

    pub fn seed_offer(&self, offer: Offer) {
        self.offers.insert(offer.offer_id.clone(), offer);
    }

    pub fn seed_courier(&self, courier: Courier) {
        self.couriers.insert(courier.courier_id.clone(), courier);
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn resolve_foods(&self, food_ids: &[String]) -> Result<Vec<Food>, AppError> {
        Ok(food_ids
            .iter()
            .filter_map(|id| self.foods.get(id).map(|entry| entry.value().clone()))
            .collect())
    }

    async fn find_vendor(&self, vendor_id: &str) -> Result<Option<Vendor>, AppError> {
        Ok(self.vendors.get(vendor_id).map(|entry| entry.value().clone()))
    }
}

#[async_trait]
impl OfferStore for MemoryStore {
    async fn find_offer(&self, offer_id: &str) -> Result<Option<Offer>, AppError> {
        Ok(self.offers.get(offer_id).map(|entry| entry.value().clone()))
    }
}

#[async_trait]
impl CartStore for MemoryStore {
    async fn find_cart(&self, customer_id: &str) -> Result<Option<Cart>, AppError> {
        Ok(self.carts.get(customer_id).map(|entry| entry.value().clone()))
    }

    async fn put_cart(
        &self,
        cart: &Cart,
        expected_version: Option<i64>,
    ) -> Result<bool, AppError> {
        match expected_version {
            None => match self.carts.entry(cart.customer_id.clone()) {
                Entry::Occupied(_) => Ok(false),
                Entry::Vacant(slot) => {
                    let mut stored = cart.clone();
                    stored.version = 0;
                    slot.insert(stored);
                    Ok(true)
                }
            },
            Some(expected) => match self.carts.get_mut(&cart.customer_id) {
                Some(mut current) if current.version == expected => {
                    let mut stored = cart.clone();
                    stored.version = expected + 1;
                    *current = stored;
                    Ok(true)
                }
                _ => Ok(false),
            },
        }
    }
}

#[async_trait]
impl TransactionStore for MemoryStore {
    async fn insert_transaction(&self, txn: &Transaction) -> Result<(), AppError> {
        self.transactions
            .insert(txn.transaction_id.clone(), txn.clone());
        Ok(())
    }

    async fn find_transaction(
        &self,
        transaction_id: &str,
    ) -> Result<Option<Transaction>, AppError> {
        Ok(self
            .transactions
            .get(transaction_id)
            .map(|entry| entry.value().clone()))
    }

    async fn confirm_transaction(
        &self,
        transaction_id: &str,
        order_id: &str,
        vendor_id: &str,
    ) -> Result<ConfirmOutcome, AppError> {
        let Some(mut txn) = self.transactions.get_mut(transaction_id) else {
            return Ok(ConfirmOutcome::Missing);
        };
        match txn.status {
            TransactionStatus::Open => {
                txn.status = TransactionStatus::Confirmed;
                txn.order_id = Some(order_id.to_string());
                txn.vendor_id = Some(vendor_id.to_string());
                txn.updated_utc = Utc::now();
                Ok(ConfirmOutcome::Confirmed)
            }
            TransactionStatus::Confirmed if txn.order_id.as_deref() == Some(order_id) => {
                Ok(ConfirmOutcome::AlreadyConfirmed)
            }
            _ => Ok(ConfirmOutcome::Conflict),
        }
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn insert_order(&self, order: &Order) -> Result<(), AppError> {
        self.orders.insert(order.order_id.clone(), order.clone());
        Ok(())
    }

    async fn find_order(&self, order_id: &str) -> Result<Option<Order>, AppError> {
        Ok(self.orders.get(order_id).map(|entry| entry.value().clone()))
    }

    async fn list_orders_by_customer(&self, customer_id: &str) -> Result<Vec<Order>, AppError> {
        let mut orders: Vec<Order> = self
            .orders
            .iter()
            .filter(|entry| entry.value().customer_id == customer_id)
            .map(|entry| entry.value().clone())
            .collect();
        orders.sort_by(|a, b| b.created_utc.cmp(&a.created_utc));
        Ok(orders)
    }

    async fn list_orders_by_vendor(&self, vendor_id: &str) -> Result<Vec<Order>, AppError> {
        let mut orders: Vec<Order> = self
            .orders
            .iter()
            .filter(|entry| entry.value().vendor_id == vendor_id)
            .map(|entry| entry.value().clone())
            .collect();
        orders.sort_by(|a, b| b.created_utc.cmp(&a.created_utc));
        Ok(orders)
    }

    async fn update_order_status(
        &self,
        order_id: &str,
        update: &StatusUpdate,
    ) -> Result<bool, AppError> {
        match self.orders.get_mut(order_id) {
            Some(mut order) if order.status == update.from => {
                order.status = update.to;
                if let Some(remarks) = &update.remarks {
                    order.remarks = Some(remarks.clone());
                }
                if let Some(minutes) = update.ready_minutes {
                    order.ready_minutes = minutes;
                }
                order.updated_utc = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn bind_courier(&self, order_id: &str, courier_id: &str) -> Result<bool, AppError> {
        match self.orders.get_mut(order_id) {
            Some(mut order)
                if order.courier_id.is_none() && order.status.accepts_courier() =>
            {
                order.courier_id = Some(courier_id.to_string());
                order.updated_utc = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_order(&self, order_id: &str) -> Result<(), AppError> {
        self.orders.remove(order_id);
        Ok(())
    }

    async fn list_orders_created_between(
        &self,
        created_after: DateTime<Utc>,
        created_before: DateTime<Utc>,
    ) -> Result<Vec<Order>, AppError> {
        let mut orders: Vec<Order> = self
            .orders
            .iter()
            .filter(|entry| {
                let order = entry.value();
                order.created_utc >= created_after && order.created_utc <= created_before
            })
            .map(|entry| entry.value().clone())
            .collect();
        orders.sort_by(|a, b| a.created_utc.cmp(&b.created_utc));
        Ok(orders)
    }

    async fn list_unassigned_orders(
        &self,
        created_after: DateTime<Utc>,
        created_before: DateTime<Utc>,
    ) -> Result<Vec<Order>, AppError> {
        Ok(self
            .orders
            .iter()
            .filter(|entry| {
                let order = entry.value();
                order.status.accepts_courier()
                    && order.courier_id.is_none()
                    && order.created_utc >= created_after
                    && order.created_utc <= created_before
            })
            .map(|entry| entry.value().clone())
            .collect())
    }
}

#[async_trait]
impl CourierStore for MemoryStore {
    async fn find_courier(&self, courier_id: &str) -> Result<Option<Courier>, AppError> {
        Ok(self
            .couriers
            .get(courier_id)
            .map(|entry| entry.value().clone()))
    }

    async fn list_assignable_couriers(&self, pincode: &str) -> Result<Vec<Courier>, AppError> {
        Ok(self
            .couriers
            .iter()
            .filter(|entry| {
                let courier = entry.value();
                courier.pincode == pincode && courier.is_assignable()
            })
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn claim_courier(&self, courier_id: &str, order_id: &str) -> Result<bool, AppError> {
        match self.couriers.get_mut(courier_id) {
            Some(mut courier) if courier.is_assignable() => {
                courier.is_available = false;
                courier.active_order_id = Some(order_id.to_string());
                courier.updated_utc = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn release_courier(&self, courier_id: &str, order_id: &str) -> Result<bool, AppError> {
        match self.couriers.get_mut(courier_id) {
            Some(mut courier) if courier.active_order_id.as_deref() == Some(order_id) => {
                courier.active_order_id = None;
                courier.is_available = true;
                courier.updated_utc = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn set_courier_status(
        &self,
        courier_id: &str,
        available: bool,
        lat: f64,
        lng: f64,
    ) -> Result<bool, AppError> {
        match self.couriers.get_mut(courier_id) {
            Some(mut courier) => {
                courier.is_available = available;
                courier.lat = lat;
                courier.lng = lng;
                courier.updated_utc = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CartLine;

    fn cart_for(customer: &str) -> Cart {
        let mut cart = Cart::new(customer.to_string());
        cart.lines.push(CartLine {
            food_id: "f-1".into(),
            quantity: 2,
        });
        cart
    }

    #[tokio::test]
    async fn cart_insert_then_stale_version_is_rejected() {
        let store = MemoryStore::new();
        let cart = cart_for("cust-1");

        assert!(store.put_cart(&cart, None).await.unwrap());
        // Second insert without a version loses.
        assert!(!store.put_cart(&cart, None).await.unwrap());
        // Version 0 guard succeeds once, then the stored version is 1.
        assert!(store.put_cart(&cart, Some(0)).await.unwrap());
        assert!(!store.put_cart(&cart, Some(0)).await.unwrap());
        let stored = store.find_cart("cust-1").await.unwrap().unwrap();
        assert_eq!(stored.version, 1);
    }

    #[tokio::test]
    async fn transaction_confirm_is_single_shot() {
        let store = MemoryStore::new();
        let txn = Transaction::open("cust-1".into(), 100.0, 100.0, "CARD".into(), None);
        let txn_id = txn.transaction_id.clone();
        store.insert_transaction(&txn).await.unwrap();

        assert_eq!(
            store.confirm_transaction(&txn_id, "o-1", "v-1").await.unwrap(),
            ConfirmOutcome::Confirmed
        );
        assert_eq!(
            store.confirm_transaction(&txn_id, "o-1", "v-1").await.unwrap(),
            ConfirmOutcome::AlreadyConfirmed
        );
        assert_eq!(
            store.confirm_transaction(&txn_id, "o-2", "v-1").await.unwrap(),
            ConfirmOutcome::Conflict
        );
        assert_eq!(
            store.confirm_transaction("nope", "o-1", "v-1").await.unwrap(),
            ConfirmOutcome::Missing
        );
    }

    #[tokio::test]
    async fn courier_claim_is_exclusive_and_released_by_owner_only() {
        let store = MemoryStore::new();
        store.seed_courier(Courier {
            id: None,
            courier_id: "c-1".into(),
            name: "Rider".into(),
            pincode: "560001".into(),
            verified: true,
            is_available: true,
            lat: 0.0,
            lng: 0.0,
            active_order_id: None,
            updated_utc: Utc::now(),
        });

        assert!(store.claim_courier("c-1", "o-1").await.unwrap());
        assert!(!store.claim_courier("c-1", "o-2").await.unwrap());
        // Wrong order cannot release.
        assert!(!store.release_courier("c-1", "o-2").await.unwrap());
        assert!(store.release_courier("c-1", "o-1").await.unwrap());
        assert!(store.claim_courier("c-1", "o-2").await.unwrap());
    }
}
