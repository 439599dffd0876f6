use std::collections::HashSet;
use tracing::{error, info, instrument, warn};

use crate::error::AppError;
use crate::models::{
    CartLine, Order, OrderLine, OrderStatus, TransactionStatus, DEFAULT_READY_MINUTES,
};
use crate::services::assignment::{AssignmentJob, AssignmentQueue};
use crate::services::cart::CartService;
use crate::services::ledger::LedgerService;
use crate::services::metrics::{record_order_placed, record_status_transition};
use crate::services::stores::{ConfirmOutcome, StatusUpdate, Stores};

/// Attempts for the contended sub-steps of placement (cart clear,
/// transaction confirm) and for status-change races.
const MAX_SUBSTEP_ATTEMPTS: u32 = 5;

#[derive(Clone)]
pub struct OrderService {
    stores: Stores,
    cart: CartService,
    ledger: LedgerService,
    assignments: AssignmentQueue,
}

impl OrderService {
    pub fn new(
        stores: Stores,
        cart: CartService,
        ledger: LedgerService,
        assignments: AssignmentQueue,
    ) -> Self {
        Self {
            stores,
            cart,
            ledger,
            assignments,
        }
    }

    /// Convert a priced cart plus a usable payment into a durable
    /// order. All validation happens before the first write; after the
    /// order insert, the cart clear can roll the insert back, and a
    /// confirm left hanging by a crash is repaired by the
    /// reconciliation sweep.
    #[instrument(skip(self, requested_lines), fields(line_count = requested_lines.len()))]
    pub async fn place_order(
        &self,
        customer_id: &str,
        transaction_id: &str,
        requested_lines: &[CartLine],
        paid_amount: f64,
    ) -> Result<Order, AppError> {
        if requested_lines.is_empty() {
            return Err(AppError::ItemUnavailable(anyhow::anyhow!(
                "order has no lines"
            )));
        }

        // 1. Payment gate. A FAILED or missing transaction never backs
        // an order; a CONFIRMED one is already spent.
        let (txn, valid) = match self.ledger.validate_transaction(transaction_id).await {
            Ok(pair) => pair,
            Err(AppError::NotFound(err)) => return Err(AppError::PaymentInvalid(err)),
            Err(err) => return Err(err),
        };
        if !valid {
            return Err(AppError::PaymentInvalid(anyhow::anyhow!(
                "transaction {} has failed",
                transaction_id
            )));
        }
        if txn.status == TransactionStatus::Confirmed {
            return Err(AppError::PaymentInvalid(anyhow::anyhow!(
                "transaction {} is already bound to an order",
                transaction_id
            )));
        }
        if txn.customer_id != customer_id {
            return Err(AppError::PaymentInvalid(anyhow::anyhow!(
                "transaction {} belongs to a different customer",
                transaction_id
            )));
        }

        // 2. The submitted lines must be exactly what the cart holds;
        // drift means the customer checked out against a stale view.
        let cart = self.stores.carts.find_cart(customer_id).await?;
        let cart_matches = match &cart {
            Some(cart) => cart.same_lines(requested_lines),
            None => requested_lines.is_empty(),
        };
        if !cart_matches {
            return Err(AppError::ConcurrencyConflict(anyhow::anyhow!(
                "cart for customer {} changed since checkout began",
                customer_id
            )));
        }

        // 3. Authoritative re-pricing from the catalog.
        let distinct_ids: Vec<String> = {
            let mut seen = HashSet::new();
            requested_lines
                .iter()
                .filter(|line| seen.insert(line.food_id.as_str()))
                .map(|line| line.food_id.clone())
                .collect()
        };
        let foods = self.stores.catalog.resolve_foods(&distinct_ids).await?;
        let missing: Vec<&str> = distinct_ids
            .iter()
            .filter(|id| !foods.iter().any(|f| &f.food_id == *id))
            .map(|id| id.as_str())
            .collect();
        if !missing.is_empty() {
            return Err(AppError::ItemUnavailable(anyhow::anyhow!(
                "items not available: {}",
                missing.join(", ")
            )));
        }

        // 4. One vendor per order.
        let vendors: HashSet<&str> = foods.iter().map(|f| f.vendor_id.as_str()).collect();
        if vendors.len() != 1 {
            return Err(AppError::MixedVendorOrder(anyhow::anyhow!(
                "order spans {} vendors",
                vendors.len()
            )));
        }
        let vendor_id = foods[0].vendor_id.clone();

        let ready_minutes = match self.stores.catalog.find_vendor(&vendor_id).await? {
            Some(vendor) => vendor.effective_ready_minutes(),
            None => {
                warn!(vendor_id, "vendor record missing, using default prep time");
                DEFAULT_READY_MINUTES
            }
        };

        // 5. Snapshot lines in the order they were requested.
        let mut lines = Vec::with_capacity(requested_lines.len());
        for line in requested_lines {
            let Some(food) = foods.iter().find(|f| f.food_id == line.food_id) else {
                return Err(AppError::ItemUnavailable(anyhow::anyhow!(
                    "items not available: {}",
                    line.food_id
                )));
            };
            lines.push(OrderLine::snapshot(food, line.quantity));
        }

        let order = Order::create(
            customer_id.to_string(),
            vendor_id.clone(),
            transaction_id.to_string(),
            lines,
            paid_amount,
            ready_minutes,
        );
        self.stores.orders.insert_order(&order).await?;

        // 6. Version-checked cart clear. If it definitively fails the
        // order insert is rolled back, since the payment is not yet
        // bound.
        if let Err(err) = self.cart.clear_for_order(customer_id, requested_lines).await {
            warn!(
                order_id = %order.order_id,
                "cart clear failed, rolling back order: {}",
                err
            );
            if let Err(rollback_err) = self.stores.orders.delete_order(&order.order_id).await {
                error!(
                    order_id = %order.order_id,
                    "order rollback failed, reconciliation will flag it: {}",
                    rollback_err
                );
            }
            return Err(err);
        }

        // 7. Bind the payment. Transient store errors are retried here
        // and, failing that, left to the reconciliation sweep; losing
        // the CAS means another placement spent this transaction.
        match self
            .confirm_with_retry(transaction_id, &order.order_id, &vendor_id)
            .await
        {
            Some(ConfirmOutcome::Confirmed) | Some(ConfirmOutcome::AlreadyConfirmed) => {}
            Some(_) => {
                if let Err(rollback_err) = self.stores.orders.delete_order(&order.order_id).await
                {
                    error!(
                        order_id = %order.order_id,
                        "order rollback failed after confirm conflict: {}",
                        rollback_err
                    );
                }
                return Err(AppError::PaymentInvalid(anyhow::anyhow!(
                    "transaction {} was spent by another order",
                    transaction_id
                )));
            }
            None => {
                error!(
                    order_id = %order.order_id,
                    transaction_id,
                    "transaction confirm kept failing, leaving repair to reconciliation"
                );
            }
        }

        // 8. Hand delivery to the background dispatcher. Its outcome
        // never affects placement.
        self.assignments
            .submit(AssignmentJob {
                order_id: order.order_id.clone(),
                vendor_id: vendor_id.clone(),
            })
            .await;

        record_order_placed(&vendor_id);
        info!(
            order_id = %order.order_id,
            order_code = %order.order_code,
            vendor_id,
            total_amount = order.total_amount,
            "order placed"
        );
        Ok(order)
    }

    /// Retry the confirm CAS across transient store failures only.
    /// `None` means the outcome is unknown after exhausting attempts.
    async fn confirm_with_retry(
        &self,
        transaction_id: &str,
        order_id: &str,
        vendor_id: &str,
    ) -> Option<ConfirmOutcome> {
        for attempt in 1..=MAX_SUBSTEP_ATTEMPTS {
            match self
                .ledger
                .confirm_transaction(transaction_id, order_id, vendor_id)
                .await
            {
                Ok(outcome) => return Some(outcome),
                Err(err) => {
                    warn!(
                        transaction_id,
                        attempt, "transaction confirm attempt failed: {}", err
                    );
                }
            }
        }
        None
    }

    /// Vendor-driven status change along the strict forward path, with
    /// cancellation allowed from any non-terminal state. The write is a
    /// compare-and-set on the current status, retried when another
    /// writer moves the order first.
    #[instrument(skip(self))]
    pub async fn advance_status(
        &self,
        order_id: &str,
        new_status: OrderStatus,
        remarks: Option<String>,
        ready_minutes: Option<u32>,
    ) -> Result<Order, AppError> {
        for _ in 0..MAX_SUBSTEP_ATTEMPTS {
            let order = self
                .stores
                .orders
                .find_order(order_id)
                .await?
                .ok_or_else(|| {
                    AppError::NotFound(anyhow::anyhow!("order {} not found", order_id))
                })?;

            if !order.status.can_transition_to(new_status) {
                return Err(AppError::InvalidTransition(anyhow::anyhow!(
                    "cannot move order {} from {} to {}",
                    order_id,
                    order.status,
                    new_status
                )));
            }

            let update = StatusUpdate {
                from: order.status,
                to: new_status,
                remarks: remarks.clone(),
                ready_minutes,
            };
            if !self
                .stores
                .orders
                .update_order_status(order_id, &update)
                .await?
            {
                // Someone else moved the order; re-read and re-check.
                continue;
            }

            if (new_status == OrderStatus::Cancelled || new_status == OrderStatus::Delivered)
                && order.courier_id.is_some()
            {
                self.release_courier_for(&order).await;
            }

            record_status_transition(&new_status.to_string());
            info!(order_id, from = %order.status, to = %new_status, "order status advanced");

            return self
                .stores
                .orders
                .find_order(order_id)
                .await?
                .ok_or_else(|| {
                    AppError::NotFound(anyhow::anyhow!("order {} not found", order_id))
                });
        }

        Err(AppError::ConcurrencyConflict(anyhow::anyhow!(
            "order {} status is changing concurrently",
            order_id
        )))
    }

    /// Free the courier once the order leaves the road, so cancels and
    /// deliveries put riders back into the pool.
    async fn release_courier_for(&self, order: &Order) {
        let Some(courier_id) = order.courier_id.as_deref() else {
            return;
        };
        match self
            .stores
            .couriers
            .release_courier(courier_id, &order.order_id)
            .await
        {
            Ok(true) => {
                info!(order_id = %order.order_id, courier_id, "courier released");
            }
            Ok(false) => {
                warn!(
                    order_id = %order.order_id,
                    courier_id, "courier was not bound to this order at release"
                );
            }
            Err(err) => {
                error!(
                    order_id = %order.order_id,
                    courier_id, "courier release failed: {}", err
                );
            }
        }
    }

    pub async fn get_order(&self, order_id: &str) -> Result<Order, AppError> {
        self.stores
            .orders
            .find_order(order_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("order {} not found", order_id)))
    }

    pub async fn list_customer_orders(&self, customer_id: &str) -> Result<Vec<Order>, AppError> {
        self.stores.orders.list_orders_by_customer(customer_id).await
    }

    pub async fn list_vendor_orders(&self, vendor_id: &str) -> Result<Vec<Order>, AppError> {
        self.stores.orders.list_orders_by_vendor(vendor_id).await
    }
}
