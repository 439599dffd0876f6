use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::error::AppError;
use crate::models::{Cart, CartLine};
use crate::services::stores::{CartStore, CatalogStore};

/// Attempts before a contended optimistic write gives up.
const MAX_CAS_ATTEMPTS: u32 = 5;

/// One cart line joined with live catalog data, for display only. The
/// snapshots frozen into an order are taken separately at placement.
#[derive(Debug, Clone, Serialize)]
pub struct CartViewLine {
    pub food_id: String,
    pub name: String,
    pub unit_price: f64,
    pub quantity: u32,
    pub line_total: f64,
    pub images: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CartView {
    pub customer_id: String,
    pub lines: Vec<CartViewLine>,
    pub total_amount: f64,
}

#[derive(Clone)]
pub struct CartService {
    catalog: Arc<dyn CatalogStore>,
    carts: Arc<dyn CartStore>,
}

impl CartService {
    pub fn new(catalog: Arc<dyn CatalogStore>, carts: Arc<dyn CartStore>) -> Self {
        Self { catalog, carts }
    }

    /// Insert or overwrite one line; a quantity of zero or less removes
    /// it. Returns the cart as stored.
    #[instrument(skip(self))]
    pub async fn upsert_line(
        &self,
        customer_id: &str,
        food_id: &str,
        quantity: i32,
    ) -> Result<Cart, AppError> {
        let resolved = self.catalog.resolve_foods(&[food_id.to_string()]).await?;
        if resolved.is_empty() {
            return Err(AppError::NotFound(anyhow::anyhow!(
                "food {} not found in catalog",
                food_id
            )));
        }

        for _ in 0..MAX_CAS_ATTEMPTS {
            match self.carts.find_cart(customer_id).await? {
                None => {
                    if quantity <= 0 {
                        // Removing from a cart that does not exist.
                        return Ok(Cart::new(customer_id.to_string()));
                    }
                    let mut cart = Cart::new(customer_id.to_string());
                    cart.upsert_line(food_id, quantity);
                    if self.carts.put_cart(&cart, None).await? {
                        return Ok(cart);
                    }
                }
                Some(current) => {
                    let expected = current.version;
                    let mut next = current;
                    next.upsert_line(food_id, quantity);
                    next.updated_utc = chrono::Utc::now();
                    if self.carts.put_cart(&next, Some(expected)).await? {
                        next.version = expected + 1;
                        return Ok(next);
                    }
                }
            }
        }

        warn!(customer_id, "cart upsert lost the version race repeatedly");
        Err(AppError::ConcurrencyConflict(anyhow::anyhow!(
            "cart for customer {} is being modified concurrently",
            customer_id
        )))
    }

    /// The cart joined with current catalog prices. Lines whose food
    /// has left the catalog are dropped from the view; placement
    /// revalidates against the catalog anyway.
    #[instrument(skip(self))]
    pub async fn get_cart(&self, customer_id: &str) -> Result<CartView, AppError> {
        let Some(cart) = self.carts.find_cart(customer_id).await? else {
            return Ok(CartView {
                customer_id: customer_id.to_string(),
                lines: Vec::new(),
                total_amount: 0.0,
            });
        };

        let food_ids: Vec<String> = cart.lines.iter().map(|l| l.food_id.clone()).collect();
        let foods = self.catalog.resolve_foods(&food_ids).await?;

        let mut lines = Vec::with_capacity(cart.lines.len());
        let mut total = 0.0;
        for line in &cart.lines {
            if let Some(food) = foods.iter().find(|f| f.food_id == line.food_id) {
                let line_total = food.price * f64::from(line.quantity);
                total += line_total;
                lines.push(CartViewLine {
                    food_id: food.food_id.clone(),
                    name: food.name.clone(),
                    unit_price: food.price,
                    quantity: line.quantity,
                    line_total,
                    images: food.images.clone(),
                });
            }
        }

        Ok(CartView {
            customer_id: customer_id.to_string(),
            lines,
            total_amount: total,
        })
    }

    /// Remove the ordered lines from the cart under the version guard.
    /// Lines added concurrently with checkout survive; only quantities
    /// that went into the order leave the cart. Internal step of order
    /// placement, safe when the cart is already empty or gone.
    #[instrument(skip(self, ordered))]
    pub async fn clear_for_order(
        &self,
        customer_id: &str,
        ordered: &[CartLine],
    ) -> Result<(), AppError> {
        for _ in 0..MAX_CAS_ATTEMPTS {
            let Some(current) = self.carts.find_cart(customer_id).await? else {
                return Ok(());
            };
            let expected = current.version;
            let mut next = current;
            next.subtract_lines(ordered);
            next.updated_utc = chrono::Utc::now();
            if self.carts.put_cart(&next, Some(expected)).await? {
                info!(customer_id, "cart cleared after order");
                return Ok(());
            }
        }

        warn!(customer_id, "cart clear lost the version race repeatedly");
        Err(AppError::ConcurrencyConflict(anyhow::anyhow!(
            "cart for customer {} changed during checkout",
            customer_id
        )))
    }
}
