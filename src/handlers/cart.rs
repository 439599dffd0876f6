use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::AppError;
use crate::models::Cart;
use crate::services::CartView;
use crate::startup::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct UpsertCartLineRequest {
    #[validate(length(min = 1, message = "customer_id cannot be empty"))]
    pub customer_id: String,
    #[validate(length(min = 1, message = "food_id cannot be empty"))]
    pub food_id: String,
    /// Zero or negative removes the line.
    pub quantity: i32,
}

#[derive(Debug, Serialize)]
pub struct CartLineResponse {
    pub food_id: String,
    pub quantity: u32,
}

#[derive(Debug, Serialize)]
pub struct CartResponse {
    pub customer_id: String,
    pub lines: Vec<CartLineResponse>,
    pub version: i64,
}

impl From<Cart> for CartResponse {
    fn from(cart: Cart) -> Self {
        Self {
            customer_id: cart.customer_id,
            lines: cart
                .lines
                .into_iter()
                .map(|line| CartLineResponse {
                    food_id: line.food_id,
                    quantity: line.quantity,
                })
                .collect(),
            version: cart.version,
        }
    }
}

#[tracing::instrument(skip(state, request))]
pub async fn upsert_cart_line(
    State(state): State<AppState>,
    Json(request): Json<UpsertCartLineRequest>,
) -> Result<Json<CartResponse>, AppError> {
    request.validate()?;

    let cart = state
        .cart
        .upsert_line(&request.customer_id, &request.food_id, request.quantity)
        .await?;
    Ok(Json(cart.into()))
}

#[tracing::instrument(skip(state))]
pub async fn get_cart(
    State(state): State<AppState>,
    Path(customer_id): Path<String>,
) -> Result<Json<CartView>, AppError> {
    let view = state.cart.get_cart(&customer_id).await?;
    Ok(Json(view))
}
