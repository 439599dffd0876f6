use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::AppError;
use crate::models::{CartLine, Order, OrderStatus};
use crate::startup::AppState;

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct OrderLineRequest {
    #[validate(length(min = 1, message = "food_id cannot be empty"))]
    pub food_id: String,
    #[validate(range(min = 1, message = "quantity must be at least 1"))]
    pub quantity: u32,
}

#[derive(Debug, Deserialize, Validate)]
pub struct PlaceOrderRequest {
    #[validate(length(min = 1, message = "customer_id cannot be empty"))]
    pub customer_id: String,
    #[validate(length(min = 1, message = "transaction_id cannot be empty"))]
    pub transaction_id: String,
    #[validate(range(min = 0.0, message = "paid_amount cannot be negative"))]
    pub paid_amount: f64,
    #[validate(length(min = 1, message = "an order needs at least one line"))]
    #[validate(nested)]
    pub lines: Vec<OrderLineRequest>,
}

#[derive(Debug, Deserialize)]
pub struct AdvanceStatusRequest {
    pub status: OrderStatus,
    pub remarks: Option<String>,
    pub ready_minutes: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct OrderLineResponse {
    pub food_id: String,
    pub name: String,
    pub price: f64,
    pub quantity: u32,
    pub images: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub order_id: String,
    pub order_code: String,
    pub customer_id: String,
    pub vendor_id: String,
    pub transaction_id: String,
    pub status: String,
    pub lines: Vec<OrderLineResponse>,
    pub total_amount: f64,
    pub paid_amount: f64,
    pub ready_minutes: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub courier_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            order_id: order.order_id,
            order_code: order.order_code,
            customer_id: order.customer_id,
            vendor_id: order.vendor_id,
            transaction_id: order.transaction_id,
            status: order.status.to_string(),
            lines: order
                .lines
                .into_iter()
                .map(|line| OrderLineResponse {
                    food_id: line.food_id,
                    name: line.name,
                    price: line.price,
                    quantity: line.quantity,
                    images: line.images,
                })
                .collect(),
            total_amount: order.total_amount,
            paid_amount: order.paid_amount,
            ready_minutes: order.ready_minutes,
            courier_id: order.courier_id,
            remarks: order.remarks,
            created_utc: order.created_utc,
            updated_utc: order.updated_utc,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct OrderListResponse {
    pub orders: Vec<OrderResponse>,
    pub count: usize,
}

impl From<Vec<Order>> for OrderListResponse {
    fn from(orders: Vec<Order>) -> Self {
        let orders: Vec<OrderResponse> = orders.into_iter().map(Into::into).collect();
        Self {
            count: orders.len(),
            orders,
        }
    }
}

#[tracing::instrument(skip(state, request))]
pub async fn place_order(
    State(state): State<AppState>,
    Json(request): Json<PlaceOrderRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), AppError> {
    request.validate()?;

    let lines: Vec<CartLine> = request
        .lines
        .iter()
        .map(|line| CartLine {
            food_id: line.food_id.clone(),
            quantity: line.quantity,
        })
        .collect();

    let order = state
        .orders
        .place_order(
            &request.customer_id,
            &request.transaction_id,
            &lines,
            request.paid_amount,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(order.into())))
}

#[tracing::instrument(skip(state))]
pub async fn get_order(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Result<Json<OrderResponse>, AppError> {
    let order = state.orders.get_order(&order_id).await?;
    Ok(Json(order.into()))
}

#[tracing::instrument(skip(state, request))]
pub async fn advance_order_status(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
    Json(request): Json<AdvanceStatusRequest>,
) -> Result<Json<OrderResponse>, AppError> {
    let order = state
        .orders
        .advance_status(
            &order_id,
            request.status,
            request.remarks,
            request.ready_minutes,
        )
        .await?;
    Ok(Json(order.into()))
}

#[tracing::instrument(skip(state))]
pub async fn list_customer_orders(
    State(state): State<AppState>,
    Path(customer_id): Path<String>,
) -> Result<Json<OrderListResponse>, AppError> {
    let orders = state.orders.list_customer_orders(&customer_id).await?;
    Ok(Json(orders.into()))
}

#[tracing::instrument(skip(state))]
pub async fn list_vendor_orders(
    State(state): State<AppState>,
    Path(vendor_id): Path<String>,
) -> Result<Json<OrderListResponse>, AppError> {
    let orders = state.orders.list_vendor_orders(&vendor_id).await?;
    Ok(Json(orders.into()))
}
