use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::AppError;
use crate::models::Courier;
use crate::startup::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct CourierStatusRequest {
    pub is_available: bool,
    #[validate(range(min = -90.0, max = 90.0, message = "latitude out of range"))]
    pub lat: f64,
    #[validate(range(min = -180.0, max = 180.0, message = "longitude out of range"))]
    pub lng: f64,
}

#[derive(Debug, Serialize)]
pub struct CourierResponse {
    pub courier_id: String,
    pub name: String,
    pub pincode: String,
    pub verified: bool,
    pub is_available: bool,
    pub lat: f64,
    pub lng: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_order_id: Option<String>,
}

impl From<Courier> for CourierResponse {
    fn from(courier: Courier) -> Self {
        Self {
            courier_id: courier.courier_id,
            name: courier.name,
            pincode: courier.pincode,
            verified: courier.verified,
            is_available: courier.is_available,
            lat: courier.lat,
            lng: courier.lng,
            active_order_id: courier.active_order_id,
        }
    }
}

#[tracing::instrument(skip(state, request))]
pub async fn update_courier_status(
    State(state): State<AppState>,
    Path(courier_id): Path<String>,
    Json(request): Json<CourierStatusRequest>,
) -> Result<Json<CourierResponse>, AppError> {
    request.validate()?;

    let courier = state
        .assignment
        .set_courier_status(&courier_id, request.is_available, request.lat, request.lng)
        .await?;
    Ok(Json(courier.into()))
}
