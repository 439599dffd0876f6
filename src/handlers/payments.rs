use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::AppError;
use crate::models::Transaction;
use crate::startup::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct OpenPaymentRequest {
    #[validate(length(min = 1, message = "customer_id cannot be empty"))]
    pub customer_id: String,
    #[validate(range(min = 0.01, message = "amount must be positive"))]
    pub amount: f64,
    #[validate(length(min = 1, message = "payment_mode cannot be empty"))]
    pub payment_mode: String,
    pub offer_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TransactionResponse {
    pub transaction_id: String,
    pub customer_id: String,
    pub amount: f64,
    pub payable_amount: f64,
    pub status: String,
    pub payment_mode: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offer_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    pub created_utc: DateTime<Utc>,
}

impl From<Transaction> for TransactionResponse {
    fn from(txn: Transaction) -> Self {
        Self {
            transaction_id: txn.transaction_id,
            customer_id: txn.customer_id,
            amount: txn.amount,
            payable_amount: txn.payable_amount,
            status: txn.status.to_string(),
            payment_mode: txn.payment_mode,
            offer_id: txn.offer_id,
            order_id: txn.order_id,
            created_utc: txn.created_utc,
        }
    }
}

#[tracing::instrument(skip(state, request))]
pub async fn open_payment(
    State(state): State<AppState>,
    Json(request): Json<OpenPaymentRequest>,
) -> Result<(StatusCode, Json<TransactionResponse>), AppError> {
    request.validate()?;

    let txn = state
        .ledger
        .open_transaction(
            &request.customer_id,
            request.amount,
            &request.payment_mode,
            request.offer_id.as_deref(),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(txn.into())))
}
