use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

/// Settlement state of a payment attempt. A transaction is created OPEN,
/// moves to CONFIRMED exactly once (when its order is created) and never
/// reverts. FAILED transactions can never back an order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Open,
    Confirmed,
    Failed,
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionStatus::Open => write!(f, "OPEN"),
            TransactionStatus::Confirmed => write!(f, "CONFIRMED"),
            TransactionStatus::Failed => write!(f, "FAILED"),
        }
    }
}

/// A payment attempt, recorded before and independently of any order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub transaction_id: String,
    pub customer_id: String,
    /// Set when the transaction is confirmed against an order, never before.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vendor_id: Option<String>,
    /// Amount the customer submitted for payment.
    pub amount: f64,
    /// Amount actually payable after any offer discount.
    pub payable_amount: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offer_id: Option<String>,
    pub status: TransactionStatus,
    pub payment_mode: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<String>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_utc: DateTime<Utc>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub updated_utc: DateTime<Utc>,
}

impl Transaction {
    pub fn open(
        customer_id: String,
        amount: f64,
        payable_amount: f64,
        payment_mode: String,
        offer_id: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: None,
            transaction_id: uuid::Uuid::new_v4().to_string(),
            customer_id,
            order_id: None,
            vendor_id: None,
            amount,
            payable_amount,
            offer_id,
            status: TransactionStatus::Open,
            payment_mode,
            raw_response: None,
            created_utc: now,
            updated_utc: now,
        }
    }
}
