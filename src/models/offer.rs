use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

use super::opt_chrono_datetime_as_bson_datetime;

/// A promotional discount a customer may apply when opening a payment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Offer {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub offer_id: String,
    pub title: String,
    pub is_active: bool,
    /// Flat discount applied to the transaction amount.
    pub discount_amount: f64,
    /// Minimum transaction amount the offer applies to.
    #[serde(default)]
    pub min_order_amount: f64,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "opt_chrono_datetime_as_bson_datetime"
    )]
    pub valid_until: Option<DateTime<Utc>>,
}

impl Offer {
    /// An offer is usable when it is active and has not passed its expiry.
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.valid_until.map_or(true, |until| now <= until)
    }

    /// Whether the offer's minimum spend is met.
    pub fn covers_amount(&self, amount: f64) -> bool {
        amount >= self.min_order_amount
    }
}
