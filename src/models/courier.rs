use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

/// A delivery rider. Assignment claims a courier by flipping
/// `is_available` and stamping `active_order_id` in a single atomic
/// update; release reverses both.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Courier {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub courier_id: String,
    pub name: String,
    /// Service area the courier operates in.
    pub pincode: String,
    /// Only verified couriers are eligible for assignment.
    pub verified: bool,
    pub is_available: bool,
    pub lat: f64,
    pub lng: f64,
    /// The order this courier is currently carrying, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_order_id: Option<String>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub updated_utc: DateTime<Utc>,
}

impl Courier {
    /// Eligible to receive a new order right now.
    pub fn is_assignable(&self) -> bool {
        self.verified && self.is_available && self.active_order_id.is_none()
    }
}
