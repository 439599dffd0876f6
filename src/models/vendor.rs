use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

/// Fallback preparation estimate when a vendor has not set one.
pub const DEFAULT_READY_MINUTES: u32 = 45;

/// A restaurant on the platform. Orders are scoped to exactly one vendor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vendor {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub vendor_id: String,
    pub name: String,
    pub pincode: String,
    pub lat: f64,
    pub lng: f64,
    /// Typical preparation time in minutes, if configured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ready_minutes: Option<u32>,
    /// Whether the vendor is currently taking orders.
    #[serde(default = "default_service_available")]
    pub service_available: bool,
}

fn default_service_available() -> bool {
    true
}

impl Vendor {
    pub fn effective_ready_minutes(&self) -> u32 {
        self.ready_minutes.unwrap_or(DEFAULT_READY_MINUTES)
    }
}
