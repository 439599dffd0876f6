use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

/// A catalog item offered by a single vendor. Order lines snapshot the
/// fields they need from this at placement time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Food {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub food_id: String,
    pub vendor_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub food_type: String,
    pub price: f64,
    /// Preparation time in minutes, if the vendor supplied one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ready_time: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(default)]
    pub images: Vec<String>,
}
