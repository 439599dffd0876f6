use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::models::Food;

/// Order fulfillment status. Transitions follow the strict forward path
/// WAITING → PREPARING → READY → DISPATCHED → DELIVERED; CANCELLED is
/// reachable from any non-terminal state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Waiting,
    Preparing,
    Ready,
    Dispatched,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// Statuses in which an order can still be matched with a courier.
    pub fn accepts_courier(&self) -> bool {
        matches!(
            self,
            OrderStatus::Waiting | OrderStatus::Preparing | OrderStatus::Ready
        )
    }

    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        match (*self, next) {
            (Waiting, Preparing)
            | (Preparing, Ready)
            | (Ready, Dispatched)
            | (Dispatched, Delivered) => true,
            (current, Cancelled) => !current.is_terminal(),
            _ => false,
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatus::Waiting => write!(f, "WAITING"),
            OrderStatus::Preparing => write!(f, "PREPARING"),
            OrderStatus::Ready => write!(f, "READY"),
            OrderStatus::Dispatched => write!(f, "DISPATCHED"),
            OrderStatus::Delivered => write!(f, "DELIVERED"),
            OrderStatus::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

/// A line item frozen at order time. Catalog changes after placement never
/// touch these fields.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderLine {
    pub food_id: String,
    pub name: String,
    pub price: f64,
    #[serde(default)]
    pub images: Vec<String>,
    pub quantity: u32,
}

impl OrderLine {
    pub fn snapshot(food: &Food, quantity: u32) -> Self {
        Self {
            food_id: food.food_id.clone(),
            name: food.name.clone(),
            price: food.price,
            images: food.images.clone(),
            quantity,
        }
    }

    pub fn line_total(&self) -> f64 {
        self.price * self.quantity as f64
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub order_id: String,
    /// Short numeric display code shown to customers and vendors. Not a key;
    /// collisions are tolerated.
    pub order_code: String,
    pub customer_id: String,
    pub vendor_id: String,
    pub transaction_id: String,
    pub lines: Vec<OrderLine>,
    pub total_amount: f64,
    pub paid_amount: f64,
    pub status: OrderStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
    pub ready_minutes: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub courier_id: Option<String>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_utc: DateTime<Utc>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub updated_utc: DateTime<Utc>,
}

impl Order {
    pub fn create(
        customer_id: String,
        vendor_id: String,
        transaction_id: String,
        lines: Vec<OrderLine>,
        paid_amount: f64,
        ready_minutes: u32,
    ) -> Self {
        let total_amount = lines.iter().map(OrderLine::line_total).sum();
        let now = Utc::now();
        Self {
            id: None,
            order_id: uuid::Uuid::new_v4().to_string(),
            order_code: generate_order_code(),
            customer_id,
            vendor_id,
            transaction_id,
            lines,
            total_amount,
            paid_amount,
            status: OrderStatus::Waiting,
            remarks: None,
            ready_minutes,
            courier_id: None,
            created_utc: now,
            updated_utc: now,
        }
    }
}

/// 4–5 digit numeric display code.
pub fn generate_order_code() -> String {
    rand::thread_rng().gen_range(1000..=99999u32).to_string()
}
