pub mod cart;
pub mod courier;
pub mod food;
pub mod offer;
pub mod order;
pub mod transaction;
pub mod vendor;

pub use cart::{Cart, CartLine};
pub use courier::Courier;
pub use food::Food;
pub use offer::Offer;
pub use order::{generate_order_code, Order, OrderLine, OrderStatus};
pub use transaction::{Transaction, TransactionStatus};
pub use vendor::{Vendor, DEFAULT_READY_MINUTES};

/// Serde helper for `Option<DateTime<Utc>>` stored as a BSON datetime.
/// The driver ships a helper for the non-optional case only.
pub mod opt_chrono_datetime_as_bson_datetime {
    use chrono::{DateTime, Utc};
    use mongodb::bson;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(dt) => bson::DateTime::from_chrono(*dt).serialize(serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<bson::DateTime>::deserialize(deserializer)?;
        Ok(value.map(|dt| dt.to_chrono()))
    }
}
