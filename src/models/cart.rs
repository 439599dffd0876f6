use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One pending selection: a food id and how many of it. food_id is unique
/// within a cart; re-adding overwrites the existing line's quantity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CartLine {
    pub food_id: String,
    pub quantity: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cart {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub customer_id: String,
    #[serde(default)]
    pub lines: Vec<CartLine>,
    /// Optimistic concurrency counter. Every write bumps it; conditional
    /// writes carry the version they read.
    pub version: i64,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub updated_utc: DateTime<Utc>,
}

impl Cart {
    pub fn new(customer_id: String) -> Self {
        Self {
            id: None,
            customer_id,
            lines: Vec::new(),
            version: 0,
            updated_utc: Utc::now(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Inserts or overwrites the line for `food_id`. A non-positive quantity
    /// removes the line if present.
    pub fn upsert_line(&mut self, food_id: &str, quantity: i32) {
        if quantity <= 0 {
            self.lines.retain(|l| l.food_id != food_id);
            return;
        }
        let quantity = quantity as u32;
        match self.lines.iter_mut().find(|l| l.food_id == food_id) {
            Some(line) => line.quantity = quantity,
            None => self.lines.push(CartLine {
                food_id: food_id.to_string(),
                quantity,
            }),
        }
    }

    /// Removes exactly the given quantities, dropping lines that reach zero.
    /// Lines added concurrently (not present in `ordered`) are preserved.
    pub fn subtract_lines(&mut self, ordered: &[CartLine]) {
        let mut take: HashMap<&str, u32> = HashMap::new();
        for line in ordered {
            *take.entry(line.food_id.as_str()).or_insert(0) += line.quantity;
        }
        for line in &mut self.lines {
            if let Some(qty) = take.get(line.food_id.as_str()) {
                line.quantity = line.quantity.saturating_sub(*qty);
            }
        }
        self.lines.retain(|l| l.quantity > 0);
    }

    /// Multiset equality against a set of requested lines, ignoring order.
    pub fn same_lines(&self, requested: &[CartLine]) -> bool {
        fn to_map(lines: &[CartLine]) -> HashMap<&str, u32> {
            let mut map = HashMap::new();
            for line in lines {
                *map.entry(line.food_id.as_str()).or_insert(0) += line.quantity;
            }
            map
        }
        to_map(&self.lines) == to_map(requested)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(food_id: &str, quantity: u32) -> CartLine {
        CartLine {
            food_id: food_id.to_string(),
            quantity,
        }
    }

    #[test]
    fn upsert_overwrites_existing_line_in_place() {
        let mut cart = Cart::new("c1".into());
        cart.upsert_line("f1", 2);
        cart.upsert_line("f1", 5);
        assert_eq!(cart.lines, vec![line("f1", 5)]);
    }

    #[test]
    fn non_positive_quantity_removes_the_line() {
        let mut cart = Cart::new("c1".into());
        cart.upsert_line("f1", 2);
        cart.upsert_line("f2", 1);
        cart.upsert_line("f1", 0);
        assert_eq!(cart.lines, vec![line("f2", 1)]);
        // removing an absent line is a no-op
        cart.upsert_line("f9", -3);
        assert_eq!(cart.lines, vec![line("f2", 1)]);
    }

    #[test]
    fn subtract_preserves_concurrent_additions() {
        let mut cart = Cart::new("c1".into());
        cart.upsert_line("f1", 2);
        cart.upsert_line("f2", 3);
        cart.subtract_lines(&[line("f1", 2)]);
        assert_eq!(cart.lines, vec![line("f2", 3)]);
    }

    #[test]
    fn same_lines_is_order_insensitive() {
        let mut cart = Cart::new("c1".into());
        cart.upsert_line("f1", 2);
        cart.upsert_line("f2", 1);
        assert!(cart.same_lines(&[line("f2", 1), line("f1", 2)]));
        assert!(!cart.same_lines(&[line("f1", 2)]));
        assert!(!cart.same_lines(&[line("f1", 1), line("f2", 1)]));
    }
}
