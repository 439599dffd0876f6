//! Common test utilities for food-order-service integration tests.
//!
//! Every test spawns its own application on the in-memory store, so
//! tests are isolated and need no external services.
#![allow(dead_code)]

use chrono::Utc;
use food_order_service::config::{
    AssignmentConfig, Config, DatabaseConfig, ReconciliationConfig, ServerConfig, StoreBackend,
};
use food_order_service::models::{Courier, Food, Offer, Vendor};
use food_order_service::services::MemoryStore;
use food_order_service::startup::Application;
use serde_json::{json, Value};
use std::sync::Arc;
use std::sync::Once;
use std::time::Duration;

static INIT: Once = Once::new();

/// Initialize tracing for tests (only once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("info,food_order_service=debug")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

fn test_config() -> Config {
    Config {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
        },
        database: DatabaseConfig {
            url: None,
            db_name: "food_order_test".to_string(),
        },
        store_backend: StoreBackend::Memory,
        assignment: AssignmentConfig {
            max_attempts: 4,
            base_delay_ms: 5,
            max_delay_ms: 20,
        },
        reconciliation: ReconciliationConfig {
            enabled: false,
            interval_secs: 3600,
            grace_secs: 0,
            lookback_hours: 24,
        },
        service_name: "food-order-service-test".to_string(),
    }
}

/// Test application wrapper.
pub struct TestApp {
    pub address: String,
    pub client: reqwest::Client,
    pub store: Arc<MemoryStore>,
}

/// Spawn a test application on a random port and wait until it answers.
pub async fn spawn_app() -> TestApp {
    init_tracing();

    let app = Application::build(test_config())
        .await
        .expect("Failed to build application");
    let port = app.port();
    let store = app
        .state()
        .backend
        .memory()
        .expect("test app should run on the in-memory store");

    tokio::spawn(async move {
        app.run_until_stopped().await.ok();
    });

    let address = format!("http://127.0.0.1:{}", port);
    let client = reqwest::Client::new();

    // Wait for server to be ready with retry
    let mut attempts = 0;
    loop {
        match client.get(format!("{}/health", address)).send().await {
            Ok(_) => break,
            Err(_) if attempts < 20 => {
                attempts += 1;
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
            Err(e) => panic!("Failed to reach test server after 20 attempts: {}", e),
        }
    }

    TestApp {
        address,
        client,
        store,
    }
}

impl TestApp {
    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.client
            .get(format!("{}{}", self.address, path))
            .send()
            .await
            .expect("request failed")
    }

    pub async fn post_json(&self, path: &str, body: &Value) -> reqwest::Response {
        self.client
            .post(format!("{}{}", self.address, path))
            .json(body)
            .send()
            .await
            .expect("request failed")
    }

    pub async fn patch_json(&self, path: &str, body: &Value) -> reqwest::Response {
        self.client
            .patch(format!("{}{}", self.address, path))
            .json(body)
            .send()
            .await
            .expect("request failed")
    }

    pub async fn add_cart_line(
        &self,
        customer_id: &str,
        food_id: &str,
        quantity: i32,
    ) -> reqwest::Response {
        self.post_json(
            "/cart",
            &json!({
                "customer_id": customer_id,
                "food_id": food_id,
                "quantity": quantity,
            }),
        )
        .await
    }

    /// Open a payment transaction and return its id. Panics on failure;
    /// tests exercising payment errors call `/payments` directly.
    pub async fn open_test_payment(
        &self,
        customer_id: &str,
        amount: f64,
        offer_id: Option<&str>,
    ) -> String {
        let response = self
            .post_json(
                "/payments",
                &json!({
                    "customer_id": customer_id,
                    "amount": amount,
                    "payment_mode": "CARD",
                    "offer_id": offer_id,
                }),
            )
            .await;
        assert_eq!(response.status().as_u16(), 201, "payment open failed");
        let body: Value = response.json().await.expect("invalid payment response");
        body["transaction_id"]
            .as_str()
            .expect("missing transaction_id")
            .to_string()
    }

    pub async fn place_order(
        &self,
        customer_id: &str,
        transaction_id: &str,
        lines: &[(&str, u32)],
        paid_amount: f64,
    ) -> reqwest::Response {
        let lines: Vec<Value> = lines
            .iter()
            .map(|(food_id, quantity)| json!({ "food_id": food_id, "quantity": quantity }))
            .collect();
        self.post_json(
            "/orders",
            &json!({
                "customer_id": customer_id,
                "transaction_id": transaction_id,
                "paid_amount": paid_amount,
                "lines": lines,
            }),
        )
        .await
    }
}

/// Cart + payment + placement against the standard catalog, returning
/// the order as JSON. Panics on any failure along the way.
pub async fn place_standard_order(app: &TestApp, customer_id: &str) -> Value {
    let response = app.add_cart_line(customer_id, "f-dosa", 1).await;
    assert_eq!(response.status().as_u16(), 200, "cart add failed");
    let txn_id = app.open_test_payment(customer_id, 150.0, None).await;
    let response = app
        .place_order(customer_id, &txn_id, &[("f-dosa", 1)], 150.0)
        .await;
    assert_eq!(response.status().as_u16(), 201, "order placement failed");
    response.json().await.expect("invalid order response")
}

/// Poll until the background worker binds a courier to the order.
pub async fn wait_for_assignment(app: &TestApp, order_id: &str) -> String {
    use food_order_service::services::OrderStore;
    for _ in 0..40 {
        let order = app
            .store
            .find_order(order_id)
            .await
            .unwrap()
            .expect("order disappeared while waiting for assignment");
        if let Some(courier_id) = order.courier_id {
            return courier_id;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("no courier assigned to order {} within a second", order_id);
}

pub fn test_food(food_id: &str, vendor_id: &str, name: &str, price: f64) -> Food {
    Food {
        id: None,
        food_id: food_id.to_string(),
        vendor_id: vendor_id.to_string(),
        name: name.to_string(),
        description: String::new(),
        category: None,
        food_type: "VEG".to_string(),
        price,
        ready_time: None,
        rating: None,
        images: Vec::new(),
    }
}

pub fn test_vendor(
    vendor_id: &str,
    pincode: &str,
    lat: f64,
    lng: f64,
    ready_minutes: Option<u32>,
) -> Vendor {
    Vendor {
        id: None,
        vendor_id: vendor_id.to_string(),
        name: format!("Vendor {}", vendor_id),
        pincode: pincode.to_string(),
        lat,
        lng,
        ready_minutes,
        service_available: true,
    }
}

pub fn test_courier(courier_id: &str, pincode: &str, lat: f64, lng: f64) -> Courier {
    Courier {
        id: None,
        courier_id: courier_id.to_string(),
        name: format!("Courier {}", courier_id),
        pincode: pincode.to_string(),
        verified: true,
        is_available: true,
        lat,
        lng,
        active_order_id: None,
        updated_utc: Utc::now(),
    }
}

pub fn test_offer(offer_id: &str, discount_amount: f64, min_order_amount: f64) -> Offer {
    Offer {
        id: None,
        offer_id: offer_id.to_string(),
        title: format!("Offer {}", offer_id),
        is_active: true,
        discount_amount,
        min_order_amount,
        valid_until: None,
    }
}

/// A small two-vendor catalog most order tests share.
pub fn seed_standard_catalog(store: &MemoryStore) {
    store.seed_vendor(test_vendor("v-udupi", "560001", 12.9716, 77.5946, Some(30)));
    store.seed_vendor(test_vendor("v-punjabi", "560002", 12.9352, 77.6245, None));
    store.seed_food(test_food("f-dosa", "v-udupi", "Masala Dosa", 150.0));
    store.seed_food(test_food("f-coffee", "v-udupi", "Filter Coffee", 40.0));
    store.seed_food(test_food("f-naan", "v-punjabi", "Butter Naan", 60.0));
}
