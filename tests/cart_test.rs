//! Cart endpoint integration tests.

mod common;

use common::{seed_standard_catalog, spawn_app, test_food};
use food_order_service::models::Cart;
use food_order_service::services::CartStore;
use serde_json::{json, Value};

#[tokio::test]
async fn adding_a_line_creates_the_cart_at_version_zero() {
    let app = spawn_app().await;
    seed_standard_catalog(&app.store);

    let response = app.add_cart_line("cust-1", "f-dosa", 2).await;

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["customer_id"], "cust-1");
    assert_eq!(body["version"], 0);
    assert_eq!(body["lines"], json!([{ "food_id": "f-dosa", "quantity": 2 }]));
}

#[tokio::test]
async fn re_adding_a_food_overwrites_its_quantity_and_bumps_the_version() {
    let app = spawn_app().await;
    seed_standard_catalog(&app.store);

    app.add_cart_line("cust-1", "f-dosa", 2).await;
    let response = app.add_cart_line("cust-1", "f-dosa", 5).await;

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["version"], 1);
    assert_eq!(body["lines"], json!([{ "food_id": "f-dosa", "quantity": 5 }]));
}

#[tokio::test]
async fn zero_quantity_removes_the_line() {
    let app = spawn_app().await;
    seed_standard_catalog(&app.store);

    app.add_cart_line("cust-1", "f-dosa", 2).await;
    app.add_cart_line("cust-1", "f-coffee", 1).await;
    let response = app.add_cart_line("cust-1", "f-dosa", 0).await;

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(
        body["lines"],
        json!([{ "food_id": "f-coffee", "quantity": 1 }])
    );
}

#[tokio::test]
async fn unknown_food_cannot_be_added() {
    let app = spawn_app().await;
    seed_standard_catalog(&app.store);

    let response = app.add_cart_line("cust-1", "f-ghost", 1).await;

    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn empty_customer_id_fails_validation() {
    let app = spawn_app().await;
    seed_standard_catalog(&app.store);

    let response = app.add_cart_line("", "f-dosa", 1).await;

    assert_eq!(response.status(), 422);
}

#[tokio::test]
async fn cart_view_joins_live_catalog_prices() {
    let app = spawn_app().await;
    seed_standard_catalog(&app.store);

    app.add_cart_line("cust-1", "f-dosa", 2).await;
    app.add_cart_line("cust-1", "f-coffee", 1).await;
    let response = app.get("/cart/cust-1").await;

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["total_amount"], 340.0);
    let lines = body["lines"].as_array().unwrap();
    assert_eq!(lines.len(), 2);
    let dosa = lines
        .iter()
        .find(|l| l["food_id"] == "f-dosa")
        .expect("dosa line missing");
    assert_eq!(dosa["name"], "Masala Dosa");
    assert_eq!(dosa["unit_price"], 150.0);
    assert_eq!(dosa["line_total"], 300.0);
}

#[tokio::test]
async fn cart_view_reflects_a_price_change() {
    let app = spawn_app().await;
    seed_standard_catalog(&app.store);

    app.add_cart_line("cust-1", "f-coffee", 2).await;
    // The vendor re-prices the coffee after it went into the cart.
    app.store
        .seed_food(test_food("f-coffee", "v-udupi", "Filter Coffee", 55.0));

    let body: Value = app.get("/cart/cust-1").await.json().await.unwrap();
    assert_eq!(body["total_amount"], 110.0);
}

#[tokio::test]
async fn unknown_customer_gets_an_empty_view() {
    let app = spawn_app().await;

    let response = app.get("/cart/nobody").await;

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["lines"], json!([]));
    assert_eq!(body["total_amount"], 0.0);
}

#[tokio::test]
async fn delisted_foods_are_dropped_from_the_view() {
    let app = spawn_app().await;
    seed_standard_catalog(&app.store);

    // A cart holding a food that has since left the catalog.
    let mut cart = Cart::new("cust-1".to_string());
    cart.upsert_line("f-dosa", 1);
    cart.upsert_line("f-discontinued", 3);
    assert!(app.store.put_cart(&cart, None).await.unwrap());

    let body: Value = app.get("/cart/cust-1").await.json().await.unwrap();
    let lines = body["lines"].as_array().unwrap();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["food_id"], "f-dosa");
    assert_eq!(body["total_amount"], 150.0);
}
