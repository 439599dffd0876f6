//! Courier assignment tests: nearest-first ranking, atomic claims, and
//! the courier availability endpoint.

mod common;

use common::{
    init_tracing, seed_standard_catalog, spawn_app, test_courier, test_vendor,
    wait_for_assignment,
};
use food_order_service::error::AppError;
use food_order_service::models::{Order, OrderLine, OrderStatus};
use food_order_service::services::{
    AssignmentOutcome, AssignmentService, CourierStore, MemoryStore, OrderStore, StatusUpdate,
};
use serde_json::{json, Value};
use std::sync::Arc;

/// Assignment exercised directly against the in-memory store, without
/// the HTTP layer or the background dispatcher in the way.
fn assignment_fixture() -> (Arc<MemoryStore>, AssignmentService) {
    init_tracing();
    let store = Arc::new(MemoryStore::new());
    let service = AssignmentService::new(store.stores());
    (store, service)
}

fn waiting_order(customer_id: &str, vendor_id: &str) -> Order {
    Order::create(
        customer_id.to_string(),
        vendor_id.to_string(),
        "txn-test".to_string(),
        vec![OrderLine {
            food_id: "f-1".to_string(),
            name: "Test Food".to_string(),
            price: 100.0,
            images: Vec::new(),
            quantity: 1,
        }],
        100.0,
        30,
    )
}

#[tokio::test]
async fn the_nearest_courier_in_the_vendors_pincode_wins() {
    let (store, service) = assignment_fixture();
    store.seed_vendor(test_vendor("v-1", "560001", 12.9716, 77.5946, Some(30)));
    store.seed_courier(test_courier("c-near", "560001", 12.9750, 77.6000));
    store.seed_courier(test_courier("c-far", "560001", 13.0500, 77.6500));

    let order = waiting_order("cust-1", "v-1");
    store.insert_order(&order).await.unwrap();

    let outcome = service.assign_courier(&order.order_id, "v-1").await.unwrap();
    assert_eq!(
        outcome,
        AssignmentOutcome::Assigned {
            courier_id: "c-near".to_string()
        }
    );

    let courier = store.find_courier("c-near").await.unwrap().unwrap();
    assert!(!courier.is_available);
    assert_eq!(courier.active_order_id.as_deref(), Some(order.order_id.as_str()));
    let stored = store.find_order(&order.order_id).await.unwrap().unwrap();
    assert_eq!(stored.courier_id.as_deref(), Some("c-near"));
}

#[tokio::test]
async fn couriers_outside_the_vendors_pincode_are_ignored() {
    let (store, service) = assignment_fixture();
    store.seed_vendor(test_vendor("v-1", "560001", 12.9716, 77.5946, Some(30)));
    // Closer as the crow flies, but serving another area.
    store.seed_courier(test_courier("c-wrong-pin", "560099", 12.9720, 77.5950));
    store.seed_courier(test_courier("c-right-pin", "560001", 13.0500, 77.6500));

    let order = waiting_order("cust-1", "v-1");
    store.insert_order(&order).await.unwrap();

    let outcome = service.assign_courier(&order.order_id, "v-1").await.unwrap();
    assert_eq!(
        outcome,
        AssignmentOutcome::Assigned {
            courier_id: "c-right-pin".to_string()
        }
    );
}

#[tokio::test]
async fn unverified_off_duty_and_busy_couriers_are_skipped() {
    let (store, service) = assignment_fixture();
    store.seed_vendor(test_vendor("v-1", "560001", 12.9716, 77.5946, Some(30)));

    let mut unverified = test_courier("c-unverified", "560001", 12.97, 77.59);
    unverified.verified = false;
    store.seed_courier(unverified);

    let mut off_duty = test_courier("c-off", "560001", 12.97, 77.59);
    off_duty.is_available = false;
    store.seed_courier(off_duty);

    let mut busy = test_courier("c-busy", "560001", 12.97, 77.59);
    busy.active_order_id = Some("order-elsewhere".to_string());
    store.seed_courier(busy);

    let order = waiting_order("cust-1", "v-1");
    store.insert_order(&order).await.unwrap();

    let result = service.assign_courier(&order.order_id, "v-1").await;
    assert!(matches!(result, Err(AppError::NoCourierAvailable(_))));
}

#[tokio::test]
async fn assignment_is_idempotent_per_order() {
    let (store, service) = assignment_fixture();
    store.seed_vendor(test_vendor("v-1", "560001", 12.9716, 77.5946, Some(30)));
    store.seed_courier(test_courier("c-1", "560001", 12.97, 77.60));
    store.seed_courier(test_courier("c-2", "560001", 12.98, 77.61));

    let order = waiting_order("cust-1", "v-1");
    store.insert_order(&order).await.unwrap();

    let first = service.assign_courier(&order.order_id, "v-1").await.unwrap();
    let AssignmentOutcome::Assigned { courier_id } = first else {
        panic!("expected an assignment, got {:?}", first);
    };

    let second = service.assign_courier(&order.order_id, "v-1").await.unwrap();
    assert_eq!(second, AssignmentOutcome::AlreadyAssigned { courier_id });
}

#[tokio::test]
async fn closed_orders_are_not_assigned() {
    let (store, service) = assignment_fixture();
    store.seed_vendor(test_vendor("v-1", "560001", 12.9716, 77.5946, Some(30)));
    store.seed_courier(test_courier("c-1", "560001", 12.97, 77.60));

    let order = waiting_order("cust-1", "v-1");
    store.insert_order(&order).await.unwrap();
    let cancelled = StatusUpdate {
        from: OrderStatus::Waiting,
        to: OrderStatus::Cancelled,
        remarks: None,
        ready_minutes: None,
    };
    assert!(store
        .update_order_status(&order.order_id, &cancelled)
        .await
        .unwrap());

    let outcome = service.assign_courier(&order.order_id, "v-1").await.unwrap();
    assert_eq!(outcome, AssignmentOutcome::OrderClosed);

    let courier = store.find_courier("c-1").await.unwrap().unwrap();
    assert!(courier.is_available);
    assert!(courier.active_order_id.is_none());
}

#[tokio::test]
async fn two_orders_racing_for_the_last_courier_get_one_winner() {
    let (store, service) = assignment_fixture();
    store.seed_vendor(test_vendor("v-1", "560001", 12.9716, 77.5946, Some(30)));
    store.seed_courier(test_courier("c-only", "560001", 12.97, 77.60));

    let first = waiting_order("cust-1", "v-1");
    let second = waiting_order("cust-2", "v-1");
    store.insert_order(&first).await.unwrap();
    store.insert_order(&second).await.unwrap();

    let (r1, r2) = tokio::join!(
        service.assign_courier(&first.order_id, "v-1"),
        service.assign_courier(&second.order_id, "v-1")
    );

    let outcomes = [r1, r2];
    let winners = outcomes
        .iter()
        .filter(|r| matches!(r, Ok(AssignmentOutcome::Assigned { .. })))
        .count();
    let losers = outcomes
        .iter()
        .filter(|r| matches!(r, Err(AppError::NoCourierAvailable(_))))
        .count();
    assert_eq!(winners, 1, "exactly one order should win the courier");
    assert_eq!(losers, 1, "the other order should find the pool empty");

    let courier = store.find_courier("c-only").await.unwrap().unwrap();
    let bound_order = courier.active_order_id.expect("courier should be claimed");
    let winner = store.find_order(&bound_order).await.unwrap().unwrap();
    assert_eq!(winner.courier_id.as_deref(), Some("c-only"));
}

#[tokio::test]
async fn assigning_an_unknown_order_or_vendor_is_not_found() {
    let (store, service) = assignment_fixture();
    store.seed_vendor(test_vendor("v-1", "560001", 12.9716, 77.5946, Some(30)));

    let result = service.assign_courier("order-nope", "v-1").await;
    assert!(matches!(result, Err(AppError::NotFound(_))));

    let order = waiting_order("cust-1", "v-1");
    store.insert_order(&order).await.unwrap();
    let result = service.assign_courier(&order.order_id, "v-nope").await;
    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn a_courier_toggled_off_stops_receiving_orders() {
    let (store, service) = assignment_fixture();
    store.seed_vendor(test_vendor("v-1", "560001", 12.9716, 77.5946, Some(30)));
    store.seed_courier(test_courier("c-1", "560001", 12.97, 77.60));

    let courier = service
        .set_courier_status("c-1", false, 12.98, 77.61)
        .await
        .unwrap();
    assert!(!courier.is_available);
    assert_eq!(courier.lat, 12.98);

    let order = waiting_order("cust-1", "v-1");
    store.insert_order(&order).await.unwrap();
    let result = service.assign_courier(&order.order_id, "v-1").await;
    assert!(matches!(result, Err(AppError::NoCourierAvailable(_))));
}

#[tokio::test]
async fn courier_status_endpoint_updates_availability_and_position() {
    let app = spawn_app().await;
    app.store
        .seed_courier(test_courier("c-1", "560001", 12.97, 77.60));

    let response = app
        .patch_json(
            "/couriers/c-1/status",
            &json!({ "is_available": false, "lat": 12.9800, "lng": 77.6100 }),
        )
        .await;

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["is_available"], false);
    assert_eq!(body["lat"], 12.98);
    assert_eq!(body["lng"], 77.61);

    let missing = app
        .patch_json(
            "/couriers/c-nope/status",
            &json!({ "is_available": true, "lat": 0.0, "lng": 0.0 }),
        )
        .await;
    assert_eq!(missing.status(), 404);

    let out_of_range = app
        .patch_json(
            "/couriers/c-1/status",
            &json!({ "is_available": true, "lat": 200.0, "lng": 0.0 }),
        )
        .await;
    assert_eq!(out_of_range.status(), 422);
}

#[tokio::test]
async fn a_placed_order_is_eventually_assigned_end_to_end() {
    let app = spawn_app().await;
    seed_standard_catalog(&app.store);
    app.store
        .seed_courier(test_courier("c-1", "560001", 12.9750, 77.6000));

    let order = common::place_standard_order(&app, "cust-1").await;
    let order_id = order["order_id"].as_str().unwrap();

    let courier_id = wait_for_assignment(&app, order_id).await;
    assert_eq!(courier_id, "c-1");

    let fetched: Value = app
        .get(&format!("/orders/{}", order_id))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(fetched["courier_id"], "c-1");

    let courier = app.store.find_courier("c-1").await.unwrap().unwrap();
    assert!(!courier.is_available);
}

#[tokio::test]
async fn assignment_retries_until_a_courier_appears() {
    let app = spawn_app().await;
    seed_standard_catalog(&app.store);

    // Place with an empty courier pool; the job backs off and retries.
    let order = common::place_standard_order(&app, "cust-1").await;
    let order_id = order["order_id"].as_str().unwrap();

    app.store
        .seed_courier(test_courier("c-late", "560001", 12.9750, 77.6000));

    let courier_id = wait_for_assignment(&app, order_id).await;
    assert_eq!(courier_id, "c-late");
}
