use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use prometheus::{IntCounterVec, Opts, Registry};
use std::sync::OnceLock;

pub static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();
pub static PROMETHEUS_REGISTRY: OnceLock<Registry> = OnceLock::new();
pub static ORDERS_PLACED_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static ORDER_TRANSITIONS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static TRANSACTIONS_OPENED_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static COURIER_ASSIGNMENTS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static RECONCILIATION_ACTIONS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Install the Prometheus recorder and register the custom counters.
/// Safe to call more than once; only the first call wins, so test
/// binaries can spawn several apps in one process.
pub fn init_metrics() {
    if METRICS_HANDLE.get().is_some() {
        return;
    }

    if let Ok(handle) = PrometheusBuilder::new().install_recorder() {
        let _ = METRICS_HANDLE.set(handle);
    }

    let registry = Registry::new();

    let orders_placed = IntCounterVec::new(
        Opts::new("orders_placed_total", "Orders successfully placed, by vendor"),
        &["vendor_id"],
    )
    .expect("Failed to create orders_placed_total metric");

    let transitions = IntCounterVec::new(
        Opts::new(
            "order_status_transitions_total",
            "Order status transitions applied, by target status",
        ),
        &["to_status"],
    )
    .expect("Failed to create order_status_transitions_total metric");

    let transactions_opened = IntCounterVec::new(
        Opts::new(
            "transactions_opened_total",
            "Payment transactions opened, by payment mode",
        ),
        &["payment_mode"],
    )
    .expect("Failed to create transactions_opened_total metric");

    let assignments = IntCounterVec::new(
        Opts::new(
            "courier_assignments_total",
            "Courier assignment attempts, by outcome",
        ),
        &["outcome"],
    )
    .expect("Failed to create courier_assignments_total metric");

    let reconciliation = IntCounterVec::new(
        Opts::new(
            "reconciliation_actions_total",
            "Reconciliation sweep actions, by kind",
        ),
        &["kind"],
    )
    .expect("Failed to create reconciliation_actions_total metric");

    registry
        .register(Box::new(orders_placed.clone()))
        .expect("Failed to register orders_placed_total");
    registry
        .register(Box::new(transitions.clone()))
        .expect("Failed to register order_status_transitions_total");
    registry
        .register(Box::new(transactions_opened.clone()))
        .expect("Failed to register transactions_opened_total");
    registry
        .register(Box::new(assignments.clone()))
        .expect("Failed to register courier_assignments_total");
    registry
        .register(Box::new(reconciliation.clone()))
        .expect("Failed to register reconciliation_actions_total");

    let _ = PROMETHEUS_REGISTRY.set(registry);
    let _ = ORDERS_PLACED_TOTAL.set(orders_placed);
    let _ = ORDER_TRANSITIONS_TOTAL.set(transitions);
    let _ = TRANSACTIONS_OPENED_TOTAL.set(transactions_opened);
    let _ = COURIER_ASSIGNMENTS_TOTAL.set(assignments);
    let _ = RECONCILIATION_ACTIONS_TOTAL.set(reconciliation);
}

pub fn get_metrics() -> String {
    let mut output = METRICS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_else(|| "# Metrics recorder not initialized\n".to_string());

    if let Some(registry) = PROMETHEUS_REGISTRY.get() {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let metric_families = registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer).ok();
        if let Ok(custom_metrics) = String::from_utf8(buffer) {
            output.push_str(&custom_metrics);
        }
    }

    output
}

pub fn record_order_placed(vendor_id: &str) {
    if let Some(counter) = ORDERS_PLACED_TOTAL.get() {
        counter.with_label_values(&[vendor_id]).inc();
    }
}

pub fn record_status_transition(to_status: &str) {
    if let Some(counter) = ORDER_TRANSITIONS_TOTAL.get() {
        counter.with_label_values(&[to_status]).inc();
    }
}

pub fn record_transaction_opened(payment_mode: &str) {
    if let Some(counter) = TRANSACTIONS_OPENED_TOTAL.get() {
        counter.with_label_values(&[payment_mode]).inc();
    }
}

pub fn record_assignment(outcome: &str) {
    if let Some(counter) = COURIER_ASSIGNMENTS_TOTAL.get() {
        counter.with_label_values(&[outcome]).inc();
    }
}

pub fn record_reconciliation_action(kind: &str) {
    if let Some(counter) = RECONCILIATION_ACTIONS_TOTAL.get() {
        counter.with_label_values(&[kind]).inc();
    }
}
