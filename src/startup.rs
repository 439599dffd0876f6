//! Application startup and lifecycle management.

use crate::config::{Config, StoreBackend};
use crate::error::AppError;
use crate::handlers::{
    advance_order_status, get_cart, get_order, health_check, list_customer_orders,
    list_vendor_orders, metrics_endpoint, open_payment, place_order, readiness_check,
    update_courier_status, upsert_cart_line,
};
use crate::middleware::{metrics_middleware, request_id_middleware};
use crate::services::{
    init_metrics, AssignmentDispatcher, AssignmentService, CartService, LedgerService, MemoryStore,
    MongoStore, OrderService, ReconciliationService,
};
use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};
use secrecy::ExposeSecret;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Handle on whichever store backend the service was started with.
///
/// Kept in state so the readiness probe pings the live backend, and so
/// test harnesses running on the in-memory store can reach it to seed
/// catalog, offer and courier fixtures.
#[derive(Clone)]
pub enum StoreBackendHandle {
    Mongo(Arc<MongoStore>),
    Memory(Arc<MemoryStore>),
}

impl StoreBackendHandle {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Mongo(_) => "mongo",
            Self::Memory(_) => "memory",
        }
    }

    pub async fn health_check(&self) -> Result<(), AppError> {
        match self {
            Self::Mongo(store) => store.health_check().await,
            Self::Memory(_) => Ok(()),
        }
    }

    /// The in-memory store, when running on it.
    pub fn memory(&self) -> Option<Arc<MemoryStore>> {
        match self {
            Self::Memory(store) => Some(store.clone()),
            Self::Mongo(_) => None,
        }
    }
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub cart: CartService,
    pub ledger: LedgerService,
    pub orders: OrderService,
    pub assignment: AssignmentService,
    pub backend: StoreBackendHandle,
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Build the application with the given configuration.
    ///
    /// Connects the configured store backend, wires the order engine on
    /// top of it and starts the background workers (assignment
    /// dispatcher, reconciliation sweep). The listener is bound here so
    /// tests can pass port 0 and read the assigned port back.
    pub async fn build(config: Config) -> Result<Self, AppError> {
        init_metrics();

        let (stores, backend) = match config.store_backend {
            StoreBackend::Mongo => {
                let url = config.database.url.as_ref().ok_or_else(|| {
                    AppError::Internal(anyhow::anyhow!(
                        "database url is required for the mongo backend"
                    ))
                })?;
                let store = Arc::new(
                    MongoStore::connect(url.expose_secret(), &config.database.db_name).await?,
                );
                store.initialize_indexes().await?;
                (store.stores(), StoreBackendHandle::Mongo(store))
            }
            StoreBackend::Memory => {
                tracing::warn!("Using the in-memory store; all data is lost on restart");
                let store = Arc::new(MemoryStore::new());
                (store.stores(), StoreBackendHandle::Memory(store))
            }
        };

        let cart = CartService::new(stores.catalog.clone(), stores.carts.clone());
        let ledger = LedgerService::new(stores.transactions.clone(), stores.offers.clone());
        let assignment = AssignmentService::new(stores.clone());

        let (assignment_queue, dispatcher) =
            AssignmentDispatcher::new(assignment.clone(), config.assignment.clone());
        dispatcher.spawn();

        let orders = OrderService::new(
            stores.clone(),
            cart.clone(),
            ledger.clone(),
            assignment_queue.clone(),
        );

        ReconciliationService::new(
            stores,
            ledger.clone(),
            assignment_queue,
            config.reconciliation.clone(),
        )
        .spawn_interval();

        let state = AppState {
            cart,
            ledger,
            orders,
            assignment,
            backend,
        };

        let addr = format!("{}:{}", config.server.host, config.server.port);
        let listener = TcpListener::bind(&addr).await.map_err(|e| {
            tracing::error!(error = %e, addr = %addr, "Failed to bind TCP listener");
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!(port = port, backend = state.backend.name(), "Listener bound");

        Ok(Self {
            port,
            listener,
            state,
        })
    }

    /// Get the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Get the application state, for probing from tests.
    pub fn state(&self) -> AppState {
        self.state.clone()
    }

    /// Run the application until stopped.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let router = Router::new()
            .route("/health", get(health_check))
            .route("/ready", get(readiness_check))
            .route("/metrics", get(metrics_endpoint))
            .route("/cart", post(upsert_cart_line))
            .route("/cart/:customer_id", get(get_cart))
            .route("/payments", post(open_payment))
            .route("/orders", post(place_order))
            .route("/orders/:order_id", get(get_order))
            .route("/orders/:order_id/status", patch(advance_order_status))
            .route("/customers/:customer_id/orders", get(list_customer_orders))
            .route("/vendors/:vendor_id/orders", get(list_vendor_orders))
            .route("/couriers/:courier_id/status", patch(update_courier_status))
            .layer(TraceLayer::new_for_http())
            .layer(middleware::from_fn(metrics_middleware))
            .layer(middleware::from_fn(request_id_middleware))
            .with_state(self.state);

        tracing::info!(
            service = "food-order-service",
            version = env!("CARGO_PKG_VERSION"),
            port = self.port,
            "Service ready to accept connections"
        );

        axum::serve(self.listener, router).await
    }
}
