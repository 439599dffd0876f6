use anyhow::{Result, anyhow};
use dotenvy::dotenv;
use secrecy::Secret;
use serde::Deserialize;
use std::env;

#[derive(Deserialize, Clone, Debug)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub store_backend: StoreBackend,
    pub assignment: AssignmentConfig,
    pub reconciliation: ReconciliationConfig,
    pub service_name: String,
}

#[derive(Deserialize, Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Deserialize, Clone, Debug)]
pub struct DatabaseConfig {
    pub url: Option<Secret<String>>,
    pub db_name: String,
}

/// Which storage backend the service runs against. The engine only sees the
/// store traits, so the memory backend is a full-fidelity stand-in for local
/// runs and tests.
#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Mongo,
    Memory,
}

#[derive(Deserialize, Clone, Debug)]
pub struct AssignmentConfig {
    /// Attempts per assignment job before it is abandoned.
    pub max_attempts: u32,
    /// Base delay between attempts; grows exponentially with jitter.
    pub base_delay_ms: u64,
    /// Upper bound on a single backoff sleep.
    pub max_delay_ms: u64,
}

#[derive(Deserialize, Clone, Debug)]
pub struct ReconciliationConfig {
    pub enabled: bool,
    /// Seconds between sweeps.
    pub interval_secs: u64,
    /// Orders younger than this are skipped so in-flight placements are not
    /// mistaken for anomalies.
    pub grace_secs: u64,
    /// How far back a sweep looks.
    pub lookback_hours: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let host = env::var("ORDER_SERVICE_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("ORDER_SERVICE_PORT")
            .unwrap_or_else(|_| "3007".to_string())
            .parse()?;

        let store_backend = match env::var("ORDER_STORE_BACKEND")
            .unwrap_or_else(|_| "mongo".to_string())
            .to_lowercase()
            .as_str()
        {
            "mongo" => StoreBackend::Mongo,
            "memory" => StoreBackend::Memory,
            other => return Err(anyhow!("unknown ORDER_STORE_BACKEND '{}'", other)),
        };

        let db_url = env::var("ORDER_DATABASE_URL").ok().map(Secret::new);
        if store_backend == StoreBackend::Mongo && db_url.is_none() {
            return Err(anyhow!(
                "ORDER_DATABASE_URL must be set when ORDER_STORE_BACKEND is mongo"
            ));
        }
        let db_name =
            env::var("ORDER_DATABASE_NAME").unwrap_or_else(|_| "food_order_db".to_string());

        let assignment = AssignmentConfig {
            max_attempts: env::var("ORDER_ASSIGNMENT_MAX_ATTEMPTS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()?,
            base_delay_ms: env::var("ORDER_ASSIGNMENT_BASE_DELAY_MS")
                .unwrap_or_else(|_| "200".to_string())
                .parse()?,
            max_delay_ms: env::var("ORDER_ASSIGNMENT_MAX_DELAY_MS")
                .unwrap_or_else(|_| "5000".to_string())
                .parse()?,
        };

        let reconciliation = ReconciliationConfig {
            enabled: env::var("ORDER_RECONCILE_ENABLED")
                .unwrap_or_else(|_| "true".to_string())
                .parse()
                .unwrap_or(true),
            interval_secs: env::var("ORDER_RECONCILE_INTERVAL_SECS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()?,
            grace_secs: env::var("ORDER_RECONCILE_GRACE_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()?,
            lookback_hours: env::var("ORDER_RECONCILE_LOOKBACK_HOURS")
                .unwrap_or_else(|_| "24".to_string())
                .parse()?,
        };

        Ok(Self {
            server: ServerConfig { host, port },
            database: DatabaseConfig { url: db_url, db_name },
            store_backend,
            assignment,
            reconciliation,
            service_name: "food-order-service".to_string(),
        })
    }
}
