use rand::Rng;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, instrument, warn};

use crate::config::AssignmentConfig;
use crate::error::AppError;
use crate::models::Courier;
use crate::services::metrics::record_assignment;
use crate::services::stores::Stores;

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance between two lat/lng points.
pub fn haversine_km(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lng = (lng2 - lng1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().atan2((1.0 - a).sqrt())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssignmentOutcome {
    Assigned { courier_id: String },
    /// Another attempt already bound a courier to this order.
    AlreadyAssigned { courier_id: String },
    /// The order reached a state that no longer takes a courier.
    OrderClosed,
}

#[derive(Clone)]
pub struct AssignmentService {
    stores: Stores,
}

impl AssignmentService {
    pub fn new(stores: Stores) -> Self {
        Self { stores }
    }

    /// Pick the nearest assignable courier in the vendor's pincode and
    /// claim it. The claim flips the courier's availability in the same
    /// atomic write, so two orders racing for the last courier resolve
    /// to exactly one winner; the loser moves to the next candidate.
    #[instrument(skip(self))]
    pub async fn assign_courier(
        &self,
        order_id: &str,
        vendor_id: &str,
    ) -> Result<AssignmentOutcome, AppError> {
        let order = self
            .stores
            .orders
            .find_order(order_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("order {} not found", order_id)))?;
        if let Some(courier_id) = order.courier_id {
            return Ok(AssignmentOutcome::AlreadyAssigned { courier_id });
        }
        if !order.status.accepts_courier() {
            return Ok(AssignmentOutcome::OrderClosed);
        }

        let vendor = self
            .stores
            .catalog
            .find_vendor(vendor_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(anyhow::anyhow!("vendor {} not found", vendor_id))
            })?;

        let candidates = self
            .stores
            .couriers
            .list_assignable_couriers(&vendor.pincode)
            .await?;

        let mut ranked: Vec<(f64, Courier)> = candidates
            .into_iter()
            .map(|courier| {
                let distance = haversine_km(vendor.lat, vendor.lng, courier.lat, courier.lng);
                (distance, courier)
            })
            .collect();
        ranked.sort_by(|a, b| a.0.total_cmp(&b.0));

        for (distance_km, candidate) in ranked {
            if !self
                .stores
                .couriers
                .claim_courier(&candidate.courier_id, order_id)
                .await?
            {
                // Lost this courier to a concurrent assignment.
                continue;
            }

            if self
                .stores
                .orders
                .bind_courier(order_id, &candidate.courier_id)
                .await?
            {
                record_assignment("assigned");
                info!(
                    order_id,
                    courier_id = %candidate.courier_id,
                    distance_km,
                    "courier assigned to order"
                );
                return Ok(AssignmentOutcome::Assigned {
                    courier_id: candidate.courier_id,
                });
            }

            // The order moved on while we held the claim. Undo it and
            // report what actually happened.
            self.stores
                .couriers
                .release_courier(&candidate.courier_id, order_id)
                .await?;
            return match self.stores.orders.find_order(order_id).await? {
                Some(order) => match order.courier_id {
                    Some(courier_id) => Ok(AssignmentOutcome::AlreadyAssigned { courier_id }),
                    None => Ok(AssignmentOutcome::OrderClosed),
                },
                None => Ok(AssignmentOutcome::OrderClosed),
            };
        }

        record_assignment("no_courier");
        Err(AppError::NoCourierAvailable(anyhow::anyhow!(
            "no verified courier available in pincode {}",
            vendor.pincode
        )))
    }

    /// Courier self-service: availability toggle with a position
    /// refresh. Assignment does not trust this flag mid-claim, the
    /// atomic claim does, but it feeds the candidate query.
    #[instrument(skip(self))]
    pub async fn set_courier_status(
        &self,
        courier_id: &str,
        available: bool,
        lat: f64,
        lng: f64,
    ) -> Result<Courier, AppError> {
        let updated = self
            .stores
            .couriers
            .set_courier_status(courier_id, available, lat, lng)
            .await?;
        if !updated {
            return Err(AppError::NotFound(anyhow::anyhow!(
                "courier {} not found",
                courier_id
            )));
        }
        self.stores
            .couriers
            .find_courier(courier_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(anyhow::anyhow!("courier {} not found", courier_id))
            })
    }
}

/// A unit of background assignment work.
#[derive(Debug, Clone)]
pub struct AssignmentJob {
    pub order_id: String,
    pub vendor_id: String,
}

/// Cheap handle for submitting jobs to the dispatcher.
#[derive(Clone)]
pub struct AssignmentQueue {
    tx: mpsc::Sender<AssignmentJob>,
}

impl AssignmentQueue {
    pub async fn submit(&self, job: AssignmentJob) {
        let order_id = job.order_id.clone();
        if self.tx.send(job).await.is_err() {
            error!(order_id, "assignment dispatcher is gone, dropping job");
        }
    }
}

/// Background worker that drains the job channel. Each job runs in its
/// own task with bounded retries and jittered exponential backoff, so a
/// stubborn order cannot hold up the queue.
pub struct AssignmentDispatcher {
    rx: mpsc::Receiver<AssignmentJob>,
    service: AssignmentService,
    config: AssignmentConfig,
}

impl AssignmentDispatcher {
    pub fn new(service: AssignmentService, config: AssignmentConfig) -> (AssignmentQueue, Self) {
        let (tx, rx) = mpsc::channel(256);
        (
            AssignmentQueue { tx },
            Self {
                rx,
                service,
                config,
            },
        )
    }

    /// Run until every queue handle has been dropped.
    pub fn spawn(mut self) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(job) = self.rx.recv().await {
                let service = self.service.clone();
                let config = self.config.clone();
                tokio::spawn(async move {
                    run_job(service, job, config).await;
                });
            }
            info!("assignment dispatcher stopped");
        })
    }
}

async fn run_job(service: AssignmentService, job: AssignmentJob, config: AssignmentConfig) {
    for attempt in 1..=config.max_attempts {
        match service.assign_courier(&job.order_id, &job.vendor_id).await {
            Ok(outcome) => {
                info!(
                    order_id = %job.order_id,
                    attempt,
                    ?outcome,
                    "assignment job finished"
                );
                return;
            }
            Err(err) if attempt < config.max_attempts => {
                let delay = backoff_delay(attempt, &config);
                warn!(
                    order_id = %job.order_id,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "assignment attempt failed, will retry: {}",
                    err
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => {
                record_assignment("gave_up");
                error!(
                    order_id = %job.order_id,
                    attempts = config.max_attempts,
                    "assignment abandoned: {}",
                    err
                );
            }
        }
    }
}

fn backoff_delay(attempt: u32, config: &AssignmentConfig) -> Duration {
    let exp = config
        .base_delay_ms
        .saturating_mul(2_u64.saturating_pow(attempt.saturating_sub(1)));
    let capped = exp.min(config.max_delay_ms);
    let jitter = rand::thread_rng().gen_range(0..=capped / 4);
    Duration::from_millis(capped.saturating_add(jitter).min(config.max_delay_ms))
}
