use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{error, info, instrument, warn};

use crate::config::ReconciliationConfig;
use crate::error::AppError;
use crate::models::{OrderStatus, TransactionStatus};
use crate::services::assignment::{AssignmentJob, AssignmentQueue};
use crate::services::ledger::LedgerService;
use crate::services::metrics::record_reconciliation_action;
use crate::services::stores::{ConfirmOutcome, Stores};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub scanned: usize,
    /// Open transactions confirmed behind an already-placed order.
    pub repaired: usize,
    /// Courier assignment jobs re-enqueued.
    pub reassigned: usize,
    /// States the sweep cannot fix and only reports.
    pub anomalies: usize,
}

/// Periodic safety net for the window between order insert and
/// transaction confirm: a crash there leaves a placed order with an
/// OPEN transaction, which the sweep re-confirms idempotently. It also
/// re-enqueues courier assignment for orders whose job died with the
/// process.
#[derive(Clone)]
pub struct ReconciliationService {
    stores: Stores,
    ledger: LedgerService,
    assignments: AssignmentQueue,
    config: ReconciliationConfig,
}

impl ReconciliationService {
    pub fn new(
        stores: Stores,
        ledger: LedgerService,
        assignments: AssignmentQueue,
        config: ReconciliationConfig,
    ) -> Self {
        Self {
            stores,
            ledger,
            assignments,
            config,
        }
    }

    #[instrument(skip(self))]
    pub async fn sweep_once(&self) -> Result<SweepReport, AppError> {
        let now = Utc::now();
        let created_before = now - chrono::Duration::seconds(self.config.grace_secs as i64);
        let created_after = now - chrono::Duration::hours(self.config.lookback_hours as i64);

        let mut report = SweepReport::default();

        let orders = self
            .stores
            .orders
            .list_orders_created_between(created_after, created_before)
            .await?;
        for order in &orders {
            if order.status == OrderStatus::Cancelled {
                // A cancelled order must not charge; its transaction is
                // left for the customer to reuse.
                continue;
            }
            report.scanned += 1;

            let Some(txn) = self
                .stores
                .transactions
                .find_transaction(&order.transaction_id)
                .await?
            else {
                report.anomalies += 1;
                record_reconciliation_action("anomaly");
                error!(
                    order_id = %order.order_id,
                    transaction_id = %order.transaction_id,
                    "order references a missing transaction"
                );
                continue;
            };

            match txn.status {
                TransactionStatus::Open => {
                    match self
                        .ledger
                        .confirm_transaction(&order.transaction_id, &order.order_id, &order.vendor_id)
                        .await
                    {
                        Ok(ConfirmOutcome::Confirmed) => {
                            report.repaired += 1;
                            record_reconciliation_action("confirm_repaired");
                            warn!(
                                order_id = %order.order_id,
                                transaction_id = %order.transaction_id,
                                "confirmed open transaction behind a placed order"
                            );
                        }
                        Ok(ConfirmOutcome::AlreadyConfirmed) => {}
                        Ok(outcome) => {
                            report.anomalies += 1;
                            record_reconciliation_action("anomaly");
                            error!(
                                order_id = %order.order_id,
                                ?outcome,
                                "open transaction could not be re-confirmed"
                            );
                        }
                        Err(err) => {
                            error!(
                                order_id = %order.order_id,
                                "re-confirm attempt failed: {}", err
                            );
                        }
                    }
                }
                TransactionStatus::Confirmed => {
                    if txn.order_id.as_deref() != Some(order.order_id.as_str()) {
                        report.anomalies += 1;
                        record_reconciliation_action("anomaly");
                        error!(
                            order_id = %order.order_id,
                            bound_order = ?txn.order_id,
                            "transaction is confirmed against a different order"
                        );
                    }
                }
                TransactionStatus::Failed => {
                    report.anomalies += 1;
                    record_reconciliation_action("anomaly");
                    error!(
                        order_id = %order.order_id,
                        "order is backed by a failed transaction"
                    );
                }
            }
        }

        let unassigned = self
            .stores
            .orders
            .list_unassigned_orders(created_after, created_before)
            .await?;
        for order in unassigned {
            report.reassigned += 1;
            record_reconciliation_action("reassigned");
            info!(order_id = %order.order_id, "re-enqueueing courier assignment");
            self.assignments
                .submit(AssignmentJob {
                    order_id: order.order_id,
                    vendor_id: order.vendor_id,
                })
                .await;
        }

        info!(
            scanned = report.scanned,
            repaired = report.repaired,
            reassigned = report.reassigned,
            anomalies = report.anomalies,
            "reconciliation sweep finished"
        );
        Ok(report)
    }

    /// Run `sweep_once` on the configured interval. Returns `None` when
    /// reconciliation is disabled.
    pub fn spawn_interval(self) -> Option<JoinHandle<()>> {
        if !self.config.enabled {
            info!("reconciliation sweeps disabled by config");
            return None;
        }
        let period = std::time::Duration::from_secs(self.config.interval_secs.max(1));
        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Err(err) = self.sweep_once().await {
                    error!("reconciliation sweep failed: {}", err);
                }
            }
        }))
    }
}
