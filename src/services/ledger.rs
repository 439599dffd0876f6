use chrono::Utc;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::error::AppError;
use crate::models::{Transaction, TransactionStatus};
use crate::services::metrics::record_transaction_opened;
use crate::services::stores::{ConfirmOutcome, OfferStore, TransactionStore};

#[derive(Clone)]
pub struct LedgerService {
    transactions: Arc<dyn TransactionStore>,
    offers: Arc<dyn OfferStore>,
}

impl LedgerService {
    pub fn new(transactions: Arc<dyn TransactionStore>, offers: Arc<dyn OfferStore>) -> Self {
        Self {
            transactions,
            offers,
        }
    }

    /// Record a payment attempt as an OPEN transaction. When an offer
    /// is referenced it must be active, unexpired and applicable to the
    /// amount; anything else is an `OfferExpired` error rather than a
    /// silent full-price charge.
    #[instrument(skip(self))]
    pub async fn open_transaction(
        &self,
        customer_id: &str,
        amount: f64,
        payment_mode: &str,
        offer_id: Option<&str>,
    ) -> Result<Transaction, AppError> {
        let mut payable_amount = amount;

        if let Some(offer_id) = offer_id {
            let offer = self.offers.find_offer(offer_id).await?.ok_or_else(|| {
                AppError::NotFound(anyhow::anyhow!("offer {} not found", offer_id))
            })?;
            if !offer.is_usable(Utc::now()) || !offer.covers_amount(amount) {
                return Err(AppError::OfferExpired(anyhow::anyhow!(
                    "offer {} is not applicable to this payment",
                    offer_id
                )));
            }
            payable_amount = (amount - offer.discount_amount).max(0.0);
        }

        let txn = Transaction::open(
            customer_id.to_string(),
            amount,
            payable_amount,
            payment_mode.to_string(),
            offer_id.map(String::from),
        );
        self.transactions.insert_transaction(&txn).await?;

        record_transaction_opened(payment_mode);
        info!(
            transaction_id = %txn.transaction_id,
            customer_id,
            amount,
            payable_amount,
            "opened payment transaction"
        );
        Ok(txn)
    }

    /// Precondition gate for order placement. Mutates nothing; a
    /// transaction is usable as long as it has not FAILED.
    #[instrument(skip(self))]
    pub async fn validate_transaction(
        &self,
        transaction_id: &str,
    ) -> Result<(Transaction, bool), AppError> {
        let txn = self
            .transactions
            .find_transaction(transaction_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(anyhow::anyhow!("transaction {} not found", transaction_id))
            })?;
        let valid = txn.status != TransactionStatus::Failed;
        Ok((txn, valid))
    }

    /// Bind an OPEN transaction to its order. Exactly one caller wins;
    /// re-confirming the same pair reports `AlreadyConfirmed` and is
    /// harmless under at-least-once retry.
    #[instrument(skip(self))]
    pub async fn confirm_transaction(
        &self,
        transaction_id: &str,
        order_id: &str,
        vendor_id: &str,
    ) -> Result<ConfirmOutcome, AppError> {
        let outcome = self
            .transactions
            .confirm_transaction(transaction_id, order_id, vendor_id)
            .await?;
        match outcome {
            ConfirmOutcome::Confirmed => {
                info!(transaction_id, order_id, "transaction confirmed");
            }
            ConfirmOutcome::AlreadyConfirmed => {
                info!(transaction_id, order_id, "transaction was already confirmed");
            }
            ConfirmOutcome::Conflict => {
                warn!(
                    transaction_id,
                    order_id, "transaction is bound elsewhere or failed"
                );
            }
            ConfirmOutcome::Missing => {
                warn!(transaction_id, "transaction disappeared before confirm");
            }
        }
        Ok(outcome)
    }
}
