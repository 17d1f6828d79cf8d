//! Reconciliation engine: filter, resolve and write back, one receipt at a time

pub mod mutator;

pub use mutator::*;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::matching::MatchConfig;
use crate::traits::*;
use crate::types::*;
use crate::utils::validation::parse_observed_date;

/// Orchestrates candidate filtering, match resolution and mutation
pub struct ReconciliationEngine {
    config: MatchConfig,
    validator: Box<dyn ReceiptValidator>,
    mutator: LedgerMutator,
}

impl Default for ReconciliationEngine {
    fn default() -> Self {
        Self::new(MatchConfig::default())
    }
}

impl ReconciliationEngine {
    /// Create an engine with the default receipt validator
    pub fn new(config: MatchConfig) -> Self {
        Self::with_validator(config, Box::new(DefaultReceiptValidator))
    }

    /// Create an engine with a custom receipt validator
    pub fn with_validator(config: MatchConfig, validator: Box<dyn ReceiptValidator>) -> Self {
        let mutator = LedgerMutator::new(config.marker_tag.clone());
        Self {
            config,
            validator,
            mutator,
        }
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    /// Reconcile a single receipt against the ledger
    pub async fn reconcile_one<L: Ledger + ?Sized>(
        &self,
        ledger: &mut L,
        receipt: &Receipt,
        observed_date: NaiveDate,
    ) -> Result<ReconciliationOutcome, ReconcileError> {
        self.validator.validate_receipt(receipt)?;

        // Filtering
        let filter = self.config.candidate_filter(ledger.equivalent_markers());
        let (start, end) = filter.window(observed_date);
        let snapshot = ledger.entries_between(start, end).await?;
        let candidates = filter.filter(&snapshot, observed_date, &receipt.total_billed);
        debug!(
            merchant = %receipt.merchant,
            total_billed = %receipt.total_billed,
            %observed_date,
            candidates = candidates.len(),
            "filtered ledger candidates"
        );

        // Resolving
        let decision = self.config.resolver().resolve(&candidates, &receipt.merchant);
        debug!(merchant = %receipt.merchant, ?decision, "resolved match");

        let entry_id = match decision {
            MatchDecision::NoCandidate => return Ok(ReconciliationOutcome::NoCandidate),
            MatchDecision::Ambiguous(ids) => {
                warn!(
                    merchant = %receipt.merchant,
                    entries = ?ids,
                    "ambiguous match, leaving ledger untouched"
                );
                return Ok(ReconciliationOutcome::Ambiguous(ids));
            }
            MatchDecision::Matched(id) => id,
        };

        // Mutating
        let outcome = match self.mutator.apply(ledger, &entry_id, receipt).await {
            Ok(MutationStatus::Updated) => {
                info!(merchant = %receipt.merchant, entry_id = %entry_id, "reconciled receipt");
                ReconciliationOutcome::MatchedAndUpdated(entry_id)
            }
            Ok(MutationStatus::AlreadyReconciled) => ReconciliationOutcome::MatchedNoOp(entry_id),
            Err(error) => {
                warn!(
                    merchant = %receipt.merchant,
                    entry_id = %entry_id,
                    %error,
                    "failed to update ledger entry"
                );
                ReconciliationOutcome::MutationFailed { entry_id, error }
            }
        };
        Ok(outcome)
    }

    /// Reconcile a receipt whose observed date is still raw text (e.g. an email `Date` header)
    pub async fn reconcile_raw<L: Ledger + ?Sized>(
        &self,
        ledger: &mut L,
        receipt: &Receipt,
        observed_date: &str,
    ) -> Result<ReconciliationOutcome, ReconcileError> {
        let date = parse_observed_date(observed_date)?;
        self.reconcile_one(ledger, receipt, date).await
    }

    /// Reconcile receipts strictly in order against the same ledger.
    ///
    /// A failure on one receipt is recorded and the batch carries on. The
    /// ledger is not persisted; callers decide when to call [`Ledger::persist`].
    pub async fn reconcile_batch<L, I, D>(&self, ledger: &mut L, receipts: I) -> BatchReport
    where
        L: Ledger + ?Sized,
        I: IntoIterator<Item = (Receipt, D)>,
        D: AsRef<str>,
    {
        let mut items = Vec::new();

        for (receipt, observed_date) in receipts {
            let observed_date = observed_date.as_ref();
            let result = self.reconcile_raw(&mut *ledger, &receipt, observed_date).await;
            if let Err(error) = &result {
                warn!(merchant = %receipt.merchant, %error, "could not reconcile receipt");
            }
            items.push(BatchItem {
                merchant: receipt.merchant,
                observed_date: observed_date.to_string(),
                result,
            });
        }

        let report = BatchReport { items };
        let summary = report.summary();
        info!(
            matched = summary.matched,
            already_reconciled = summary.already_reconciled,
            ambiguous = summary.ambiguous,
            no_candidate = summary.no_candidate,
            failed = summary.failed,
            invalid = summary.invalid,
            "reconciliation batch complete"
        );
        report
    }
}

/// One receipt's result within a batch
#[derive(Debug)]
pub struct BatchItem {
    pub merchant: String,
    pub observed_date: String,
    pub result: Result<ReconciliationOutcome, ReconcileError>,
}

/// Outcomes of a batch, in input order
#[derive(Debug, Default)]
pub struct BatchReport {
    pub items: Vec<BatchItem>,
}

/// Outcome counts for a batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub matched: usize,
    pub already_reconciled: usize,
    pub ambiguous: usize,
    pub no_candidate: usize,
    /// Mutation failures and ledger read errors
    pub failed: usize,
    /// Receipts rejected by validation
    pub invalid: usize,
}

impl BatchReport {
    pub fn summary(&self) -> BatchSummary {
        let mut summary = BatchSummary::default();
        for item in &self.items {
            match &item.result {
                Ok(ReconciliationOutcome::MatchedAndUpdated(_)) => summary.matched += 1,
                Ok(ReconciliationOutcome::MatchedNoOp(_)) => summary.already_reconciled += 1,
                Ok(ReconciliationOutcome::Ambiguous(_)) => summary.ambiguous += 1,
                Ok(ReconciliationOutcome::NoCandidate) => summary.no_candidate += 1,
                Ok(ReconciliationOutcome::MutationFailed { .. }) => summary.failed += 1,
                Err(ReconcileError::Ledger(_)) => summary.failed += 1,
                Err(ReconcileError::Validation(_)) => summary.invalid += 1,
            }
        }
        summary
    }

    /// Receipts that need manual review, with their competing entry IDs
    pub fn ambiguous(&self) -> impl Iterator<Item = (&BatchItem, &[String])> {
        self.items.iter().filter_map(|item| match &item.result {
            Ok(ReconciliationOutcome::Ambiguous(ids)) => Some((item, ids.as_slice())),
            _ => None,
        })
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
