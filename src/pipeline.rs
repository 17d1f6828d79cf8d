//! End-to-end run: emails in, annotated ledger out

use std::path::Path;
use tracing::{debug, info, warn};

use crate::email::{load_directory, EmailError, EmailMessage};
use crate::reconciliation::{BatchReport, ReconciliationEngine};
use crate::traits::*;
use crate::types::*;

/// Errors that abort a whole pipeline run
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Email loading failed: {0}")]
    Email(#[from] EmailError),
    #[error("Ledger persistence failed: {0}")]
    Ledger(#[from] LedgerError),
}

/// What happened to a run's emails before and during reconciliation
#[derive(Debug, Default)]
pub struct PipelineReport {
    pub emails_loaded: usize,
    pub receipts_detected: usize,
    pub classification_failures: usize,
    pub extraction_failures: usize,
    pub batch: BatchReport,
}

/// Receipts pulled out of a set of emails, ready for reconciliation
#[derive(Debug, Default)]
pub struct CollectedReceipts {
    /// Each receipt with the raw `Date` header of its email
    pub receipts: Vec<(Receipt, String)>,
    /// Emails the classifier accepted
    pub detected: usize,
    /// Emails the classifier could not decide on
    pub classification_failures: usize,
}

/// Classifies, extracts and reconciles a set of emails against one ledger
pub struct ReceiptPipeline<C, E> {
    classifier: C,
    extractor: E,
    engine: ReconciliationEngine,
}

impl<C, E> ReceiptPipeline<C, E>
where
    C: ReceiptClassifier,
    E: ReceiptExtractor,
{
    pub fn new(classifier: C, extractor: E, engine: ReconciliationEngine) -> Self {
        Self {
            classifier,
            extractor,
            engine,
        }
    }

    /// Extract a receipt from every email the classifier accepts.
    ///
    /// Classification and extraction failures are logged and the email is
    /// skipped.
    pub async fn extract_receipts(&self, emails: &[EmailMessage]) -> CollectedReceipts {
        let mut collected = CollectedReceipts::default();

        for email in emails {
            match self.classifier.is_receipt(email).await {
                Ok(true) => {}
                Ok(false) => continue,
                Err(error) => {
                    warn!(
                        subject = %email.subject,
                        %error,
                        "classification failed, skipping email"
                    );
                    collected.classification_failures += 1;
                    continue;
                }
            }

            collected.detected += 1;
            match self.extractor.extract(email).await {
                Ok(receipt) => {
                    debug!(
                        subject = %email.subject,
                        merchant = %receipt.merchant,
                        "extracted receipt"
                    );
                    collected.receipts.push((receipt, email.date.clone()));
                }
                Err(error) => warn!(subject = %email.subject, %error, "skipping receipt email"),
            }
        }

        collected
    }

    /// Reconcile the given emails in one batch, then persist the ledger once
    pub async fn run<L: Ledger + ?Sized>(
        &self,
        ledger: &mut L,
        emails: &[EmailMessage],
    ) -> Result<PipelineReport, PipelineError> {
        let collected = self.extract_receipts(emails).await;
        let receipts_detected = collected.detected;
        let classification_failures = collected.classification_failures;
        let extraction_failures = receipts_detected - collected.receipts.len();
        info!(
            emails = emails.len(),
            receipts_detected,
            classification_failures,
            extraction_failures,
            "starting reconciliation"
        );

        let batch = self
            .engine
            .reconcile_batch(&mut *ledger, collected.receipts)
            .await;
        ledger.persist().await?;

        Ok(PipelineReport {
            emails_loaded: emails.len(),
            receipts_detected,
            classification_failures,
            extraction_failures,
            batch,
        })
    }

    /// Load every `.eml` file in `dir` and run the pipeline over them
    pub async fn run_directory<L: Ledger + ?Sized>(
        &self,
        ledger: &mut L,
        dir: impl AsRef<Path>,
    ) -> Result<PipelineReport, PipelineError> {
        let emails = load_directory(dir)?;
        self.run(ledger, &emails).await
    }
}
