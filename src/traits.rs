//! Traits for ledger abstraction and the upstream collaborator seams

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::BTreeSet;

use crate::email::EmailMessage;
use crate::types::*;
use crate::utils::validation::validate_receipt;

/// Storage abstraction for the ledger being reconciled against
///
/// Implemented by the in-memory arena, the CSV file backend and the remote
/// API backend. The reconciliation core only ever talks to this trait.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// List every entry in the current snapshot
    async fn list_entries(&self) -> LedgerResult<Vec<LedgerEntry>>;

    /// List entries dated within `[start, end]`, inclusive
    ///
    /// Backends that can query by date should override this.
    async fn entries_between(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> LedgerResult<Vec<LedgerEntry>> {
        let entries = self.list_entries().await?;
        Ok(entries
            .into_iter()
            .filter(|entry| entry.date >= start && entry.date <= end)
            .collect())
    }

    /// Get an entry by ID
    async fn get_entry(&self, id: &str) -> LedgerResult<Option<LedgerEntry>>;

    /// Replace the tag set of an entry
    async fn set_tags(&mut self, id: &str, tags: &BTreeSet<String>) -> LedgerResult<()>;

    /// Append text to an entry's notes, newline separated from existing content
    async fn append_note(&mut self, id: &str, text: &str) -> LedgerResult<()>;

    /// Flush pending changes (no-op for write-through backends)
    async fn persist(&mut self) -> LedgerResult<()>;

    /// Tags written by other sync processes that mean "already reconciled"
    fn equivalent_markers(&self) -> &[String] {
        &[]
    }
}

/// Trait for implementing custom receipt validation rules
pub trait ReceiptValidator: Send + Sync {
    /// Validate a receipt before it is matched
    fn validate_receipt(&self, receipt: &Receipt) -> Result<(), ValidationError>;
}

/// Default receipt validator: non-empty merchant, item quantities of at least one
pub struct DefaultReceiptValidator;

impl ReceiptValidator for DefaultReceiptValidator {
    fn validate_receipt(&self, receipt: &Receipt) -> Result<(), ValidationError> {
        validate_receipt(receipt)
    }
}

/// Decides whether an email is a purchase receipt
#[async_trait]
pub trait ReceiptClassifier: Send + Sync {
    async fn is_receipt(&self, email: &EmailMessage) -> Result<bool, ClassifyError>;
}

#[async_trait]
impl<T: ReceiptClassifier + ?Sized> ReceiptClassifier for Box<T> {
    async fn is_receipt(&self, email: &EmailMessage) -> Result<bool, ClassifyError> {
        (**self).is_receipt(email).await
    }
}

/// Turns a receipt email into structured receipt data
#[async_trait]
pub trait ReceiptExtractor: Send + Sync {
    async fn extract(&self, email: &EmailMessage) -> Result<Receipt, ExtractError>;
}
