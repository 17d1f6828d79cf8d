//! Core types and data structures for receipt reconciliation

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A single purchased line on a receipt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    /// Name of the item as printed on the receipt
    pub name: String,
    /// Unit cost of the item
    pub cost: BigDecimal,
    /// Optional longer description
    pub description: Option<String>,
    /// Quantity purchased, at least one
    pub quantity: u32,
    /// Payment method if the receipt states one (e.g. "Visa 5320")
    pub payment_method: Option<String>,
}

impl LineItem {
    /// Create a line item with quantity one and no description
    pub fn new(name: impl Into<String>, cost: BigDecimal) -> Self {
        Self {
            name: name.into(),
            cost,
            description: None,
            quantity: 1,
            payment_method: None,
        }
    }

    /// Set the quantity
    pub fn quantity(mut self, quantity: u32) -> Self {
        self.quantity = quantity;
        self
    }

    /// Set the description
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Structured purchase data extracted from a source document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Receipt {
    /// Merchant name as it appears on the receipt
    pub merchant: String,
    /// Sum of item costs before promotions, gift cards or discounts
    pub total_cost: BigDecimal,
    /// Amount actually charged to the payment method
    pub total_billed: BigDecimal,
    /// Purchased items, in receipt order
    pub items: Vec<LineItem>,
}

impl Receipt {
    /// Create a receipt without items where cost equals the billed amount
    pub fn new(merchant: impl Into<String>, total_billed: BigDecimal) -> Self {
        Self {
            merchant: merchant.into(),
            total_cost: total_billed.clone(),
            total_billed,
            items: Vec::new(),
        }
    }

    /// Override the pre-adjustment total
    pub fn total_cost(mut self, total_cost: BigDecimal) -> Self {
        self.total_cost = total_cost;
        self
    }

    /// Append a line item
    pub fn item(mut self, item: LineItem) -> Self {
        self.items.push(item);
        self
    }
}

/// One transaction row in a ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Identifier, unique within a ledger snapshot
    pub id: String,
    /// Calendar date the transaction posted
    pub date: NaiveDate,
    /// Signed amount; outflows are negative
    pub amount: BigDecimal,
    /// Merchant name recorded by the ledger
    pub merchant_name: String,
    /// Tags attached to the transaction
    pub tags: BTreeSet<String>,
    /// Free-form notes
    pub notes: Option<String>,
}

impl LedgerEntry {
    /// Create an untagged entry without notes
    pub fn new(
        id: impl Into<String>,
        date: NaiveDate,
        amount: BigDecimal,
        merchant_name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            date,
            amount,
            merchant_name: merchant_name.into(),
            tags: BTreeSet::new(),
            notes: None,
        }
    }

    /// Add a tag
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    /// Set the notes
    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Whether the entry carries any of the given tags
    pub fn has_any_tag<S: AsRef<str>>(&self, tags: &[S]) -> bool {
        tags.iter().any(|t| self.tags.contains(t.as_ref()))
    }

    /// The note this entry would hold after appending `text`
    pub fn note_with_appended(&self, text: &str) -> String {
        join_note(self.notes.as_deref(), text)
    }
}

/// Append `text` to an existing note, newline separated.
///
/// Missing or empty notes are replaced by `text` outright.
pub fn join_note(existing: Option<&str>, text: &str) -> String {
    match existing {
        Some(current) if !current.is_empty() => format!("{current}\n{text}"),
        _ => text.to_string(),
    }
}

/// Result of resolving scored candidates for one receipt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchDecision {
    /// No ledger entry cleared the filters and the similarity threshold
    NoCandidate,
    /// Exactly one entry cleared the threshold
    Matched(String),
    /// Two or more entries cleared the threshold; nothing is mutated
    Ambiguous(Vec<String>),
}

/// What a successful mutation actually did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MutationStatus {
    /// Marker tag added and note appended
    Updated,
    /// Entry already carried a reconciliation marker; nothing written
    AlreadyReconciled,
}

/// Terminal state of reconciling one receipt
#[derive(Debug)]
pub enum ReconciliationOutcome {
    /// No unreconciled entry passed the date, amount and name filters
    NoCandidate,
    /// Two or more entries qualified; nothing was written
    Ambiguous(Vec<String>),
    /// The single matching entry was tagged and annotated
    MatchedAndUpdated(String),
    /// The single matching entry already carried a reconciliation marker
    MatchedNoOp(String),
    /// The single matching entry could not be written
    MutationFailed {
        entry_id: String,
        error: MutationError,
    },
}

impl ReconciliationOutcome {
    /// The ledger entry this outcome refers to, if a single one was chosen
    pub fn entry_id(&self) -> Option<&str> {
        match self {
            Self::MatchedAndUpdated(id) | Self::MatchedNoOp(id) => Some(id),
            Self::MutationFailed { entry_id, .. } => Some(entry_id),
            Self::NoCandidate | Self::Ambiguous(_) => None,
        }
    }

    /// Short label used in logs and reports
    pub fn label(&self) -> &'static str {
        match self {
            Self::NoCandidate => "no_candidate",
            Self::Ambiguous(_) => "ambiguous",
            Self::MatchedAndUpdated(_) => "matched",
            Self::MatchedNoOp(_) => "already_reconciled",
            Self::MutationFailed { .. } => "mutation_failed",
        }
    }
}

/// Errors raised by ledger backends
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid data: {0}")]
    InvalidData(String),
    #[error("Entry not found: {0}")]
    EntryNotFound(String),
    #[error("Backend error: {0}")]
    Backend(String),
}

/// Result type for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Malformed input reaching the reconciliation core
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid date: {0}")]
    InvalidDate(String),
    #[error("Non-finite amount for {field}: {value}")]
    NonFiniteAmount { field: String, value: String },
    #[error("Merchant name cannot be empty")]
    EmptyMerchant,
    #[error("Item '{0}' must have a quantity of at least one")]
    InvalidQuantity(String),
}

/// Failure to write a reconciliation back to the ledger
#[derive(Debug, thiserror::Error)]
pub enum MutationError {
    #[error("Ledger entry not found: {0}")]
    NotFound(String),
    #[error("Ledger backend failure: {0}")]
    BackendFailure(#[source] LedgerError),
}

impl From<LedgerError> for MutationError {
    fn from(error: LedgerError) -> Self {
        match error {
            LedgerError::EntryNotFound(id) => MutationError::NotFound(id),
            other => MutationError::BackendFailure(other),
        }
    }
}

/// Per-receipt failure that prevents a decision from being reached
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

/// Failure to decide whether an email is a receipt
#[derive(Debug, thiserror::Error)]
pub enum ClassifyError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Failure to turn an email into a receipt
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Malformed extraction response: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_join_note_replaces_empty() {
        assert_eq!(join_note(None, "a"), "a");
        assert_eq!(join_note(Some(""), "a"), "a");
        assert_eq!(join_note(Some("old"), "a"), "old\na");
    }

    #[test]
    fn test_entry_has_any_tag() {
        let entry = LedgerEntry::new(
            "1",
            NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
            BigDecimal::from_str("-42.50").unwrap(),
            "Bombas",
        )
        .tag("Retail Sync");

        assert!(entry.has_any_tag(&["ReceiptAggregator", "Retail Sync"]));
        assert!(!entry.has_any_tag(&["ReceiptAggregator"]));
    }

    #[test]
    fn test_not_found_maps_to_mutation_error() {
        let err: MutationError = LedgerError::EntryNotFound("7".to_string()).into();
        assert!(matches!(err, MutationError::NotFound(id) if id == "7"));

        let err: MutationError = LedgerError::Backend("down".to_string()).into();
        assert!(matches!(err, MutationError::BackendFailure(_)));
    }
}
