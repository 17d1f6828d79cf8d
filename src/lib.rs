//! # Receipt Aggregator
//!
//! Reconciles purchase receipts against a ledger of financial transactions.
//! Each receipt is matched to at most one transaction by date window, exact
//! billed amount and merchant-name similarity; the matched transaction gets a
//! marker tag and an itemized note.
//!
//! ## Features
//!
//! - **Matching core**: Jaro similarity, candidate filtering and a conservative
//!   resolver that only updates on a single unambiguous match
//! - **Idempotent mutation**: entries already carrying a reconciliation marker
//!   are never written twice
//! - **Storage abstraction**: in-memory, CSV file and REST API ledgers behind
//!   one async [`Ledger`] trait
//! - **Email pipeline**: `.eml` loading, keyword or model-backed receipt
//!   classification and structured extraction through an Ollama model
//!
//! ## Quick Start
//!
//! ```rust
//! use receipt_aggregator::{LedgerEntry, MemoryLedger, Receipt, ReconciliationEngine};
//! use bigdecimal::BigDecimal;
//! use chrono::NaiveDate;
//! use std::str::FromStr;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let mut ledger = MemoryLedger::new();
//! ledger.insert(LedgerEntry::new(
//!     "tx-1",
//!     NaiveDate::from_ymd_opt(2024, 1, 13).unwrap(),
//!     BigDecimal::from_str("-42.50").unwrap(),
//!     "Bombas",
//! )).unwrap();
//!
//! let receipt = Receipt::new("Bombas", BigDecimal::from_str("42.50").unwrap());
//! let engine = ReconciliationEngine::default();
//! let outcome = engine
//!     .reconcile_one(&mut ledger, &receipt, NaiveDate::from_ymd_opt(2024, 1, 12).unwrap())
//!     .await
//!     .unwrap();
//! assert_eq!(outcome.entry_id(), Some("tx-1"));
//! # }
//! ```

pub mod backends;
pub mod classify;
pub mod config;
pub mod email;
pub mod extract;
pub mod matching;
pub mod ollama;
pub mod pipeline;
pub mod reconciliation;
pub mod traits;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use backends::*;
pub use classify::*;
pub use config::*;
pub use email::*;
pub use extract::*;
pub use matching::*;
pub use ollama::OllamaClient;
pub use pipeline::*;
pub use reconciliation::*;
pub use traits::*;
pub use types::*;
pub use utils::*;
