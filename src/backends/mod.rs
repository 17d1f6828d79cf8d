//! Concrete ledger backends

pub mod api_ledger;
pub mod csv_ledger;

pub use api_ledger::*;
pub use csv_ledger::*;
