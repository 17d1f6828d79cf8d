//! Matching module: string similarity, candidate filtering and resolution

pub mod candidate;
pub mod resolver;
pub mod similarity;

pub use candidate::*;
pub use resolver::*;
pub use similarity::*;

use serde::{Deserialize, Serialize};

/// Days searched on either side of the date a receipt was received
pub const DEFAULT_DATE_WINDOW_DAYS: i64 = 5;

/// Minimum Jaro similarity between receipt and ledger merchant names
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.75;

/// Tag written onto reconciled ledger entries
pub const RECONCILIATION_MARKER: &str = "ReceiptAggregator";

/// Tunable matching constants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    pub date_window_days: i64,
    pub similarity_threshold: f64,
    pub marker_tag: String,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            date_window_days: DEFAULT_DATE_WINDOW_DAYS,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            marker_tag: RECONCILIATION_MARKER.to_string(),
        }
    }
}

impl MatchConfig {
    /// Candidate filter for this configuration, skipping already-marked entries
    pub fn candidate_filter(&self, equivalent_markers: &[String]) -> CandidateFilter {
        CandidateFilter::new(self.date_window_days).excluding_markers(
            std::iter::once(self.marker_tag.clone()).chain(equivalent_markers.iter().cloned()),
        )
    }

    pub fn resolver(&self) -> MatchResolver {
        MatchResolver::new(self.similarity_threshold)
    }
}
