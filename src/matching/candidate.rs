//! Date-window and exact-amount filtering of ledger entries

use bigdecimal::BigDecimal;
use chrono::{Duration, NaiveDate};

use crate::types::LedgerEntry;

/// Selects ledger entries that could correspond to a receipt
#[derive(Debug, Clone)]
pub struct CandidateFilter {
    window_days: i64,
    excluded_markers: Vec<String>,
}

impl CandidateFilter {
    /// Create a filter with a `±window_days` search window
    pub fn new(window_days: i64) -> Self {
        Self {
            window_days: window_days.max(0),
            excluded_markers: Vec::new(),
        }
    }

    /// Skip entries carrying any of these tags
    pub fn excluding_markers(mut self, markers: impl IntoIterator<Item = String>) -> Self {
        self.excluded_markers.extend(markers);
        self
    }

    /// Inclusive date bounds searched around `observed_date`
    pub fn window(&self, observed_date: NaiveDate) -> (NaiveDate, NaiveDate) {
        let span = Duration::days(self.window_days);
        let start = observed_date
            .checked_sub_signed(span)
            .unwrap_or(NaiveDate::MIN);
        let end = observed_date
            .checked_add_signed(span)
            .unwrap_or(NaiveDate::MAX);
        (start, end)
    }

    /// Entries inside the window whose amount is exactly `-total_billed`.
    ///
    /// A negative `total_billed` never matches anything.
    pub fn filter<'a>(
        &self,
        entries: &'a [LedgerEntry],
        observed_date: NaiveDate,
        total_billed: &BigDecimal,
    ) -> Vec<&'a LedgerEntry> {
        if *total_billed < BigDecimal::from(0) {
            return Vec::new();
        }

        let (start, end) = self.window(observed_date);
        let expected_amount = -total_billed.clone();

        entries
            .iter()
            .filter(|entry| entry.date >= start && entry.date <= end)
            .filter(|entry| entry.amount == expected_amount)
            .filter(|entry| !entry.has_any_tag(self.excluded_markers.as_slice()))
            .collect()
    }
}
