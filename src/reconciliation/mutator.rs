//! Idempotent, additive write-back of a decided match

use std::fmt::Write as _;
use tracing::debug;

use crate::matching::RECONCILIATION_MARKER;
use crate::traits::Ledger;
use crate::types::*;

/// Render the note text appended to a reconciled entry.
///
/// ```text
/// Total Cost: 45.00 - Total Billed: 42.50
/// 2x Crew Socks - $15.00
/// 1x Ankle Socks - $15.00
/// ```
pub fn render_note(receipt: &Receipt) -> String {
    let mut note = format!(
        "Total Cost: {} - Total Billed: {}",
        receipt.total_cost, receipt.total_billed
    );
    for item in &receipt.items {
        let _ = write!(note, "\n{}x {} - ${}", item.quantity, item.name, item.cost);
    }
    note
}

/// Applies a reconciliation to one ledger entry
#[derive(Debug, Clone)]
pub struct LedgerMutator {
    marker_tag: String,
}

impl Default for LedgerMutator {
    fn default() -> Self {
        Self::new(RECONCILIATION_MARKER)
    }
}

impl LedgerMutator {
    pub fn new(marker_tag: impl Into<String>) -> Self {
        Self {
            marker_tag: marker_tag.into(),
        }
    }

    pub fn marker_tag(&self) -> &str {
        &self.marker_tag
    }

    /// Tag `entry_id` and append the receipt summary to its notes.
    ///
    /// Entries already carrying the marker (or a ledger-specific equivalent)
    /// are left untouched and reported as [`MutationStatus::AlreadyReconciled`].
    pub async fn apply<L: Ledger + ?Sized>(
        &self,
        ledger: &mut L,
        entry_id: &str,
        receipt: &Receipt,
    ) -> Result<MutationStatus, MutationError> {
        let entry = ledger
            .get_entry(entry_id)
            .await?
            .ok_or_else(|| MutationError::NotFound(entry_id.to_string()))?;

        if entry.tags.contains(&self.marker_tag) || entry.has_any_tag(ledger.equivalent_markers())
        {
            debug!(entry_id, "entry already reconciled, skipping write");
            return Ok(MutationStatus::AlreadyReconciled);
        }

        // A failed tag write leaves the note behind without the marker.
        let note = render_note(receipt);
        if entry
            .notes
            .as_deref()
            .is_some_and(|notes| notes.contains(&note))
        {
            debug!(entry_id, "note already present, only adding marker");
        } else {
            ledger.append_note(entry_id, &note).await?;
        }

        // Marker goes on last; it records a completed write.
        let mut tags = entry.tags;
        tags.insert(self.marker_tag.clone());
        ledger.set_tags(entry_id, &tags).await?;

        Ok(MutationStatus::Updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::MemoryLedger;
    use bigdecimal::BigDecimal;
    use chrono::NaiveDate;
    use std::str::FromStr;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    fn receipt() -> Receipt {
        Receipt::new("Bombas", dec("42.50"))
            .total_cost(dec("45.00"))
            .item(LineItem::new("Crew Socks", dec("15.00")).quantity(2))
            .item(LineItem::new("Ankle Socks", dec("15.00")))
    }

    fn ledger_with(entry: LedgerEntry) -> MemoryLedger {
        MemoryLedger::with_entries(vec![entry])
    }

    fn bombas() -> LedgerEntry {
        LedgerEntry::new(
            "1",
            NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
            dec("-42.50"),
            "Bombas",
        )
    }

    #[test]
    fn test_render_note() {
        assert_eq!(
            render_note(&receipt()),
            "Total Cost: 45.00 - Total Billed: 42.50\n\
             2x Crew Socks - $15.00\n\
             1x Ankle Socks - $15.00"
        );
    }

    #[test]
    fn test_render_note_without_items() {
        let receipt = Receipt::new("Netflix", dec("15.49"));
        assert_eq!(
            render_note(&receipt),
            "Total Cost: 15.49 - Total Billed: 15.49"
        );
    }

    #[tokio::test]
    async fn test_apply_is_additive() {
        let mut ledger = ledger_with(bombas().tag("Shopping").notes("gift for dad"));
        let mutator = LedgerMutator::default();

        let status = mutator.apply(&mut ledger, "1", &receipt()).await.unwrap();
        assert_eq!(status, MutationStatus::Updated);

        let entry = ledger.get_entry("1").await.unwrap().unwrap();
        assert!(entry.tags.contains("Shopping"));
        assert!(entry.tags.contains(RECONCILIATION_MARKER));
        assert_eq!(
            entry.notes.unwrap(),
            format!("gift for dad\n{}", render_note(&receipt()))
        );
    }

    #[tokio::test]
    async fn test_apply_twice_is_idempotent() {
        let mut ledger = ledger_with(bombas());
        let mutator = LedgerMutator::default();

        mutator.apply(&mut ledger, "1", &receipt()).await.unwrap();
        let after_first = ledger.get_entry("1").await.unwrap();

        let status = mutator.apply(&mut ledger, "1", &receipt()).await.unwrap();
        assert_eq!(status, MutationStatus::AlreadyReconciled);
        assert_eq!(ledger.get_entry("1").await.unwrap(), after_first);
    }

    #[tokio::test]
    async fn test_equivalent_marker_short_circuits() {
        let mut ledger = ledger_with(bombas().tag("Retail Sync"))
            .with_equivalent_markers(vec!["Retail Sync".to_string()]);
        let mutator = LedgerMutator::default();

        let status = mutator.apply(&mut ledger, "1", &receipt()).await.unwrap();
        assert_eq!(status, MutationStatus::AlreadyReconciled);
        assert!(ledger.get_entry("1").await.unwrap().unwrap().notes.is_none());
    }

    /// Memory ledger whose first tag write fails
    struct FailFirstTagWrite {
        inner: MemoryLedger,
        failed: bool,
    }

    #[async_trait::async_trait]
    impl Ledger for FailFirstTagWrite {
        async fn list_entries(&self) -> LedgerResult<Vec<LedgerEntry>> {
            self.inner.list_entries().await
        }

        async fn get_entry(&self, id: &str) -> LedgerResult<Option<LedgerEntry>> {
            self.inner.get_entry(id).await
        }

        async fn set_tags(
            &mut self,
            id: &str,
            tags: &std::collections::BTreeSet<String>,
        ) -> LedgerResult<()> {
            if !self.failed {
                self.failed = true;
                return Err(LedgerError::Backend("timeout".to_string()));
            }
            self.inner.set_tags(id, tags).await
        }

        async fn append_note(&mut self, id: &str, text: &str) -> LedgerResult<()> {
            self.inner.append_note(id, text).await
        }

        async fn persist(&mut self) -> LedgerResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_retry_after_failed_tag_write_keeps_single_note() {
        let mut ledger = FailFirstTagWrite {
            inner: ledger_with(bombas()),
            failed: false,
        };
        let mutator = LedgerMutator::default();

        let first = mutator.apply(&mut ledger, "1", &receipt()).await;
        assert!(matches!(first, Err(MutationError::BackendFailure(_))));

        let second = mutator.apply(&mut ledger, "1", &receipt()).await.unwrap();
        assert_eq!(second, MutationStatus::Updated);

        let entry = ledger.get_entry("1").await.unwrap().unwrap();
        assert!(entry.tags.contains(RECONCILIATION_MARKER));
        assert_eq!(entry.notes.unwrap(), render_note(&receipt()));
    }

    #[tokio::test]
    async fn test_missing_entry_is_not_found() {
        let mut ledger = MemoryLedger::new();
        let err = LedgerMutator::default()
            .apply(&mut ledger, "gone", &receipt())
            .await
            .unwrap_err();
        assert!(matches!(err, MutationError::NotFound(id) if id == "gone"));
    }
}
