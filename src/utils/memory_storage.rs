//! In-memory ledger implementation for testing

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::traits::*;
use crate::types::*;

/// In-memory ledger for testing and embedding
///
/// Clones share the same arena, so a test can keep a handle while the engine
/// mutates through another.
#[derive(Debug, Clone, Default)]
pub struct MemoryLedger {
    entries: Arc<RwLock<BTreeMap<String, LedgerEntry>>>,
    equivalent_markers: Vec<String>,
}

impl MemoryLedger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a ledger holding the given entries
    pub fn with_entries(entries: impl IntoIterator<Item = LedgerEntry>) -> Self {
        let map = entries
            .into_iter()
            .map(|entry| (entry.id.clone(), entry))
            .collect();
        Self {
            entries: Arc::new(RwLock::new(map)),
            equivalent_markers: Vec::new(),
        }
    }

    /// Treat these tags as equivalent reconciliation markers
    pub fn with_equivalent_markers(mut self, markers: Vec<String>) -> Self {
        self.equivalent_markers = markers;
        self
    }

    /// Insert an entry, assigning a fresh ID when it has none. Returns the ID.
    pub fn insert(&self, mut entry: LedgerEntry) -> LedgerResult<String> {
        if entry.id.trim().is_empty() {
            entry.id = uuid::Uuid::new_v4().to_string();
        }
        let id = entry.id.clone();
        self.write()?.insert(id.clone(), entry);
        Ok(id)
    }

    /// Remove an entry, returning it if it existed
    pub fn remove(&self, id: &str) -> LedgerResult<Option<LedgerEntry>> {
        Ok(self.write()?.remove(id))
    }

    /// Clear all data (useful for testing)
    pub fn clear(&self) -> LedgerResult<()> {
        self.write()?.clear();
        Ok(())
    }

    fn read(&self) -> LedgerResult<RwLockReadGuard<'_, BTreeMap<String, LedgerEntry>>> {
        self.entries
            .read()
            .map_err(|_| LedgerError::Backend("ledger lock poisoned".to_string()))
    }

    fn write(&self) -> LedgerResult<RwLockWriteGuard<'_, BTreeMap<String, LedgerEntry>>> {
        self.entries
            .write()
            .map_err(|_| LedgerError::Backend("ledger lock poisoned".to_string()))
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn list_entries(&self) -> LedgerResult<Vec<LedgerEntry>> {
        Ok(self.read()?.values().cloned().collect())
    }

    async fn get_entry(&self, id: &str) -> LedgerResult<Option<LedgerEntry>> {
        Ok(self.read()?.get(id).cloned())
    }

    async fn set_tags(&mut self, id: &str, tags: &BTreeSet<String>) -> LedgerResult<()> {
        let mut entries = self.write()?;
        let entry = entries
            .get_mut(id)
            .ok_or_else(|| LedgerError::EntryNotFound(id.to_string()))?;
        entry.tags = tags.clone();
        Ok(())
    }

    async fn append_note(&mut self, id: &str, text: &str) -> LedgerResult<()> {
        let mut entries = self.write()?;
        let entry = entries
            .get_mut(id)
            .ok_or_else(|| LedgerError::EntryNotFound(id.to_string()))?;
        entry.notes = Some(entry.note_with_appended(text));
        Ok(())
    }

    async fn persist(&mut self) -> LedgerResult<()> {
        Ok(())
    }

    fn equivalent_markers(&self) -> &[String] {
        &self.equivalent_markers
    }
}
