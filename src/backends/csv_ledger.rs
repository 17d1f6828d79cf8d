//! Ledger backed by a transactions CSV export
//!
//! Expected columns (case-insensitive): `Date`, `Merchant`, `Amount`, plus
//! optional `Notes` and `Tags`. Any other columns are carried through
//! untouched when the file is written back.

use async_trait::async_trait;
use chrono::NaiveDate;
use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use std::collections::BTreeSet;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::traits::*;
use crate::types::*;
use crate::utils::validation::parse_amount;

const TAG_SEPARATOR: char = ',';

#[derive(Debug, Clone, Copy)]
struct Columns {
    date: usize,
    merchant: usize,
    amount: usize,
    notes: usize,
    tags: usize,
}

/// In-memory snapshot of a CSV ledger, written out on [`Ledger::persist`]
#[derive(Debug, Clone)]
pub struct CsvLedger {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
    entries: Vec<LedgerEntry>,
    columns: Columns,
    output: Option<PathBuf>,
}

impl CsvLedger {
    /// Load a ledger file; `persist` writes back to the same path
    pub fn open(path: impl AsRef<Path>) -> LedgerResult<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)?;
        let mut ledger = Self::from_reader(file)?;
        ledger.output = Some(path.to_path_buf());
        info!(path = %path.display(), entries = ledger.entries.len(), "loaded CSV ledger");
        Ok(ledger)
    }

    /// Parse a ledger from any reader. Set an output path before persisting.
    pub fn from_reader<R: Read>(reader: R) -> LedgerResult<Self> {
        let mut rdr = ReaderBuilder::new().has_headers(true).from_reader(reader);

        let mut headers: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();
        let find = |headers: &[String], name: &str| {
            headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
        };
        let required = |headers: &[String], name: &str| {
            find(headers, name)
                .ok_or_else(|| LedgerError::InvalidData(format!("missing '{name}' column")))
        };

        let date = required(&headers, "Date")?;
        let merchant = required(&headers, "Merchant")?;
        let amount = required(&headers, "Amount")?;
        let notes = match find(&headers, "Notes") {
            Some(i) => i,
            None => {
                headers.push("Notes".to_string());
                headers.len() - 1
            }
        };
        let tags = match find(&headers, "Tags") {
            Some(i) => i,
            None => {
                headers.push("Tags".to_string());
                headers.len() - 1
            }
        };
        let columns = Columns {
            date,
            merchant,
            amount,
            notes,
            tags,
        };

        let mut rows = Vec::new();
        let mut entries = Vec::new();
        for (index, record) in rdr.records().enumerate() {
            let row = normalize_row(record?, headers.len());
            entries.push(row_to_entry(index, &row, columns)?);
            rows.push(row);
        }

        debug!("Parsed {} ledger rows", entries.len());
        Ok(Self {
            headers,
            rows,
            entries,
            columns,
            output: None,
        })
    }

    /// Write to `path` on persist instead of the source file
    pub fn with_output(mut self, path: impl Into<PathBuf>) -> Self {
        self.output = Some(path.into());
        self
    }

    /// Serialize the current snapshot
    pub fn write_to<W: Write>(&self, writer: W) -> LedgerResult<()> {
        let mut wtr = WriterBuilder::new().from_writer(writer);
        wtr.write_record(&self.headers)?;
        for row in &self.rows {
            wtr.write_record(row)?;
        }
        wtr.flush()?;
        Ok(())
    }

    /// Row index for a canonical id; "01" and "+1" are not aliases of "1"
    fn index_of(&self, id: &str) -> LedgerResult<usize> {
        id.parse::<usize>()
            .ok()
            .filter(|i| *i < self.entries.len() && i.to_string() == id)
            .ok_or_else(|| LedgerError::EntryNotFound(id.to_string()))
    }
}

/// Pad short rows so every row has a cell for each header
fn normalize_row(record: StringRecord, width: usize) -> Vec<String> {
    let mut row: Vec<String> = record.iter().map(str::to_string).collect();
    if row.len() < width {
        row.resize(width, String::new());
    }
    row
}

fn row_to_entry(index: usize, row: &[String], columns: Columns) -> LedgerResult<LedgerEntry> {
    let line = index + 2;
    let date = parse_ledger_date(&row[columns.date]).ok_or_else(|| {
        LedgerError::InvalidData(format!("line {line}: invalid date '{}'", row[columns.date]))
    })?;
    let amount = parse_amount(&row[columns.amount]).ok_or_else(|| {
        LedgerError::InvalidData(format!(
            "line {line}: invalid amount '{}'",
            row[columns.amount]
        ))
    })?;
    let notes = Some(row[columns.notes].clone()).filter(|n| !n.is_empty());

    Ok(LedgerEntry {
        id: index.to_string(),
        date,
        amount,
        merchant_name: row[columns.merchant].clone(),
        tags: parse_tags(&row[columns.tags]),
        notes,
    })
}

/// Parse `YYYY-MM-DD` (optionally followed by a time) or `MM/DD/YYYY`
fn parse_ledger_date(raw: &str) -> Option<NaiveDate> {
    let day = raw.trim().split([' ', 'T']).next()?;
    NaiveDate::parse_from_str(day, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(day, "%m/%d/%Y"))
        .ok()
}

fn parse_tags(raw: &str) -> BTreeSet<String> {
    raw.split(TAG_SEPARATOR)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn format_tags(tags: &BTreeSet<String>) -> String {
    tags.iter().map(String::as_str).collect::<Vec<_>>().join(", ")
}

#[async_trait]
impl Ledger for CsvLedger {
    async fn list_entries(&self) -> LedgerResult<Vec<LedgerEntry>> {
        Ok(self.entries.clone())
    }

    async fn get_entry(&self, id: &str) -> LedgerResult<Option<LedgerEntry>> {
        Ok(self
            .index_of(id)
            .ok()
            .map(|index| self.entries[index].clone()))
    }

    async fn set_tags(&mut self, id: &str, tags: &BTreeSet<String>) -> LedgerResult<()> {
        let index = self.index_of(id)?;
        self.entries[index].tags = tags.clone();
        self.rows[index][self.columns.tags] = format_tags(tags);
        Ok(())
    }

    async fn append_note(&mut self, id: &str, text: &str) -> LedgerResult<()> {
        let index = self.index_of(id)?;
        let note = self.entries[index].note_with_appended(text);
        self.rows[index][self.columns.notes] = note.clone();
        self.entries[index].notes = Some(note);
        Ok(())
    }

    async fn persist(&mut self) -> LedgerResult<()> {
        let path = self
            .output
            .clone()
            .ok_or_else(|| LedgerError::Backend("CSV ledger has no output path".to_string()))?;
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        let mut tmp = NamedTempFile::new_in(dir)?;
        self.write_to(tmp.as_file_mut())?;
        tmp.persist(&path).map_err(|e| LedgerError::Io(e.error))?;

        info!(path = %path.display(), entries = self.entries.len(), "wrote CSV ledger");
        Ok(())
    }
}
