//! Ledger backed by a remote account-management REST API
//!
//! Endpoints, relative to the configured base URL:
//!
//! - `GET /transactions?start_date=YYYY-MM-DD&end_date=YYYY-MM-DD`
//! - `GET /transactions/{id}` (404 when absent)
//! - `PUT /transactions/{id}/tags` with `{"tags": [...]}`
//! - `PATCH /transactions/{id}` with `{"notes": "..."}`
//!
//! Every write goes through immediately, so `persist` has nothing to do.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::str::FromStr;
use tracing::debug;

use crate::traits::*;
use crate::types::*;

/// Marker written by the account provider's own retailer sync
pub const RETAIL_SYNC_MARKER: &str = "Retail Sync";

/// REST client implementing [`Ledger`]
#[derive(Debug, Clone)]
pub struct ApiLedger {
    http_client: Client,
    base_url: String,
    token: Option<String>,
    equivalent_markers: Vec<String>,
}

impl ApiLedger {
    pub fn new(base_url: &str) -> Self {
        Self {
            http_client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
            equivalent_markers: vec![RETAIL_SYNC_MARKER.to_string()],
        }
    }

    /// Authenticate requests with a bearer token
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Replace the tags treated as "already reconciled" by another process
    pub fn with_equivalent_markers(mut self, markers: Vec<String>) -> Self {
        self.equivalent_markers = markers;
        self
    }

    /// Base URL extended by `segments`, each percent-encoded as one path segment
    fn url(&self, segments: &[&str]) -> LedgerResult<Url> {
        let invalid = || LedgerError::Backend(format!("invalid base URL '{}'", self.base_url));
        let mut url = Url::parse(&self.base_url).map_err(|_| invalid())?;
        url.path_segments_mut()
            .map_err(|_| invalid())?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn fetch(&self, request: RequestBuilder) -> LedgerResult<Vec<LedgerEntry>> {
        let response = self.authorized(request).send().await?.error_for_status()?;
        let transactions: Vec<ApiTransaction> = response.json().await?;
        transactions.into_iter().map(LedgerEntry::try_from).collect()
    }

    async fn send_update<T: Serialize + ?Sized>(
        &self,
        request: RequestBuilder,
        id: &str,
        body: &T,
    ) -> LedgerResult<()> {
        let response = self.authorized(request).json(body).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(LedgerError::EntryNotFound(id.to_string()));
        }
        response.error_for_status()?;
        Ok(())
    }
}

/// Amount as sent by the API: either a JSON number or a decimal string
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ApiAmount {
    Number(serde_json::Number),
    Text(String),
}

#[derive(Debug, Deserialize)]
struct ApiTransaction {
    id: String,
    date: NaiveDate,
    amount: ApiAmount,
    merchant_name: String,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    notes: Option<String>,
}

impl TryFrom<ApiTransaction> for LedgerEntry {
    type Error = LedgerError;

    fn try_from(tx: ApiTransaction) -> LedgerResult<Self> {
        let raw = match &tx.amount {
            ApiAmount::Number(n) => n.to_string(),
            ApiAmount::Text(s) => s.clone(),
        };
        let amount = BigDecimal::from_str(raw.trim()).map_err(|_| {
            LedgerError::InvalidData(format!("transaction {}: invalid amount '{raw}'", tx.id))
        })?;

        Ok(LedgerEntry {
            id: tx.id,
            date: tx.date,
            amount,
            merchant_name: tx.merchant_name,
            tags: tx.tags.into_iter().collect(),
            notes: tx.notes.filter(|n| !n.is_empty()),
        })
    }
}

#[derive(Serialize)]
struct TagsUpdate<'a> {
    tags: Vec<&'a str>,
}

#[derive(Serialize)]
struct NotesUpdate<'a> {
    notes: &'a str,
}

#[async_trait]
impl Ledger for ApiLedger {
    async fn list_entries(&self) -> LedgerResult<Vec<LedgerEntry>> {
        self.fetch(self.http_client.get(self.url(&["transactions"])?))
            .await
    }

    async fn entries_between(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> LedgerResult<Vec<LedgerEntry>> {
        let request = self.http_client.get(self.url(&["transactions"])?).query(&[
            ("start_date", start.to_string()),
            ("end_date", end.to_string()),
        ]);
        let entries = self.fetch(request).await?;
        debug!(%start, %end, count = entries.len(), "fetched transactions");
        Ok(entries)
    }

    async fn get_entry(&self, id: &str) -> LedgerResult<Option<LedgerEntry>> {
        let request = self
            .http_client
            .get(self.url(&["transactions", id])?);
        let response = self.authorized(request).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let transaction: ApiTransaction = response.error_for_status()?.json().await?;
        LedgerEntry::try_from(transaction).map(Some)
    }

    async fn set_tags(&mut self, id: &str, tags: &BTreeSet<String>) -> LedgerResult<()> {
        let request = self
            .http_client
            .put(self.url(&["transactions", id, "tags"])?);
        let body = TagsUpdate {
            tags: tags.iter().map(String::as_str).collect(),
        };
        self.send_update(request, id, &body).await
    }

    async fn append_note(&mut self, id: &str, text: &str) -> LedgerResult<()> {
        let entry = self
            .get_entry(id)
            .await?
            .ok_or_else(|| LedgerError::EntryNotFound(id.to_string()))?;
        let notes = entry.note_with_appended(text);

        let request = self
            .http_client
            .patch(self.url(&["transactions", id])?);
        self.send_update(request, id, &NotesUpdate { notes: &notes })
            .await
    }

    async fn persist(&mut self) -> LedgerResult<()> {
        Ok(())
    }

    fn equivalent_markers(&self) -> &[String] {
        &self.equivalent_markers
    }
}
