//! Merchant-similarity scoring and the single-match decision rule

use crate::matching::similarity::jaro_similarity;
use crate::types::{LedgerEntry, MatchDecision};

/// A filtered candidate with its merchant similarity score
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCandidate {
    pub entry_id: String,
    pub merchant_name: String,
    pub score: f64,
}

/// Decides which (if any) candidate a receipt belongs to
#[derive(Debug, Clone)]
pub struct MatchResolver {
    threshold: f64,
}

impl MatchResolver {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Score every candidate against the receipt merchant, best first.
    ///
    /// Equal scores keep ID order so ambiguous results are reproducible.
    pub fn score(&self, candidates: &[&LedgerEntry], merchant: &str) -> Vec<ScoredCandidate> {
        let mut scored: Vec<ScoredCandidate> = candidates
            .iter()
            .map(|entry| ScoredCandidate {
                entry_id: entry.id.clone(),
                merchant_name: entry.merchant_name.clone(),
                score: jaro_similarity(merchant, &entry.merchant_name),
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.entry_id.cmp(&b.entry_id))
        });
        scored
    }

    /// Apply the threshold and the conservative ambiguity rule
    pub fn resolve(&self, candidates: &[&LedgerEntry], merchant: &str) -> MatchDecision {
        let mut qualifying: Vec<String> = self
            .score(candidates, merchant)
            .into_iter()
            .filter(|candidate| candidate.score >= self.threshold)
            .map(|candidate| candidate.entry_id)
            .collect();

        match qualifying.len() {
            0 => MatchDecision::NoCandidate,
            1 => MatchDecision::Matched(qualifying.remove(0)),
            _ => MatchDecision::Ambiguous(qualifying),
        }
    }
}
