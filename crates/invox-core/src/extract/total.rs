//! Invoice total resolution.
//!
//! A parseable answer to a total query wins outright. Detected candidates
//! come from form fields, text lines, and table summary rows, and are
//! ranked by keyword tier: an explicit amount-due label beats
//! a grand total, which beats a subtotal, which beats weaker hints. Within
//! a tier the highest-confidence candidate wins; remaining ties go to the
//! bottom-most occurrence since totals close out the document.

use std::cmp::Ordering;

use tracing::debug;

use super::amount::parse_amount;
use crate::models::block::{Document, Geometry};
use crate::models::invoice::Amount;

/// Keyword strength of a total candidate, strongest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum TotalTier {
    DueAmount,
    Total,
    Subtotal,
    KeywordAdjacent,
}

impl TotalTier {
    /// Classify label text. `None` means the text names no total at all.
    fn classify(text: &str) -> Option<TotalTier> {
        let lowered = text.to_lowercase();

        const DUE: &[&str] = &["balance due", "amount due", "total due"];
        if DUE.iter().any(|kw| lowered.contains(kw)) {
            return Some(TotalTier::DueAmount);
        }

        let subtotal = ["subtotal", "sub total", "sub-total"]
            .iter()
            .any(|kw| lowered.contains(kw));
        if lowered.contains("total") && !subtotal {
            return Some(TotalTier::Total);
        }
        if subtotal {
            return Some(TotalTier::Subtotal);
        }

        // Bare "due" or "balance" is not a total label; payment-terms
        // sentences and due-date fields must never produce a total.
        const WEAK: &[&str] = &[
            "amount payable",
            "gross amount",
            "net amount",
            "including vat",
            "incl. vat",
        ];
        if WEAK.iter().any(|kw| lowered.contains(kw)) {
            return Some(TotalTier::KeywordAdjacent);
        }
        None
    }
}

#[derive(Debug)]
struct TotalCandidate {
    tier: TotalTier,
    amount: Amount,
    confidence: f32,
    page: u32,
    bottom: f32,
}

impl TotalCandidate {
    fn from_text(text: &str, label: &str, confidence: f32, geometry: &Geometry) -> Option<Self> {
        let tier = TotalTier::classify(label)?;
        let amount = parse_amount(text)?;
        Some(TotalCandidate {
            tier,
            amount,
            confidence,
            page: geometry.page,
            bottom: geometry.bottom(),
        })
    }

    /// `Less` means better: tier, then confidence, then lowest on the page.
    fn ranking(&self, other: &Self) -> Ordering {
        self.tier
            .cmp(&other.tier)
            .then(other.confidence.total_cmp(&self.confidence))
            .then(other.page.cmp(&self.page))
            .then(other.bottom.total_cmp(&self.bottom))
    }
}

/// Resolve the invoice total from all available signals.
pub fn resolve_total(doc: &Document) -> Option<Amount> {
    // A parseable answer to a total query is authoritative.
    for query in doc.queries() {
        let label = format!("{} {}", query.alias, query.question);
        if TotalTier::classify(&label).is_none() {
            continue;
        }
        if let Some(amount) = parse_amount(&query.answer) {
            debug!(total = %amount.formatted, "resolved invoice total from query answer");
            return Some(amount);
        }
    }

    let mut candidates = Vec::new();

    for kv in doc.key_values() {
        if let Some(c) =
            TotalCandidate::from_text(&kv.value, &kv.key, kv.confidence, &kv.geometry)
        {
            candidates.push(c);
        }
    }

    for line in doc.lines() {
        if let Some(c) =
            TotalCandidate::from_text(&line.text, &line.text, line.confidence, &line.geometry)
        {
            candidates.push(c);
        }
    }

    for grid in doc.tables() {
        for (index, row) in grid.rows().iter().enumerate() {
            let text = grid.row_text(index);
            let geometry = row
                .iter()
                .find(|c| !c.is_empty())
                .map(|c| c.geometry)
                .unwrap_or_default();
            let confidence = row
                .iter()
                .filter(|c| !c.is_empty())
                .map(|c| c.confidence)
                .fold(0.0f32, f32::max);
            if let Some(c) = TotalCandidate::from_text(&text, &text, confidence, &geometry) {
                candidates.push(c);
            }
        }
    }

    let winner = candidates.into_iter().min_by(|a, b| a.ranking(b))?;
    debug!(tier = ?winner.tier, total = %winner.amount.formatted, "resolved invoice total");
    Some(winner.amount)
}
