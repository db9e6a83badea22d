//! Field candidate detection for invoice number, date, and payment terms.
//!
//! Detectors emit scored [`Candidate`]s from three signal sources (query
//! answers, form key-value pairs, and free-text lines) and reduce them
//! through one total order, keeping the tie-break policy in a single
//! auditable place.

use std::cmp::Ordering;

use tracing::debug;

use super::patterns::{
    self, DATE_KEYS, HAS_DIGIT, HASH_NUMBER, INVOICE_NUMBER_BARE, INVOICE_NUMBER_KEYS,
    INVOICE_NUMBER_LABELED, PAYMENT_TERMS_KEYS, STANDALONE_TOKEN,
};
use crate::models::block::{Document, QueryAnswer};

/// Which invoice field a candidate proposes a value for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRole {
    InvoiceNumber,
    InvoiceDate,
    PaymentTerms,
}

/// Where a candidate was observed. Query answers are the strongest signal,
/// then form fields, then lines that carry a field keyword, then bare
/// pattern matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    QueryAnswer,
    KeyValue,
    KeywordLine,
    PatternLine,
}

impl SourceKind {
    fn priority(self) -> u8 {
        match self {
            SourceKind::QueryAnswer => 3,
            SourceKind::KeyValue => 2,
            SourceKind::KeywordLine => 1,
            SourceKind::PatternLine => 0,
        }
    }
}

/// A scored, provisional value for one invoice field.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub role: FieldRole,
    pub text: String,
    pub source: SourceKind,
    /// OCR confidence of the block the candidate came from (0-100).
    pub confidence: f32,
    pub page: u32,
    /// Position in reading order; breaks final ties deterministically.
    pub order: usize,
}

impl Candidate {
    /// Total order over candidates: source priority, then confidence, then
    /// earliest page and reading order. `Less` means better.
    pub fn ranking(&self, other: &Self) -> Ordering {
        other
            .source
            .priority()
            .cmp(&self.source.priority())
            .then(other.confidence.total_cmp(&self.confidence))
            .then(self.page.cmp(&other.page))
            .then(self.order.cmp(&other.order))
    }
}

/// Reduce candidates to the single winner under [`Candidate::ranking`].
pub fn best(candidates: Vec<Candidate>) -> Option<Candidate> {
    candidates.into_iter().min_by(|a, b| a.ranking(b))
}

fn normalize_key(key: &str) -> String {
    let lowered = key.to_lowercase();
    let cleaned: String = lowered
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '#' {
                c
            } else {
                ' '
            }
        })
        .collect();
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn key_matches(key: &str, keywords: &[&str]) -> bool {
    let normalized = normalize_key(key);
    keywords
        .iter()
        .any(|kw| normalized.contains(&normalize_key(kw)))
}

/// Matchable label for a query: its alias plus the question text, so
/// `INVOICE_NUMBER` and "What is the invoice number?" both hit the
/// keyword tables after normalization.
fn query_label(query: &QueryAnswer) -> String {
    format!("{} {}", query.alias, query.question)
}

/// Detect the invoice number.
///
/// Query answers win over form fields keyed with an invoice-number
/// keyword; free-text matches (labeled token, or a digit-bearing token on
/// the line after an invoice keyword) fill in when both are absent.
pub fn detect_invoice_number(doc: &Document) -> Option<String> {
    let mut candidates = Vec::new();

    for (order, query) in doc.queries().iter().enumerate() {
        let answer = query.answer.trim();
        if answer.is_empty() || !key_matches(&query_label(query), INVOICE_NUMBER_KEYS) {
            continue;
        }
        candidates.push(Candidate {
            role: FieldRole::InvoiceNumber,
            text: answer.to_string(),
            source: SourceKind::QueryAnswer,
            confidence: query.confidence,
            page: query.geometry.page,
            order,
        });
    }

    for (order, kv) in doc.key_values().iter().enumerate() {
        let value = kv.value.trim();
        if value.is_empty() || !key_matches(&kv.key, INVOICE_NUMBER_KEYS) {
            continue;
        }
        candidates.push(Candidate {
            role: FieldRole::InvoiceNumber,
            text: value.to_string(),
            source: SourceKind::KeyValue,
            confidence: kv.confidence,
            page: kv.geometry.page,
            order,
        });
    }

    let lines = doc.lines();
    for (order, line) in lines.iter().enumerate() {
        let text = line.text.trim();
        let token = INVOICE_NUMBER_LABELED
            .captures(text)
            .or_else(|| INVOICE_NUMBER_BARE.captures(text))
            .map(|caps| (caps[1].to_string(), SourceKind::KeywordLine))
            .or_else(|| {
                HASH_NUMBER
                    .captures(text)
                    .map(|caps| (caps[1].to_string(), SourceKind::PatternLine))
            })
            .or_else(|| {
                // Keyword line followed by a standalone token.
                let lowered = text.to_lowercase();
                if !lowered.contains("invoice") {
                    return None;
                }
                lines.get(order + 1).and_then(|next| {
                    let next_text = next.text.trim();
                    STANDALONE_TOKEN
                        .is_match(next_text)
                        .then(|| (next_text.to_string(), SourceKind::PatternLine))
                })
            });

        if let Some((token, source)) = token {
            if !HAS_DIGIT.is_match(&token) {
                continue;
            }
            candidates.push(Candidate {
                role: FieldRole::InvoiceNumber,
                text: token,
                source,
                confidence: line.confidence,
                page: line.geometry.page,
                order,
            });
        }
    }

    let winner = best(candidates)?;
    debug!(number = %winner.text, source = ?winner.source, "resolved invoice number");
    Some(winner.text)
}

/// Detect the invoice date, preserved as the literal matched text.
///
/// Query answers win, then form fields keyed with a date keyword;
/// free-text lines are then scanned with each date pattern in priority
/// order, and the first pattern that matches anywhere wins.
pub fn detect_invoice_date(doc: &Document) -> Option<String> {
    for query in doc.queries() {
        let answer = query.answer.trim();
        if answer.is_empty() || !date_key_matches(&query_label(query)) {
            continue;
        }
        let text = patterns::date_patterns()
            .iter()
            .find_map(|pat| pat.find(answer))
            .map(|m| m.as_str().to_string())
            .unwrap_or_else(|| answer.to_string());
        debug!(date = %text, "resolved invoice date from query answer");
        return Some(text);
    }

    for kv in doc.key_values() {
        let value = kv.value.trim();
        if value.is_empty() || !date_key_matches(&kv.key) {
            continue;
        }
        // Prefer the date-shaped substring; fall back to the raw value.
        let text = patterns::date_patterns()
            .iter()
            .find_map(|pat| pat.find(value))
            .map(|m| m.as_str().to_string())
            .unwrap_or_else(|| value.to_string());
        debug!(date = %text, "resolved invoice date from form field");
        return Some(text);
    }

    let lines = doc.lines();
    for pattern in patterns::date_patterns() {
        for line in &lines {
            if let Some(m) = pattern.find(&line.text) {
                debug!(date = %m.as_str(), "resolved invoice date from text line");
                return Some(m.as_str().to_string());
            }
        }
    }

    None
}

fn date_key_matches(key: &str) -> bool {
    let normalized = normalize_key(key);
    // "Due date" names the payment deadline, not the invoice date.
    if normalized.contains("due") && !normalized.contains("invoice") {
        return false;
    }
    DATE_KEYS
        .iter()
        .any(|kw| normalized.contains(&normalize_key(kw)))
}

/// Detect payment terms. Query answers win; among detected lines and
/// fields the longest text wins so a full sentence beats a fragment.
pub fn detect_payment_terms(doc: &Document) -> Option<String> {
    for query in doc.queries() {
        let answer = query.answer.trim();
        let label = query_label(query).to_lowercase();
        if !answer.is_empty() && PAYMENT_TERMS_KEYS.iter().any(|kw| label.contains(kw)) {
            return Some(answer.to_string());
        }
    }

    let mut candidates = Vec::new();

    for (order, kv) in doc.key_values().iter().enumerate() {
        let value = kv.value.trim();
        if value.is_empty() {
            continue;
        }
        let combined = format!("{} {}", kv.key, value).to_lowercase();
        if PAYMENT_TERMS_KEYS.iter().any(|kw| combined.contains(kw)) {
            candidates.push((value.to_string(), kv.geometry.page, order));
        }
    }

    for (order, line) in doc.lines().iter().enumerate() {
        let text = line.text.trim();
        let lowered = text.to_lowercase();
        if PAYMENT_TERMS_KEYS.iter().any(|kw| lowered.contains(kw)) {
            candidates.push((text.to_string(), line.geometry.page, order));
        }
    }

    candidates
        .into_iter()
        .min_by(|a, b| {
            b.0.len()
                .cmp(&a.0.len())
                .then(a.1.cmp(&b.1))
                .then(a.2.cmp(&b.2))
        })
        .map(|(text, _, _)| text)
}
