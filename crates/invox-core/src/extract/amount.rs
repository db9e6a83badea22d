//! Currency-aware numeric parsing.
//!
//! Handles both `1,234.56` and `1.234,56` separator styles. The separator
//! that appears last decides: followed by exactly two digits it is the
//! decimal separator, otherwise every separator is grouping.

use rust_decimal::Decimal;
use std::str::FromStr;

use super::patterns::NUMBER_TOKEN;
use crate::models::invoice::{Amount, Currency};

/// Parse a monetary amount from raw text.
///
/// The currency marker may appear in prefix or suffix position. Returns
/// `None` when no digit sequence is found; never panics or errors.
pub fn parse_amount(text: &str) -> Option<Amount> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    let currency = Currency::detect(trimmed);
    let value = extract_value(trimmed)?;
    Some(Amount::new(value, currency))
}

/// Parse a plain number such as a quantity cell.
///
/// Tries a direct decimal parse first so `"1.5"` stays `1.5`, then falls
/// back to the grouped-token rules.
pub fn parse_number(text: &str) -> Option<Decimal> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(value) = Decimal::from_str(trimmed) {
        return Some(value);
    }
    extract_value(trimmed)
}

/// Pull the value out of arbitrary text. Labels and stray numbers may
/// precede the amount ("Tax (10%): $8.50"), so the last numeric token wins;
/// amounts sit rightmost on invoice lines.
fn extract_value(text: &str) -> Option<Decimal> {
    let token = NUMBER_TOKEN.find_iter(text).last()?;
    let normalized = normalize_token(token.as_str());
    Decimal::from_str(&normalized).ok()
}

/// Collapse separators in a numeric token to a single `.` decimal point,
/// or none at all when the token carries only grouping.
fn normalize_token(token: &str) -> String {
    let last_sep = token.rfind([',', '.']);
    let Some(pos) = last_sep else {
        return token.to_string();
    };

    let trailing_digits = token.len() - pos - 1;
    let mut out = String::with_capacity(token.len());
    for (i, c) in token.char_indices() {
        match c {
            ',' | '.' if i == pos && trailing_digits == 2 => out.push('.'),
            ',' | '.' => {}
            _ => out.push(c),
        }
    }
    out
}
