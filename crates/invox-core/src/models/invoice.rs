//! The normalized invoice record and its building blocks.
//!
//! Serialized field names match the artifact contract exactly:
//! `InvoiceNumber`, `InvoiceDate`, `LineItems`, `InvoiceTotal`,
//! `PaymentTerms`, with amounts as `{value, currency, formatted}`.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A recognized currency. Detection accepts both the glyph and the ISO code;
/// display always uses the glyph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Usd,
    Eur,
    Gbp,
    Jpy,
    Inr,
}

impl Currency {
    pub const ALL: [Currency; 5] = [
        Currency::Usd,
        Currency::Eur,
        Currency::Gbp,
        Currency::Jpy,
        Currency::Inr,
    ];

    /// Currency glyph used in canonical formatting.
    pub fn symbol(&self) -> &'static str {
        match self {
            Currency::Usd => "$",
            Currency::Eur => "€",
            Currency::Gbp => "£",
            Currency::Jpy => "¥",
            Currency::Inr => "₹",
        }
    }

    /// ISO 4217 code.
    pub fn iso_code(&self) -> &'static str {
        match self {
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
            Currency::Gbp => "GBP",
            Currency::Jpy => "JPY",
            Currency::Inr => "INR",
        }
    }

    /// Find a currency marker anywhere in the text, prefix or suffix.
    /// Glyphs win over ISO codes so `"EUR 5 €"` stays unambiguous.
    pub fn detect(text: &str) -> Option<Currency> {
        for currency in Currency::ALL {
            if text.contains(currency.symbol()) {
                return Some(currency);
            }
        }
        let upper = text.to_uppercase();
        Currency::ALL
            .into_iter()
            .find(|c| upper.contains(c.iso_code()))
    }

    /// Parse from a serialized symbol or ISO code.
    pub fn from_marker(marker: &str) -> Option<Currency> {
        let marker = marker.trim();
        if marker.is_empty() {
            return None;
        }
        Currency::ALL
            .into_iter()
            .find(|c| c.symbol() == marker || c.iso_code().eq_ignore_ascii_case(marker))
    }
}

/// A parsed monetary (or plain numeric) amount.
///
/// `formatted` is always derivable from `(value, currency)`: the glyph,
/// a space, and the value with two decimals; the bare two-decimal value
/// when no currency was recognized. `value` is never NaN (not
/// representable) and never negative zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Amount {
    pub value: Decimal,
    #[serde(
        serialize_with = "currency_symbol::serialize",
        deserialize_with = "currency_symbol::deserialize"
    )]
    pub currency: Option<Currency>,
    pub formatted: String,
}

impl Amount {
    /// Build an amount with its canonical formatted string.
    pub fn new(value: Decimal, currency: Option<Currency>) -> Self {
        let value = if value.is_zero() { Decimal::ZERO } else { value };
        let formatted = match currency {
            Some(c) => format!("{} {:.2}", c.symbol(), value),
            None => format!("{:.2}", value),
        };
        Self {
            value,
            currency,
            formatted,
        }
    }
}

/// Serialize the currency as its glyph (empty string when absent), matching
/// the artifact contract's plain-string `currency` field.
mod currency_symbol {
    use serde::{Deserialize, Deserializer, Serializer};

    use super::Currency;

    pub fn serialize<S>(currency: &Option<Currency>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(currency.map(|c| c.symbol()).unwrap_or(""))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Currency>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let marker = String::deserialize(deserializer)?;
        Ok(Currency::from_marker(&marker))
    }
}

/// One reconstructed invoice line item.
///
/// An item is only emitted with an amount; quantity defaults to 1 when the
/// source table had no usable quantity column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LineItem {
    pub quantity: Decimal,
    pub description: String,
    pub unit_price: Option<Amount>,
    pub amount: Amount,
}

/// The normalized, terminal output of the extraction engine.
///
/// `invoice_date` keeps the detected literal text; source formats vary and
/// round-trip fidelity beats locale reformatting. No arithmetic
/// cross-validation is performed between `line_items` and `invoice_total`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InvoiceRecord {
    pub invoice_number: Option<String>,
    pub invoice_date: Option<String>,
    pub line_items: Vec<LineItem>,
    pub invoice_total: Option<Amount>,
    pub payment_terms: Option<String>,
}

impl InvoiceRecord {
    /// True when nothing at all was extracted.
    pub fn is_empty(&self) -> bool {
        self.invoice_number.is_none()
            && self.invoice_date.is_none()
            && self.line_items.is_empty()
            && self.invoice_total.is_none()
            && self.payment_terms.is_none()
    }
}
