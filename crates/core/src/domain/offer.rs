use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A structured, possibly partial proposal extracted from free text.
///
/// Every field is independently optional because extraction is lossy. Missing
/// fields are only ever filled by merging with the counterpart's last known
/// offer, never invented.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Offer {
    pub price: Option<f64>,
    pub payment_terms: Option<String>,
    pub delivery_date: Option<NaiveDate>,
}

impl Offer {
    pub fn is_empty(&self) -> bool {
        self.price.is_none() && self.payment_terms.is_none() && self.delivery_date.is_none()
    }

    /// An offer can be scored only when both price and payment terms are known.
    pub fn is_decidable(&self) -> bool {
        self.price.is_some() && self.payment_terms.is_some()
    }

    /// Fill fields missing from this offer with the last known values from the
    /// same counterpart.
    pub fn merged_with(&self, last_known: &Offer) -> Offer {
        Offer {
            price: self.price.or(last_known.price),
            payment_terms: self.payment_terms.clone().or_else(|| last_known.payment_terms.clone()),
            delivery_date: self.delivery_date.or(last_known.delivery_date),
        }
    }
}

/// Parse a payment-terms phrase into net days. `None` means unparseable, which
/// scores the neutral terms utility downstream.
pub fn payment_term_days(terms: &str) -> Option<u32> {
    let normalized = terms.to_ascii_lowercase();
    let trimmed = normalized.trim();

    if trimmed == "cod" || trimmed.contains("cash on delivery") || trimmed.contains("on receipt") {
        return Some(0);
    }

    if let Some(rest) = trimmed.strip_prefix("net") {
        return rest.trim().parse::<u32>().ok();
    }

    // "30 days", "within 45 days"
    let mut previous: Option<u32> = None;
    for token in trimmed.split_whitespace() {
        if token.starts_with("day") {
            if let Some(days) = previous {
                return Some(days);
            }
        }
        previous = token.parse::<u32>().ok();
    }
    None
}

const STANDARD_TERM_DAYS: &[u32] = &[15, 30, 45, 60, 90];

/// Bucket a day count to the nearest standard payment term.
pub fn nearest_standard_term(days: u32) -> String {
    let nearest = STANDARD_TERM_DAYS
        .iter()
        .copied()
        .min_by_key(|candidate| candidate.abs_diff(days))
        .unwrap_or(30);
    format!("Net {nearest}")
}
