use chrono::NaiveDate;

use parley_core::classifier::{extract_delivery_date, extract_payment_terms, extract_price};
use parley_core::domain::offer::Offer;

/// Pulls a structured (and usually partial) offer out of free text. Purely
/// deterministic; the turn processor merges the result with the counterpart's
/// last known offer before scoring.
#[derive(Clone, Debug, Default)]
pub struct OfferExtractor;

impl OfferExtractor {
    pub fn new() -> Self {
        Self
    }

    pub fn extract(&self, text: &str, today: NaiveDate) -> Offer {
        Offer {
            price: extract_price(text),
            payment_terms: extract_payment_terms(text),
            delivery_date: extract_delivery_date(text, today),
        }
    }
}
