use crate::domain::offer::{payment_term_days, Offer};

/// Which lever the counterpart keeps moving between consecutive offers.
/// Feeds reply-variable framing only; never affects phase transitions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PreferenceSignal {
    Price,
    Terms,
    Neither,
}

const DOMINANCE_RATIO: f64 = 1.5;

/// Infer the counterpart's negotiation lever from their offer history,
/// oldest first. Needs at least two offers to say anything.
pub fn infer_preference(offers: &[Offer]) -> PreferenceSignal {
    if offers.len() < 2 {
        return PreferenceSignal::Neither;
    }

    let mut price_changes = 0u32;
    let mut terms_changes = 0u32;

    for pair in offers.windows(2) {
        let [previous, current] = pair else { continue };
        if let (Some(a), Some(b)) = (previous.price, current.price) {
            if (a - b).abs() > f64::EPSILON {
                price_changes += 1;
            }
        }
        let previous_days = previous.payment_terms.as_deref().and_then(payment_term_days);
        let current_days = current.payment_terms.as_deref().and_then(payment_term_days);
        if let (Some(a), Some(b)) = (previous_days, current_days) {
            if a != b {
                terms_changes += 1;
            }
        }
    }

    let price = f64::from(price_changes);
    let terms = f64::from(terms_changes);
    if price > terms * DOMINANCE_RATIO {
        PreferenceSignal::Price
    } else if terms > price * DOMINANCE_RATIO {
        PreferenceSignal::Terms
    } else {
        PreferenceSignal::Neither
    }
}
