//! Utility-based decision engine.
//!
//! `decide` is a pure function of (config, offer, round). It never performs
//! I/O and never fails on type-valid input: a missing price becomes an
//! `AskClarify` decision, not an error.

use serde::{Deserialize, Serialize};

use crate::domain::negotiation::NegotiationConfig;
use crate::domain::offer::{nearest_standard_term, payment_term_days, Offer};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionAction {
    Accept,
    Counter,
    Escalate,
    WalkAway,
    AskClarify,
}

/// Immutable record of one round's decision, attached to the outbound
/// message for audit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub action: DecisionAction,
    pub utility_score: f64,
    pub counter_offer: Option<Offer>,
    pub reasons: Vec<String>,
    /// True when utility landed between the escalate and accept thresholds,
    /// i.e. the gap is small enough to frame the counter as near-agreement.
    /// Numeric counter policy is identical either way.
    #[serde(default)]
    pub close_to_acceptance: bool,
}

pub fn decide(config: &NegotiationConfig, offer: &Offer, round: u32) -> Decision {
    let Some(price) = offer.price else {
        return Decision {
            action: DecisionAction::AskClarify,
            utility_score: 0.0,
            counter_offer: None,
            reasons: vec!["offer is missing a unit price, cannot be scored".to_string()],
            close_to_acceptance: false,
        };
    };

    let price_u = price_utility(price, config.target_price, config.max_price);
    let term_days = offer.payment_terms.as_deref().and_then(payment_term_days);
    let terms_u = terms_utility(term_days, config.ideal_payment_days, config.max_payment_days);
    let delivery_u = delivery_utility(
        offer.delivery_date,
        config.preferred_delivery,
        config.required_delivery,
    );

    let utility = price_u * config.weights.price
        + terms_u * config.weights.terms
        + delivery_u * config.weights.delivery;

    let mut reasons = vec![
        format!(
            "price utility {price_u:.2} for {price:.2} against target {:.2} / max {:.2}",
            config.target_price, config.max_price
        ),
        match term_days {
            Some(days) => format!("terms utility {terms_u:.2} for net {days} days"),
            None => format!("terms utility {terms_u:.2} (terms absent or unparseable)"),
        },
        format!("delivery utility {delivery_u:.2}"),
        format!("weighted utility {utility:.3}"),
    ];

    if round >= config.max_rounds {
        reasons.push(format!(
            "round {round} reached the limit of {}, handing off to a human",
            config.max_rounds
        ));
        return Decision {
            action: DecisionAction::Escalate,
            utility_score: utility,
            counter_offer: None,
            reasons,
            close_to_acceptance: false,
        };
    }

    let thresholds = &config.thresholds;
    if utility >= thresholds.accept {
        reasons.push(format!("utility meets accept threshold {:.2}", thresholds.accept));
        return Decision {
            action: DecisionAction::Accept,
            utility_score: utility,
            counter_offer: None,
            reasons,
            close_to_acceptance: false,
        };
    }

    if utility < thresholds.walk_away {
        reasons.push(format!("utility below walk-away threshold {:.2}", thresholds.walk_away));
        return Decision {
            action: DecisionAction::WalkAway,
            utility_score: utility,
            counter_offer: None,
            reasons,
            close_to_acceptance: false,
        };
    }

    let close_to_acceptance = utility >= thresholds.escalate;
    let counter = counter_offer(config, price, round);
    reasons.push(if close_to_acceptance {
        format!("close to agreement, countering at {:.2}", counter.price.unwrap_or_default())
    } else {
        format!("gap is still wide, countering at {:.2}", counter.price.unwrap_or_default())
    });

    Decision {
        action: DecisionAction::Counter,
        utility_score: utility,
        counter_offer: Some(counter),
        reasons,
        close_to_acceptance,
    }
}

/// Linear from 1.0 at target down to 0.0 at max.
pub fn price_utility(price: f64, target: f64, max: f64) -> f64 {
    if price <= target {
        return 1.0;
    }
    if price >= max {
        return 0.0;
    }
    1.0 - (price - target) / (max - target)
}

const TERMS_FLOOR: f64 = 0.3;
const NEUTRAL_UTILITY: f64 = 0.5;

/// Linear from 1.0 at ideal days down to a 0.3 floor at max days, so even
/// unattractive terms still contribute signal. Unparseable terms are neutral.
pub fn terms_utility(days: Option<u32>, ideal: u32, max: u32) -> f64 {
    let Some(days) = days else {
        return NEUTRAL_UTILITY;
    };
    if days <= ideal {
        return 1.0;
    }
    if days >= max {
        return TERMS_FLOOR;
    }
    let span = f64::from(max - ideal);
    1.0 - (1.0 - TERMS_FLOOR) * f64::from(days - ideal) / span
}

/// 1.0 on or before the preferred date, 0.8 on or before the required date,
/// then a 0.1-per-day penalty floored at 0.1. Absent dates are neutral.
pub fn delivery_utility(
    date: Option<chrono::NaiveDate>,
    preferred: Option<chrono::NaiveDate>,
    required: Option<chrono::NaiveDate>,
) -> f64 {
    let Some(date) = date else {
        return NEUTRAL_UTILITY;
    };
    let preferred = preferred.or(required);
    let required = required.or(preferred);
    let (Some(preferred), Some(required)) = (preferred, required) else {
        return NEUTRAL_UTILITY;
    };

    if date <= preferred {
        return 1.0;
    }
    if date <= required {
        return 0.8;
    }
    let days_late = (date - required).num_days() as f64;
    (0.8 - 0.1 * days_late).max(0.1)
}

/// Counter price concedes a bounded share of the target-to-max band as rounds
/// progress, and never counters above what the counterpart is already asking.
fn counter_offer(config: &NegotiationConfig, offer_price: f64, round: u32) -> Offer {
    let progress = (f64::from(round) / f64::from(config.max_rounds)).min(0.8);
    let raw = config.target_price + (config.max_price - config.target_price) * progress * 0.6;
    let capped = raw.min(offer_price * 0.95);

    Offer {
        price: Some(round_to_cents(capped)),
        payment_terms: Some(nearest_standard_term(config.ideal_payment_days)),
        delivery_date: config.preferred_delivery,
    }
}

fn round_to_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{decide, delivery_utility, price_utility, terms_utility, DecisionAction};
    use crate::domain::negotiation::{AttributeWeights, DecisionThresholds, NegotiationConfig};
    use crate::domain::offer::Offer;

    fn config(target: f64, max: f64) -> NegotiationConfig {
        NegotiationConfig {
            target_price: target,
            max_price: max,
            ideal_payment_days: 30,
            max_payment_days: 90,
            preferred_delivery: None,
            required_delivery: None,
            weights: AttributeWeights::default(),
            thresholds: DecisionThresholds::default(),
            max_rounds: 6,
        }
    }

    fn offer(price: f64, terms: &str) -> Offer {
        Offer {
            price: Some(price),
            payment_terms: Some(terms.to_string()),
            delivery_date: None,
        }
    }

    #[test]
    fn price_utility_is_linear_and_anchored() {
        assert_eq!(price_utility(90.0, 90.0, 120.0), 1.0);
        assert_eq!(price_utility(120.0, 90.0, 120.0), 0.0);
        assert_eq!(price_utility(50.0, 90.0, 120.0), 1.0);
        assert_eq!(price_utility(500.0, 90.0, 120.0), 0.0);

        // Strictly decreasing across the interpolated band.
        let mut previous = 1.0;
        for step in 1..30 {
            let price = 90.0 + f64::from(step);
            let utility = price_utility(price, 90.0, 120.0);
            assert!(utility < previous, "utility must strictly decrease at price {price}");
            previous = utility;
        }
        let mid = price_utility(105.0, 90.0, 120.0);
        assert!((mid - 0.5).abs() < 1e-9);
    }

    #[test]
    fn terms_utility_floors_at_point_three() {
        assert_eq!(terms_utility(Some(30), 30, 90), 1.0);
        assert_eq!(terms_utility(Some(15), 30, 90), 1.0);
        assert_eq!(terms_utility(Some(90), 30, 90), 0.3);
        assert_eq!(terms_utility(Some(365), 30, 90), 0.3);
        assert_eq!(terms_utility(None, 30, 90), 0.5);

        let mid = terms_utility(Some(60), 30, 90);
        assert!((mid - 0.65).abs() < 1e-9);
    }

    #[test]
    fn delivery_utility_penalizes_lateness() {
        let preferred = NaiveDate::from_ymd_opt(2026, 10, 1);
        let required = NaiveDate::from_ymd_opt(2026, 10, 10);
        let date = |d: u32| NaiveDate::from_ymd_opt(2026, 10, d);

        assert_eq!(delivery_utility(date(1), preferred, required), 1.0);
        assert_eq!(delivery_utility(date(5), preferred, required), 0.8);
        let two_late = delivery_utility(date(12), preferred, required);
        assert!((two_late - 0.6).abs() < 1e-9);
        assert_eq!(delivery_utility(date(31), preferred, required), 0.1);
        assert_eq!(delivery_utility(None, preferred, required), 0.5);
        assert_eq!(delivery_utility(date(5), None, None), 0.5);
    }

    #[test]
    fn missing_price_asks_for_clarification() {
        let decision = decide(
            &config(90.0, 120.0),
            &Offer { price: None, payment_terms: Some("Net 30".to_string()), delivery_date: None },
            1,
        );
        assert_eq!(decision.action, DecisionAction::AskClarify);
        assert_eq!(decision.utility_score, 0.0);
        assert!(decision.counter_offer.is_none());
        assert!(decision.reasons[0].contains("missing a unit price"));
    }

    #[test]
    fn decision_is_deterministic_and_threshold_driven() {
        let config = config(90.0, 120.0);
        let offer = offer(100.0, "Net 30");

        let first = decide(&config, &offer, 1);
        let second = decide(&config, &offer, 1);
        assert_eq!(first, second);

        // price 0.6667 * 0.6 + terms 1.0 * 0.25 + delivery 0.5 * 0.15 = 0.725
        assert!((first.utility_score - 0.725).abs() < 1e-3);
        assert_eq!(
            first.action,
            if first.utility_score >= config.thresholds.accept {
                DecisionAction::Accept
            } else {
                DecisionAction::Counter
            }
        );
        assert!(first.close_to_acceptance);
    }

    #[test]
    fn target_price_offer_is_accepted() {
        let decision = decide(&config(90.0, 120.0), &offer(88.0, "Net 30"), 1);
        assert_eq!(decision.action, DecisionAction::Accept);
        assert!(decision.utility_score >= 0.8);
    }

    #[test]
    fn hopeless_offer_walks_away() {
        let mut cfg = config(90.0, 120.0);
        cfg.weights = AttributeWeights { price: 0.9, terms: 0.05, delivery: 0.05 };
        let decision = decide(&cfg, &offer(200.0, "Net 90"), 1);
        assert_eq!(decision.action, DecisionAction::WalkAway);
    }

    #[test]
    fn round_exhaustion_always_escalates() {
        let mut cfg = config(90.0, 120.0);
        cfg.max_rounds = 3;
        for price in [80.0, 100.0, 500.0] {
            let decision = decide(&cfg, &offer(price, "Net 30"), 3);
            assert_eq!(decision.action, DecisionAction::Escalate, "price {price}");
        }
    }

    #[test]
    fn counter_price_stays_within_band() {
        let cfg = config(120.0, 160.0);
        let vendor_price = 150.0;
        for round in 1..6 {
            let decision = decide(&cfg, &offer(vendor_price, "Net 60"), round);
            assert_eq!(decision.action, DecisionAction::Counter, "round {round}");
            let counter = decision.counter_offer.expect("counter offer").price.expect("price");
            assert!(counter >= cfg.target_price, "round {round}: {counter}");
            assert!(counter <= (vendor_price * 0.95).min(cfg.max_price), "round {round}: {counter}");
        }
    }

    #[test]
    fn counter_never_exceeds_vendor_ask() {
        let mut cfg = config(90.0, 300.0);
        cfg.max_rounds = 2;
        // Late round would concede far above the vendor's own ask without the cap.
        let decision = decide(&cfg, &offer(100.0, "Net 90"), 1);
        let counter = decision.counter_offer.expect("counter").price.expect("price");
        assert!(counter <= 95.0);
    }

    #[test]
    fn counter_terms_bucket_ideal_days() {
        let mut cfg = config(120.0, 160.0);
        cfg.ideal_payment_days = 40;
        let decision = decide(&cfg, &offer(150.0, "Net 60"), 1);
        let counter = decision.counter_offer.expect("counter");
        assert_eq!(counter.payment_terms.as_deref(), Some("Net 45"));
    }

    #[test]
    fn counter_price_is_rounded_to_cents() {
        let cfg = config(100.0, 133.33);
        let decision = decide(&cfg, &offer(140.0, "Net 60"), 1);
        let counter = decision.counter_offer.expect("counter").price.expect("price");
        assert_eq!((counter * 100.0).round() / 100.0, counter);
    }

    #[test]
    fn decision_round_trips_through_json() {
        let decision = decide(&config(90.0, 120.0), &offer(100.0, "Net 30"), 1);
        let json = serde_json::to_string(&decision).expect("serialize");
        let back: super::Decision = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, decision);
    }
}
