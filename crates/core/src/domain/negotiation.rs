use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::offer::Offer;
use crate::errors::DomainError;
use crate::orchestrator::state::{ConversationState, ResponseIntent};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NegotiationId(pub String);

impl NegotiationId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NegotiationStatus {
    Active,
    Accepted,
    WalkedAway,
    Escalated,
}

impl NegotiationStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Active)
    }

    /// Status implied by the reply the agent is about to send.
    pub fn after_reply(self, intent: ResponseIntent) -> Self {
        match intent {
            ResponseIntent::Accept => Self::Accepted,
            ResponseIntent::WalkAway => Self::WalkedAway,
            ResponseIntent::Escalate => Self::Escalated,
            _ => self,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Accepted => "accepted",
            Self::WalkedAway => "walked_away",
            Self::Escalated => "escalated",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "active" => Some(Self::Active),
            "accepted" => Some(Self::Accepted),
            "walked_away" => Some(Self::WalkedAway),
            "escalated" => Some(Self::Escalated),
            _ => None,
        }
    }
}

/// Relative importance of each offer attribute. Must sum to 1.0.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AttributeWeights {
    pub price: f64,
    pub terms: f64,
    pub delivery: f64,
}

impl Default for AttributeWeights {
    fn default() -> Self {
        Self { price: 0.6, terms: 0.25, delivery: 0.15 }
    }
}

/// Utility cut points driving the decision ladder.
/// Invariant: `accept > escalate > walk_away`, each in [0, 1].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DecisionThresholds {
    pub accept: f64,
    pub escalate: f64,
    pub walk_away: f64,
}

impl Default for DecisionThresholds {
    fn default() -> Self {
        Self { accept: 0.8, escalate: 0.45, walk_away: 0.25 }
    }
}

/// Per-negotiation targets, immutable for the negotiation's lifetime.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NegotiationConfig {
    pub target_price: f64,
    pub max_price: f64,
    pub ideal_payment_days: u32,
    pub max_payment_days: u32,
    pub preferred_delivery: Option<NaiveDate>,
    pub required_delivery: Option<NaiveDate>,
    pub weights: AttributeWeights,
    pub thresholds: DecisionThresholds,
    pub max_rounds: u32,
}

const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

impl NegotiationConfig {
    pub fn validate(&self) -> Result<(), DomainError> {
        if !(self.target_price > 0.0) {
            return Err(DomainError::InvalidNegotiationConfig(
                "target_price must be positive".to_string(),
            ));
        }
        if self.max_price <= self.target_price {
            return Err(DomainError::InvalidNegotiationConfig(
                "max_price must exceed target_price".to_string(),
            ));
        }
        if self.max_payment_days < self.ideal_payment_days {
            return Err(DomainError::InvalidNegotiationConfig(
                "max_payment_days must be at least ideal_payment_days".to_string(),
            ));
        }
        let weight_sum = self.weights.price + self.weights.terms + self.weights.delivery;
        if (weight_sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(DomainError::InvalidNegotiationConfig(format!(
                "attribute weights must sum to 1.0, got {weight_sum}"
            )));
        }
        let t = &self.thresholds;
        let ordered = t.accept > t.escalate && t.escalate > t.walk_away;
        let bounded = t.walk_away >= 0.0 && t.accept <= 1.0;
        if !ordered || !bounded {
            return Err(DomainError::InvalidNegotiationConfig(
                "thresholds must satisfy 0 <= walk_away < escalate < accept <= 1".to_string(),
            ));
        }
        if self.max_rounds == 0 {
            return Err(DomainError::InvalidNegotiationConfig(
                "max_rounds must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// One ongoing negotiation with a vendor, as loaded from the deal store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Negotiation {
    pub id: NegotiationId,
    pub vendor_name: String,
    pub owner_user_id: String,
    pub status: NegotiationStatus,
    pub round: u32,
    pub config: NegotiationConfig,
    pub state: ConversationState,
    pub last_offer: Option<Offer>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
