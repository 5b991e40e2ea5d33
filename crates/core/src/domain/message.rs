use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::offer::Offer;
use crate::engine::Decision;

/// How many trailing messages are fed to classifiers and LLM prompts.
pub const HISTORY_WINDOW: usize = 10;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    Agent,
    Counterpart,
    System,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Agent => "agent",
            Self::Counterpart => "counterpart",
            Self::System => "system",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "agent" => Some(Self::Agent),
            "counterpart" => Some(Self::Counterpart),
            "system" => Some(Self::System),
            _ => None,
        }
    }
}

/// Append-only log entry. Agent messages carry the decision that produced
/// them so every outbound number can be explained after the fact.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoredMessage {
    pub role: MessageRole,
    pub content: String,
    pub extracted_offer: Option<Offer>,
    pub decision: Option<Decision>,
    pub round: u32,
    pub created_at: DateTime<Utc>,
}

impl StoredMessage {
    pub fn counterpart(content: impl Into<String>, round: u32, at: DateTime<Utc>) -> Self {
        Self {
            role: MessageRole::Counterpart,
            content: content.into(),
            extracted_offer: None,
            decision: None,
            round,
            created_at: at,
        }
    }

    pub fn agent(content: impl Into<String>, round: u32, at: DateTime<Utc>) -> Self {
        Self {
            role: MessageRole::Agent,
            content: content.into(),
            extracted_offer: None,
            decision: None,
            round,
            created_at: at,
        }
    }

    pub fn with_offer(mut self, offer: Offer) -> Self {
        self.extracted_offer = Some(offer);
        self
    }

    pub fn with_decision(mut self, decision: Decision) -> Self {
        self.decision = Some(decision);
        self
    }
}
