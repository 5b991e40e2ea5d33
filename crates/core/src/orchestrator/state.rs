use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Coarse negotiation stage. Transitions are one-directional except the
/// self-loop on `Negotiating`; `Closed` is terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConvoPhase {
    Greet,
    AskOffer,
    Negotiating,
    Closed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CounterpartIntent {
    ProvideOffer,
    Refusal,
    SmallTalk,
    AskQuestion,
    Negotiate,
    Greeting,
    Agree,
}

impl CounterpartIntent {
    pub fn key(&self) -> &'static str {
        match self {
            Self::ProvideOffer => "PROVIDE_OFFER",
            Self::Refusal => "REFUSAL",
            Self::SmallTalk => "SMALL_TALK",
            Self::AskQuestion => "ASK_QUESTION",
            Self::Negotiate => "NEGOTIATE",
            Self::Greeting => "GREETING",
            Self::Agree => "AGREE",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "PROVIDE_OFFER" => Some(Self::ProvideOffer),
            "REFUSAL" => Some(Self::Refusal),
            "SMALL_TALK" => Some(Self::SmallTalk),
            "ASK_QUESTION" => Some(Self::AskQuestion),
            "NEGOTIATE" => Some(Self::Negotiate),
            "GREETING" => Some(Self::Greeting),
            "AGREE" => Some(Self::Agree),
            _ => None,
        }
    }
}

/// Category of the reply the agent sends next, independent of wording.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseIntent {
    Greet,
    AskForOffer,
    AskClarify,
    Counter,
    Accept,
    Escalate,
    WalkAway,
    SmallTalk,
}

impl ResponseIntent {
    pub fn key(&self) -> &'static str {
        match self {
            Self::Greet => "GREET",
            Self::AskForOffer => "ASK_FOR_OFFER",
            Self::AskClarify => "ASK_CLARIFY",
            Self::Counter => "COUNTER",
            Self::Accept => "ACCEPT",
            Self::Escalate => "ESCALATE",
            Self::WalkAway => "WALK_AWAY",
            Self::SmallTalk => "SMALL_TALK",
        }
    }

    /// Terminal replies close the negotiation.
    pub fn closes_negotiation(&self) -> bool {
        matches!(self, Self::Accept | Self::Escalate | Self::WalkAway)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefusalKind {
    No,
    Later,
    AlreadyShared,
    Confused,
}

impl RefusalKind {
    pub fn key(&self) -> &'static str {
        match self {
            Self::No => "NO",
            Self::Later => "LATER",
            Self::AlreadyShared => "ALREADY_SHARED",
            Self::Confused => "CONFUSED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "NO" => Some(Self::No),
            "LATER" => Some(Self::Later),
            "ALREADY_SHARED" => Some(Self::AlreadyShared),
            "CONFUSED" => Some(Self::Confused),
            _ => None,
        }
    }
}

/// Write-once-true context markers. Never reset.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextFlags {
    pub mentioned_price: bool,
    pub mentioned_terms: bool,
    pub shared_constraints: bool,
}

/// Durable per-negotiation conversation state. Mutated exactly once per
/// processed turn (by the orchestrator reducer) and logically frozen once the
/// phase reaches `Closed`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConversationState {
    pub phase: ConvoPhase,
    pub refusal_count: u32,
    pub last_refusal: Option<RefusalKind>,
    pub asked_for_preferences: bool,
    pub small_talk_count: u32,
    pub turn_count: u32,
    pub last_intent: Option<ResponseIntent>,
    pub flags: ContextFlags,
    pub last_updated_at: DateTime<Utc>,
}

impl ConversationState {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            phase: ConvoPhase::Greet,
            refusal_count: 0,
            last_refusal: None,
            asked_for_preferences: false,
            small_talk_count: 0,
            turn_count: 0,
            last_intent: None,
            flags: ContextFlags::default(),
            last_updated_at: now,
        }
    }

    /// Load a persisted state blob. Any structurally invalid or missing blob
    /// degrades to a fresh initial state; callers decide whether to warn.
    pub fn from_blob(blob: Option<&str>, now: DateTime<Utc>) -> Result<Self, serde_json::Error> {
        match blob {
            Some(raw) => serde_json::from_str(raw),
            None => Ok(Self::new(now)),
        }
    }

    pub fn to_blob(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::{
        ContextFlags, ConversationState, ConvoPhase, CounterpartIntent, RefusalKind,
        ResponseIntent,
    };

    #[test]
    fn fresh_state_starts_in_greet_with_zero_counters() {
        let state = ConversationState::new(Utc::now());
        assert_eq!(state.phase, ConvoPhase::Greet);
        assert_eq!(state.refusal_count, 0);
        assert_eq!(state.small_talk_count, 0);
        assert_eq!(state.turn_count, 0);
        assert!(!state.asked_for_preferences);
        assert_eq!(state.flags, ContextFlags::default());
        assert!(state.last_intent.is_none());
    }

    #[test]
    fn state_round_trips_through_blob() {
        let mut state = ConversationState::new(Utc::now());
        state.phase = ConvoPhase::Negotiating;
        state.refusal_count = 2;
        state.last_refusal = Some(RefusalKind::Later);
        state.asked_for_preferences = true;
        state.small_talk_count = 1;
        state.turn_count = 7;
        state.last_intent = Some(ResponseIntent::Counter);
        state.flags.mentioned_price = true;
        state.flags.mentioned_terms = true;
        state.flags.shared_constraints = true;

        let blob = state.to_blob().expect("serialize");
        let restored =
            ConversationState::from_blob(Some(&blob), Utc::now()).expect("deserialize");
        assert_eq!(restored, state);

        // serialize -> deserialize -> serialize is stable
        assert_eq!(restored.to_blob().expect("re-serialize"), blob);
    }

    #[test]
    fn missing_blob_initializes_fresh_state() {
        let now = Utc::now();
        let state = ConversationState::from_blob(None, now).expect("fresh");
        assert_eq!(state, ConversationState::new(now));
    }

    #[test]
    fn corrupt_blob_surfaces_a_decode_error() {
        assert!(ConversationState::from_blob(Some("{\"phase\":7}"), Utc::now()).is_err());
        assert!(ConversationState::from_blob(Some("not json"), Utc::now()).is_err());
    }

    #[test]
    fn intent_labels_round_trip() {
        for intent in [
            CounterpartIntent::ProvideOffer,
            CounterpartIntent::Refusal,
            CounterpartIntent::SmallTalk,
            CounterpartIntent::AskQuestion,
            CounterpartIntent::Negotiate,
            CounterpartIntent::Greeting,
            CounterpartIntent::Agree,
        ] {
            assert_eq!(CounterpartIntent::parse(intent.key()), Some(intent));
        }
        assert_eq!(CounterpartIntent::parse("counter_offer"), None);

        for kind in [
            RefusalKind::No,
            RefusalKind::Later,
            RefusalKind::AlreadyShared,
            RefusalKind::Confused,
        ] {
            assert_eq!(RefusalKind::parse(kind.key()), Some(kind));
        }
    }

    #[test]
    fn terminal_response_intents_close_the_negotiation() {
        assert!(ResponseIntent::Accept.closes_negotiation());
        assert!(ResponseIntent::Escalate.closes_negotiation());
        assert!(ResponseIntent::WalkAway.closes_negotiation());
        assert!(!ResponseIntent::Counter.closes_negotiation());
        assert!(!ResponseIntent::Greet.closes_negotiation());
    }
}
