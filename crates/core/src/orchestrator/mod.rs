//! Conversation orchestrator.
//!
//! A single pure reducer `advance(state, event) -> outcome` owns every
//! mutation of [`ConversationState`]. Refusal and small-talk sub-flows
//! preempt the per-phase dispatch; a final update step applies the counters,
//! flags, and terminal-phase rules that hold for every turn.

pub mod preference;
pub mod state;

use chrono::{DateTime, Utc};

use crate::engine::{Decision, DecisionAction};
use self::state::{
    ConversationState, ConvoPhase, CounterpartIntent, RefusalKind, ResponseIntent,
};

/// Everything the reducer needs to know about one inbound counterpart turn.
#[derive(Clone, Debug, PartialEq)]
pub struct TurnEvent {
    pub intent: CounterpartIntent,
    pub refusal: Option<RefusalKind>,
    pub decision: Option<Decision>,
    pub now: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TurnOutcome {
    pub response_intent: ResponseIntent,
    pub state: ConversationState,
    /// Set when a message arrived while the phase was already `Closed`.
    /// Callers log this as an invariant warning; it is never a crash.
    pub closed_phase_turn: bool,
}

/// Consecutive refusals before the negotiation is escalated and closed.
pub const REFUSAL_ESCALATION_LIMIT: u32 = 5;
/// Consecutive refusals before the agent asks for preferences (once).
pub const REFUSAL_PREFERENCE_ASK: u32 = 3;
/// Consecutive small-talk turns before the agent redirects.
pub const SMALL_TALK_REDIRECT_LIMIT: u32 = 2;

pub fn advance(state: &ConversationState, event: &TurnEvent) -> TurnOutcome {
    let mut next = state.clone();
    let closed_phase_turn = state.phase == ConvoPhase::Closed;

    let response_intent = if closed_phase_turn {
        ResponseIntent::Escalate
    } else {
        match event.intent {
            CounterpartIntent::Refusal => {
                handle_refusal(&mut next, event.refusal.unwrap_or(RefusalKind::No))
            }
            CounterpartIntent::SmallTalk => handle_small_talk(&mut next),
            _ => dispatch_phase(&mut next, event.intent, event.decision.as_ref()),
        }
    };

    finalize_turn(&mut next, event, response_intent);
    TurnOutcome { response_intent, state: next, closed_phase_turn }
}

fn handle_refusal(next: &mut ConversationState, kind: RefusalKind) -> ResponseIntent {
    next.refusal_count += 1;
    next.last_refusal = Some(kind);

    if next.refusal_count >= REFUSAL_ESCALATION_LIMIT {
        return ResponseIntent::Escalate;
    }
    if next.refusal_count >= REFUSAL_PREFERENCE_ASK && !next.asked_for_preferences {
        next.asked_for_preferences = true;
        return ResponseIntent::AskClarify;
    }
    match kind {
        RefusalKind::Later => ResponseIntent::AskForOffer,
        RefusalKind::Confused | RefusalKind::AlreadyShared | RefusalKind::No => {
            ResponseIntent::AskClarify
        }
    }
}

fn handle_small_talk(next: &mut ConversationState) -> ResponseIntent {
    next.small_talk_count += 1;
    if next.small_talk_count >= SMALL_TALK_REDIRECT_LIMIT {
        // Redirect without resetting the counter; it only resets once a
        // subsequent turn is small talk on neither side.
        if next.phase == ConvoPhase::Greet {
            ResponseIntent::AskForOffer
        } else {
            ResponseIntent::AskClarify
        }
    } else {
        ResponseIntent::SmallTalk
    }
}

fn dispatch_phase(
    next: &mut ConversationState,
    intent: CounterpartIntent,
    decision: Option<&Decision>,
) -> ResponseIntent {
    match next.phase {
        ConvoPhase::Greet => match intent {
            CounterpartIntent::Greeting => {
                next.phase = ConvoPhase::AskOffer;
                ResponseIntent::Greet
            }
            CounterpartIntent::ProvideOffer => {
                next.phase = ConvoPhase::Negotiating;
                offer_reply(decision)
            }
            CounterpartIntent::AskQuestion => ResponseIntent::AskClarify,
            CounterpartIntent::Refusal => ResponseIntent::AskForOffer,
            _ => {
                next.phase = ConvoPhase::AskOffer;
                ResponseIntent::Greet
            }
        },
        ConvoPhase::AskOffer => match intent {
            CounterpartIntent::ProvideOffer => {
                next.phase = ConvoPhase::Negotiating;
                offer_reply(decision)
            }
            CounterpartIntent::Refusal => ResponseIntent::AskForOffer,
            CounterpartIntent::AskQuestion | CounterpartIntent::Negotiate => {
                ResponseIntent::AskClarify
            }
            _ => ResponseIntent::AskForOffer,
        },
        ConvoPhase::Negotiating => match intent {
            CounterpartIntent::ProvideOffer => offer_reply(decision),
            CounterpartIntent::Agree => ResponseIntent::Accept,
            CounterpartIntent::Refusal
            | CounterpartIntent::AskQuestion
            | CounterpartIntent::Negotiate => ResponseIntent::AskClarify,
            _ => ResponseIntent::Counter,
        },
        ConvoPhase::Closed => ResponseIntent::Escalate,
    }
}

/// The decision engine's action overrides the default counter framing when an
/// offer was on the table.
fn offer_reply(decision: Option<&Decision>) -> ResponseIntent {
    match decision.map(|decision| decision.action) {
        Some(DecisionAction::Accept) => ResponseIntent::Accept,
        Some(DecisionAction::WalkAway) => ResponseIntent::WalkAway,
        Some(DecisionAction::Escalate) => ResponseIntent::Escalate,
        Some(DecisionAction::AskClarify) => ResponseIntent::AskClarify,
        Some(DecisionAction::Counter) | None => ResponseIntent::Counter,
    }
}

fn finalize_turn(next: &mut ConversationState, event: &TurnEvent, reply: ResponseIntent) {
    next.turn_count += 1;
    next.last_intent = Some(reply);

    if reply.closes_negotiation() {
        next.phase = ConvoPhase::Closed;
    }
    if event.intent == CounterpartIntent::ProvideOffer {
        next.flags.mentioned_price = true;
        next.flags.mentioned_terms = true;
    }
    // Substantive engagement after the preference ask means the counterpart
    // revealed what they can move on.
    if next.asked_for_preferences
        && matches!(event.intent, CounterpartIntent::ProvideOffer | CounterpartIntent::Negotiate)
    {
        next.flags.shared_constraints = true;
    }
    let either_small_talk =
        event.intent == CounterpartIntent::SmallTalk || reply == ResponseIntent::SmallTalk;
    if !either_small_talk {
        next.small_talk_count = 0;
    }
    next.last_updated_at = event.now;
}
