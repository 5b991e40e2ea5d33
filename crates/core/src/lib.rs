pub mod classifier;
pub mod config;
pub mod domain;
pub mod engine;
pub mod errors;
pub mod orchestrator;
pub mod templates;

pub use domain::message::{MessageRole, StoredMessage, HISTORY_WINDOW};
pub use domain::negotiation::{
    AttributeWeights, DecisionThresholds, Negotiation, NegotiationConfig, NegotiationId,
    NegotiationStatus,
};
pub use domain::offer::Offer;
pub use engine::{decide, Decision, DecisionAction};
pub use errors::{ApplicationError, DomainError, ValidationError};
pub use orchestrator::state::{
    ContextFlags, ConversationState, ConvoPhase, CounterpartIntent, RefusalKind, ResponseIntent,
};
pub use orchestrator::{advance, TurnEvent, TurnOutcome};
pub use templates::{fallback_reply, render_reply, select_template, RenderedReply};
