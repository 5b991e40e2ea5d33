use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use parley_core::domain::message::StoredMessage;
use parley_core::domain::negotiation::{Negotiation, NegotiationId, NegotiationStatus};
use parley_core::domain::offer::Offer;
use parley_core::orchestrator::state::ConversationState;

pub mod memory;
pub mod message;
pub mod negotiation;

pub use memory::{InMemoryMessageRepository, InMemoryNegotiationRepository, InMemoryStore};
pub use message::SqlMessageRepository;
pub use negotiation::SqlNegotiationRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("negotiation `{0}` not found")]
    NotFound(String),
}

/// Everything one processed turn writes, committed atomically: either the
/// deal row update and every appended message land together, or none do.
#[derive(Clone, Debug)]
pub struct TurnCommit {
    pub negotiation_id: NegotiationId,
    pub round: u32,
    pub status: NegotiationStatus,
    pub state: ConversationState,
    pub last_offer: Option<Offer>,
    pub updated_at: DateTime<Utc>,
    pub messages: Vec<StoredMessage>,
}

#[async_trait]
pub trait NegotiationRepository: Send + Sync {
    async fn find_by_id(
        &self,
        id: &NegotiationId,
    ) -> Result<Option<Negotiation>, RepositoryError>;

    async fn create(&self, negotiation: Negotiation) -> Result<(), RepositoryError>;

    async fn commit_turn(&self, commit: TurnCommit) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait MessageRepository: Send + Sync {
    async fn append(
        &self,
        id: &NegotiationId,
        message: StoredMessage,
    ) -> Result<(), RepositoryError>;

    /// The last `limit` messages, oldest first.
    async fn recent(
        &self,
        id: &NegotiationId,
        limit: usize,
    ) -> Result<Vec<StoredMessage>, RepositoryError>;
}
