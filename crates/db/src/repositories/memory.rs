use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use parley_core::domain::message::StoredMessage;
use parley_core::domain::negotiation::{Negotiation, NegotiationId};

use super::{MessageRepository, NegotiationRepository, RepositoryError, TurnCommit};

/// Shared backing store so the in-memory negotiation and message
/// repositories observe the same atomic turn commits, mirroring the SQL
/// transaction behavior.
#[derive(Default)]
pub struct InMemoryStore {
    negotiations: RwLock<HashMap<String, Negotiation>>,
    messages: RwLock<HashMap<String, Vec<StoredMessage>>>,
}

impl InMemoryStore {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

pub struct InMemoryNegotiationRepository {
    store: Arc<InMemoryStore>,
}

impl InMemoryNegotiationRepository {
    pub fn new(store: Arc<InMemoryStore>) -> Self {
        Self { store }
    }
}

#[async_trait::async_trait]
impl NegotiationRepository for InMemoryNegotiationRepository {
    async fn find_by_id(
        &self,
        id: &NegotiationId,
    ) -> Result<Option<Negotiation>, RepositoryError> {
        let negotiations = self.store.negotiations.read().await;
        Ok(negotiations.get(&id.0).cloned())
    }

    async fn create(&self, negotiation: Negotiation) -> Result<(), RepositoryError> {
        let mut negotiations = self.store.negotiations.write().await;
        negotiations.insert(negotiation.id.0.clone(), negotiation);
        Ok(())
    }

    async fn commit_turn(&self, commit: TurnCommit) -> Result<(), RepositoryError> {
        // Hold both write guards for the whole commit so no reader can see a
        // partially applied turn.
        let mut negotiations = self.store.negotiations.write().await;
        let mut messages = self.store.messages.write().await;

        let negotiation = negotiations
            .get_mut(&commit.negotiation_id.0)
            .ok_or_else(|| RepositoryError::NotFound(commit.negotiation_id.0.clone()))?;

        negotiation.round = commit.round;
        negotiation.status = commit.status;
        negotiation.state = commit.state;
        if commit.last_offer.is_some() {
            negotiation.last_offer = commit.last_offer;
        }
        negotiation.updated_at = commit.updated_at;

        messages
            .entry(commit.negotiation_id.0.clone())
            .or_default()
            .extend(commit.messages);
        Ok(())
    }
}

pub struct InMemoryMessageRepository {
    store: Arc<InMemoryStore>,
}

impl InMemoryMessageRepository {
    pub fn new(store: Arc<InMemoryStore>) -> Self {
        Self { store }
    }
}

#[async_trait::async_trait]
impl MessageRepository for InMemoryMessageRepository {
    async fn append(
        &self,
        id: &NegotiationId,
        message: StoredMessage,
    ) -> Result<(), RepositoryError> {
        let mut messages = self.store.messages.write().await;
        messages.entry(id.0.clone()).or_default().push(message);
        Ok(())
    }

    async fn recent(
        &self,
        id: &NegotiationId,
        limit: usize,
    ) -> Result<Vec<StoredMessage>, RepositoryError> {
        let messages = self.store.messages.read().await;
        let log = messages.get(&id.0).map(Vec::as_slice).unwrap_or_default();
        let start = log.len().saturating_sub(limit);
        Ok(log[start..].to_vec())
    }
}
