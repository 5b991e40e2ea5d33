use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::Mutex;

use parley_core::domain::message::{StoredMessage, HISTORY_WINDOW};
use parley_core::domain::negotiation::{NegotiationId, NegotiationStatus};
use parley_core::domain::offer::Offer;
use parley_core::engine::{decide, Decision};
use parley_core::errors::{ApplicationError, ValidationError};
use parley_core::orchestrator::preference::{infer_preference, PreferenceSignal};
use parley_core::orchestrator::state::{ConversationState, CounterpartIntent, RefusalKind, ResponseIntent};
use parley_core::orchestrator::{advance, TurnEvent};
use parley_db::{MessageRepository, NegotiationRepository, RepositoryError, TurnCommit};

use crate::classify::IntentClassifier;
use crate::extract::OfferExtractor;
use crate::respond::{ReplyContext, ResponseStrategy};

#[derive(Clone, Debug)]
pub struct TurnRequest {
    pub negotiation_id: NegotiationId,
    pub message: String,
    pub requesting_user_id: String,
}

#[derive(Clone, Debug)]
pub struct TurnResponse {
    pub reply: String,
    pub response_intent: ResponseIntent,
    pub counterpart_intent: CounterpartIntent,
    pub refusal: Option<RefusalKind>,
    pub decision: Option<Decision>,
    pub round: u32,
    pub status: NegotiationStatus,
    pub state: ConversationState,
}

#[derive(Debug, Error)]
pub enum TurnError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Persistence(#[from] RepositoryError),
}

impl From<TurnError> for ApplicationError {
    fn from(error: TurnError) -> Self {
        match error {
            TurnError::Validation(validation) => ApplicationError::Validation(validation),
            TurnError::Persistence(persistence) => {
                ApplicationError::Persistence(persistence.to_string())
            }
        }
    }
}

/// Drives one inbound message through classification, extraction, decision,
/// phase advance, and reply generation, then commits the whole turn in a
/// single write. Turns for the same negotiation are serialized; turns for
/// different negotiations run concurrently.
pub struct TurnProcessor {
    negotiations: Arc<dyn NegotiationRepository>,
    messages: Arc<dyn MessageRepository>,
    classifier: IntentClassifier,
    extractor: OfferExtractor,
    responder: Arc<dyn ResponseStrategy>,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl TurnProcessor {
    pub fn new(
        negotiations: Arc<dyn NegotiationRepository>,
        messages: Arc<dyn MessageRepository>,
        classifier: IntentClassifier,
        responder: Arc<dyn ResponseStrategy>,
    ) -> Self {
        Self {
            negotiations,
            messages,
            classifier,
            extractor: OfferExtractor::new(),
            responder,
            locks: Mutex::new(HashMap::new()),
        }
    }

    async fn deal_lock(&self, id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks.entry(id.to_string()).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }

    /// Drop an entry nobody is waiting on. Waiters clone the `Arc` under the
    /// map mutex, so a strong count of one here means only the map holds it.
    async fn release_deal_lock(&self, id: &str, lock: Arc<Mutex<()>>) {
        let mut locks = self.locks.lock().await;
        drop(lock);
        if locks.get(id).is_some_and(|entry| Arc::strong_count(entry) == 1) {
            locks.remove(id);
        }
    }

    pub async fn process(&self, request: TurnRequest) -> Result<TurnResponse, TurnError> {
        let deal_id = request.negotiation_id.0.clone();
        let lock = self.deal_lock(&deal_id).await;
        let result = {
            let _guard = lock.lock().await;
            self.process_locked(request).await
        };
        self.release_deal_lock(&deal_id, lock).await;
        result
    }

    async fn process_locked(&self, request: TurnRequest) -> Result<TurnResponse, TurnError> {
        let negotiation = self
            .negotiations
            .find_by_id(&request.negotiation_id)
            .await?
            .ok_or_else(|| {
                ValidationError::NegotiationNotFound(request.negotiation_id.0.clone())
            })?;

        if negotiation.owner_user_id != request.requesting_user_id {
            return Err(ValidationError::Unauthorized {
                negotiation_id: negotiation.id.0.clone(),
                user_id: request.requesting_user_id,
            }
            .into());
        }
        if negotiation.status.is_terminal() {
            return Err(ValidationError::NegotiationClosed {
                negotiation_id: negotiation.id.0.clone(),
                status: negotiation.status,
            }
            .into());
        }

        let now = Utc::now();
        let round = negotiation.round + 1;

        let extracted = self.extractor.extract(&request.message, now.date_naive());
        let merged = match &negotiation.last_offer {
            Some(last_offer) => extracted.merged_with(last_offer),
            None => extracted.clone(),
        };

        let intent = self.classifier.classify(&request.message).await;
        let refusal = match intent {
            CounterpartIntent::Refusal => {
                Some(self.classifier.refusal_kind(&request.message).await)
            }
            _ => None,
        };

        let decision = (intent == CounterpartIntent::ProvideOffer)
            .then(|| decide(&negotiation.config, &merged, round));

        let outcome = advance(
            &negotiation.state,
            &TurnEvent { intent, refusal, decision: decision.clone(), now },
        );
        if outcome.closed_phase_turn {
            tracing::warn!(
                negotiation_id = %negotiation.id.0,
                "message arrived for a closed conversation, escalating"
            );
        }

        let history = self.recent_history(&negotiation.id).await;
        let preference = preference_from(&history, &extracted);
        let status = negotiation.status.after_reply(outcome.response_intent);

        let reply_offer = if merged.is_empty() { negotiation.last_offer.as_ref() } else { Some(&merged) };
        let context = ReplyContext {
            deal_id: &negotiation.id.0,
            vendor_name: &negotiation.vendor_name,
            round,
            intent: outcome.response_intent,
            decision: decision.as_ref(),
            offer: reply_offer,
            state: &outcome.state,
            preference,
            history: &history,
        };
        let reply = self.responder.generate(&context).await;

        let mut inbound = StoredMessage::counterpart(request.message.clone(), round, now);
        if !extracted.is_empty() {
            inbound = inbound.with_offer(extracted);
        }
        let mut outbound = StoredMessage::agent(reply.clone(), round, now);
        if let Some(decision) = &decision {
            outbound = outbound.with_decision(decision.clone());
        }

        self.negotiations
            .commit_turn(TurnCommit {
                negotiation_id: negotiation.id.clone(),
                round,
                status,
                state: outcome.state.clone(),
                last_offer: if merged.is_empty() { None } else { Some(merged) },
                updated_at: now,
                messages: vec![inbound, outbound],
            })
            .await?;

        tracing::info!(
            negotiation_id = %negotiation.id.0,
            round,
            counterpart_intent = intent.key(),
            response_intent = outcome.response_intent.key(),
            status = status.as_str(),
            "turn processed"
        );

        Ok(TurnResponse {
            reply,
            response_intent: outcome.response_intent,
            counterpart_intent: intent,
            refusal,
            decision,
            round,
            status,
            state: outcome.state,
        })
    }

    /// Bounded conversation context for preference inference and LLM prompts.
    /// A history read failure degrades to an empty window; the turn proceeds.
    async fn recent_history(&self, id: &NegotiationId) -> Vec<StoredMessage> {
        match self.messages.recent(id, HISTORY_WINDOW).await {
            Ok(history) => history,
            Err(error) => {
                tracing::warn!(
                    negotiation_id = %id.0,
                    error = %error,
                    "could not load message history, continuing without context"
                );
                Vec::new()
            }
        }
    }
}

/// Which lever the counterpart keeps moving, from their recent extracted
/// offers plus the one just received.
fn preference_from(history: &[StoredMessage], latest: &Offer) -> PreferenceSignal {
    let mut offers = history
        .iter()
        .filter_map(|message| message.extracted_offer.clone())
        .collect::<Vec<_>>();
    if !latest.is_empty() {
        offers.push(latest.clone());
    }
    infer_preference(&offers)
}
