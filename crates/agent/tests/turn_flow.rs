use std::sync::Arc;

use chrono::Utc;

use parley_agent::classify::IntentClassifier;
use parley_agent::processor::{TurnProcessor, TurnRequest};
use parley_agent::respond::TemplateResponder;
use parley_core::domain::negotiation::{
    AttributeWeights, DecisionThresholds, Negotiation, NegotiationConfig, NegotiationId,
    NegotiationStatus,
};
use parley_core::orchestrator::state::{
    ConversationState, ConvoPhase, CounterpartIntent, ResponseIntent,
};
use parley_db::{
    InMemoryMessageRepository, InMemoryNegotiationRepository, InMemoryStore, MessageRepository,
    NegotiationRepository,
};

const DEAL: &str = "deal-e2e";
const OWNER: &str = "user-1";

fn seed_negotiation() -> Negotiation {
    let now = Utc::now();
    Negotiation {
        id: NegotiationId(DEAL.to_string()),
        vendor_name: "Acme Metals".to_string(),
        owner_user_id: OWNER.to_string(),
        status: NegotiationStatus::Active,
        round: 0,
        config: NegotiationConfig {
            target_price: 120.0,
            max_price: 160.0,
            ideal_payment_days: 30,
            max_payment_days: 90,
            preferred_delivery: None,
            required_delivery: None,
            weights: AttributeWeights::default(),
            thresholds: DecisionThresholds::default(),
            max_rounds: 6,
        },
        state: ConversationState::new(now),
        last_offer: None,
        created_at: now,
        updated_at: now,
    }
}

struct Harness {
    processor: TurnProcessor,
    negotiations: Arc<InMemoryNegotiationRepository>,
    messages: Arc<InMemoryMessageRepository>,
}

async fn harness() -> Harness {
    let store = InMemoryStore::shared();
    let negotiations = Arc::new(InMemoryNegotiationRepository::new(store.clone()));
    let messages = Arc::new(InMemoryMessageRepository::new(store));
    negotiations.create(seed_negotiation()).await.expect("seed");

    let processor = TurnProcessor::new(
        negotiations.clone(),
        messages.clone(),
        IntentClassifier::heuristic_only(),
        Arc::new(TemplateResponder::new()),
    );
    Harness { processor, negotiations, messages }
}

fn request(message: &str) -> TurnRequest {
    TurnRequest {
        negotiation_id: NegotiationId(DEAL.to_string()),
        message: message.to_string(),
        requesting_user_id: OWNER.to_string(),
    }
}

#[tokio::test]
async fn greeting_then_offer_drives_the_happy_path() {
    let harness = harness().await;

    let greeting = harness.processor.process(request("Hello!")).await.expect("greeting turn");
    assert_eq!(greeting.counterpart_intent, CounterpartIntent::Greeting);
    assert_eq!(greeting.response_intent, ResponseIntent::Greet);
    assert_eq!(greeting.round, 1);
    assert_eq!(greeting.state.phase, ConvoPhase::AskOffer);
    assert_eq!(greeting.status, NegotiationStatus::Active);
    assert!(greeting.decision.is_none());

    let offer_turn = harness
        .processor
        .process(request("Our price is $150 per unit with Net 60 payment"))
        .await
        .expect("offer turn");
    assert_eq!(offer_turn.counterpart_intent, CounterpartIntent::ProvideOffer);
    assert_eq!(offer_turn.response_intent, ResponseIntent::Counter);
    assert_eq!(offer_turn.round, 2);
    assert_eq!(offer_turn.state.phase, ConvoPhase::Negotiating);

    let decision = offer_turn.decision.expect("offer was scored");
    let counter_price = decision
        .counter_offer
        .as_ref()
        .and_then(|counter| counter.price)
        .expect("counter price");
    assert!(counter_price >= 120.0, "never counters below target: {counter_price}");
    assert!(counter_price <= 150.0 * 0.95, "never counters above the cap: {counter_price}");
    assert!(offer_turn.reply.contains(&format!("${counter_price:.2}")));

    // Both turns were committed: deal row advanced and four messages stored.
    let stored = harness
        .negotiations
        .find_by_id(&NegotiationId(DEAL.to_string()))
        .await
        .expect("find")
        .expect("present");
    assert_eq!(stored.round, 2);
    assert_eq!(stored.state.phase, ConvoPhase::Negotiating);
    assert_eq!(stored.last_offer.as_ref().and_then(|offer| offer.price), Some(150.0));

    let log = harness
        .messages
        .recent(&NegotiationId(DEAL.to_string()), 10)
        .await
        .expect("recent");
    assert_eq!(log.len(), 4);
    assert!(log[2].extracted_offer.is_some(), "inbound offer message carries the extraction");
    assert!(log[3].decision.is_some(), "outbound counter message carries the decision audit");
}

#[tokio::test]
async fn acceptable_offer_closes_the_deal_as_accepted() {
    let harness = harness().await;

    let turn = harness
        .processor
        .process(request("We can do $118 with Net 30 terms"))
        .await
        .expect("turn");
    assert_eq!(turn.response_intent, ResponseIntent::Accept);
    assert_eq!(turn.status, NegotiationStatus::Accepted);
    assert_eq!(turn.state.phase, ConvoPhase::Closed);

    // A follow-up message is rejected, the deal is terminal.
    let error = harness.processor.process(request("actually, one more thing")).await;
    assert!(error.is_err());
}

#[tokio::test]
async fn repeated_refusals_escalate_and_close() {
    let harness = harness().await;

    let mut last = None;
    for _ in 0..5 {
        last = Some(
            harness
                .processor
                .process(request("Sorry, we can't share pricing right now"))
                .await
                .expect("refusal turn"),
        );
    }

    let last = last.expect("five turns ran");
    assert_eq!(last.response_intent, ResponseIntent::Escalate);
    assert_eq!(last.status, NegotiationStatus::Escalated);
    assert_eq!(last.state.refusal_count, 5);
    assert_eq!(last.state.phase, ConvoPhase::Closed);
}

#[tokio::test]
async fn partial_offer_merges_with_the_last_known_offer() {
    let harness = harness().await;

    harness
        .processor
        .process(request("Our price is $150 per unit with Net 60 payment"))
        .await
        .expect("full offer");

    // Terms-only update reuses the remembered $150 price.
    let update = harness
        .processor
        .process(request("We could move to Net 30 days"))
        .await
        .expect("terms update");
    assert_eq!(update.counterpart_intent, CounterpartIntent::ProvideOffer);
    let decision = update.decision.expect("scored against the merged offer");
    assert!(decision.utility_score > 0.0);

    let stored = harness
        .negotiations
        .find_by_id(&NegotiationId(DEAL.to_string()))
        .await
        .expect("find")
        .expect("present");
    let last_offer = stored.last_offer.expect("merged offer persisted");
    assert_eq!(last_offer.price, Some(150.0));
    assert_eq!(last_offer.payment_terms.as_deref(), Some("Net 30"));
}
