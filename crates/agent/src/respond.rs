use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use parley_core::domain::message::{MessageRole, StoredMessage};
use parley_core::domain::offer::Offer;
use parley_core::engine::{Decision, DecisionAction};
use parley_core::orchestrator::preference::PreferenceSignal;
use parley_core::orchestrator::state::{ConversationState, RefusalKind, ResponseIntent};
use parley_core::orchestrator::{REFUSAL_ESCALATION_LIMIT, REFUSAL_PREFERENCE_ASK};
use parley_core::templates::{fallback_reply, render_reply};

use crate::llm::{ChatTurn, CompletionRequest, LlmClient};

/// Everything response generation may draw on for one turn. All decisions are
/// already made by the time this exists; generation only words them.
pub struct ReplyContext<'a> {
    pub deal_id: &'a str,
    pub vendor_name: &'a str,
    pub round: u32,
    pub intent: ResponseIntent,
    pub decision: Option<&'a Decision>,
    pub offer: Option<&'a Offer>,
    pub state: &'a ConversationState,
    pub preference: PreferenceSignal,
    /// Recent conversation, oldest first, for LLM context only.
    pub history: &'a [StoredMessage],
}

#[async_trait]
pub trait ResponseStrategy: Send + Sync {
    async fn generate(&self, context: &ReplyContext<'_>) -> String;
}

fn format_price(price: f64) -> String {
    format!("${price:.2}")
}

/// Template variables for one reply. Missing variables are left out rather
/// than guessed; the renderer reports them and the caller falls back.
pub fn prepare_variables(context: &ReplyContext<'_>) -> HashMap<String, String> {
    let mut variables = HashMap::new();
    variables.insert("vendor".to_string(), context.vendor_name.to_string());

    let offer_price = context.offer.and_then(|offer| offer.price);
    if let Some(price) = offer_price {
        variables.insert("current_price".to_string(), format_price(price));
    }

    match context.intent {
        ResponseIntent::Counter => {
            let counter = context.decision.and_then(|decision| decision.counter_offer.as_ref());
            if let Some(price) = counter.and_then(|counter| counter.price) {
                variables.insert("target_price".to_string(), format_price(price));
            }
            if let Some(terms) = counter.and_then(|counter| counter.payment_terms.clone()) {
                variables.insert("payment_terms".to_string(), terms);
            }
            variables.insert("reason".to_string(), counter_reason(context).to_string());
        }
        ResponseIntent::Accept => {
            let terms = context
                .offer
                .and_then(|offer| offer.payment_terms.clone())
                .unwrap_or_else(|| "the proposed terms".to_string());
            variables.insert("payment_terms".to_string(), terms);
        }
        ResponseIntent::AskClarify => {
            variables.insert("reason".to_string(), clarify_reason(context).to_string());
        }
        ResponseIntent::Escalate => {
            variables.insert("reason".to_string(), escalate_reason(context).to_string());
        }
        ResponseIntent::WalkAway => {
            variables.insert(
                "reason".to_string(),
                "the gap between our positions is too large".to_string(),
            );
        }
        ResponseIntent::Greet | ResponseIntent::AskForOffer | ResponseIntent::SmallTalk => {}
    }

    variables
}

fn counter_reason(context: &ReplyContext<'_>) -> &'static str {
    let close = context.decision.map(|decision| decision.close_to_acceptance).unwrap_or(false);
    if close {
        return "We're close, and this last step would get us to a signed deal.";
    }
    match context.preference {
        PreferenceSignal::Terms => "We can stay flexible on payment terms if the price works.",
        PreferenceSignal::Price | PreferenceSignal::Neither => {
            "We believe this is a fair midpoint for both sides."
        }
    }
}

fn clarify_reason(context: &ReplyContext<'_>) -> &'static str {
    if let Some(decision) = context.decision {
        if decision.action == DecisionAction::AskClarify {
            return "your unit price and payment terms";
        }
    }
    if context.state.asked_for_preferences
        && context.state.refusal_count >= REFUSAL_PREFERENCE_ASK
    {
        return "whether price or payment terms matter more on your side";
    }
    match context.state.last_refusal {
        Some(RefusalKind::Confused) => "which part of our proposal is unclear",
        Some(RefusalKind::AlreadyShared) => {
            "the numbers once more, since we could not find them in this thread"
        }
        _ => "your unit price and payment terms",
    }
}

fn escalate_reason(context: &ReplyContext<'_>) -> &'static str {
    if context.state.refusal_count >= REFUSAL_ESCALATION_LIMIT {
        return "we haven't been able to make progress here";
    }
    if context.decision.map(|decision| decision.action) == Some(DecisionAction::Escalate) {
        return "we've reached the limit of what I can settle directly";
    }
    "this needs attention from our team"
}

/// Deterministic responder. Never fails: an unresolvable template degrades to
/// the per-intent hard-coded fallback.
#[derive(Clone, Debug, Default)]
pub struct TemplateResponder;

impl TemplateResponder {
    pub fn new() -> Self {
        Self
    }

    fn render(&self, context: &ReplyContext<'_>) -> String {
        let variables = prepare_variables(context);
        let rendered = render_reply(context.deal_id, context.round, context.intent, &variables);
        if rendered.unresolved.is_empty() {
            return rendered.text;
        }
        tracing::warn!(
            deal_id = %context.deal_id,
            intent = context.intent.key(),
            unresolved = ?rendered.unresolved,
            "template had unresolved variables, using fallback reply"
        );
        fallback_reply(context.intent).to_string()
    }
}

#[async_trait]
impl ResponseStrategy for TemplateResponder {
    async fn generate(&self, context: &ReplyContext<'_>) -> String {
        self.render(context)
    }
}

const MIN_REPLY_CHARS: usize = 10;
const MAX_REPLY_CHARS: usize = 550;

/// Words that would leak the decision machinery to the counterpart.
const BANNED_KEYWORDS: &[&str] =
    &["utility", "threshold", "algorithm", "score", "internal", "weight"];

const ACCEPT_KEYWORDS: &[&str] = &["accept", "agree", "deal", "confirm", "works for us"];

fn validate_reply(
    text: &str,
    context: &ReplyContext<'_>,
    variables: &HashMap<String, String>,
) -> Result<(), String> {
    let length = text.chars().count();
    if !(MIN_REPLY_CHARS..=MAX_REPLY_CHARS).contains(&length) {
        return Err(format!("length {length} outside {MIN_REPLY_CHARS}..={MAX_REPLY_CHARS}"));
    }

    let lowered = text.to_ascii_lowercase();
    if let Some(banned) = BANNED_KEYWORDS.iter().find(|keyword| lowered.contains(**keyword)) {
        return Err(format!("contains banned keyword `{banned}`"));
    }

    match context.intent {
        ResponseIntent::Accept => {
            if !ACCEPT_KEYWORDS.iter().any(|keyword| lowered.contains(keyword)) {
                return Err("acceptance reply does not read as an acceptance".to_string());
            }
        }
        ResponseIntent::Counter => {
            for key in ["target_price", "payment_terms"] {
                match variables.get(key) {
                    Some(value) if text.contains(value) => {}
                    Some(value) => {
                        return Err(format!("counter reply dropped {key} `{value}`"));
                    }
                    None => return Err(format!("counter reply is missing the {key} variable")),
                }
            }
        }
        _ => {}
    }
    Ok(())
}

/// LLM-polished responder. The model rewrites a deterministic draft for tone;
/// any failure or validation miss falls back to the draft machinery.
pub struct LlmResponder {
    llm: Arc<dyn LlmClient>,
    templates: TemplateResponder,
}

impl LlmResponder {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm, templates: TemplateResponder::new() }
    }

    fn prompt(context: &ReplyContext<'_>, draft: &str) -> CompletionRequest {
        let system = "You are a professional buyer negotiating with a vendor over chat. \
Rewrite the drafted message in a natural, courteous tone. Keep every number, \
price, and payment term exactly as written. Do not add new offers, concessions, \
or commitments. Reply with the message text only."
            .to_string();

        let mut turns = Vec::with_capacity(context.history.len() + 1);
        for message in context.history {
            turns.push(match message.role {
                MessageRole::Counterpart | MessageRole::System => {
                    ChatTurn::user(message.content.clone())
                }
                MessageRole::Agent => ChatTurn::assistant(message.content.clone()),
            });
        }
        turns.push(ChatTurn::user(format!(
            "Vendor: {vendor}\nReply type: {intent}\nDraft:\n{draft}",
            vendor = context.vendor_name,
            intent = context.intent.key(),
        )));
        CompletionRequest { system, turns }
    }
}

#[async_trait]
impl ResponseStrategy for LlmResponder {
    async fn generate(&self, context: &ReplyContext<'_>) -> String {
        let draft = self.templates.render(context);
        let variables = prepare_variables(context);

        match self.llm.complete(&Self::prompt(context, &draft)).await {
            Ok(polished) => match validate_reply(&polished, context, &variables) {
                Ok(()) => polished,
                Err(reason) => {
                    tracing::warn!(
                        deal_id = %context.deal_id,
                        intent = context.intent.key(),
                        reason = %reason,
                        "llm reply failed validation, using template draft"
                    );
                    draft
                }
            },
            Err(error) => {
                tracing::warn!(
                    deal_id = %context.deal_id,
                    intent = context.intent.key(),
                    error = %error,
                    "llm reply generation failed, using template draft"
                );
                draft
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use anyhow::Result;
    use async_trait::async_trait;
    use chrono::Utc;

    use parley_core::domain::negotiation::{
        AttributeWeights, DecisionThresholds, NegotiationConfig,
    };
    use parley_core::domain::offer::Offer;
    use parley_core::engine::decide;
    use parley_core::orchestrator::preference::PreferenceSignal;
    use parley_core::orchestrator::state::{ConversationState, RefusalKind, ResponseIntent};

    use super::{
        prepare_variables, LlmResponder, ReplyContext, ResponseStrategy, TemplateResponder,
    };
    use crate::llm::{CompletionRequest, LlmClient};

    fn config() -> NegotiationConfig {
        NegotiationConfig {
            target_price: 120.0,
            max_price: 160.0,
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

    struct FixedReply(&'static str);

    #[async_trait]
    impl LlmClient for FixedReply {
        async fn complete(&self, _request: &CompletionRequest) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    #[test]
    fn counter_variables_carry_both_prices_and_terms() {
        let config = config();
        let vendor_offer = offer(150.0, "Net 60");
        let decision = decide(&config, &vendor_offer, 1);
        let state = ConversationState::new(Utc::now());
        let context = ReplyContext {
            deal_id: "deal-1",
            vendor_name: "Acme",
            round: 1,
            intent: ResponseIntent::Counter,
            decision: Some(&decision),
            offer: Some(&vendor_offer),
            state: &state,
            preference: PreferenceSignal::Neither,
            history: &[],
        };

        let variables = prepare_variables(&context);
        assert_eq!(variables.get("current_price").map(String::as_str), Some("$150.00"));
        assert!(variables.get("target_price").expect("target").starts_with('$'));
        assert_eq!(variables.get("payment_terms").map(String::as_str), Some("Net 30"));
        assert!(variables.contains_key("reason"));
    }

    #[test]
    fn clarify_reason_reflects_the_refusal_subtype() {
        let mut state = ConversationState::new(Utc::now());
        state.refusal_count = 1;
        state.last_refusal = Some(RefusalKind::Confused);
        let context = ReplyContext {
            deal_id: "deal-1",
            vendor_name: "Acme",
            round: 2,
            intent: ResponseIntent::AskClarify,
            decision: None,
            offer: None,
            state: &state,
            preference: PreferenceSignal::Neither,
            history: &[],
        };

        let variables = prepare_variables(&context);
        assert_eq!(
            variables.get("reason").map(String::as_str),
            Some("which part of our proposal is unclear")
        );
    }

    #[test]
    fn preference_ask_overrides_the_subtype_reason() {
        let mut state = ConversationState::new(Utc::now());
        state.refusal_count = 3;
        state.asked_for_preferences = true;
        state.last_refusal = Some(RefusalKind::No);
        let context = ReplyContext {
            deal_id: "deal-1",
            vendor_name: "Acme",
            round: 3,
            intent: ResponseIntent::AskClarify,
            decision: None,
            offer: None,
            state: &state,
            preference: PreferenceSignal::Neither,
            history: &[],
        };

        let variables = prepare_variables(&context);
        assert_eq!(
            variables.get("reason").map(String::as_str),
            Some("whether price or payment terms matter more on your side")
        );
    }

    #[tokio::test]
    async fn template_responder_renders_a_complete_counter() {
        let config = config();
        let vendor_offer = offer(150.0, "Net 60");
        let decision = decide(&config, &vendor_offer, 1);
        let state = ConversationState::new(Utc::now());
        let context = ReplyContext {
            deal_id: "deal-1",
            vendor_name: "Acme",
            round: 1,
            intent: ResponseIntent::Counter,
            decision: Some(&decision),
            offer: Some(&vendor_offer),
            state: &state,
            preference: PreferenceSignal::Neither,
            history: &[],
        };

        let reply = TemplateResponder::new().generate(&context).await;
        let counter_price = decision.counter_offer.as_ref().and_then(|c| c.price).expect("price");
        assert!(reply.contains(&format!("${counter_price:.2}")));
        assert!(reply.contains("Net 30"));
        assert!(!reply.contains('{'), "no unresolved placeholders: {reply}");
    }

    #[tokio::test]
    async fn missing_counter_variables_degrade_to_fallback() {
        let state = ConversationState::new(Utc::now());
        let context = ReplyContext {
            deal_id: "deal-1",
            vendor_name: "Acme",
            round: 1,
            intent: ResponseIntent::Counter,
            decision: None,
            offer: None,
            state: &state,
            preference: PreferenceSignal::Neither,
            history: &[],
        };

        let reply = TemplateResponder::new().generate(&context).await;
        assert!(!reply.contains('{'), "fallback must have no placeholders: {reply}");
        assert!(!reply.is_empty());
    }

    #[tokio::test]
    async fn llm_reply_that_leaks_machinery_is_rejected() {
        let config = config();
        let vendor_offer = offer(150.0, "Net 60");
        let decision = decide(&config, &vendor_offer, 1);
        let state = ConversationState::new(Utc::now());
        let context = ReplyContext {
            deal_id: "deal-1",
            vendor_name: "Acme",
            round: 1,
            intent: ResponseIntent::Counter,
            decision: Some(&decision),
            offer: Some(&vendor_offer),
            state: &state,
            preference: PreferenceSignal::Neither,
            history: &[],
        };

        let responder = LlmResponder::new(Arc::new(FixedReply(
            "Our utility score says we should counter at a lower threshold.",
        )));
        let reply = responder.generate(&context).await;
        assert!(!reply.to_ascii_lowercase().contains("utility"));
        assert!(reply.contains("Net 30"), "fell back to the template draft: {reply}");
    }

    #[tokio::test]
    async fn llm_reply_that_drops_the_counter_price_is_rejected() {
        let config = config();
        let vendor_offer = offer(150.0, "Net 60");
        let decision = decide(&config, &vendor_offer, 1);
        let counter_price = decision.counter_offer.as_ref().and_then(|c| c.price).expect("price");
        let state = ConversationState::new(Utc::now());
        let context = ReplyContext {
            deal_id: "deal-1",
            vendor_name: "Acme",
            round: 1,
            intent: ResponseIntent::Counter,
            decision: Some(&decision),
            offer: Some(&vendor_offer),
            state: &state,
            preference: PreferenceSignal::Neither,
            history: &[],
        };

        let responder = LlmResponder::new(Arc::new(FixedReply(
            "Thanks for the proposal! We would love a better price if you can manage it.",
        )));
        let reply = responder.generate(&context).await;
        assert!(reply.contains(&format!("${counter_price:.2}")));
    }

    #[tokio::test]
    async fn valid_llm_reply_is_used_verbatim() {
        let state = ConversationState::new(Utc::now());
        let context = ReplyContext {
            deal_id: "deal-1",
            vendor_name: "Acme",
            round: 1,
            intent: ResponseIntent::AskForOffer,
            decision: None,
            offer: None,
            state: &state,
            preference: PreferenceSignal::Neither,
            history: &[],
        };

        let polished = "Whenever you're ready, could you send over your price and payment terms?";
        let responder = LlmResponder::new(Arc::new(FixedReply(polished)));
        assert_eq!(responder.generate(&context).await, polished);
    }
}
