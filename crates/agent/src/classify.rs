use std::sync::Arc;

use parley_core::classifier;
use parley_core::orchestrator::state::{CounterpartIntent, RefusalKind};

use crate::llm::{ChatTurn, CompletionRequest, LlmClient};

const INTENT_INSTRUCTION: &str = "You label one vendor message in a price negotiation. \
Reply with exactly one label and nothing else: \
PROVIDE_OFFER, REFUSAL, SMALL_TALK, ASK_QUESTION, NEGOTIATE, GREETING, or AGREE.";

const REFUSAL_INSTRUCTION: &str = "A vendor declined to share their offer. \
Classify how they declined. Reply with exactly one label and nothing else: \
NO, LATER, ALREADY_SHARED, or CONFUSED.";

/// LLM-first message classifier. Any LLM failure, timeout, or out-of-enum
/// label falls back to the deterministic keyword classifier, so a turn is
/// never blocked on the model.
pub struct IntentClassifier {
    llm: Option<Arc<dyn LlmClient>>,
}

impl IntentClassifier {
    pub fn with_llm(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm: Some(llm) }
    }

    pub fn heuristic_only() -> Self {
        Self { llm: None }
    }

    pub async fn classify(&self, text: &str) -> CounterpartIntent {
        if let Some(llm) = &self.llm {
            match self.label(llm, INTENT_INSTRUCTION, text).await {
                Ok(label) => {
                    if let Some(intent) = CounterpartIntent::parse(&label) {
                        return intent;
                    }
                    tracing::warn!(label = %label, "llm returned an unknown intent label, using heuristics");
                }
                Err(error) => {
                    tracing::warn!(error = %error, "llm intent classification failed, using heuristics");
                }
            }
        }
        classifier::classify_intent(text)
    }

    pub async fn refusal_kind(&self, text: &str) -> RefusalKind {
        if let Some(llm) = &self.llm {
            match self.label(llm, REFUSAL_INSTRUCTION, text).await {
                Ok(label) => {
                    if let Some(kind) = RefusalKind::parse(&label) {
                        return kind;
                    }
                    tracing::warn!(label = %label, "llm returned an unknown refusal label, using heuristics");
                }
                Err(error) => {
                    tracing::warn!(error = %error, "llm refusal classification failed, using heuristics");
                }
            }
        }
        classifier::classify_refusal(text)
    }

    async fn label(
        &self,
        llm: &Arc<dyn LlmClient>,
        instruction: &str,
        text: &str,
    ) -> anyhow::Result<String> {
        let request = CompletionRequest {
            system: instruction.to_string(),
            turns: vec![ChatTurn::user(text)],
        };
        llm.complete(&request).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use anyhow::{bail, Result};
    use async_trait::async_trait;

    use parley_core::orchestrator::state::{CounterpartIntent, RefusalKind};

    use super::IntentClassifier;
    use crate::llm::{CompletionRequest, LlmClient};

    struct FixedLabel(&'static str);

    #[async_trait]
    impl LlmClient for FixedLabel {
        async fn complete(&self, _request: &CompletionRequest) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    struct AlwaysFails;

    #[async_trait]
    impl LlmClient for AlwaysFails {
        async fn complete(&self, _request: &CompletionRequest) -> Result<String> {
            bail!("connection refused")
        }
    }

    #[tokio::test]
    async fn llm_label_wins_when_it_is_in_the_enum() {
        let classifier = IntentClassifier::with_llm(Arc::new(FixedLabel("PROVIDE_OFFER")));
        let intent = classifier.classify("here you go").await;
        assert_eq!(intent, CounterpartIntent::ProvideOffer);
    }

    #[tokio::test]
    async fn out_of_enum_label_falls_back_to_heuristics() {
        let classifier = IntentClassifier::with_llm(Arc::new(FixedLabel("HAGGLE")));
        let intent = classifier.classify("Our price is $150 per unit").await;
        assert_eq!(intent, CounterpartIntent::ProvideOffer);
    }

    #[tokio::test]
    async fn llm_failure_falls_back_to_heuristics() {
        let classifier = IntentClassifier::with_llm(Arc::new(AlwaysFails));
        let intent = classifier.classify("Hello there!").await;
        assert_eq!(intent, CounterpartIntent::Greeting);

        let kind = classifier.refusal_kind("maybe later, not yet").await;
        assert_eq!(kind, RefusalKind::Later);
    }

    #[tokio::test]
    async fn heuristic_only_never_touches_a_model() {
        let classifier = IntentClassifier::heuristic_only();
        assert_eq!(classifier.classify("sounds good, deal").await, CounterpartIntent::Agree);
        assert_eq!(classifier.refusal_kind("I already sent it").await, RefusalKind::AlreadyShared);
    }
}
