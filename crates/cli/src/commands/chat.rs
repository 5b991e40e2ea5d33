use std::io::Write;
use std::sync::Arc;

use chrono::Utc;
use tokio::io::{AsyncBufReadExt, BufReader};

use parley_agent::classify::IntentClassifier;
use parley_agent::llm::client_from_config;
use parley_agent::processor::{TurnProcessor, TurnRequest};
use parley_agent::respond::{LlmResponder, ResponseStrategy, TemplateResponder};
use parley_core::config::{AppConfig, LoadOptions};
use parley_core::domain::negotiation::{
    AttributeWeights, DecisionThresholds, Negotiation, NegotiationConfig, NegotiationId,
    NegotiationStatus,
};
use parley_core::errors::ApplicationError;
use parley_core::orchestrator::state::ConversationState;
use parley_db::{
    connect_with_settings, migrations, MessageRepository, NegotiationRepository,
    SqlMessageRepository, SqlNegotiationRepository,
};

use crate::commands::{current_thread_runtime, CommandResult};

const OPERATOR_USER: &str = "operator";

#[derive(Debug)]
pub struct ChatArgs {
    pub vendor: String,
    pub target_price: f64,
    pub max_price: f64,
    pub ideal_days: u32,
    pub max_days: u32,
    pub max_rounds: u32,
    pub no_llm: bool,
}

pub fn run(args: ChatArgs) -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "chat",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };
    crate::init_logging(&config.logging);

    let runtime = match current_thread_runtime("chat") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    match runtime.block_on(chat_loop(config, args)) {
        Ok(message) => CommandResult::success("chat", message),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("chat", error_class, message, exit_code)
        }
    }
}

async fn chat_loop(
    config: AppConfig,
    args: ChatArgs,
) -> Result<String, (&'static str, String, u8)> {
    let negotiation_config = NegotiationConfig {
        target_price: args.target_price,
        max_price: args.max_price,
        ideal_payment_days: args.ideal_days,
        max_payment_days: args.max_days,
        preferred_delivery: None,
        required_delivery: None,
        weights: AttributeWeights::default(),
        thresholds: DecisionThresholds::default(),
        max_rounds: args.max_rounds,
    };
    negotiation_config
        .validate()
        .map_err(|error| ("negotiation_config", error.to_string(), 2u8))?;

    let pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;
    migrations::run_pending(&pool)
        .await
        .map_err(|error| ("migration", error.to_string(), 5u8))?;

    let negotiations: Arc<dyn NegotiationRepository> =
        Arc::new(SqlNegotiationRepository::new(pool.clone()));
    let messages: Arc<dyn MessageRepository> = Arc::new(SqlMessageRepository::new(pool.clone()));

    let llm_enabled = config.llm.enabled && !args.no_llm;
    let (classifier, responder): (IntentClassifier, Arc<dyn ResponseStrategy>) = if llm_enabled {
        let client = client_from_config(&config.llm)
            .map_err(|error| ("llm_init", error.to_string(), 6u8))?;
        (IntentClassifier::with_llm(client.clone()), Arc::new(LlmResponder::new(client)))
    } else {
        (IntentClassifier::heuristic_only(), Arc::new(TemplateResponder::new()))
    };
    let processor = TurnProcessor::new(negotiations.clone(), messages, classifier, responder);

    let now = Utc::now();
    let negotiation = Negotiation {
        id: NegotiationId::generate(),
        vendor_name: args.vendor.clone(),
        owner_user_id: OPERATOR_USER.to_string(),
        status: NegotiationStatus::Active,
        round: 0,
        config: negotiation_config,
        state: ConversationState::new(now),
        last_offer: None,
        created_at: now,
        updated_at: now,
    };
    let deal_id = negotiation.id.clone();
    negotiations
        .create(negotiation)
        .await
        .map_err(|error| ("persistence", error.to_string(), 4u8))?;

    println!(
        "Negotiating with {} as deal {}. Type the vendor's messages; `quit` ends the session.",
        args.vendor, deal_id.0
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("vendor> ");
        let _ = std::io::stdout().flush();

        let line = lines
            .next_line()
            .await
            .map_err(|error| ("io", error.to_string(), 3u8))?;
        let Some(line) = line else { break };
        let line = line.trim().to_string();
        if line.is_empty() {
            continue;
        }
        if line.eq_ignore_ascii_case("quit") || line.eq_ignore_ascii_case("exit") {
            break;
        }

        let request = TurnRequest {
            negotiation_id: deal_id.clone(),
            message: line,
            requesting_user_id: OPERATOR_USER.to_string(),
        };
        match processor.process(request).await {
            Ok(turn) => {
                println!("agent> {}", turn.reply);
                if turn.status.is_terminal() {
                    pool.close().await;
                    return Ok(format!(
                        "negotiation {} finished with status {}",
                        deal_id.0,
                        turn.status.as_str()
                    ));
                }
            }
            Err(error) => {
                let error = ApplicationError::from(error);
                eprintln!("error: {error}");
                // A transient infrastructure failure keeps the session open;
                // anything else means the negotiation can no longer be driven.
                if !error.is_retryable() {
                    pool.close().await;
                    return Err(("turn_processing", error.to_string(), 1u8));
                }
            }
        }
    }

    pool.close().await;
    Ok(format!("negotiation {} left active", deal_id.0))
}
