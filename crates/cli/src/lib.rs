pub mod commands;

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use parley_core::config::{LogFormat, LoggingConfig};

use crate::commands::chat::ChatArgs;

#[derive(Debug, Parser)]
#[command(
    name = "parley",
    about = "Parley negotiation agent CLI",
    long_about = "Operate the Parley negotiation agent: run migrations, check runtime readiness, and drive negotiations interactively.",
    after_help = "Examples:\n  parley migrate\n  parley doctor --json\n  parley chat --vendor \"Acme Metals\" --target-price 120 --max-price 160"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Validate config, LLM readiness, and database connectivity")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Negotiate interactively, typing the vendor side of the conversation")]
    Chat {
        #[arg(long, help = "Vendor display name for the negotiation")]
        vendor: String,
        #[arg(long, help = "Price we aim for")]
        target_price: f64,
        #[arg(long, help = "Price above which the deal is unacceptable")]
        max_price: f64,
        #[arg(long, default_value_t = 30, help = "Ideal payment terms in net days")]
        ideal_days: u32,
        #[arg(long, default_value_t = 90, help = "Worst acceptable payment terms in net days")]
        max_days: u32,
        #[arg(long, default_value_t = 6, help = "Negotiation rounds before escalating")]
        max_rounds: u32,
        #[arg(long, help = "Use deterministic templates only, no LLM calls")]
        no_llm: bool,
    },
}

/// Install the global tracing subscriber. Safe to call more than once; later
/// calls are no-ops.
pub fn init_logging(config: &LoggingConfig) {
    let filter =
        EnvFilter::try_new(&config.level).unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let _ = match config.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Doctor { json } => commands::doctor::run(json),
        Command::Chat {
            vendor,
            target_price,
            max_price,
            ideal_days,
            max_days,
            max_rounds,
            no_llm,
        } => commands::chat::run(ChatArgs {
            vendor,
            target_price,
            max_price,
            ideal_days,
            max_days,
            max_rounds,
            no_llm,
        }),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
