pub mod chat;
pub mod doctor;
pub mod migrate;

use serde::Serialize;
use serde_json::Value;

/// What a subcommand hands back to the dispatcher: a process exit code plus
/// the line already rendered for stdout.
#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

/// One-line JSON envelope shared by all subcommands. `error_class` and
/// `details` are omitted when empty so success output stays minimal.
#[derive(Debug, Serialize)]
struct CommandReport<'a> {
    command: &'a str,
    status: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_class: Option<&'a str>,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Value>,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        Self::success_with(command, message, None)
    }

    /// Success carrying a structured payload under `details`.
    pub fn success_with(
        command: &str,
        message: impl Into<String>,
        details: Option<Value>,
    ) -> Self {
        let report = CommandReport {
            command,
            status: "ok",
            error_class: None,
            message: message.into(),
            details,
        };
        Self { exit_code: 0, output: render(&report) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let report = CommandReport {
            command,
            status: "error",
            error_class: Some(error_class),
            message: message.into(),
            details: None,
        };
        Self { exit_code, output: render(&report) }
    }
}

/// Single-threaded runtime for commands that block on async work. A build
/// failure becomes a uniform `runtime_init` result.
pub(crate) fn current_thread_runtime(
    command: &str,
) -> Result<tokio::runtime::Runtime, CommandResult> {
    tokio::runtime::Builder::new_current_thread().enable_all().build().map_err(|error| {
        CommandResult::failure(
            command,
            "runtime_init",
            format!("failed to initialize async runtime: {error}"),
            3,
        )
    })
}

fn render(report: &CommandReport<'_>) -> String {
    serde_json::to_string(report).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}
