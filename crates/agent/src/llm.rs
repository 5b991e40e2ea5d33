use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde_json::{json, Value};

use parley_core::config::{LlmConfig, LlmProvider};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatRole {
    fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

#[derive(Clone, Debug)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: ChatRole::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: ChatRole::Assistant, content: content.into() }
    }
}

#[derive(Clone, Debug, Default)]
pub struct CompletionRequest {
    pub system: String,
    pub turns: Vec<ChatTurn>,
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;
}

/// Stands in for a client when `llm.enabled = false`. Every call errors, which
/// routes callers onto their deterministic fallback paths.
pub struct DisabledLlm;

#[async_trait]
impl LlmClient for DisabledLlm {
    async fn complete(&self, _request: &CompletionRequest) -> Result<String> {
        bail!("llm is disabled")
    }
}

pub struct HttpLlmClient {
    config: LlmConfig,
    http: reqwest::Client,
}

impl HttpLlmClient {
    pub fn new(config: LlmConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("building http client")?;
        Ok(Self { config, http })
    }

    fn base_url(&self, default: &str) -> String {
        self.config
            .base_url
            .as_deref()
            .unwrap_or(default)
            .trim_end_matches('/')
            .to_string()
    }

    fn api_key(&self) -> Result<&str> {
        self.config
            .api_key
            .as_ref()
            .map(|key| key.expose_secret())
            .context("llm api key is not configured")
    }

    async fn complete_openai(&self, request: &CompletionRequest) -> Result<String> {
        let mut messages = vec![json!({ "role": "system", "content": request.system })];
        for turn in &request.turns {
            messages.push(json!({ "role": turn.role.as_str(), "content": turn.content }));
        }

        let body = json!({
            "model": self.config.model,
            "messages": messages,
            "temperature": self.config.temperature,
            "max_tokens": self.config.max_tokens,
        });

        let response: Value = self
            .http
            .post(format!("{}/v1/chat/completions", self.base_url("https://api.openai.com")))
            .bearer_auth(self.api_key()?)
            .json(&body)
            .send()
            .await
            .context("openai request failed")?
            .error_for_status()
            .context("openai returned an error status")?
            .json()
            .await
            .context("openai response was not json")?;

        response["choices"][0]["message"]["content"]
            .as_str()
            .map(|content| content.trim().to_string())
            .context("openai response had no message content")
    }

    async fn complete_anthropic(&self, request: &CompletionRequest) -> Result<String> {
        let messages = request
            .turns
            .iter()
            .map(|turn| json!({ "role": turn.role.as_str(), "content": turn.content }))
            .collect::<Vec<_>>();

        let body = json!({
            "model": self.config.model,
            "system": request.system,
            "messages": messages,
            "temperature": self.config.temperature,
            "max_tokens": self.config.max_tokens,
        });

        let response: Value = self
            .http
            .post(format!("{}/v1/messages", self.base_url("https://api.anthropic.com")))
            .header("x-api-key", self.api_key()?)
            .header("anthropic-version", "2023-06-01")
            .json(&body)
            .send()
            .await
            .context("anthropic request failed")?
            .error_for_status()
            .context("anthropic returned an error status")?
            .json()
            .await
            .context("anthropic response was not json")?;

        response["content"][0]["text"]
            .as_str()
            .map(|content| content.trim().to_string())
            .context("anthropic response had no text content")
    }

    async fn complete_ollama(&self, request: &CompletionRequest) -> Result<String> {
        let mut messages = vec![json!({ "role": "system", "content": request.system })];
        for turn in &request.turns {
            messages.push(json!({ "role": turn.role.as_str(), "content": turn.content }));
        }

        let body = json!({
            "model": self.config.model,
            "messages": messages,
            "stream": false,
            "options": { "temperature": self.config.temperature },
        });

        let response: Value = self
            .http
            .post(format!("{}/api/chat", self.base_url("http://localhost:11434")))
            .json(&body)
            .send()
            .await
            .context("ollama request failed")?
            .error_for_status()
            .context("ollama returned an error status")?
            .json()
            .await
            .context("ollama response was not json")?;

        response["message"]["content"]
            .as_str()
            .map(|content| content.trim().to_string())
            .context("ollama response had no message content")
    }
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        match self.config.provider {
            LlmProvider::OpenAi => self.complete_openai(request).await,
            LlmProvider::Anthropic => self.complete_anthropic(request).await,
            LlmProvider::Ollama => self.complete_ollama(request).await,
        }
    }
}

/// Build the configured client, or the disabled stub when the LLM is off.
pub fn client_from_config(config: &LlmConfig) -> Result<std::sync::Arc<dyn LlmClient>> {
    if !config.enabled {
        return Ok(std::sync::Arc::new(DisabledLlm));
    }
    Ok(std::sync::Arc::new(HttpLlmClient::new(config.clone())?))
}
