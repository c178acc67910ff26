//! Chat-completion client abstraction.
//!
//! The [`ChatModel`] trait decouples the arbiter from the HTTP backend. Tests
//! use scripted models that replay canned replies.

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use reqwest::blocking::Client;
use serde_json::{Value, json};
use tracing::{debug, instrument};

use crate::io::config::LlmConfig;

const ERROR_BODY_LIMIT: usize = 2000;
const DEFAULT_API_KEY: &str = "dummy";

/// One system + user exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRequest {
    pub system: String,
    pub user: String,
}

/// Abstraction over chat-completion backends.
pub trait ChatModel {
    /// Return the raw assistant content for `request`.
    fn complete(&self, request: &ChatRequest) -> Result<String>;
}

/// OpenAI-compatible `/v1/chat/completions` client.
pub struct HttpChatModel {
    client: Client,
    url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: f64,
}

impl HttpChatModel {
    /// Build a client; the bearer token is read from the env var named in `config`.
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_KEY.to_string());
        Self::new(config, api_key)
    }

    pub fn new(config: &LlmConfig, api_key: String) -> Result<Self> {
        let timeout = Duration::try_from_secs_f64(config.timeout_secs)
            .context("llm.timeout_secs out of range")?;
        let client = Client::builder()
            .no_proxy()
            .timeout(timeout)
            .build()
            .context("build http client")?;
        Ok(Self {
            client,
            url: chat_completions_url(&config.base_url),
            api_key,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }

    fn payload(&self, request: &ChatRequest) -> Value {
        json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": request.system},
                {"role": "user", "content": request.user},
            ],
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
            "stream": false,
            "response_format": {"type": "json_object"},
            "stop": ["```"],
        })
    }
}

impl ChatModel for HttpChatModel {
    #[instrument(skip_all, fields(url = %self.url, model = %self.model))]
    fn complete(&self, request: &ChatRequest) -> Result<String> {
        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&self.payload(request))
            .send()
            .with_context(|| format!("POST {}", self.url))?;

        let status = response.status();
        let body = response
            .text()
            .with_context(|| format!("read response body from {}", self.url))?;
        if !status.is_success() {
            return Err(anyhow!(
                "chat completion returned {status}: {}",
                truncate(&body, ERROR_BODY_LIMIT)
            ));
        }
        debug!(bytes = body.len(), "chat completion response");

        let parsed: Value = serde_json::from_str(&body).context("parse chat completion body")?;
        extract_content(&parsed)
            .map(str::to_string)
            .ok_or_else(|| anyhow!("chat completion has no message content"))
    }
}

/// Normalize a base URL (with or without a `/v1` suffix) to the completions endpoint.
pub fn chat_completions_url(base_url: &str) -> String {
    let mut base = base_url.trim().trim_end_matches('/');
    if let Some(stripped) = base.strip_suffix("/v1") {
        base = stripped.trim_end_matches('/');
    }
    format!("{base}/v1/chat/completions")
}

fn extract_content(body: &Value) -> Option<&str> {
    let choice = body.get("choices")?.get(0)?;
    choice
        .pointer("/message/content")
        .and_then(Value::as_str)
        .or_else(|| choice.get("text").and_then(Value::as_str))
}

fn truncate(value: &str, max_chars: usize) -> String {
    value.chars().take(max_chars).collect()
}
