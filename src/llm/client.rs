// Claude Messages API client used for candidate re-ranking.
//
// One non-streaming request per recommendation. The reply's text blocks are
// concatenated and handed back for parsing; nothing here interprets them.

use std::time::Duration;

use serde_json::Value;
use tracing::debug;

use crate::config::Config;
use crate::llm::LlmError;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

const ANTHROPIC_VERSION: &str = "2023-06-01";

// ---------------------------------------------------------------------------
// ClaudeClient
// ---------------------------------------------------------------------------

/// Low-level Claude API client.
pub struct ClaudeClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    messages_url: String,
    max_tokens: u32,
    temperature: f64,
    timeout: Duration,
}

impl ClaudeClient {
    pub fn new(
        api_key: String,
        model: String,
        api_base: &str,
        max_tokens: u32,
        temperature: f64,
        timeout: Duration,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
            model,
            messages_url: format!("{}/v1/messages", api_base.trim_end_matches('/')),
            max_tokens,
            temperature,
            timeout,
        }
    }

    /// Send one system + user message pair and return the reply text.
    pub async fn complete(&self, system: &str, user_content: &str) -> Result<String, LlmError> {
        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
            "system": system,
            "messages": [{ "role": "user", "content": user_content }]
        });

        let response = self
            .http
            .post(&self.messages_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(LlmError::Status(status.as_u16()));
        }

        let json: Value = response.json().await.map_err(map_reqwest_error)?;
        if let Some((input, output)) = parse_usage(&json) {
            debug!(input_tokens = input, output_tokens = output, "LLM call complete");
        }
        extract_text(&json).ok_or_else(|| LlmError::Decode("no text content blocks".into()))
    }
}

fn map_reqwest_error(e: reqwest::Error) -> LlmError {
    if e.is_timeout() {
        LlmError::Timeout
    } else if e.is_decode() {
        LlmError::Decode(e.to_string())
    } else {
        LlmError::Transport(e.to_string())
    }
}

// ---------------------------------------------------------------------------
// LlmClient wrapper
// ---------------------------------------------------------------------------

/// Either an active Claude client or disabled for lack of an API key.
pub enum LlmClient {
    Active(ClaudeClient),
    Disabled,
}

impl LlmClient {
    /// `Active` when credentials carry a non-blank key, otherwise `Disabled`.
    pub fn from_config(config: &Config) -> Self {
        match config.api_key() {
            Some(key) => {
                let llm = &config.strategy.llm;
                LlmClient::Active(ClaudeClient::new(
                    key.to_string(),
                    llm.model.clone(),
                    &llm.api_base,
                    llm.max_tokens,
                    llm.temperature,
                    Duration::from_secs(llm.timeout_secs),
                ))
            }
            None => LlmClient::Disabled,
        }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, LlmClient::Active(_))
    }

    pub async fn complete(&self, system: &str, user_content: &str) -> Result<String, LlmError> {
        match self {
            LlmClient::Active(client) => client.complete(system, user_content).await,
            LlmClient::Disabled => Err(LlmError::NotConfigured),
        }
    }
}

// ---------------------------------------------------------------------------
// Response parsing helpers
// ---------------------------------------------------------------------------

/// Concatenate the `text` of every text content block.
///
/// Expected shape: `{ "content": [ { "type": "text", "text": "..." } ] }`
pub(crate) fn extract_text(v: &Value) -> Option<String> {
    let blocks = v.get("content")?.as_array()?;
    let texts: Vec<&str> = blocks
        .iter()
        .filter(|b| b.get("type").and_then(Value::as_str) == Some("text"))
        .filter_map(|b| b.get("text").and_then(Value::as_str))
        .collect();
    if texts.is_empty() {
        None
    } else {
        Some(texts.concat())
    }
}

/// `(input_tokens, output_tokens)` from the `usage` object.
pub(crate) fn parse_usage(v: &Value) -> Option<(u64, u64)> {
    let usage = v.get("usage")?;
    Some((
        usage.get("input_tokens")?.as_u64()?,
        usage.get("output_tokens")?.as_u64()?,
    ))
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
