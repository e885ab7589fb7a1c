/// OpenAI-compatible chat-completions client.
///
/// Talks to any provider exposing `POST {base_url}/chat/completions` with
/// bearer-token auth (Groq, OpenAI, local gateways) using the synchronous
/// `ureq` HTTP client. Provides:
///
/// - **Chat**: send system + history + user messages, get the first choice.
/// - **Reachability**: `GET {base_url}/models` for `wastemeter health`.
use std::fmt;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::config::schema::LlmEndpointConfig;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// A single message in a chat conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    /// Build a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    /// Build a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    /// Build an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// Request body for `POST /chat/completions`.
#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f64,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<serde_json::Value>,
    #[serde(default)]
    model: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}

/// Error body most providers return on non-2xx responses.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

/// A completed chat turn.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub content: String,
    /// Token usage as reported by the provider, passed through untouched.
    pub usage: Option<serde_json::Value>,
    pub model: String,
}

/// The provider answered with a non-2xx status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamStatus {
    pub status: u16,
    pub message: String,
}

impl fmt::Display for UpstreamStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "upstream returned {}: {}", self.status, self.message)
    }
}

impl std::error::Error for UpstreamStatus {}

// ---------------------------------------------------------------------------
// Backend seam
// ---------------------------------------------------------------------------

/// Anything that can complete a chat conversation.
pub trait ChatBackend {
    fn complete(&self, messages: &[ChatMessage]) -> Result<Completion>;
    fn model_name(&self) -> &str;
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Synchronous chat-completions client for one configured endpoint.
///
/// Built per request from the live config, so config edits apply to the
/// next call without a restart.
#[derive(Debug)]
pub struct ChatClient {
    base_url: String,
    model: String,
    api_key: String,
    temperature: f64,
    max_tokens: u32,
    timeout: Duration,
}

impl ChatClient {
    /// Build a client, reading the API key from the endpoint's env var.
    pub fn from_endpoint(endpoint: &LlmEndpointConfig, timeout_ms: u64) -> Result<Self> {
        let api_key = std::env::var(&endpoint.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .with_context(|| format!("{} is not set", endpoint.api_key_env))?;
        Ok(Self::with_key(endpoint, timeout_ms, api_key))
    }

    /// Build a client with an explicit key.
    pub fn with_key(endpoint: &LlmEndpointConfig, timeout_ms: u64, api_key: String) -> Self {
        Self {
            base_url: endpoint.base_url.trim_end_matches('/').to_string(),
            model: endpoint.model.clone(),
            api_key,
            temperature: endpoint.temperature,
            max_tokens: endpoint.max_tokens,
            timeout: Duration::from_millis(timeout_ms),
        }
    }

    /// Check whether the provider answers an authenticated `GET /models`.
    ///
    /// Uses a short timeout (5 s) so `wastemeter health` doesn't stall.
    pub fn is_reachable(&self) -> bool {
        let url = format!("{}/models", self.base_url);
        ureq::get(&url)
            .timeout(Duration::from_secs(5))
            .set("Authorization", &format!("Bearer {}", self.api_key))
            .call()
            .is_ok()
    }
}

impl ChatBackend for ChatClient {
    fn complete(&self, messages: &[ChatMessage]) -> Result<Completion> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = ChatRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let resp = match ureq::post(&url)
            .timeout(self.timeout)
            .set("Authorization", &format!("Bearer {}", self.api_key))
            .send_json(&body)
        {
            Ok(resp) => resp,
            Err(ureq::Error::Status(status, resp)) => {
                let message = resp
                    .into_json::<ErrorBody>()
                    .map(|b| b.error.message)
                    .unwrap_or_else(|_| "request rejected".to_string());
                return Err(UpstreamStatus { status, message }.into());
            }
            Err(e) => return Err(e).context("chat completion request failed"),
        };

        let parsed: ChatResponse = resp
            .into_json()
            .context("failed to parse chat completion response")?;

        let Some(choice) = parsed.choices.into_iter().next() else {
            bail!("chat completion returned no choices");
        };

        Ok(Completion {
            content: choice.message.content,
            usage: parsed.usage,
            model: parsed.model.unwrap_or_else(|| self.model.clone()),
        })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
