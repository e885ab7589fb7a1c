/// LLM proxies: prompt analysis and the sustainability chat assistant.
///
/// Both proxies forward to an OpenAI-compatible chat-completions endpoint
/// configured under `[llm.analysis]` and `[llm.chat]`. The API key is read
/// from the environment variable named by `api_key_env`; it never lives in
/// the config file.
///
/// # Flow
///
/// 1. Validate the caller's input (non-empty prompt or message).
/// 2. Build messages from the templates in [`prompts`].
/// 3. Call the backend once. No retries: upstream errors are returned to the
///    caller, who reports them and keeps serving.
/// 4. For analysis, parse the reply as JSON with a raw-text fallback.
use std::time::Instant;

use anyhow::{Result, bail};
use serde::Serialize;

pub mod client;
pub mod prompts;
pub mod validation;

use client::{ChatBackend, ChatMessage};
use prompts::{AnalysisType, build_analysis_messages, build_chat_messages};
use validation::{check_non_empty, parse_analysis, sanitize_history};

/// Result of a prompt analysis.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResult {
    /// Parsed JSON object, or `{"raw_analysis": ...}`.
    pub analysis: serde_json::Value,
    pub model: String,
    pub usage: Option<serde_json::Value>,
    #[serde(skip)]
    pub latency_ms: u64,
}

/// Result of a chat turn.
#[derive(Debug, Clone, Serialize)]
pub struct ChatResult {
    pub response: String,
    pub usage: Option<serde_json::Value>,
    #[serde(skip)]
    pub model: String,
    #[serde(skip)]
    pub latency_ms: u64,
}

/// Ask the backend to analyze `prompt` through the given lens.
pub fn analyze_prompt(
    backend: &dyn ChatBackend,
    prompt: &str,
    analysis: AnalysisType,
) -> Result<AnalysisResult> {
    if prompt.trim().is_empty() {
        bail!("Prompt is required");
    }

    let (system, user) = build_analysis_messages(prompt, analysis);
    let messages = [ChatMessage::system(system), ChatMessage::user(user)];

    let start = Instant::now();
    let completion = backend.complete(&messages)?;
    let latency_ms = start.elapsed().as_millis() as u64;

    tracing::debug!(
        model = %completion.model,
        %analysis,
        latency_ms,
        "analysis completed"
    );

    Ok(AnalysisResult {
        analysis: parse_analysis(&completion.content),
        model: completion.model,
        usage: completion.usage,
        latency_ms,
    })
}

/// One chat turn with the sustainability assistant.
pub fn chat(
    backend: &dyn ChatBackend,
    message: &str,
    history: Vec<ChatMessage>,
) -> Result<ChatResult> {
    if message.trim().is_empty() {
        bail!("Message is required");
    }

    let messages = build_chat_messages(message, &sanitize_history(history));

    let start = Instant::now();
    let completion = backend.complete(&messages)?;
    let latency_ms = start.elapsed().as_millis() as u64;
    check_non_empty(&completion.content)?;

    tracing::debug!(model = %completion.model, latency_ms, "chat completed");

    Ok(ChatResult {
        response: completion.content.trim().to_string(),
        usage: completion.usage,
        model: completion.model,
        latency_ms,
    })
}
