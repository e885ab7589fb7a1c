/// Sanity checks on what goes to and comes back from the LLM.
///
/// Outbound: client-supplied chat history is filtered before it is forwarded.
/// Inbound: analysis replies are parsed as JSON, tolerating the code fences
/// and preamble small models like to add; anything unparseable is passed
/// back verbatim as `{"raw_analysis": ...}`.
use anyhow::{Result, anyhow};
use serde_json::{Value, json};

use super::client::ChatMessage;

/// Most history turns forwarded to the chat endpoint.
pub const MAX_HISTORY_TURNS: usize = 20;

/// The LLM response must contain at least one non-whitespace character.
pub fn check_non_empty(llm_output: &str) -> Result<()> {
    if llm_output.trim().is_empty() {
        return Err(anyhow!("LLM returned empty output"));
    }
    Ok(())
}

/// Parse an analysis reply into a JSON object.
///
/// Tries, in order: the whole reply, the reply with a surrounding Markdown code
/// fence removed, and the outermost `{...}` span. Falls back to
/// `{"raw_analysis": reply}`.
pub fn parse_analysis(reply: &str) -> Value {
    let candidates = [
        Some(reply.trim()),
        strip_code_fence(reply),
        outermost_object(reply),
    ];
    for candidate in candidates.into_iter().flatten() {
        if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(candidate) {
            return value;
        }
    }
    json!({ "raw_analysis": reply })
}

fn strip_code_fence(reply: &str) -> Option<&str> {
    let trimmed = reply.trim();
    let body = trimmed.strip_prefix("```")?.strip_suffix("```")?;
    // Drop an optional language tag on the opening fence.
    let body = match body.find('\n') {
        Some(newline) if !body[..newline].contains('{') => &body[newline + 1..],
        _ => body,
    };
    Some(body.trim())
}

fn outermost_object(reply: &str) -> Option<&str> {
    let start = reply.find('{')?;
    let end = reply.rfind('}')?;
    (start < end).then(|| &reply[start..=end])
}

/// Keep only user/assistant turns with content, newest last, capped at
/// [`MAX_HISTORY_TURNS`]. System turns from clients are dropped so the
/// persona cannot be overridden.
pub fn sanitize_history(history: Vec<ChatMessage>) -> Vec<ChatMessage> {
    let mut kept: Vec<ChatMessage> = history
        .into_iter()
        .filter(|m| matches!(m.role.as_str(), "user" | "assistant"))
        .filter(|m| !m.content.trim().is_empty())
        .collect();
    let skip = kept.len().saturating_sub(MAX_HISTORY_TURNS);
    kept.split_off(skip)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
