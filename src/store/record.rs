//! The timestamped record shared by every metric.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::utils::token_counter;

/// Milliseconds since the Unix epoch.
pub type Millis = i64;

/// Wall-clock time as [`Millis`].
pub fn now_millis() -> Millis {
    chrono::Utc::now().timestamp_millis()
}

/// Which conceptual stream a record belongs to.
///
/// - `Prompt` feeds redundancy and refinement-loop grouping.
/// - `Output` feeds reuse and abandonment.
/// - `Interaction` (a prompt with its response and timing) feeds excess ratio
///   and latency.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    #[default]
    Prompt,
    Output,
    Interaction,
}

impl RecordKind {
    pub const ALL: [RecordKind; 3] = [Self::Prompt, Self::Output, Self::Interaction];
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Prompt => write!(f, "prompt"),
            Self::Output => write!(f, "output"),
            Self::Interaction => write!(f, "interaction"),
        }
    }
}

/// Computation-specific fields. Every field is optional on the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RecordMetadata {
    /// Tokens actually produced by the response.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual_tokens: Option<f64>,
    /// Tokens the prompt called for.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_tokens: Option<f64>,
    /// End-to-end response latency.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<f64>,
    /// Whether the user did anything with an output (copy, follow-up, rate).
    pub has_interacted: bool,
    /// Declared response shape: `code`, `explanation`, `list`, `summary`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_type: Option<String>,
    /// Response text for interaction records.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
}

impl RecordMetadata {
    /// Field-wise merge where values set on `other` win.
    pub fn overlay(self, other: RecordMetadata) -> Self {
        Self {
            actual_tokens: other.actual_tokens.or(self.actual_tokens),
            expected_tokens: other.expected_tokens.or(self.expected_tokens),
            latency_ms: other.latency_ms.or(self.latency_ms),
            has_interacted: self.has_interacted || other.has_interacted,
            response_type: other.response_type.or(self.response_type),
            response: other.response.or(self.response),
        }
    }
}

/// Metric fields as they arrive on the wire: flat beside `text` and
/// `timestamp`, nested under `metadata`, or both. Nested values win.
#[derive(Debug, Default, Deserialize)]
pub struct MetricFields {
    #[serde(flatten)]
    flat: RecordMetadata,
    #[serde(default)]
    metadata: Option<RecordMetadata>,
}

impl MetricFields {
    pub fn into_metadata(self) -> RecordMetadata {
        match self.metadata {
            Some(nested) => self.flat.overlay(nested),
            None => self.flat,
        }
    }
}

/// A single observed prompt, output, or interaction.
///
/// Serializes with metric fields under `metadata`; deserializes through
/// `RawRecord`, which also accepts them flat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawRecord")]
pub struct TimestampedRecord {
    /// Creation-time based, strictly increasing within a store.
    pub id: u64,
    pub text: String,
    pub category: String,
    pub timestamp: Millis,
    pub kind: RecordKind,
    pub metadata: RecordMetadata,
}

#[derive(Deserialize)]
struct RawRecord {
    #[serde(default)]
    id: u64,
    #[serde(alias = "content", alias = "prompt")]
    text: String,
    #[serde(default = "default_category")]
    category: String,
    timestamp: Millis,
    #[serde(default, alias = "type")]
    kind: RecordKind,
    #[serde(flatten)]
    fields: MetricFields,
}

impl From<RawRecord> for TimestampedRecord {
    fn from(raw: RawRecord) -> Self {
        Self {
            id: raw.id,
            text: raw.text,
            category: raw.category,
            timestamp: raw.timestamp,
            kind: raw.kind,
            metadata: raw.fields.into_metadata(),
        }
    }
}

pub fn default_category() -> String {
    "general".to_string()
}

impl TimestampedRecord {
    pub fn new(kind: RecordKind, text: impl Into<String>, timestamp: Millis) -> Self {
        Self {
            id: 0,
            text: text.into(),
            category: default_category(),
            timestamp,
            kind,
            metadata: RecordMetadata::default(),
        }
    }

    pub fn with_id(mut self, id: u64) -> Self {
        self.id = id;
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_tokens(mut self, actual: f64, expected: f64) -> Self {
        self.metadata.actual_tokens = Some(actual);
        self.metadata.expected_tokens = Some(expected);
        self
    }

    pub fn with_latency(mut self, latency_ms: f64) -> Self {
        self.metadata.latency_ms = Some(latency_ms);
        self
    }

    pub fn with_response(mut self, response: impl Into<String>) -> Self {
        self.metadata.response = Some(response.into());
        self
    }

    pub fn with_response_type(mut self, response_type: impl Into<String>) -> Self {
        self.metadata.response_type = Some(response_type.into());
        self
    }

    pub fn interacted(mut self) -> Self {
        self.metadata.has_interacted = true;
        self
    }

    /// Age of the record relative to `now`, never negative.
    pub fn age(&self, now: Millis) -> Millis {
        (now - self.timestamp).max(0)
    }

    /// Fill in token counts an interaction did not carry.
    ///
    /// `actual_tokens` comes from the response text, `expected_tokens` from
    /// the prompt wording. Existing values are left alone.
    pub fn fill_token_estimates(&mut self) {
        if self.kind != RecordKind::Interaction {
            return;
        }
        if self.metadata.actual_tokens.is_none()
            && let Some(response) = &self.metadata.response
        {
            self.metadata.actual_tokens = Some(token_counter::count_words_as_tokens(response));
        }
        if self.metadata.expected_tokens.is_none() && self.metadata.actual_tokens.is_some() {
            let response_type = self.metadata.response_type.as_deref().unwrap_or("general");
            self.metadata.expected_tokens = Some(token_counter::estimate_expected_tokens(
                &self.text,
                response_type,
            ));
        }
    }
}

/// Parse a JSONL records file: one [`TimestampedRecord`] per non-blank line.
pub fn parse_jsonl(content: &str) -> Result<Vec<TimestampedRecord>> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            serde_json::from_str::<TimestampedRecord>(line)
                .with_context(|| format!("invalid record on line {}", index + 1))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_jsonl_skips_blank_lines_and_reports_bad_ones() {
        let content = "{\"text\":\"a\",\"timestamp\":1}\n\n{\"prompt\":\"b\",\"timestamp\":2}\n";
        let records = parse_jsonl(content).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].text, "b");

        let err = parse_jsonl("{\"text\":\"a\",\"timestamp\":1}\n{oops}").unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn deserializes_content_alias_and_defaults() {
        let json = r#"{"content": "Paris is the capital", "timestamp": 1000, "kind": "output"}"#;
        let record: TimestampedRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.text, "Paris is the capital");
        assert_eq!(record.category, "general");
        assert_eq!(record.kind, RecordKind::Output);
        assert!(!record.metadata.has_interacted);
    }

    #[test]
    fn metric_fields_are_read_flat_or_nested() {
        let content = r#"
{"text":"summarize this","timestamp":1,"type":"interaction","actualTokens":150,"expectedTokens":50,"latencyMs":900}
{"text":"an answer","timestamp":2,"type":"output","hasInteracted":true}
{"text":"both","timestamp":3,"type":"interaction","latencyMs":10,"actualTokens":5,"metadata":{"latencyMs":20}}
"#;
        let records = parse_jsonl(content).unwrap();

        assert_eq!(records[0].metadata.actual_tokens, Some(150.0));
        assert_eq!(records[0].metadata.expected_tokens, Some(50.0));
        assert_eq!(records[0].metadata.latency_ms, Some(900.0));
        assert!(records[1].metadata.has_interacted);
        // nested values win, flat ones fill the gaps
        assert_eq!(records[2].metadata.latency_ms, Some(20.0));
        assert_eq!(records[2].metadata.actual_tokens, Some(5.0));
    }

    #[test]
    fn serializes_metric_fields_nested() {
        let record = TimestampedRecord::new(RecordKind::Interaction, "hi", 1).with_latency(30.0);
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["metadata"]["latencyMs"], 30.0);
        assert!(value.get("latencyMs").is_none());

        let back: TimestampedRecord = serde_json::from_value(value).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn age_is_clamped_at_zero() {
        let record = TimestampedRecord::new(RecordKind::Prompt, "hi", 5_000);
        assert_eq!(record.age(8_000), 3_000);
        assert_eq!(record.age(1_000), 0);
    }

    #[test]
    fn fill_token_estimates_uses_response_and_prompt() {
        let mut record = TimestampedRecord::new(RecordKind::Interaction, "List 3 languages", 0)
            .with_response("Python JavaScript Java")
            .with_response_type("list");
        record.fill_token_estimates();

        // ceil(3 words * 1.3) = 4
        assert_eq!(record.metadata.actual_tokens, Some(4.0));
        // "list" -> 100, list response type -> x0.8
        assert_eq!(record.metadata.expected_tokens, Some(80.0));
    }

    #[test]
    fn fill_token_estimates_keeps_explicit_values() {
        let mut record = TimestampedRecord::new(RecordKind::Interaction, "anything", 0)
            .with_tokens(150.0, 50.0)
            .with_response("short");
        record.fill_token_estimates();
        assert_eq!(record.metadata.actual_tokens, Some(150.0));
        assert_eq!(record.metadata.expected_tokens, Some(50.0));
    }

    #[test]
    fn fill_token_estimates_ignores_prompts() {
        let mut record =
            TimestampedRecord::new(RecordKind::Prompt, "explain", 0).with_response("x y z");
        record.fill_token_estimates();
        assert_eq!(record.metadata.actual_tokens, None);
    }
}
