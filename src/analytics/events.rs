//! Request event record: one entry per HTTP request the dashboard serves.
//!
//! Events are what `wastemeter stats` summarizes: which endpoints are hit,
//! how often they fail, how long they take, and which upstream model served
//! the LLM proxies.
//!
//! Log file: `[logging] path`, default `~/.wastemeter/events.jsonl`

use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Event entry
// ---------------------------------------------------------------------------

/// A served request. One line per request in the event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestEvent {
    /// RFC 3339, UTC.
    pub timestamp: String,
    /// Path without query string (e.g. `"/api/metrics"`).
    pub endpoint: String,
    pub method: String,
    pub status: u16,
    pub duration_ms: u64,
    /// Upstream model, only set for the LLM proxies.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub model: Option<String>,
}

impl RequestEvent {
    /// Stamp a new event with the current time.
    pub fn new(method: &str, endpoint: &str, status: u16, elapsed: Duration) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            endpoint: endpoint.to_string(),
            method: method.to_string(),
            status,
            duration_ms: elapsed.as_millis() as u64,
            model: None,
        }
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }

    /// 4xx and 5xx responses.
    pub fn is_error(&self) -> bool {
        self.status >= 400
    }

    /// `YYYY-MM-DD` part of the timestamp, used for daily grouping.
    pub fn date(&self) -> &str {
        self.timestamp.get(..10).unwrap_or("unknown")
    }
}
