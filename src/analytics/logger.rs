use std::fs::{self, OpenOptions, create_dir_all};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::Utc;

use crate::analytics::events::RequestEvent;
use crate::config::schema::LoggingConfig;
use crate::utils::expand_home;

// ---------------------------------------------------------------------------
// Event log (JSONL)
// ---------------------------------------------------------------------------

/// Append-only JSONL request log.
///
/// A disabled log accepts events and drops them.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    path: Option<PathBuf>,
}

impl EventLog {
    pub fn from_config(config: &LoggingConfig) -> Self {
        if !config.enabled {
            return Self::disabled();
        }
        Self {
            path: Some(expand_home(&config.path)),
        }
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    pub fn disabled() -> Self {
        Self { path: None }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Record an event.
    ///
    /// Best-effort: failures are logged at debug level and otherwise ignored.
    pub fn record(&self, event: &RequestEvent) {
        let Some(path) = &self.path else {
            return;
        };
        if let Err(e) = append_event(path, event) {
            tracing::debug!(path = %path.display(), error = %e, "event log append failed");
        }
    }

    /// Read all events. Malformed lines are skipped; a missing file is empty.
    pub fn read_all(&self) -> Vec<RequestEvent> {
        let Some(path) = &self.path else {
            return Vec::new();
        };

        let Ok(file) = fs::File::open(path) else {
            return Vec::new();
        };

        BufReader::new(file)
            .lines()
            .map_while(Result::ok)
            .filter_map(|line| serde_json::from_str::<RequestEvent>(&line).ok())
            .collect()
    }

    /// Read events from the last `days` days. `None` returns everything.
    pub fn read_since_days(&self, days: Option<u32>) -> Vec<RequestEvent> {
        let events = self.read_all();

        let Some(days) = days else {
            return events;
        };

        let cutoff = (Utc::now() - chrono::Duration::days(i64::from(days))).to_rfc3339();

        events
            .into_iter()
            .filter(|e| e.timestamp >= cutoff)
            .collect()
    }
}

// ---------------------------------------------------------------------------
// File I/O
// ---------------------------------------------------------------------------

fn append_event(path: &Path, event: &RequestEvent) -> Result<()> {
    if let Some(parent) = path.parent() {
        create_dir_all(parent)?;
    }

    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    let json = serde_json::to_string(event)?;
    writeln!(file, "{json}")?;

    Ok(())
}
