//! Shared, time-windowed record store.
//!
//! One store owns every retained record, split per [`RecordKind`]. Metrics
//! never hold records of their own; they read slices of the store. The store
//! is not internally synchronized: the server wraps it in a single `Mutex`
//! and holds the lock across append + recompute.

pub mod record;

use anyhow::{Result, bail};

use crate::config::schema::WastemeterConfig;
use crate::metrics::snapshot::{MetricsSnapshot, Streams};
use crate::metrics::window;
use record::{Millis, RecordKind, TimestampedRecord};

#[derive(Debug, Clone)]
pub struct RecordStore {
    window_ms: u64,
    prompts: Vec<TimestampedRecord>,
    outputs: Vec<TimestampedRecord>,
    interactions: Vec<TimestampedRecord>,
    last_id: u64,
}

impl RecordStore {
    pub fn new(window_ms: u64) -> Self {
        Self {
            window_ms,
            prompts: Vec::new(),
            outputs: Vec::new(),
            interactions: Vec::new(),
            last_id: 0,
        }
    }

    pub fn window_ms(&self) -> u64 {
        self.window_ms
    }

    /// Change the retention window. Takes effect on the next sweep.
    pub fn set_window_ms(&mut self, window_ms: u64) {
        self.window_ms = window_ms;
    }

    /// Next id: creation time in millis, bumped past the previous id so ids
    /// stay strictly increasing even within one millisecond.
    fn next_id(&mut self, now: Millis) -> u64 {
        let candidate = u64::try_from(now).unwrap_or(0);
        self.last_id = candidate.max(self.last_id + 1);
        self.last_id
    }

    /// Insert a fully-formed record, assigning its id. Missing token counts on
    /// interactions are estimated. Returns the assigned id.
    pub fn insert(&mut self, mut record: TimestampedRecord, now: Millis) -> u64 {
        record.id = self.next_id(now);
        record.fill_token_estimates();
        let id = record.id;
        self.stream_mut(record.kind).push(record);
        id
    }

    /// Create and insert a record timestamped `now`.
    pub fn append(
        &mut self,
        kind: RecordKind,
        text: impl Into<String>,
        category: impl Into<String>,
        now: Millis,
    ) -> u64 {
        let record = TimestampedRecord::new(kind, text, now).with_category(category);
        self.insert(record, now)
    }

    /// Mark an output as interacted with. The flag never flips back.
    pub fn mark_interacted(&mut self, id: u64) -> Result<()> {
        match self.outputs.iter_mut().find(|r| r.id == id) {
            Some(record) => {
                record.metadata.has_interacted = true;
                Ok(())
            }
            None => bail!("No output with id {id} in the current window"),
        }
    }

    /// Evict everything older than the window. Returns the number evicted.
    pub fn sweep(&mut self, now: Millis) -> usize {
        let window_ms = self.window_ms;
        RecordKind::ALL
            .iter()
            .map(|&kind| window::retain_within(self.stream_mut(kind), window_ms, now))
            .sum()
    }

    pub fn records(&self, kind: RecordKind) -> &[TimestampedRecord] {
        match kind {
            RecordKind::Prompt => &self.prompts,
            RecordKind::Output => &self.outputs,
            RecordKind::Interaction => &self.interactions,
        }
    }

    fn stream_mut(&mut self, kind: RecordKind) -> &mut Vec<TimestampedRecord> {
        match kind {
            RecordKind::Prompt => &mut self.prompts,
            RecordKind::Output => &mut self.outputs,
            RecordKind::Interaction => &mut self.interactions,
        }
    }

    pub fn len(&self) -> usize {
        self.prompts.len() + self.outputs.len() + self.interactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn streams(&self) -> Streams<'_> {
        Streams {
            prompts: &self.prompts,
            outputs: &self.outputs,
            interactions: &self.interactions,
        }
    }

    /// Sweep, then recompute every metric from what is left.
    pub fn snapshot(&mut self, config: &WastemeterConfig, now: Millis) -> MetricsSnapshot {
        self.sweep(now);
        MetricsSnapshot::compute(self.streams(), config, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_strictly_increase_within_one_millisecond() {
        let mut store = RecordStore::new(60_000);
        let a = store.append(RecordKind::Prompt, "a", "general", 1_000);
        let b = store.append(RecordKind::Prompt, "b", "general", 1_000);
        let c = store.append(RecordKind::Output, "c", "general", 999);
        assert_eq!(a, 1_000);
        assert!(b > a);
        assert!(c > b);
    }

    #[test]
    fn records_are_split_by_kind() {
        let mut store = RecordStore::new(60_000);
        store.append(RecordKind::Prompt, "p", "general", 0);
        store.append(RecordKind::Output, "o", "general", 0);
        store.append(RecordKind::Output, "o2", "general", 0);

        assert_eq!(store.records(RecordKind::Prompt).len(), 1);
        assert_eq!(store.records(RecordKind::Output).len(), 2);
        assert_eq!(store.records(RecordKind::Interaction).len(), 0);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn sweep_evicts_across_streams() {
        let mut store = RecordStore::new(1_000);
        store.append(RecordKind::Prompt, "old", "general", 0);
        store.append(RecordKind::Output, "old", "general", 0);
        store.append(RecordKind::Prompt, "new", "general", 1_500);

        assert_eq!(store.sweep(2_000), 2);
        assert_eq!(store.records(RecordKind::Prompt)[0].text, "new");
        assert_eq!(store.sweep(2_000), 0);
    }

    #[test]
    fn mark_interacted_only_finds_outputs() {
        let mut store = RecordStore::new(60_000);
        let prompt = store.append(RecordKind::Prompt, "p", "general", 0);
        let output = store.append(RecordKind::Output, "o", "general", 0);

        assert!(store.mark_interacted(prompt).is_err());
        store.mark_interacted(output).unwrap();
        assert!(store.records(RecordKind::Output)[0].metadata.has_interacted);
        // idempotent
        store.mark_interacted(output).unwrap();
    }

    #[test]
    fn insert_fills_interaction_tokens() {
        let mut store = RecordStore::new(60_000);
        let record = TimestampedRecord::new(RecordKind::Interaction, "Summarize AI", 0)
            .with_response("AI is software that learns");
        store.insert(record, 0);

        let stored = &store.records(RecordKind::Interaction)[0];
        assert_eq!(stored.metadata.actual_tokens, Some(7.0));
        assert_eq!(stored.metadata.expected_tokens, Some(20.0));
    }

    #[test]
    fn snapshot_sweeps_first() {
        let config = WastemeterConfig::default();
        let mut store = RecordStore::new(1_000);
        store.append(RecordKind::Prompt, "same words", "general", 0);
        store.append(RecordKind::Prompt, "same words", "general", 5_000);

        let snapshot = store.snapshot(&config, 5_500);
        assert_eq!(snapshot.metrics.total_prompts, 1);
        assert_eq!(snapshot.metrics.redundancy_rate, 0.0);
    }
}
