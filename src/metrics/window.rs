//! Sliding time-window retention.
//!
//! A record is kept while `now - timestamp <= window`. Eviction is lazy: the
//! store calls [`retain_within`] from the periodic sweep and whenever a fresh
//! snapshot is requested, never on a per-record timer.

use crate::store::record::{Millis, TimestampedRecord};

/// Whether a record timestamped `timestamp` is still inside the window.
pub fn is_within(timestamp: Millis, window_ms: u64, now: Millis) -> bool {
    now.saturating_sub(timestamp) <= i64::try_from(window_ms).unwrap_or(i64::MAX)
}

/// Drop records older than the window, preserving insertion order.
///
/// Returns the number of records evicted.
pub fn retain_within(records: &mut Vec<TimestampedRecord>, window_ms: u64, now: Millis) -> usize {
    let before = records.len();
    records.retain(|r| is_within(r.timestamp, window_ms, now));
    before - records.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::record::RecordKind;

    fn records_at(timestamps: &[Millis]) -> Vec<TimestampedRecord> {
        timestamps
            .iter()
            .enumerate()
            .map(|(i, &ts)| {
                TimestampedRecord::new(RecordKind::Prompt, format!("p{i}"), ts).with_id(i as u64 + 1)
            })
            .collect()
    }

    #[test]
    fn boundary_is_inclusive() {
        assert!(is_within(0, 1_000, 1_000));
        assert!(!is_within(0, 1_000, 1_001));
    }

    #[test]
    fn eviction_preserves_order() {
        let mut records = records_at(&[100, 5_000, 200, 9_000]);
        let evicted = retain_within(&mut records, 5_000, 10_000);

        assert_eq!(evicted, 2);
        let texts: Vec<&str> = records.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, vec!["p1", "p3"]);
    }

    #[test]
    fn eviction_is_idempotent() {
        let mut records = records_at(&[0, 2_000, 4_000, 6_000, 8_000]);
        retain_within(&mut records, 3_000, 8_000);
        let once = records.clone();
        let evicted = retain_within(&mut records, 3_000, 8_000);

        assert_eq!(evicted, 0);
        assert_eq!(records, once);
    }

    #[test]
    fn shorter_window_never_keeps_more() {
        let records = records_at(&[0, 1_000, 2_500, 4_000, 7_000, 9_999]);
        let mut previous = usize::MAX;
        for window in [20_000, 9_000, 6_000, 3_000, 1, 0] {
            let mut kept = records.clone();
            retain_within(&mut kept, window, 10_000);
            let kept = kept.len();
            assert!(kept <= previous, "window {window} kept {kept} > {previous}");
            previous = kept;
        }
    }

    #[test]
    fn empty_input_is_fine() {
        let mut records = Vec::new();
        assert_eq!(retain_within(&mut records, 1_000, 0), 0);
        assert!(records.is_empty());
    }

    #[test]
    fn future_timestamps_are_kept() {
        let mut records = records_at(&[20_000]);
        assert_eq!(retain_within(&mut records, 1_000, 10_000), 0);
        assert_eq!(records.len(), 1);
    }
}
