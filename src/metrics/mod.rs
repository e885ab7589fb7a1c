//! Metric aggregation engine.
//!
//! Every computation here is a pure function over an ordered slice of
//! [`TimestampedRecord`](crate::store::record::TimestampedRecord)s: no I/O,
//! no clocks, no shared state. Callers pass `now` explicitly.

pub mod abandonment;
pub mod excess;
pub mod latency;
pub mod redundancy;
pub mod refinement;
pub mod score;
pub mod similarity;
pub mod snapshot;
pub mod tier;
pub mod window;

pub use snapshot::{MetricsSnapshot, Streams};

/// Length of the text previews attached to "recent" entries.
pub const PREVIEW_CHARS: usize = 50;

/// First [`PREVIEW_CHARS`] characters, with an ellipsis when cut.
pub fn preview(text: &str) -> String {
    match text.char_indices().nth(PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_keeps_short_text() {
        assert_eq!(preview("short"), "short");
        assert_eq!(preview(&"x".repeat(50)), "x".repeat(50));
    }

    #[test]
    fn preview_cuts_on_char_boundary() {
        let text = "é".repeat(60);
        let cut = preview(&text);
        assert_eq!(cut.chars().count(), 53);
        assert!(cut.ends_with("..."));
    }
}
