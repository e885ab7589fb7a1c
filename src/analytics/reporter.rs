//! Analytics reporter: aggregation over the request event log.
//!
//! Reads the JSONL event log and provides:
//! - **Stats**: totals, error rate, per-endpoint latency, model usage
//! - **Trends**: daily request counts and error rates

use std::collections::HashMap;

use crate::analytics::events::RequestEvent;

// ---------------------------------------------------------------------------
// Aggregated stats
// ---------------------------------------------------------------------------

/// Summary statistics for `wastemeter stats`.
#[derive(Debug, Default)]
pub struct Stats {
    pub total_requests: usize,
    pub error_requests: usize,
    pub avg_duration_ms: f64,
    pub endpoint_stats: Vec<EndpointStat>,
    /// `(model, calls)`, most used first.
    pub model_usage: Vec<(String, usize)>,
}

impl Stats {
    /// Error share in percent, 0.0 when there were no requests.
    pub fn error_pct(&self) -> f64 {
        pct(self.error_requests, self.total_requests)
    }
}

/// Per-endpoint aggregated statistics.
#[derive(Debug, Clone)]
pub struct EndpointStat {
    pub endpoint: String,
    pub count: usize,
    pub errors: usize,
    pub avg_duration_ms: f64,
    pub max_duration_ms: u64,
}

/// A single day in the trend.
#[derive(Debug, Clone)]
pub struct TrendEntry {
    pub date: String,
    pub requests: usize,
    pub errors: usize,
    pub avg_duration_ms: f64,
}

fn pct(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        (part as f64 / total as f64) * 100.0
    }
}

fn mean_duration(events: &[&RequestEvent]) -> f64 {
    if events.is_empty() {
        0.0
    } else {
        events.iter().map(|e| e.duration_ms as f64).sum::<f64>() / events.len() as f64
    }
}

// ---------------------------------------------------------------------------
// Stats computation
// ---------------------------------------------------------------------------

pub fn build_stats(events: &[RequestEvent]) -> Stats {
    if events.is_empty() {
        return Stats::default();
    }

    let all: Vec<&RequestEvent> = events.iter().collect();

    Stats {
        total_requests: events.len(),
        error_requests: events.iter().filter(|e| e.is_error()).count(),
        avg_duration_ms: mean_duration(&all),
        endpoint_stats: compute_endpoint_stats(events),
        model_usage: compute_model_usage(events),
    }
}

/// Group by endpoint; busiest first, ties by name.
fn compute_endpoint_stats(events: &[RequestEvent]) -> Vec<EndpointStat> {
    let mut groups: HashMap<&str, Vec<&RequestEvent>> = HashMap::new();
    for event in events {
        groups.entry(&event.endpoint).or_default().push(event);
    }

    let mut stats: Vec<EndpointStat> = groups
        .into_iter()
        .map(|(endpoint, group)| EndpointStat {
            endpoint: endpoint.to_string(),
            count: group.len(),
            errors: group.iter().filter(|e| e.is_error()).count(),
            avg_duration_ms: mean_duration(&group),
            max_duration_ms: group.iter().map(|e| e.duration_ms).max().unwrap_or(0),
        })
        .collect();

    stats.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.endpoint.cmp(&b.endpoint)));
    stats
}

fn compute_model_usage(events: &[RequestEvent]) -> Vec<(String, usize)> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for model in events.iter().filter_map(|e| e.model.as_deref()) {
        *counts.entry(model).or_default() += 1;
    }

    let mut usage: Vec<(String, usize)> = counts
        .into_iter()
        .map(|(model, n)| (model.to_string(), n))
        .collect();
    usage.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    usage
}

// ---------------------------------------------------------------------------
// Trends
// ---------------------------------------------------------------------------

/// Daily request counts, oldest day first.
pub fn build_trends(events: &[RequestEvent]) -> Vec<TrendEntry> {
    let mut daily: HashMap<&str, Vec<&RequestEvent>> = HashMap::new();
    for event in events {
        daily.entry(event.date()).or_default().push(event);
    }

    let mut trends: Vec<TrendEntry> = daily
        .into_iter()
        .map(|(date, group)| TrendEntry {
            date: date.to_string(),
            requests: group.len(),
            errors: group.iter().filter(|e| e.is_error()).count(),
            avg_duration_ms: mean_duration(&group),
        })
        .collect();

    trends.sort_by(|a, b| a.date.cmp(&b.date));
    trends
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn event(ts: &str, endpoint: &str, status: u16, ms: u64, model: Option<&str>) -> RequestEvent {
        RequestEvent {
            timestamp: ts.to_string(),
            endpoint: endpoint.to_string(),
            method: "GET".to_string(),
            status,
            duration_ms: ms,
            model: model.map(str::to_string),
        }
    }

    fn sample_events() -> Vec<RequestEvent> {
        vec![
            event("2025-01-15T10:00:00+00:00", "/api/metrics", 200, 2, None),
            event("2025-01-15T10:00:03+00:00", "/api/metrics", 200, 4, None),
            event("2025-01-15T10:01:00+00:00", "/api/chat", 200, 900, Some("gpt-4o-mini")),
            event("2025-01-16T09:00:00+00:00", "/api/analysis", 502, 30_000, Some("llama-3.1-8b-instant")),
            event("2025-01-16T09:05:00+00:00", "/api/chat", 400, 1, None),
        ]
    }

    #[test]
    fn stats_totals() {
        let stats = build_stats(&sample_events());
        assert_eq!(stats.total_requests, 5);
        assert_eq!(stats.error_requests, 2);
        assert_eq!(stats.error_pct(), 40.0);
        assert!((stats.avg_duration_ms - 6181.4).abs() < 1e-9);
    }

    #[test]
    fn endpoints_sorted_by_traffic() {
        let stats = build_stats(&sample_events());
        let names: Vec<&str> = stats.endpoint_stats.iter().map(|s| s.endpoint.as_str()).collect();
        assert_eq!(names, ["/api/chat", "/api/metrics", "/api/analysis"]);

        let chat = &stats.endpoint_stats[0];
        assert_eq!(chat.count, 2);
        assert_eq!(chat.errors, 1);
        assert_eq!(chat.max_duration_ms, 900);
    }

    #[test]
    fn model_usage_counts_proxied_calls() {
        let stats = build_stats(&sample_events());
        assert_eq!(stats.model_usage.len(), 2);
        assert!(stats.model_usage.iter().all(|(_, n)| *n == 1));
    }

    #[test]
    fn empty_log_is_zero() {
        let stats = build_stats(&[]);
        assert_eq!(stats.total_requests, 0);
        assert_eq!(stats.error_pct(), 0.0);
        assert!(build_trends(&[]).is_empty());
    }

    #[test]
    fn trends_group_by_day() {
        let trends = build_trends(&sample_events());
        assert_eq!(trends.len(), 2);
        assert_eq!(trends[0].date, "2025-01-15");
        assert_eq!(trends[0].requests, 3);
        assert_eq!(trends[1].errors, 2);
    }
}
