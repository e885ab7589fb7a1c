//! Latency per token, with per prompt-type medians for outlier detection.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::config::schema::ThresholdsConfig;
use crate::metrics::preview;
use crate::metrics::tier::{Tier, TierCounts};
use crate::store::record::{Millis, TimestampedRecord};
use crate::utils::token_counter;

/// Coarse prompt shape, inferred from wording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptType {
    Code,
    Explanation,
    List,
    Summary,
    Boolean,
    General,
}

impl PromptType {
    /// First keyword family that matches wins.
    pub fn classify(prompt: &str) -> Self {
        let lower = prompt.to_lowercase();
        let has = |words: &[&str]| words.iter().any(|w| lower.contains(w));

        if has(&["code", "function", "program"]) {
            Self::Code
        } else if has(&["explain", "describe", "how"]) {
            Self::Explanation
        } else if has(&["list", "enumerate", "show me"]) {
            Self::List
        } else if has(&["summarize", "brief", "short"]) {
            Self::Summary
        } else if has(&["yes", "no", "true", "false"]) {
            Self::Boolean
        } else {
            Self::General
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Code => "code",
            Self::Explanation => "explanation",
            Self::List => "list",
            Self::Summary => "summary",
            Self::Boolean => "boolean",
            Self::General => "general",
        }
    }
}

impl fmt::Display for PromptType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `latency / tokens`, or the raw latency when the prompt has no tokens.
pub fn latency_per_token(latency_ms: f64, tokens: f64) -> f64 {
    if tokens > 0.0 {
        latency_ms / tokens
    } else {
        latency_ms
    }
}

pub fn latency_tier(per_token_ms: f64, thresholds: &ThresholdsConfig) -> Tier {
    if per_token_ms <= thresholds.latency_efficient_max_ms {
        Tier::Efficient
    } else if per_token_ms <= thresholds.latency_moderate_max_ms {
        Tier::Moderate
    } else {
        Tier::Waste
    }
}

/// Upper median: `sorted[len / 2]`. `None` for an empty slice.
pub fn upper_median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    Some(sorted[sorted.len() / 2])
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LatencyEntry {
    pub id: u64,
    pub prompt: String,
    pub prompt_type: PromptType,
    pub latency_ms: f64,
    pub latency_per_token: f64,
    pub tokens: f64,
    pub tier: Tier,
    /// More than `latency_slow_factor` times its type's median.
    pub is_slow: bool,
    pub timestamp: Millis,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeLatency {
    pub count: usize,
    pub total_latency_ms: f64,
    pub average_per_token: f64,
    pub median_per_token: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LatencyAnalysis {
    pub average_latency_per_token: f64,
    pub total_interactions: usize,
    pub slow_interactions: usize,
    pub tier: Tier,
    pub distribution: TierCounts,
    pub recent_latencies: Vec<LatencyEntry>,
    pub type_stats: BTreeMap<PromptType, TypeLatency>,
}

pub fn analyze_latency(
    interactions: &[TimestampedRecord],
    thresholds: &ThresholdsConfig,
    recent_limit: usize,
) -> LatencyAnalysis {
    // (record, type, latency, tokens, per-token) for every timed interaction
    let measured: Vec<_> = interactions
        .iter()
        .filter_map(|r| {
            let latency = r.metadata.latency_ms?;
            let tokens = token_counter::count_words_as_tokens(&r.text);
            Some((
                r,
                PromptType::classify(&r.text),
                latency,
                tokens,
                latency_per_token(latency, tokens),
            ))
        })
        .collect();

    let mut by_type: BTreeMap<PromptType, Vec<f64>> = BTreeMap::new();
    for &(_, prompt_type, _, _, lpt) in &measured {
        by_type.entry(prompt_type).or_default().push(lpt);
    }
    let medians: BTreeMap<PromptType, f64> = by_type
        .iter()
        .filter_map(|(t, values)| upper_median(values).map(|m| (*t, m)))
        .collect();

    let mut entries = Vec::with_capacity(measured.len());
    let mut distribution = TierCounts::default();
    let mut type_stats: BTreeMap<PromptType, TypeLatency> = BTreeMap::new();
    let mut sum = 0.0;

    for &(record, prompt_type, latency, tokens, lpt) in &measured {
        let tier = latency_tier(lpt, thresholds);
        let median = medians.get(&prompt_type).copied().unwrap_or(lpt);
        let is_slow = lpt > median * thresholds.latency_slow_factor;
        distribution.record(tier);
        sum += lpt;

        let stats = type_stats.entry(prompt_type).or_default();
        stats.count += 1;
        stats.total_latency_ms += latency;
        stats.average_per_token += lpt;
        stats.median_per_token = median;

        entries.push(LatencyEntry {
            id: record.id,
            prompt: preview(&record.text),
            prompt_type,
            latency_ms: latency,
            latency_per_token: lpt,
            tokens,
            tier,
            is_slow,
            timestamp: record.timestamp,
        });
    }

    for stats in type_stats.values_mut() {
        stats.average_per_token /= stats.count as f64;
    }

    let count = entries.len();
    let average = if count > 0 { sum / count as f64 } else { 0.0 };
    let slow = entries.iter().filter(|e| e.is_slow).count();
    let skip = count.saturating_sub(recent_limit);

    LatencyAnalysis {
        average_latency_per_token: average,
        total_interactions: count,
        slow_interactions: slow,
        tier: latency_tier(average, thresholds),
        distribution,
        recent_latencies: entries.split_off(skip),
        type_stats,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::record::RecordKind;

    fn timed(prompt: &str, latency_ms: f64) -> TimestampedRecord {
        TimestampedRecord::new(RecordKind::Interaction, prompt, 0).with_latency(latency_ms)
    }

    #[test]
    fn classify_checks_families_in_order() {
        assert_eq!(PromptType::classify("Write a function"), PromptType::Code);
        // "explain" beats "list" because explanation is checked first
        assert_eq!(PromptType::classify("Explain and list"), PromptType::Explanation);
        assert_eq!(PromptType::classify("Enumerate the planets"), PromptType::List);
        assert_eq!(PromptType::classify("Summarize this"), PromptType::Summary);
        assert_eq!(PromptType::classify("True or false?"), PromptType::Boolean);
        assert_eq!(PromptType::classify("Capital of Peru"), PromptType::General);
    }

    #[test]
    fn per_token_falls_back_to_raw_latency() {
        assert_eq!(latency_per_token(1_000.0, 10.0), 100.0);
        assert_eq!(latency_per_token(1_000.0, 0.0), 1_000.0);
    }

    #[test]
    fn upper_median_picks_upper_middle() {
        assert_eq!(upper_median(&[]), None);
        assert_eq!(upper_median(&[3.0]), Some(3.0));
        assert_eq!(upper_median(&[4.0, 1.0, 3.0, 2.0]), Some(3.0));
        assert_eq!(upper_median(&[5.0, 1.0, 3.0]), Some(3.0));
    }

    #[test]
    fn tiers_are_inclusive_at_bounds() {
        let t = ThresholdsConfig::default();
        assert_eq!(latency_tier(50.0, &t), Tier::Efficient);
        assert_eq!(latency_tier(100.0, &t), Tier::Moderate);
        assert_eq!(latency_tier(100.5, &t), Tier::Waste);
    }

    #[test]
    fn outlier_is_flagged_slow_regardless_of_tier() {
        let t = ThresholdsConfig::default();
        // "capital of peru" -> 3 words -> 4 tokens
        let records = [
            timed("capital of peru", 40.0),
            timed("capital of peru", 40.0),
            timed("capital of peru", 100.0),
        ];
        let analysis = analyze_latency(&records, &t, 5);

        // per-token: 10, 10, 25 -> median 10, 25 > 20
        assert_eq!(analysis.slow_interactions, 1);
        assert!(analysis.recent_latencies[2].is_slow);
        assert_eq!(analysis.recent_latencies[2].tier, Tier::Efficient);
        assert_eq!(analysis.type_stats[&PromptType::General].median_per_token, 10.0);
    }

    #[test]
    fn untimed_interactions_are_skipped() {
        let t = ThresholdsConfig::default();
        let records = [
            TimestampedRecord::new(RecordKind::Interaction, "no timing", 0),
            timed("write code", 390.0),
        ];
        let analysis = analyze_latency(&records, &t, 5);
        assert_eq!(analysis.total_interactions, 1);
        // "write code" -> ceil(2 * 1.3) = 3 tokens
        assert_eq!(analysis.average_latency_per_token, 130.0);
        assert_eq!(analysis.tier, Tier::Waste);
    }

    #[test]
    fn empty_input_is_zero() {
        let analysis = analyze_latency(&[], &ThresholdsConfig::default(), 5);
        assert_eq!(analysis.average_latency_per_token, 0.0);
        assert_eq!(analysis.tier, Tier::Efficient);
        assert!(analysis.type_stats.is_empty());
    }
}
