//! Output excess ratio: produced tokens over expected tokens.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::config::schema::ThresholdsConfig;
use crate::metrics::preview;
use crate::metrics::tier::{Tier, TierCounts};
use crate::store::record::{Millis, TimestampedRecord};

/// `[min, max]` is efficient, `(max, moderate_max]` moderate, everything else
/// (including undershooting `min`) waste.
pub fn excess_tier(ratio: f64, thresholds: &ThresholdsConfig) -> Tier {
    if ratio >= thresholds.excess_efficient_min && ratio <= thresholds.excess_efficient_max {
        Tier::Efficient
    } else if ratio > thresholds.excess_efficient_max && ratio <= thresholds.excess_moderate_max {
        Tier::Moderate
    } else {
        Tier::Waste
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExcessEntry {
    pub id: u64,
    pub prompt: String,
    pub actual_tokens: f64,
    pub expected_tokens: f64,
    pub ratio: f64,
    pub tier: Tier,
    pub category: String,
    pub timestamp: Millis,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryExcess {
    pub total_tokens: f64,
    pub average_ratio: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExcessAnalysis {
    /// Mean ratio over measurable records, 1.0 when there are none.
    pub average_ratio: f64,
    pub total_outputs: usize,
    pub measured_outputs: usize,
    pub tier: Tier,
    pub distribution: TierCounts,
    pub recent_excesses: Vec<ExcessEntry>,
    pub category_stats: BTreeMap<String, CategoryExcess>,
}

/// Measure every interaction that carries token counts.
///
/// Records without counts, or with a non-positive expected count, are not
/// measurable and contribute to neither the average nor the distribution.
pub fn analyze_excess(
    interactions: &[TimestampedRecord],
    thresholds: &ThresholdsConfig,
    recent_limit: usize,
) -> ExcessAnalysis {
    let mut entries = Vec::new();
    let mut distribution = TierCounts::default();
    let mut category_stats: BTreeMap<String, CategoryExcess> = BTreeMap::new();
    let mut ratio_sum = 0.0;

    for record in interactions {
        let (Some(actual), Some(expected)) =
            (record.metadata.actual_tokens, record.metadata.expected_tokens)
        else {
            continue;
        };
        if expected <= 0.0 {
            continue;
        }

        let ratio = actual / expected;
        let tier = excess_tier(ratio, thresholds);
        ratio_sum += ratio;
        distribution.record(tier);

        let stats = category_stats.entry(record.category.clone()).or_default();
        stats.total_tokens += actual;
        // Running sum for now, turned into a mean below.
        stats.average_ratio += ratio;
        stats.count += 1;

        entries.push(ExcessEntry {
            id: record.id,
            prompt: preview(&record.text),
            actual_tokens: actual,
            expected_tokens: expected,
            ratio,
            tier,
            category: record.category.clone(),
            timestamp: record.timestamp,
        });
    }

    for stats in category_stats.values_mut() {
        stats.average_ratio /= stats.count as f64;
    }

    let measured = entries.len();
    let average_ratio = if measured > 0 {
        ratio_sum / measured as f64
    } else {
        1.0
    };
    let skip = measured.saturating_sub(recent_limit);

    ExcessAnalysis {
        average_ratio,
        total_outputs: interactions.len(),
        measured_outputs: measured,
        tier: excess_tier(average_ratio, thresholds),
        distribution,
        recent_excesses: entries.split_off(skip),
        category_stats,
    }
}
