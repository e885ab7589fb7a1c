//! Output abandonment: outputs nobody touched before the timeout.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::config::schema::ThresholdsConfig;
use crate::metrics::preview;
use crate::metrics::tier::{self, Tier, TierCounts};
use crate::store::record::{Millis, TimestampedRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputStatus {
    /// The user interacted with the output.
    Engaged,
    /// No interaction yet, still inside the timeout.
    Pending,
    /// No interaction and older than the timeout.
    Abandoned,
}

pub fn status(record: &TimestampedRecord, timeout_ms: u64, now: Millis) -> OutputStatus {
    if record.metadata.has_interacted {
        return OutputStatus::Engaged;
    }
    let timeout = i64::try_from(timeout_ms).unwrap_or(i64::MAX);
    if record.age(now) > timeout {
        OutputStatus::Abandoned
    } else {
        OutputStatus::Pending
    }
}

/// Tier of an abandoned output by how long it has sat unused.
pub fn abandonment_tier(age_ms: Millis, thresholds: &ThresholdsConfig) -> Tier {
    tier::lower_is_better(
        age_ms as f64,
        thresholds.abandonment_efficient_below_ms as f64,
        thresholds.abandonment_moderate_below_ms as f64,
    )
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AbandonedOutput {
    pub id: u64,
    pub content: String,
    pub category: String,
    pub time_since_output: Millis,
    pub tier: Tier,
    pub timestamp: Millis,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CategoryAbandonment {
    pub total: usize,
    pub abandoned: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AbandonmentAnalysis {
    pub rate: f64,
    pub abandoned_outputs: usize,
    pub pending_outputs: usize,
    pub engaged_outputs: usize,
    pub total_outputs: usize,
    /// Tier of the rate itself.
    pub tier: Tier,
    /// Abandoned outputs bucketed by age.
    pub distribution: TierCounts,
    pub recent_abandonments: Vec<AbandonedOutput>,
    pub category_stats: BTreeMap<String, CategoryAbandonment>,
}

pub fn analyze_abandonment(
    outputs: &[TimestampedRecord],
    thresholds: &ThresholdsConfig,
    now: Millis,
    recent_limit: usize,
) -> AbandonmentAnalysis {
    let mut abandoned = Vec::new();
    let mut distribution = TierCounts::default();
    let mut category_stats: BTreeMap<String, CategoryAbandonment> = BTreeMap::new();
    let (mut pending, mut engaged) = (0, 0);

    for output in outputs {
        let stats = category_stats.entry(output.category.clone()).or_default();
        stats.total += 1;

        match status(output, thresholds.abandonment_timeout_ms, now) {
            OutputStatus::Engaged => engaged += 1,
            OutputStatus::Pending => pending += 1,
            OutputStatus::Abandoned => {
                stats.abandoned += 1;
                let age = output.age(now);
                let tier = abandonment_tier(age, thresholds);
                distribution.record(tier);
                abandoned.push(AbandonedOutput {
                    id: output.id,
                    content: preview(&output.text),
                    category: output.category.clone(),
                    time_since_output: age,
                    tier,
                    timestamp: output.timestamp,
                });
            }
        }
    }

    let count = abandoned.len();
    let rate = if outputs.is_empty() {
        0.0
    } else {
        count as f64 / outputs.len() as f64
    };
    let skip = count.saturating_sub(recent_limit);

    AbandonmentAnalysis {
        rate,
        abandoned_outputs: count,
        pending_outputs: pending,
        engaged_outputs: engaged,
        total_outputs: outputs.len(),
        tier: tier::lower_is_better(
            rate,
            thresholds.abandonment_rate_efficient_below,
            thresholds.abandonment_rate_moderate_below,
        ),
        distribution,
        recent_abandonments: abandoned.split_off(skip),
        category_stats,
    }
}
