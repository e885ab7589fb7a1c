//! One full recomputation of every metric over the retained records.

use serde::Serialize;

use crate::config::schema::WastemeterConfig;
use crate::metrics::abandonment::{self, AbandonmentAnalysis};
use crate::metrics::excess::{self, ExcessAnalysis};
use crate::metrics::latency::{self, LatencyAnalysis};
use crate::metrics::redundancy::{self, RedundancyAnalysis, ReuseAnalysis};
use crate::metrics::refinement::{self, RefinementAnalysis};
use crate::metrics::score::{self, EfficiencyScore, ScoreInputs};
use crate::store::record::{Millis, TimestampedRecord};

/// Headline numbers, flat for the dashboard cards and CSV export.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HeadlineMetrics {
    pub redundancy_rate: f64,
    pub reuse_rate: f64,
    pub average_refinement_loops: f64,
    pub average_excess_ratio: f64,
    pub average_latency_per_token: f64,
    pub abandonment_rate: f64,
    pub efficiency_score: f64,
    pub total_prompts: usize,
    pub total_outputs: usize,
    pub total_interactions: usize,
    /// Sum of `actual_tokens` over interactions.
    pub total_tokens: f64,
    /// Tokens produced beyond what the prompts called for.
    pub wasted_tokens: f64,
    pub repeated_prompts: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub timestamp: Millis,
    pub metrics: HeadlineMetrics,
    pub redundancy_analysis: RedundancyAnalysis,
    pub output_reuse_analysis: ReuseAnalysis,
    pub refinement_analysis: RefinementAnalysis,
    pub excess_analysis: ExcessAnalysis,
    pub latency_analysis: LatencyAnalysis,
    pub abandonment_analysis: AbandonmentAnalysis,
    pub efficiency: EfficiencyScore,
}

/// The three record streams a snapshot reads.
#[derive(Debug, Clone, Copy)]
pub struct Streams<'a> {
    pub prompts: &'a [TimestampedRecord],
    pub outputs: &'a [TimestampedRecord],
    pub interactions: &'a [TimestampedRecord],
}

impl MetricsSnapshot {
    pub fn compute(streams: Streams<'_>, config: &WastemeterConfig, now: Millis) -> Self {
        let t = &config.thresholds;
        let window = config.general.window_ms;
        let recent = config.general.recent_items;

        let redundancy = redundancy::analyze_redundancy(streams.prompts, t, window, recent);
        let reuse = redundancy::analyze_reuse(streams.outputs, t, window, recent);
        let refinement = refinement::analyze_refinement(streams.prompts, t, recent);
        let excess = excess::analyze_excess(streams.interactions, t, recent);
        let latency = latency::analyze_latency(streams.interactions, t, recent);
        let abandonment = abandonment::analyze_abandonment(streams.outputs, t, now, recent);

        let efficiency = score::composite(&ScoreInputs {
            redundancy_rate: redundancy.rate,
            reuse_rate: reuse.rate,
            refinement_loops: refinement.average_loops,
            excess_ratio: excess.average_ratio,
        });

        let (total_tokens, wasted_tokens) = token_totals(streams.interactions);

        let metrics = HeadlineMetrics {
            redundancy_rate: redundancy.rate,
            reuse_rate: reuse.rate,
            average_refinement_loops: refinement.average_loops,
            average_excess_ratio: excess.average_ratio,
            average_latency_per_token: latency.average_latency_per_token,
            abandonment_rate: abandonment.rate,
            efficiency_score: efficiency.score,
            total_prompts: streams.prompts.len(),
            total_outputs: streams.outputs.len(),
            total_interactions: streams.interactions.len(),
            total_tokens,
            wasted_tokens,
            repeated_prompts: redundancy.redundant_prompts,
        };

        Self {
            timestamp: now,
            metrics,
            redundancy_analysis: redundancy,
            output_reuse_analysis: reuse,
            refinement_analysis: refinement,
            excess_analysis: excess,
            latency_analysis: latency,
            abandonment_analysis: abandonment,
            efficiency,
        }
    }
}

fn token_totals(interactions: &[TimestampedRecord]) -> (f64, f64) {
    interactions
        .iter()
        .filter_map(|r| r.metadata.actual_tokens.map(|a| (a, r.metadata.expected_tokens)))
        .fold((0.0, 0.0), |(total, wasted), (actual, expected)| {
            let over = expected.map_or(0.0, |e| (actual - e).max(0.0));
            (total + actual, wasted + over)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::score::EfficiencyLevel;
    use crate::store::record::RecordKind;

    #[test]
    fn empty_streams_produce_neutral_snapshot() {
        let config = WastemeterConfig::default();
        let streams = Streams {
            prompts: &[],
            outputs: &[],
            interactions: &[],
        };
        let snapshot = MetricsSnapshot::compute(streams, &config, 0);

        assert_eq!(snapshot.metrics.redundancy_rate, 0.0);
        assert_eq!(snapshot.metrics.average_excess_ratio, 1.0);
        // 0.30 + 0 + 0.20 + 0.20 * (2/3)
        assert!((snapshot.efficiency.score - 0.633_333).abs() < 1e-4);
        assert_eq!(snapshot.efficiency.level, EfficiencyLevel::Moderate);
    }

    #[test]
    fn wasted_tokens_only_count_overshoot() {
        let interactions = vec![
            TimestampedRecord::new(RecordKind::Interaction, "a", 0).with_tokens(150.0, 50.0),
            TimestampedRecord::new(RecordKind::Interaction, "b", 0).with_tokens(20.0, 50.0),
        ];
        let config = WastemeterConfig::default();
        let streams = Streams {
            prompts: &[],
            outputs: &[],
            interactions: &interactions,
        };
        let snapshot = MetricsSnapshot::compute(streams, &config, 0);

        assert_eq!(snapshot.metrics.total_tokens, 170.0);
        assert_eq!(snapshot.metrics.wasted_tokens, 100.0);
    }

    #[test]
    fn snapshot_serializes_with_dashboard_keys() {
        let config = WastemeterConfig::default();
        let streams = Streams {
            prompts: &[],
            outputs: &[],
            interactions: &[],
        };
        let value = serde_json::to_value(MetricsSnapshot::compute(streams, &config, 42)).unwrap();

        for key in [
            "timestamp",
            "metrics",
            "redundancyAnalysis",
            "outputReuseAnalysis",
            "refinementAnalysis",
            "excessAnalysis",
            "latencyAnalysis",
            "abandonmentAnalysis",
            "efficiency",
        ] {
            assert!(value.get(key).is_some(), "missing {key}");
        }
        assert_eq!(value["metrics"]["efficiencyScore"], value["efficiency"]["score"]);
    }
}
