/// End-to-end metric tests.
///
/// Unit tests for each classifier live next to it in `src/metrics/`. These
/// tests push records through a [`RecordStore`] and check the snapshot the
/// dashboard would see.
use wastemeter::config::WastemeterConfig;
use wastemeter::metrics::abandonment::{self, OutputStatus};
use wastemeter::metrics::excess;
use wastemeter::metrics::score::{self, EfficiencyLevel, ScoreInputs};
use wastemeter::metrics::similarity::similarity;
use wastemeter::metrics::tier::Tier;
use wastemeter::store::RecordStore;
use wastemeter::store::record::{RecordKind, TimestampedRecord};

const MINUTE: i64 = 60_000;

fn store() -> RecordStore {
    RecordStore::new(WastemeterConfig::default().general.window_ms)
}

// ---------------------------------------------------------------------------
// Similarity
// ---------------------------------------------------------------------------

#[test]
fn weather_prompts_share_a_third_of_their_tokens() {
    // {what, is, the, weather} vs {whats, the, weather, today}
    let score = similarity("What is the weather?", "What's the weather today?");
    assert!((score - 1.0 / 3.0).abs() < 1e-9);
}

#[test]
fn similarity_is_symmetric() {
    let a = "explain rust ownership";
    let b = "please explain ownership in rust";
    assert_eq!(similarity(a, b), similarity(b, a));
}

// ---------------------------------------------------------------------------
// Classifiers
// ---------------------------------------------------------------------------

#[test]
fn triple_token_ratio_is_waste() {
    let config = WastemeterConfig::default();
    assert_eq!(excess::excess_tier(150.0 / 50.0, &config.thresholds), Tier::Waste);
    assert_eq!(excess::excess_tier(1.0, &config.thresholds), Tier::Efficient);
    assert_eq!(excess::excess_tier(1.8, &config.thresholds), Tier::Moderate);
}

#[test]
fn untouched_output_past_timeout_is_abandoned_moderate() {
    let config = WastemeterConfig::default();
    let output = TimestampedRecord::new(RecordKind::Output, "some answer", 0);

    let now = 700_000;
    assert_eq!(
        abandonment::status(&output, config.thresholds.abandonment_timeout_ms, now),
        OutputStatus::Abandoned
    );
    assert_eq!(
        abandonment::abandonment_tier(now, &config.thresholds),
        Tier::Moderate
    );
}

#[test]
fn untouched_output_inside_timeout_is_pending() {
    let config = WastemeterConfig::default();
    let output = TimestampedRecord::new(RecordKind::Output, "some answer", 0);
    assert_eq!(
        abandonment::status(&output, config.thresholds.abandonment_timeout_ms, 200_000),
        OutputStatus::Pending
    );
    let engaged = output.interacted();
    assert_eq!(
        abandonment::status(&engaged, config.thresholds.abandonment_timeout_ms, 10_000_000),
        OutputStatus::Engaged
    );
}

// ---------------------------------------------------------------------------
// Composite score
// ---------------------------------------------------------------------------

#[test]
fn ideal_inputs_score_high_efficiency() {
    let result = score::composite(&ScoreInputs {
        redundancy_rate: 0.0,
        reuse_rate: 1.0,
        refinement_loops: 0.0,
        excess_ratio: 1.0,
    });
    assert!((result.score - 0.9333).abs() < 1e-3);
    assert_eq!(result.level, EfficiencyLevel::High);
}

#[test]
fn out_of_range_inputs_stay_in_unit_interval() {
    let cases = [
        (1.5, -0.5, 50.0, 9.0),
        (-2.0, 3.0, -1.0, -1.0),
        (f64::MAX, f64::MAX, f64::MAX, f64::MAX),
    ];
    for (redundancy_rate, reuse_rate, refinement_loops, excess_ratio) in cases {
        let result = score::composite(&ScoreInputs {
            redundancy_rate,
            reuse_rate,
            refinement_loops,
            excess_ratio,
        });
        assert!(
            (0.0..=1.0).contains(&result.score),
            "score {} out of range",
            result.score
        );
    }
}

// ---------------------------------------------------------------------------
// Snapshots through the store
// ---------------------------------------------------------------------------

#[test]
fn near_duplicate_prompt_is_flagged_redundant() {
    let config = WastemeterConfig::default();
    let mut store = store();
    let t0 = 10 * MINUTE;
    store.append(RecordKind::Prompt, "explain rust ownership", "code", t0);
    store.append(RecordKind::Prompt, "explain rust ownership please", "code", t0 + 1_000);
    store.append(RecordKind::Prompt, "bake sourdough bread", "food", t0 + 2_000);

    let snapshot = store.snapshot(&config, t0 + 3_000);
    let redundancy = &snapshot.redundancy_analysis;

    assert_eq!(redundancy.total_prompts, 3);
    assert_eq!(redundancy.redundant_prompts, 1);
    // One flagged out of two comparable prompts.
    assert!((redundancy.rate - 0.5).abs() < 1e-9);
    assert_eq!(redundancy.tier, Tier::Waste);
    assert_eq!(redundancy.recent_similarities.len(), 1);
    assert_eq!(
        redundancy.recent_similarities[0].similar_to,
        "explain rust ownership"
    );
    assert_eq!(snapshot.metrics.repeated_prompts, 1);
}

#[test]
fn interactions_drive_excess_and_token_totals() {
    let config = WastemeterConfig::default();
    let mut store = store();
    let t0 = 10 * MINUTE;
    store.insert(
        TimestampedRecord::new(RecordKind::Interaction, "summarize this paragraph", t0)
            .with_tokens(150.0, 50.0)
            .with_latency(3_000.0),
        t0,
    );
    store.insert(
        TimestampedRecord::new(RecordKind::Interaction, "list three colors", t0 + 1_000)
            .with_tokens(50.0, 50.0)
            .with_latency(500.0),
        t0 + 1_000,
    );

    let snapshot = store.snapshot(&config, t0 + 2_000);

    assert_eq!(snapshot.excess_analysis.measured_outputs, 2);
    assert!((snapshot.metrics.average_excess_ratio - 2.0).abs() < 1e-9);
    assert_eq!(snapshot.metrics.total_tokens, 200.0);
    assert_eq!(snapshot.metrics.wasted_tokens, 100.0);
    assert_eq!(snapshot.metrics.total_interactions, 2);
}

#[test]
fn records_outside_the_window_do_not_count() {
    let config = WastemeterConfig::default();
    let window = config.general.window_ms as i64;
    let mut store = store();

    store.append(RecordKind::Prompt, "explain rust ownership", "code", 0);
    store.append(RecordKind::Prompt, "explain rust ownership", "code", 1_000);

    let inside = store.snapshot(&config, 2_000);
    assert_eq!(inside.metrics.total_prompts, 2);
    assert_eq!(inside.redundancy_analysis.redundant_prompts, 1);

    let later = store.snapshot(&config, window + 5_000);
    assert_eq!(later.metrics.total_prompts, 0);
    assert_eq!(later.metrics.redundancy_rate, 0.0);
}

#[test]
fn snapshot_serializes_with_dashboard_field_names() {
    let config = WastemeterConfig::default();
    let mut store = store();
    store.append(RecordKind::Prompt, "hello", "general", 1_000);

    let snapshot = store.snapshot(&config, 2_000);
    let json = serde_json::to_value(&snapshot).unwrap();

    for key in [
        "redundancyRate",
        "reuseRate",
        "averageRefinementLoops",
        "averageExcessRatio",
        "averageLatencyPerToken",
        "abandonmentRate",
        "efficiencyScore",
    ] {
        assert!(json["metrics"].get(key).is_some(), "missing metrics.{key}");
    }
    assert!(json["redundancyAnalysis"]["recentSimilarities"].is_array());
    assert!(json["efficiency"]["level"].is_string());
}
