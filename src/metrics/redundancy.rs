//! Similarity-based redundancy (prompts) and reuse (outputs) detection.
//!
//! Both metrics are the same scan: every record after the first is compared
//! against every earlier record that is at most one window older, and is
//! flagged when its best match reaches the similarity threshold. They differ
//! only in which stream they read and which direction of the rate is good.
//!
//! The scan is quadratic in the number of retained records. The sliding
//! window bounds that number, so the window duration is the scaling knob.

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;

use crate::config::schema::ThresholdsConfig;
use crate::metrics::similarity::{jaccard, token_set};
use crate::metrics::tier::{self, Tier};
use crate::store::record::{Millis, TimestampedRecord};

/// A flagged record and the earlier record it most resembles.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimilarPair {
    pub id: u64,
    pub text: String,
    pub similar_to: String,
    pub similarity: f64,
    pub timestamp: Millis,
    pub category: String,
}

/// Raw result of a similarity scan.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimilarityScan {
    pub total: usize,
    pub similar_count: usize,
    /// `similar_count / (total - 1)`, or 0 with fewer than two records.
    pub rate: f64,
    /// Most recent flagged pairs, oldest first.
    pub recent: Vec<SimilarPair>,
    /// Per-record flag, parallel to the scanned slice.
    pub flagged: Vec<bool>,
}

/// Scan `records` (in insertion order) for near-duplicates of earlier records.
///
/// The best match only moves on a strictly greater similarity, so among equal
/// scores the oldest candidate is reported.
pub fn scan(
    records: &[TimestampedRecord],
    threshold: f64,
    window_ms: u64,
    recent_limit: usize,
) -> SimilarityScan {
    let total = records.len();
    let mut flagged = vec![false; total];
    if total < 2 {
        return SimilarityScan {
            total,
            flagged,
            ..Default::default()
        };
    }

    let window = i64::try_from(window_ms).unwrap_or(i64::MAX);
    let sets: Vec<HashSet<String>> = records.iter().map(|r| token_set(&r.text)).collect();
    let mut pairs = Vec::new();

    for i in 1..total {
        let current = &records[i];
        let mut best: Option<(usize, f64)> = None;

        for j in 0..i {
            if current.timestamp.saturating_sub(records[j].timestamp) > window {
                continue;
            }
            let score = jaccard(&sets[i], &sets[j]);
            if best.is_none_or(|(_, top)| score > top) {
                best = Some((j, score));
            }
        }

        if let Some((j, score)) = best
            && score >= threshold
        {
            flagged[i] = true;
            pairs.push(SimilarPair {
                id: current.id,
                text: current.text.clone(),
                similar_to: records[j].text.clone(),
                similarity: score,
                timestamp: current.timestamp,
                category: current.category.clone(),
            });
        }
    }

    let similar_count = pairs.len();
    let skip = pairs.len().saturating_sub(recent_limit);
    SimilarityScan {
        total,
        similar_count,
        rate: similar_count as f64 / (total - 1) as f64,
        recent: pairs.split_off(skip),
        flagged,
    }
}

// ---------------------------------------------------------------------------
// Redundancy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RedundancyAnalysis {
    pub rate: f64,
    pub redundant_prompts: usize,
    pub total_prompts: usize,
    /// Lower is better.
    pub tier: Tier,
    pub recent_similarities: Vec<SimilarPair>,
}

pub fn analyze_redundancy(
    prompts: &[TimestampedRecord],
    thresholds: &ThresholdsConfig,
    window_ms: u64,
    recent_limit: usize,
) -> RedundancyAnalysis {
    let scan = scan(prompts, thresholds.redundancy_similarity, window_ms, recent_limit);
    RedundancyAnalysis {
        rate: scan.rate,
        redundant_prompts: scan.similar_count,
        total_prompts: scan.total,
        tier: tier::lower_is_better(
            scan.rate,
            thresholds.redundancy_efficient_below,
            thresholds.redundancy_moderate_below,
        ),
        recent_similarities: scan.recent,
    }
}

// ---------------------------------------------------------------------------
// Reuse
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CategoryReuse {
    pub total: usize,
    pub reused: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReuseAnalysis {
    pub rate: f64,
    pub reused_outputs: usize,
    pub total_outputs: usize,
    /// Higher is better.
    pub tier: Tier,
    pub recent_reuses: Vec<SimilarPair>,
    pub category_stats: BTreeMap<String, CategoryReuse>,
}

pub fn analyze_reuse(
    outputs: &[TimestampedRecord],
    thresholds: &ThresholdsConfig,
    window_ms: u64,
    recent_limit: usize,
) -> ReuseAnalysis {
    let scan = scan(outputs, thresholds.reuse_similarity, window_ms, recent_limit);

    let mut category_stats: BTreeMap<String, CategoryReuse> = BTreeMap::new();
    for (output, &reused) in outputs.iter().zip(&scan.flagged) {
        let entry = category_stats.entry(output.category.clone()).or_default();
        entry.total += 1;
        if reused {
            entry.reused += 1;
        }
    }

    ReuseAnalysis {
        rate: scan.rate,
        reused_outputs: scan.similar_count,
        total_outputs: scan.total,
        tier: tier::higher_is_better(
            scan.rate,
            thresholds.reuse_efficient_at,
            thresholds.reuse_moderate_at,
        ),
        recent_reuses: scan.recent,
        category_stats,
    }
}
