//! Refinement-loop grouping.
//!
//! Prompts are clustered greedily into topics: each prompt joins the first
//! topic (in creation order) whose latest prompt is similar enough, otherwise
//! it opens a new topic. Every prompt after a topic's first is one refinement
//! loop. The grouping is deterministic for a given input order but is a
//! heuristic, not a canonical clustering.

use std::collections::HashSet;

use serde::Serialize;

use crate::config::schema::ThresholdsConfig;
use crate::metrics::preview;
use crate::metrics::similarity::{jaccard, token_set};
use crate::metrics::tier::{Tier, TierCounts};
use crate::store::record::{Millis, TimestampedRecord};

/// Indices into the prompt slice that ended up in one topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topic {
    pub members: Vec<usize>,
}

impl Topic {
    pub fn loops(&self) -> usize {
        self.members.len().saturating_sub(1)
    }

    pub fn is_completed(&self) -> bool {
        self.members.len() >= 2
    }
}

/// Group prompts into topics. Topic order is creation order.
pub fn group_topics(prompts: &[TimestampedRecord], topic_similarity: f64) -> Vec<Topic> {
    let mut topics: Vec<Topic> = Vec::new();
    // Token set of each topic's latest prompt, parallel to `topics`.
    let mut latest: Vec<HashSet<String>> = Vec::new();

    for (index, prompt) in prompts.iter().enumerate() {
        let tokens = token_set(&prompt.text);
        let joined = latest
            .iter()
            .position(|last| jaccard(&tokens, last) >= topic_similarity);

        match joined {
            Some(t) => {
                topics[t].members.push(index);
                latest[t] = tokens;
            }
            None => {
                topics.push(Topic {
                    members: vec![index],
                });
                latest.push(tokens);
            }
        }
    }

    topics
}

/// Tier for a single topic's loop count.
pub fn loop_tier(loops: f64, thresholds: &ThresholdsConfig) -> Tier {
    if loops <= thresholds.refinement_efficient_max as f64 {
        Tier::Efficient
    } else if loops <= thresholds.refinement_moderate_max as f64 {
        Tier::Moderate
    } else {
        Tier::Waste
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicSummary {
    pub topic: String,
    pub loop_count: usize,
    pub prompts: usize,
    pub start_time: Millis,
    pub end_time: Millis,
    pub tier: Tier,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefinementAnalysis {
    /// Average loops over completed topics.
    pub average_loops: f64,
    pub total_loops: usize,
    pub total_topics: usize,
    pub completed_topics: usize,
    pub tier: Tier,
    pub distribution: TierCounts,
    pub recent_refinements: Vec<TopicSummary>,
}

impl RefinementAnalysis {
    fn empty() -> Self {
        Self {
            average_loops: 0.0,
            total_loops: 0,
            total_topics: 0,
            completed_topics: 0,
            tier: Tier::Efficient,
            distribution: TierCounts::default(),
            recent_refinements: Vec::new(),
        }
    }
}

pub fn analyze_refinement(
    prompts: &[TimestampedRecord],
    thresholds: &ThresholdsConfig,
    recent_limit: usize,
) -> RefinementAnalysis {
    if prompts.len() < 2 {
        return RefinementAnalysis::empty();
    }

    let topics = group_topics(prompts, thresholds.topic_similarity);
    let mut distribution = TierCounts::default();
    let mut summaries = Vec::new();
    let mut total_loops = 0;

    for topic in topics.iter().filter(|t| t.is_completed()) {
        let loops = topic.loops();
        let tier = loop_tier(loops as f64, thresholds);
        total_loops += loops;
        distribution.record(tier);

        let first = &prompts[topic.members[0]];
        let last = &prompts[topic.members[topic.members.len() - 1]];
        summaries.push(TopicSummary {
            topic: preview(&first.text),
            loop_count: loops,
            prompts: topic.members.len(),
            start_time: first.timestamp,
            end_time: last.timestamp,
            tier,
        });
    }

    let completed = summaries.len();
    let average_loops = if completed > 0 {
        total_loops as f64 / completed as f64
    } else {
        0.0
    };
    let skip = completed.saturating_sub(recent_limit);

    RefinementAnalysis {
        average_loops,
        total_loops,
        total_topics: topics.len(),
        completed_topics: completed,
        tier: loop_tier(average_loops, thresholds),
        distribution,
        recent_refinements: summaries.split_off(skip),
    }
}
