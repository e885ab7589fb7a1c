//! Heuristic waste score for a single prompt submission.
//!
//! A quick, LLM-free check used by `POST /api/monitor`: a handful of phrase
//! and size rules add up to a 0-100 score, which then selects optimization
//! hints and canned recommendations.

use serde::{Deserialize, Serialize};

/// A prompt as submitted to the monitor.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MonitorRequest {
    pub prompt: String,
    pub tokens: f64,
    /// Milliseconds.
    pub response_time: f64,
    pub model: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Optimization {
    #[serde(rename = "type")]
    pub kind: String,
    pub suggestion: String,
    pub potential_savings: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorReport {
    pub waste_score: u32,
    pub optimization: Vec<Optimization>,
    pub recommendations: Vec<String>,
}

/// Score `request` from 0 (lean) to 100 (wasteful).
pub fn waste_score(request: &MonitorRequest) -> u32 {
    let prompt = &request.prompt;
    let length = prompt.chars().count() as f64;
    let tokens = request.tokens;
    let mut score = 0;

    if prompt.contains("please") && prompt.contains("kindly") {
        score += 10;
    }
    if prompt.contains("I would like") && prompt.contains("I want") {
        score += 15;
    }
    if length > 1000.0 && tokens > 200.0 {
        score += 20;
    }
    if tokens > 500.0 && request.response_time < 1000.0 {
        score += 25;
    }
    // Skipped for an empty prompt rather than dividing by zero.
    if length > 0.0 && tokens / length > 2.0 {
        score += 30;
    }

    score.min(100)
}

pub fn optimizations(prompt: &str, waste_score: u32) -> Vec<Optimization> {
    let mut found = Vec::new();
    let length = prompt.chars().count() as u64;

    if waste_score > 50 {
        found.push(Optimization {
            kind: "High Waste Detected".to_string(),
            suggestion: "Consider shortening your prompt and removing redundant phrases"
                .to_string(),
            potential_savings: u64::from(waste_score) * 2,
        });
    }
    if length > 500 {
        found.push(Optimization {
            kind: "Prompt Length".to_string(),
            suggestion: "Break down complex requests into smaller, focused prompts".to_string(),
            potential_savings: length / 10,
        });
    }

    found
}

pub fn recommendations(waste_score: u32) -> Vec<String> {
    let lines: &[&str] = if waste_score > 70 {
        &[
            "Use more specific, concise language",
            "Avoid redundant phrases and filler words",
            "Consider using structured prompts",
        ]
    } else if waste_score > 40 {
        &[
            "Review prompt structure for efficiency",
            "Consider using templates for common requests",
        ]
    } else {
        &["Good efficiency! Consider advanced optimization techniques"]
    };
    lines.iter().map(|s| s.to_string()).collect()
}

pub fn evaluate(request: &MonitorRequest) -> MonitorReport {
    let score = waste_score(request);
    MonitorReport {
        waste_score: score,
        optimization: optimizations(&request.prompt, score),
        recommendations: recommendations(score),
    }
}
