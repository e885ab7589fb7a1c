//! Jaccard text similarity.
//!
//! Both the redundancy/reuse detector and the refinement-loop grouper compare
//! texts through [`similarity`]. Normalization is deliberately crude so that
//! short prompts which differ only in punctuation or casing collapse to the
//! same token set:
//!
//! 1. lowercase
//! 2. drop every character that is not `[a-z0-9_]` or whitespace
//! 3. split on whitespace
//!
//! So `"What's the weather?"` becomes `{"whats", "the", "weather"}`.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

/// Anything that is neither an ASCII word character nor whitespace.
static NON_WORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9_\s]").expect("non-word regex must compile"));

/// Normalize a text into its token set.
pub fn token_set(text: &str) -> HashSet<String> {
    let lower = text.to_lowercase();
    NON_WORD_RE
        .replace_all(&lower, "")
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Jaccard index of the token sets of two texts, in `[0, 1]`.
///
/// Returns `0.0` when both texts normalize to nothing (empty union).
pub fn similarity(a: &str, b: &str) -> f64 {
    jaccard(&token_set(a), &token_set(b))
}

/// Jaccard index of two pre-computed token sets.
pub fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;

    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}
