/// Word-based token estimate: `ceil(words * 1.3)`.
///
/// The excess-ratio and latency metrics are calibrated against this count.
pub fn count_words_as_tokens(text: &str) -> f64 {
    let words = text.split_whitespace().count();
    (words as f64 * 1.3).ceil()
}

/// Expected response length for a prompt, from its wording and the declared
/// response type.
///
/// Keyword checks run in priority order; the first hit sets the base budget.
pub fn estimate_expected_tokens(prompt: &str, response_type: &str) -> f64 {
    let lower = prompt.to_lowercase();
    let has = |words: &[&str]| words.iter().any(|w| lower.contains(w));

    let base = if has(&["brief", "short", "summarize"]) {
        20.0
    } else if has(&["detailed", "explain", "describe"]) {
        200.0
    } else if has(&["list", "enumerate"]) {
        100.0
    } else if has(&["code", "example", "show me"]) {
        150.0
    } else if has(&["yes", "no", "true", "false"]) {
        5.0
    } else {
        50.0
    };

    match response_type {
        "code" => base * 1.5,
        "explanation" => base * 1.2,
        "list" => base * 0.8,
        "summary" => base * 0.6,
        _ => base,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_estimate_scales_by_1_3() {
        assert_eq!(count_words_as_tokens(""), 0.0);
        assert_eq!(count_words_as_tokens("one"), 2.0);
        assert_eq!(count_words_as_tokens("one two three four five six seven eight nine ten"), 13.0);
        assert_eq!(count_words_as_tokens("  spaced\n\tout  "), 3.0);
    }

    #[test]
    fn expected_tokens_follow_keyword_priority() {
        // "briefly" wins over "explain" because brevity is checked first
        assert_eq!(estimate_expected_tokens("Explain machine learning briefly", "general"), 20.0);
        assert_eq!(estimate_expected_tokens("Describe photosynthesis", "general"), 200.0);
        assert_eq!(estimate_expected_tokens("List 3 programming languages", "general"), 100.0);
        assert_eq!(estimate_expected_tokens("Show me Python code", "general"), 150.0);
        assert_eq!(estimate_expected_tokens("What is 2+2?", "general"), 50.0);
    }

    #[test]
    fn expected_tokens_scale_by_response_type() {
        assert_eq!(estimate_expected_tokens("Show me Python code", "code"), 225.0);
        assert_eq!(estimate_expected_tokens("Describe it", "explanation"), 240.0);
        assert_eq!(estimate_expected_tokens("Summarize AI", "summary"), 12.0);
        assert_eq!(estimate_expected_tokens("List things", "list"), 80.0);
    }
}
