/// Configuration schema and defaults for wastemeter.
///
/// Defines the TOML-serializable configuration structure with all sections:
/// `[general]`, `[thresholds]`, `[llm.analysis]`, `[llm.chat]`, `[llm]`,
/// `[dataset]`, `[web]`, `[demo]`, and `[logging]`.
///
/// Every field has a built-in default. Users only need to set the values they
/// want to override.
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level wastemeter configuration.
///
/// Maps directly to `~/.wastemeter/config.toml` and `.wastemeter.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WastemeterConfig {
    pub general: GeneralConfig,
    pub thresholds: ThresholdsConfig,
    pub llm: LlmConfig,
    pub dataset: DatasetConfig,
    pub web: WebConfig,
    pub demo: DemoConfig,
    pub logging: LoggingConfig,
}

// ---------------------------------------------------------------------------
// [general]
// ---------------------------------------------------------------------------

/// Sensitivity presets for the similarity and abandonment thresholds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Profile {
    /// Higher similarity bars, longer abandonment timeout: flags less.
    Lenient,
    /// Built-in defaults.
    #[default]
    Balanced,
    /// Lower similarity bars, shorter abandonment timeout: flags more.
    Strict,
}

impl std::fmt::Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lenient => write!(f, "lenient"),
            Self::Balanced => write!(f, "balanced"),
            Self::Strict => write!(f, "strict"),
        }
    }
}

/// Retention and presentation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Threshold preset applied after all layers are merged.
    pub profile: Profile,
    /// Sliding window: records older than this are evicted (milliseconds).
    pub window_ms: u64,
    /// How often the window sweep runs (milliseconds).
    pub sweep_interval_ms: u64,
    /// How many "recent" items (similar pairs, topics, outliers) to report.
    pub recent_items: usize,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            profile: Profile::default(),
            window_ms: 3_600_000,       // 1 hour
            sweep_interval_ms: 60_000, // 1 minute
            recent_items: 5,
        }
    }
}

// ---------------------------------------------------------------------------
// [thresholds]
// ---------------------------------------------------------------------------

/// Every classifier constant in one place.
///
/// Tier boundaries are half-open and partition `[0, inf)` into exactly three
/// tiers per metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdsConfig {
    /// Prompt-to-prompt similarity at which a prompt counts as redundant.
    pub redundancy_similarity: f64,
    /// Output-to-output similarity at which an output counts as reused.
    pub reuse_similarity: f64,
    /// Similarity to a topic's latest prompt required to join the topic.
    pub topic_similarity: f64,

    /// Redundancy rate below this is efficient.
    pub redundancy_efficient_below: f64,
    /// Redundancy rate below this (and not efficient) is moderate.
    pub redundancy_moderate_below: f64,

    /// Reuse rate at or above this is efficient.
    pub reuse_efficient_at: f64,
    /// Reuse rate at or above this (and not efficient) is moderate.
    pub reuse_moderate_at: f64,

    /// Topics with at most this many refinement loops are efficient.
    pub refinement_efficient_max: usize,
    /// Topics with at most this many loops (and not efficient) are moderate.
    pub refinement_moderate_max: usize,

    /// Lower bound of the efficient excess-ratio band.
    pub excess_efficient_min: f64,
    /// Upper bound (inclusive) of the efficient excess-ratio band.
    pub excess_efficient_max: f64,
    /// Upper bound (inclusive) of the moderate excess-ratio band.
    pub excess_moderate_max: f64,

    /// Latency per token at or below this is efficient (ms).
    pub latency_efficient_max_ms: f64,
    /// Latency per token at or below this is moderate (ms).
    pub latency_moderate_max_ms: f64,
    /// A record is slow when its latency per token exceeds this multiple of
    /// its prompt type's median.
    pub latency_slow_factor: f64,

    /// An untouched output becomes abandoned after this long (ms).
    pub abandonment_timeout_ms: u64,
    /// Abandoned outputs younger than this are efficient (ms).
    pub abandonment_efficient_below_ms: u64,
    /// Abandoned outputs younger than this are moderate (ms).
    pub abandonment_moderate_below_ms: u64,
    /// Abandonment rate below this is efficient.
    pub abandonment_rate_efficient_below: f64,
    /// Abandonment rate below this is moderate.
    pub abandonment_rate_moderate_below: f64,
}

impl Default for ThresholdsConfig {
    fn default() -> Self {
        Self {
            redundancy_similarity: 0.7,
            reuse_similarity: 0.8,
            topic_similarity: 0.6,
            redundancy_efficient_below: 0.20,
            redundancy_moderate_below: 0.35,
            reuse_efficient_at: 0.60,
            reuse_moderate_at: 0.40,
            refinement_efficient_max: 2,
            refinement_moderate_max: 4,
            excess_efficient_min: 0.8,
            excess_efficient_max: 1.5,
            excess_moderate_max: 2.0,
            latency_efficient_max_ms: 50.0,
            latency_moderate_max_ms: 100.0,
            latency_slow_factor: 2.0,
            abandonment_timeout_ms: 300_000,          // 5 minutes
            abandonment_efficient_below_ms: 600_000,  // 10 minutes
            abandonment_moderate_below_ms: 1_800_000, // 30 minutes
            abandonment_rate_efficient_below: 0.20,
            abandonment_rate_moderate_below: 0.40,
        }
    }
}

// ---------------------------------------------------------------------------
// [llm]
// ---------------------------------------------------------------------------

/// One OpenAI-compatible chat-completions endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmEndpointConfig {
    /// Base URL up to and including the API version, e.g. `.../v1`.
    pub base_url: String,
    pub model: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    pub temperature: f64,
    pub max_tokens: u32,
}

/// Upstream LLM settings for the analysis and chat proxies.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Request timeout for either endpoint (milliseconds).
    pub timeout_ms: u64,
    pub analysis: LlmEndpointConfig,
    pub chat: LlmEndpointConfig,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            analysis: LlmEndpointConfig {
                base_url: "https://api.groq.com/openai/v1".to_string(),
                model: "llama-3.1-8b-instant".to_string(),
                api_key_env: "GROQ_API_KEY".to_string(),
                temperature: 0.3,
                max_tokens: 1000,
            },
            chat: LlmEndpointConfig::default(),
        }
    }
}

impl Default for LlmEndpointConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            temperature: 0.7,
            max_tokens: 300,
        }
    }
}

// ---------------------------------------------------------------------------
// [dataset]
// ---------------------------------------------------------------------------

/// Sustainability CSV dataset settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    /// Path to the CSV file. Relative paths resolve against the working
    /// directory; `~` expands to the home directory.
    pub path: String,
    /// How many initiatives the report endpoint ranks.
    pub top_initiatives: usize,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            path: "public/data/ai_sustainability_dataset.csv".to_string(),
            top_initiatives: 6,
        }
    }
}

// ---------------------------------------------------------------------------
// [web]
// ---------------------------------------------------------------------------

/// Embedded dashboard server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    pub addr: String,
    /// Open the dashboard in the default browser on start.
    pub open_browser: bool,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:9747".to_string(),
            open_browser: true,
        }
    }
}

// ---------------------------------------------------------------------------
// [demo]
// ---------------------------------------------------------------------------

/// Simulated record feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    /// Seed the store from the built-in demo sequences while serving.
    pub enabled: bool,
    /// Delay between demo records (milliseconds).
    pub interval_ms: u64,
    /// Probability that a demo output gets marked as interacted.
    pub interaction_chance: f64,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ms: 3_000,
            interaction_chance: 0.7,
        }
    }
}

// ---------------------------------------------------------------------------
// [logging]
// ---------------------------------------------------------------------------

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Whether request events are appended to the event log.
    pub enabled: bool,
    /// Path to the JSONL event log. `~` is expanded to the home directory.
    pub path: String,
    /// Diagnostic level: `"error"`, `"warn"`, `"info"`, `"debug"`, `"trace"`.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: "~/.wastemeter/events.jsonl".to_string(),
            level: "info".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Profile application
// ---------------------------------------------------------------------------

impl WastemeterConfig {
    /// Apply the active profile's overrides to the thresholds.
    ///
    /// Runs after all layers are merged, so a profile wins over explicitly
    /// set similarity thresholds. Use `balanced` to keep hand-tuned values.
    /// Switching away from a profile needs [`ThresholdsConfig::restore_profile_keys`]
    /// first, since `balanced` changes nothing on its own.
    pub fn apply_profile(&mut self) {
        match self.general.profile {
            Profile::Lenient => self.apply_lenient_profile(),
            Profile::Balanced => {}
            Profile::Strict => self.apply_strict_profile(),
        }
    }

    fn apply_lenient_profile(&mut self) {
        let t = &mut self.thresholds;
        t.redundancy_similarity = 0.8;
        t.reuse_similarity = 0.9;
        t.topic_similarity = 0.7;
        t.abandonment_timeout_ms = 600_000;
    }

    fn apply_strict_profile(&mut self) {
        let t = &mut self.thresholds;
        t.redundancy_similarity = 0.6;
        t.reuse_similarity = 0.7;
        t.topic_similarity = 0.5;
        t.abandonment_timeout_ms = 180_000;
    }
}

impl ThresholdsConfig {
    /// Copy the keys a profile overrides back from `base`.
    pub fn restore_profile_keys(&mut self, base: &ThresholdsConfig) {
        self.redundancy_similarity = base.redundancy_similarity;
        self.reuse_similarity = base.reuse_similarity;
        self.topic_similarity = base.topic_similarity;
        self.abandonment_timeout_ms = base.abandonment_timeout_ms;
    }
}

// ---------------------------------------------------------------------------
// Default TOML content
// ---------------------------------------------------------------------------

impl WastemeterConfig {
    /// Annotated default config file, written by `wastemeter config init`.
    pub fn default_toml() -> String {
        r#"# wastemeter configuration
#
# Configuration hierarchy (highest precedence wins):
#   1. Environment variables (WASTEMETER_*)
#   2. Project config (.wastemeter.toml in current directory)
#   3. User global config (~/.wastemeter/config.toml)
#   4. Built-in defaults

[general]
profile = "balanced"          # lenient | balanced | strict
window_ms = 3600000           # keep records for 1 hour
sweep_interval_ms = 60000     # evict once a minute
recent_items = 5

[thresholds]
redundancy_similarity = 0.7
reuse_similarity = 0.8
topic_similarity = 0.6
redundancy_efficient_below = 0.2
redundancy_moderate_below = 0.35
reuse_efficient_at = 0.6
reuse_moderate_at = 0.4
refinement_efficient_max = 2
refinement_moderate_max = 4
excess_efficient_min = 0.8
excess_efficient_max = 1.5
excess_moderate_max = 2.0
latency_efficient_max_ms = 50.0
latency_moderate_max_ms = 100.0
latency_slow_factor = 2.0
abandonment_timeout_ms = 300000
abandonment_efficient_below_ms = 600000
abandonment_moderate_below_ms = 1800000
abandonment_rate_efficient_below = 0.2
abandonment_rate_moderate_below = 0.4

[llm]
timeout_ms = 30000

[llm.analysis]
base_url = "https://api.groq.com/openai/v1"
model = "llama-3.1-8b-instant"
api_key_env = "GROQ_API_KEY"
temperature = 0.3
max_tokens = 1000

[llm.chat]
base_url = "https://api.openai.com/v1"
model = "gpt-4o-mini"
api_key_env = "OPENAI_API_KEY"
temperature = 0.7
max_tokens = 300

[dataset]
path = "public/data/ai_sustainability_dataset.csv"
top_initiatives = 6

[web]
addr = "127.0.0.1:9747"
open_browser = true

[demo]
enabled = true
interval_ms = 3000
interaction_chance = 0.7

[logging]
enabled = true
path = "~/.wastemeter/events.jsonl"
level = "info"
"#
        .to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
