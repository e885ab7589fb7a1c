/// Configuration system for wastemeter.
///
/// Provides a layered configuration hierarchy:
///
/// 1. **Built-in defaults**: hardcoded in [`schema::WastemeterConfig::default()`]
/// 2. **User global config**: `~/.wastemeter/config.toml`
/// 3. **Project local config**: `.wastemeter.toml` in the current working directory
/// 4. **Environment variables**: `WASTEMETER_*` overrides (highest precedence)
///
/// Later layers override earlier ones key by key: a file that only sets
/// `[thresholds] reuse_similarity` leaves every other value from the layers
/// below untouched.
///
/// # Profiles
///
/// After merging all layers, the active profile (`general.profile`) is
/// applied. Profiles override the similarity bars and abandonment timeout:
///
/// - **lenient**: flag less
/// - **balanced**: built-in defaults (no-op)
/// - **strict**: flag more
///
/// # Usage
///
/// ```rust,ignore
/// use wastemeter::config;
///
/// let cfg = config::load();
/// let window = cfg.general.window_ms;
/// ```
pub mod schema;

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};

pub use schema::WastemeterConfig;

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Load the fully resolved wastemeter configuration.
///
/// Merges all layers in order: defaults → global TOML → project TOML → env
/// vars → profile application. This is the primary entry point for all
/// modules that need configuration. Problems found along the way are logged
/// as warnings; see [`load_with_warnings`] to handle them yourself.
pub fn load() -> WastemeterConfig {
    let (config, warnings) = load_with_warnings();
    for warning in &warnings {
        tracing::warn!("{warning}");
    }
    config
}

/// Like [`load`], but hands back the warnings instead of logging them.
///
/// Used before a tracing subscriber exists, so the caller can report them
/// once logging is up.
pub fn load_with_warnings() -> (WastemeterConfig, Vec<String>) {
    let mut warnings = Vec::new();
    let base = layered_base(&mut warnings);
    let config = resolve(base, &mut warnings);
    (config, warnings)
}

/// Layers 1-4 merged, before any profile is applied.
fn layered_base(warnings: &mut Vec<String>) -> WastemeterConfig {
    let mut layers = Vec::new();

    // Layer 2: user global config (~/.wastemeter/config.toml)
    if let Some(global) = load_toml_file(global_config_path(), warnings) {
        layers.push(global);
    }

    // Layer 3: project local config (.wastemeter.toml)
    if let Some(project) = load_toml_file(project_config_path(), warnings) {
        layers.push(project);
    }

    let mut config = merge_layers(&layers, warnings);

    // Layer 4: environment variable overrides
    apply_env_overrides(&mut config, |name| std::env::var(name).ok());

    config
}

/// Apply the profile and validate. A config that fails validation is
/// replaced by the defaults so the tier partitions always hold.
fn resolve(mut config: WastemeterConfig, warnings: &mut Vec<String>) -> WastemeterConfig {
    config.apply_profile();
    if let Err(e) = config.validate() {
        warnings.push(format!("invalid configuration, falling back to defaults: {e}"));
        config = WastemeterConfig::default();
        config.apply_profile();
    }
    config
}

/// Load a TOML file as a raw value tree (if it exists and parses).
///
/// Malformed files are reported and skipped so a typo never keeps the
/// dashboard from starting.
fn load_toml_file(path: Option<PathBuf>, warnings: &mut Vec<String>) -> Option<toml::Value> {
    let path = path?;
    let content = fs::read_to_string(&path).ok()?;
    match toml::from_str(&content) {
        Ok(value) => Some(value),
        Err(e) => {
            warnings.push(format!(
                "ignoring malformed config file {}: {e}",
                path.display()
            ));
            None
        }
    }
}

/// Merge raw layers over the defaults and deserialize the result.
///
/// Layers whose merged result no longer deserializes (wrong value types) are
/// skipped as a whole.
fn merge_layers(layers: &[toml::Value], warnings: &mut Vec<String>) -> WastemeterConfig {
    let mut merged = match toml::Value::try_from(WastemeterConfig::default()) {
        Ok(value) => value,
        Err(_) => return WastemeterConfig::default(),
    };

    for layer in layers {
        let mut candidate = merged.clone();
        merge_toml(&mut candidate, layer);
        match candidate.clone().try_into::<WastemeterConfig>() {
            Ok(_) => merged = candidate,
            Err(e) => warnings.push(format!("ignoring config layer with invalid value types: {e}")),
        }
    }

    merged.try_into().unwrap_or_default()
}

/// Recursively overlay `overlay` onto `base`. Tables merge key by key; any
/// other value replaces what was there.
pub fn merge_toml(base: &mut toml::Value, overlay: &toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base), toml::Value::Table(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(key) {
                    Some(existing) => merge_toml(existing, value),
                    None => {
                        base.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (base, overlay) => *base = overlay.clone(),
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

impl WastemeterConfig {
    /// Reject threshold sets that would break the tier partitions.
    pub fn validate(&self) -> Result<()> {
        let t = &self.thresholds;
        for (name, value) in [
            ("redundancy_similarity", t.redundancy_similarity),
            ("reuse_similarity", t.reuse_similarity),
            ("topic_similarity", t.topic_similarity),
        ] {
            if !(0.0..=1.0).contains(&value) {
                bail!("thresholds.{name} must be within [0, 1], got {value}");
            }
        }
        if t.redundancy_efficient_below > t.redundancy_moderate_below {
            bail!("thresholds.redundancy_efficient_below must not exceed redundancy_moderate_below");
        }
        if t.reuse_efficient_at < t.reuse_moderate_at {
            bail!("thresholds.reuse_efficient_at must not be below reuse_moderate_at");
        }
        if t.refinement_efficient_max > t.refinement_moderate_max {
            bail!("thresholds.refinement_efficient_max must not exceed refinement_moderate_max");
        }
        if !(t.excess_efficient_min <= t.excess_efficient_max
            && t.excess_efficient_max <= t.excess_moderate_max)
        {
            bail!("thresholds.excess_* bounds must be ascending");
        }
        if t.latency_efficient_max_ms > t.latency_moderate_max_ms {
            bail!("thresholds.latency_efficient_max_ms must not exceed latency_moderate_max_ms");
        }
        if t.abandonment_efficient_below_ms > t.abandonment_moderate_below_ms {
            bail!("thresholds.abandonment_efficient_below_ms must not exceed the moderate bound");
        }
        if t.abandonment_rate_efficient_below > t.abandonment_rate_moderate_below {
            bail!("thresholds.abandonment_rate_efficient_below must not exceed the moderate bound");
        }
        if self.general.window_ms == 0 {
            bail!("general.window_ms must be positive");
        }
        if !(0.0..=1.0).contains(&self.demo.interaction_chance) {
            bail!("demo.interaction_chance must be within [0, 1]");
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// File paths
// ---------------------------------------------------------------------------

/// Directory for user-level state: `~/.wastemeter/`.
pub fn state_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".wastemeter"))
}

/// Path to the user global config: `~/.wastemeter/config.toml`.
fn global_config_path() -> Option<PathBuf> {
    state_dir().map(|dir| dir.join("config.toml"))
}

/// Path to the project local config: `.wastemeter.toml` in the current directory.
fn project_config_path() -> Option<PathBuf> {
    std::env::current_dir()
        .ok()
        .map(|cwd| cwd.join(".wastemeter.toml"))
}

/// Return the path to the global config file for display/init purposes.
pub fn global_config_file() -> Option<PathBuf> {
    global_config_path()
}

/// Return the path to the project config file for display purposes.
pub fn project_config_file() -> Option<PathBuf> {
    project_config_path()
}

// ---------------------------------------------------------------------------
// Environment variable overrides
// ---------------------------------------------------------------------------

/// Apply environment variable overrides (highest precedence layer).
///
/// Supported variables:
/// - `WASTEMETER_PROFILE`: threshold profile (`lenient`, `balanced`, `strict`)
/// - `WASTEMETER_WINDOW_MS`: sliding window duration
/// - `WASTEMETER_ADDR`: dashboard bind address
/// - `WASTEMETER_DATASET`: sustainability CSV path
/// - `WASTEMETER_DEMO`: demo feed on/off (`1`/`true`/`yes`/`on`)
/// - `WASTEMETER_LOGGING`: event log on/off
/// - `WASTEMETER_LOG_LEVEL`: diagnostic level
/// - `WASTEMETER_ANALYSIS_MODEL`: model for the analysis proxy
/// - `WASTEMETER_CHAT_MODEL`: model for the chat proxy
fn apply_env_overrides(config: &mut WastemeterConfig, var: impl Fn(&str) -> Option<String>) {
    // General
    if let Some(val) = var("WASTEMETER_PROFILE")
        && let Some(profile) = parse_profile(&val)
    {
        config.general.profile = profile;
    }
    if let Some(val) = var("WASTEMETER_WINDOW_MS")
        && let Ok(ms) = val.parse::<u64>()
        && ms > 0
    {
        config.general.window_ms = ms;
    }

    // Surfaces
    if let Some(val) = var("WASTEMETER_ADDR")
        && !val.is_empty()
    {
        config.web.addr = val;
    }
    if let Some(val) = var("WASTEMETER_DATASET")
        && !val.is_empty()
    {
        config.dataset.path = val;
    }
    if let Some(val) = var("WASTEMETER_DEMO") {
        config.demo.enabled = is_truthy(&val);
    }

    // Logging
    if let Some(val) = var("WASTEMETER_LOGGING") {
        config.logging.enabled = is_truthy(&val);
    }
    if let Some(val) = var("WASTEMETER_LOG_LEVEL")
        && !val.is_empty()
    {
        config.logging.level = val;
    }

    // LLM
    if let Some(val) = var("WASTEMETER_ANALYSIS_MODEL")
        && !val.is_empty()
    {
        config.llm.analysis.model = val;
    }
    if let Some(val) = var("WASTEMETER_CHAT_MODEL")
        && !val.is_empty()
    {
        config.llm.chat.model = val;
    }
}

/// Check if a string value represents a truthy boolean.
fn is_truthy(val: &str) -> bool {
    matches!(
        val.to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Parse a profile string.
fn parse_profile(val: &str) -> Option<schema::Profile> {
    match val.to_ascii_lowercase().as_str() {
        "lenient" => Some(schema::Profile::Lenient),
        "balanced" => Some(schema::Profile::Balanced),
        "strict" => Some(schema::Profile::Strict),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Config init / set / reset
// ---------------------------------------------------------------------------

/// Write the default annotated config to `~/.wastemeter/config.toml`.
///
/// Creates the `~/.wastemeter/` directory if it doesn't exist. Returns an
/// error if the file already exists (use `force = true` to overwrite).
pub fn init_config(force: bool) -> Result<PathBuf> {
    let path = global_config_path().context("could not determine home directory")?;

    if path.exists() && !force {
        bail!(
            "config file already exists at {}. Use --force to overwrite.",
            path.display()
        );
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("failed to create ~/.wastemeter/ directory")?;
    }

    fs::write(&path, WastemeterConfig::default_toml()).context("failed to write config file")?;

    Ok(path)
}

/// Set a single config key to a value in the global config file.
///
/// Reads the current global config (or the serialized defaults), updates the
/// specified key, checks that the result still deserializes and validates,
/// and writes it back. Supports dotted keys like `thresholds.reuse_similarity`.
pub fn set_config_value(key: &str, value: &str) -> Result<()> {
    let path = global_config_path().context("could not determine home directory")?;

    let mut root: toml::Value = if path.exists() {
        let content = fs::read_to_string(&path).context("failed to read config file")?;
        toml::from_str(&content).context("failed to parse config as TOML value")?
    } else {
        toml::Value::try_from(WastemeterConfig::default())
            .context("failed to serialize default config")?
    };

    // Fill in sections the file omits so any known key can be set.
    let mut full = toml::Value::try_from(WastemeterConfig::default())
        .context("failed to serialize default config")?;
    merge_toml(&mut full, &root);
    set_toml_value(&mut full, key, value)?;
    let updated: WastemeterConfig = full
        .clone()
        .try_into()
        .with_context(|| format!("invalid value for '{key}': '{value}'"))?;
    updated.validate()?;

    // Only persist the changed key on top of what the file already had.
    set_toml_value_or_insert(&mut root, key, &full)?;

    let output = toml::to_string_pretty(&root).context("failed to serialize updated config")?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("failed to create config directory")?;
    }
    fs::write(&path, output).context("failed to write config file")?;

    Ok(())
}

/// Apply a dotted-key update to an in-memory config.
///
/// The config is left untouched unless the result deserializes and validates.
/// Changing `general.profile` restores the profile-controlled thresholds from
/// the layered files and env before applying the new profile.
pub fn apply_update(config: &mut WastemeterConfig, key: &str, value: &str) -> Result<()> {
    let mut warnings = Vec::new();
    let base = layered_base(&mut warnings);
    for warning in &warnings {
        tracing::debug!("{warning}");
    }
    apply_update_over(config, key, value, &base.thresholds)
}

/// [`apply_update`] against an explicit threshold base.
fn apply_update_over(
    config: &mut WastemeterConfig,
    key: &str,
    value: &str,
    base: &schema::ThresholdsConfig,
) -> Result<()> {
    let mut root = toml::Value::try_from(&*config).context("failed to serialize config")?;
    set_toml_value(&mut root, key, value)?;
    let mut updated: WastemeterConfig = root
        .try_into()
        .with_context(|| format!("invalid value for '{key}': '{value}'"))?;
    if key == "general.profile" {
        updated.thresholds.restore_profile_keys(base);
        updated.apply_profile();
    }
    updated.validate()?;
    *config = updated;
    Ok(())
}

/// Copy the value at dotted `key` from `source` into `root`, creating
/// intermediate tables as needed.
fn set_toml_value_or_insert(root: &mut toml::Value, key: &str, source: &toml::Value) -> Result<()> {
    let parts: Vec<&str> = key.split('.').collect();
    let mut value = source;
    for part in &parts {
        value = value
            .get(part)
            .with_context(|| format!("config key not found: '{key}'"))?;
    }

    let mut current = root;
    for &part in &parts[..parts.len() - 1] {
        let table = current
            .as_table_mut()
            .with_context(|| format!("expected table above '{part}' in '{key}'"))?;
        current = table
            .entry(part.to_string())
            .or_insert_with(|| toml::Value::Table(toml::map::Map::new()));
    }
    let table = current
        .as_table_mut()
        .with_context(|| format!("expected table for '{key}'"))?;
    table.insert(parts[parts.len() - 1].to_string(), value.clone());
    Ok(())
}

/// Set a value in a TOML value tree using a dotted key path.
fn set_toml_value(root: &mut toml::Value, key: &str, raw_value: &str) -> Result<()> {
    let parts: Vec<&str> = key.split('.').collect();
    if parts.iter().any(|p| p.is_empty()) {
        bail!("empty config key segment in '{key}'");
    }

    // Navigate to the parent table
    let mut current = root;
    for &part in &parts[..parts.len() - 1] {
        current = current
            .get_mut(part)
            .with_context(|| format!("config key not found: section '{part}' in '{key}'"))?;
    }

    let leaf = parts[parts.len() - 1];

    // Determine the type of the existing value to parse correctly
    let table = current.as_table_mut().with_context(|| {
        format!(
            "expected table at '{}'",
            key.rsplit_once('.').map(|(s, _)| s).unwrap_or("")
        )
    })?;

    let new_value = match table.get(leaf) {
        None => bail!("config key not found: '{key}'"),
        Some(toml::Value::Boolean(_)) => toml::Value::Boolean(is_truthy(raw_value)),
        Some(toml::Value::Integer(_)) => {
            let n: i64 = raw_value
                .parse()
                .with_context(|| format!("expected integer for '{key}', got '{raw_value}'"))?;
            toml::Value::Integer(n)
        }
        Some(toml::Value::Float(_)) => {
            let f: f64 = raw_value
                .parse()
                .with_context(|| format!("expected float for '{key}', got '{raw_value}'"))?;
            toml::Value::Float(f)
        }
        Some(toml::Value::Table(_)) => bail!("'{key}' is a section, not a value"),
        Some(_) => toml::Value::String(raw_value.to_string()),
    };

    table.insert(leaf.to_string(), new_value);
    Ok(())
}

/// Reset the global config to defaults (overwrite the file).
pub fn reset_config() -> Result<PathBuf> {
    init_config(true)
}

/// Show the effective (fully resolved) config as TOML.
pub fn show_effective_config() -> Result<String> {
    let config = load();
    toml::to_string_pretty(&config).context("failed to serialize effective config")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
