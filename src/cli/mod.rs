//! CLI command implementations for wastemeter.
//!
//! Provides subcommand handlers for:
//! - `wastemeter analyze <file.jsonl>`: metrics snapshot for a records file
//! - `wastemeter score`: composite score from sub-metrics
//! - `wastemeter demo`: replay the demo feed through the scheduler
//! - `wastemeter sustainability [path]`: dataset aggregates and top initiatives
//! - `wastemeter stats`: request statistics from the event log
//! - `wastemeter health`: config, dataset, LLM endpoints, event log
//! - `wastemeter config show|init|set|reset`: configuration management

use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result, anyhow};
use colored::{ColoredString, Colorize};
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::analytics::logger::EventLog;
use crate::analytics::reporter::{self, Stats, TrendEntry};
use crate::config::{self, WastemeterConfig};
use crate::demo::DemoFeed;
use crate::llm::client::{ChatBackend, ChatClient};
use crate::metrics::MetricsSnapshot;
use crate::metrics::score::{self, EfficiencyLevel, EfficiencyScore, ScoreInputs};
use crate::metrics::tier::Tier;
use crate::scheduler::Scheduler;
use crate::store::RecordStore;
use crate::store::record::{self, Millis, now_millis};
use crate::sustainability::{self, Aggregates, Report};

/// Output format for report commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
    Csv,
}

impl OutputFormat {
    pub fn from_str_opt(s: Option<&str>) -> Self {
        match s {
            Some("json") => Self::Json,
            Some("csv") => Self::Csv,
            _ => Self::Table,
        }
    }
}

// ---------------------------------------------------------------------------
// wastemeter analyze
// ---------------------------------------------------------------------------

/// Compute a snapshot for a JSONL records file.
///
/// "Now" defaults to the newest record's timestamp so historic files are
/// judged against their own window rather than the wall clock.
pub fn run_analyze(
    config: &WastemeterConfig,
    path: &Path,
    now: Option<Millis>,
    format: OutputFormat,
) -> Result<()> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let records = record::parse_jsonl(&content)?;

    if records.is_empty() {
        println!("{}", "No records in file.".yellow());
        return Ok(());
    }

    let now = now
        .or_else(|| records.iter().map(|r| r.timestamp).max())
        .unwrap_or_else(now_millis);

    let mut store = RecordStore::new(config.general.window_ms);
    for record in records {
        let timestamp = record.timestamp;
        store.insert(record, timestamp);
    }
    tracing::debug!(records = store.len(), now, "analyzing records file");

    let snapshot = store.snapshot(config, now);
    print_snapshot(&snapshot, format)
}

// ---------------------------------------------------------------------------
// wastemeter demo
// ---------------------------------------------------------------------------

/// Replay the whole demo script on a synthetic clock and report the result.
pub fn run_demo(
    config: &WastemeterConfig,
    interval_ms: Option<u64>,
    seed: Option<u64>,
    format: OutputFormat,
) -> Result<()> {
    let mut demo_config = config.demo.clone();
    if let Some(interval_ms) = interval_ms {
        demo_config.interval_ms = interval_ms;
    }

    let rng = seed.map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);
    let feed = DemoFeed::with_rng(demo_config.interaction_chance, rng);
    let steps = feed.remaining();

    let store = Arc::new(Mutex::new(RecordStore::new(config.general.window_ms)));
    let scheduler = Scheduler::new();
    let subscription = feed.subscribe(&scheduler, Arc::clone(&store), &demo_config);

    let start = now_millis();
    let interval = demo_config.interval_ms as Millis;
    let mut now = start;
    for step in 0..=steps {
        now = start + step as Millis * interval;
        scheduler.tick(now);
    }
    drop(subscription);

    let snapshot = store
        .lock()
        .map_err(|_| anyhow!("record store lock poisoned"))?
        .snapshot(config, now);
    print_snapshot(&snapshot, format)
}

// ---------------------------------------------------------------------------
// Snapshot output
// ---------------------------------------------------------------------------

fn print_snapshot(snapshot: &MetricsSnapshot, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(snapshot)?),
        OutputFormat::Csv => {
            let mut writer = csv::Writer::from_writer(std::io::stdout());
            writer
                .serialize(&snapshot.metrics)
                .context("failed to write CSV record")?;
            writer.flush().context("failed to flush CSV")?;
        }
        OutputFormat::Table => print_snapshot_table(snapshot),
    }
    Ok(())
}

fn print_snapshot_table(snapshot: &MetricsSnapshot) {
    let m = &snapshot.metrics;

    println!("{}", "wastemeter Efficiency Report".bold().cyan());
    println!("{}", "=".repeat(60));
    println!();
    print_efficiency(&snapshot.efficiency);
    println!();

    println!("{}", "Metrics".bold().cyan());
    println!("  {:<28} {:>12}  Tier", "Metric", "Value");
    println!("  {}", "-".repeat(50));
    let rows = [
        ("Redundancy rate", pct(m.redundancy_rate), snapshot.redundancy_analysis.tier),
        ("Output reuse rate", pct(m.reuse_rate), snapshot.output_reuse_analysis.tier),
        (
            "Avg refinement loops",
            format!("{:.2}", m.average_refinement_loops),
            snapshot.refinement_analysis.tier,
        ),
        (
            "Avg excess ratio",
            format!("{:.2}x", m.average_excess_ratio),
            snapshot.excess_analysis.tier,
        ),
        (
            "Latency per token",
            format!("{:.1}ms", m.average_latency_per_token),
            snapshot.latency_analysis.tier,
        ),
        ("Abandonment rate", pct(m.abandonment_rate), snapshot.abandonment_analysis.tier),
    ];
    for (name, value, tier) in rows {
        println!("  {:<28} {:>12}  {}", name, value, colorize_tier(tier));
    }
    println!();

    println!(
        "  {} {} prompts, {} outputs, {} interactions",
        "Records:".bold(),
        m.total_prompts,
        m.total_outputs,
        m.total_interactions
    );
    println!(
        "  {} {} total, {} beyond what was asked for",
        "Tokens: ".bold(),
        format_number(m.total_tokens.round() as usize),
        format_number(m.wasted_tokens.round() as usize),
    );

    let recent = &snapshot.redundancy_analysis.recent_similarities;
    if !recent.is_empty() {
        println!();
        println!("{}", "Recent Redundant Prompts".bold().cyan());
        for (i, pair) in recent.iter().enumerate() {
            let line = format!(
                "  {:>5.1}%  {}  ~  {}",
                pair.similarity * 100.0,
                truncate(&pair.text, 30),
                truncate(&pair.similar_to, 30),
            );
            if i % 2 == 0 {
                println!("{line}");
            } else {
                println!("{}", line.dimmed());
            }
        }
    }
}

fn print_efficiency(efficiency: &EfficiencyScore) {
    let label = match efficiency.level {
        EfficiencyLevel::High => efficiency.level.label().green().bold(),
        EfficiencyLevel::Moderate => efficiency.level.label().yellow().bold(),
        EfficiencyLevel::Wasteful => efficiency.level.label().red().bold(),
    };
    println!(
        "  {} {:.1}%  {}",
        "Efficiency score:".bold(),
        efficiency.score * 100.0,
        label
    );
    let b = &efficiency.breakdown;
    println!(
        "  {}",
        format!(
            "redundancy {:.3} + reuse {:.3} + refinement {:.3} + excess {:.3}",
            b.redundancy, b.reuse, b.refinement, b.excess
        )
        .dimmed()
    );
}

// ---------------------------------------------------------------------------
// wastemeter score
// ---------------------------------------------------------------------------

pub fn run_score(inputs: ScoreInputs, format: OutputFormat) -> Result<()> {
    let efficiency = score::composite(&inputs);
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&efficiency)?),
        OutputFormat::Csv => {
            println!("score,level");
            println!("{:.4},{}", efficiency.score, efficiency.level.label());
        }
        OutputFormat::Table => print_efficiency(&efficiency),
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// wastemeter sustainability
// ---------------------------------------------------------------------------

/// Summarize the sustainability dataset at `path` (or the configured one).
pub fn run_sustainability(
    config: &WastemeterConfig,
    path: Option<&Path>,
    format: OutputFormat,
) -> Result<()> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => sustainability::resolve_path(&config.dataset.path),
    };

    let Some((raw, dataset)) = sustainability::load(&path)? else {
        println!(
            "{}",
            format!("Dataset not found at {}.", path.display()).yellow()
        );
        return Ok(());
    };

    match format {
        OutputFormat::Csv => print!("{raw}"),
        OutputFormat::Json => {
            let value = serde_json::json!({
                "count": dataset.len(),
                "aggregates": dataset.aggregates(),
                "report": dataset.report(config.dataset.top_initiatives),
            });
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        OutputFormat::Table => print_sustainability_table(
            &dataset.aggregates(),
            &dataset.report(config.dataset.top_initiatives),
        ),
    }
    Ok(())
}

fn print_sustainability_table(aggregates: &Aggregates, report: &Report) {
    println!("{}", "AI Sustainability Dataset".bold().cyan());
    println!("{}", "=".repeat(60));
    println!("  {} {}", "Initiatives:       ".bold(), aggregates.ai_queries);
    println!("  {} {} kg", "CO2 reduction:     ".bold(), aggregates.co2_kg);
    println!("  {} {} kWh", "Energy (estimate): ".bold(), aggregates.energy_kwh);
    println!("  {} {} L", "Water (estimate):  ".bold(), aggregates.water_l);
    println!("  {} {}%", "Avg adoption:      ".bold(), aggregates.adoption_avg);
    println!(
        "  {} ${:.2}M, ROI {:.1} years",
        "Cost reduction:    ".bold(),
        report.total_cost_reduction_musd,
        report.avg_roi_years
    );
    println!();

    if report.top_initiatives.is_empty() {
        return;
    }
    println!("{}", "Top Initiatives by Impact".bold().cyan());
    println!("  {:<20} {:>7} {:>9}  Description", "Area", "Impact", "CO2 t");
    println!("  {}", "-".repeat(58));
    for initiative in &report.top_initiatives {
        println!(
            "  {:<20} {:>7.1} {:>9.1}  {}",
            truncate(&initiative.area, 20),
            initiative.impact_score,
            initiative.carbon_reduction,
            truncate(&initiative.description, 40),
        );
    }
}

// ---------------------------------------------------------------------------
// wastemeter stats
// ---------------------------------------------------------------------------

/// Show request statistics from the event log.
pub fn run_stats(config: &WastemeterConfig, format: OutputFormat, days: Option<u32>) -> Result<()> {
    let events = EventLog::from_config(&config.logging).read_since_days(days);
    let stats = reporter::build_stats(&events);

    if stats.total_requests == 0 {
        println!(
            "{}",
            "No data yet. Run `wastemeter serve` and use the dashboard to see stats.".yellow()
        );
        return Ok(());
    }

    let trends = reporter::build_trends(&events);
    match format {
        OutputFormat::Json => print_stats_json(&stats, &trends)?,
        OutputFormat::Csv => print_stats_csv(&stats)?,
        OutputFormat::Table => print_stats_table(&stats, &trends),
    }

    Ok(())
}

fn print_stats_table(stats: &Stats, trends: &[TrendEntry]) {
    println!("{}", "wastemeter Request Report".bold().cyan());
    println!("{}", "=".repeat(60));
    println!();

    println!("  {} {}", "Total requests:".bold(), format_number(stats.total_requests));
    println!(
        "  {} {} ({:.1}%)",
        "Errors:        ".bold(),
        stats.error_requests,
        stats.error_pct()
    );
    println!("  {} {:.1}ms", "Avg duration:  ".bold(), stats.avg_duration_ms);
    println!();

    println!("{}", "Endpoints".bold().cyan());
    println!(
        "  {:<30} {:>7} {:>7} {:>10} {:>10}",
        "Endpoint", "Count", "Errors", "Avg ms", "Max ms"
    );
    println!("  {}", "-".repeat(68));
    for (i, ep) in stats.endpoint_stats.iter().take(15).enumerate() {
        let line = format!(
            "  {:<30} {:>7} {:>7} {:>10.1} {:>10}",
            truncate(&ep.endpoint, 30),
            ep.count,
            ep.errors,
            ep.avg_duration_ms,
            ep.max_duration_ms,
        );
        if i % 2 == 0 {
            println!("{line}");
        } else {
            println!("{}", line.dimmed());
        }
    }

    if !stats.model_usage.is_empty() {
        println!();
        println!("{}", "Upstream Models".bold().cyan());
        for (model, calls) in &stats.model_usage {
            println!("  {:<36} {:>7}", model, calls);
        }
    }

    if trends.len() > 1 {
        println!();
        println!("{}", "Daily".bold().cyan());
        for t in trends {
            println!(
                "  {:<12} {:>7} requests {:>5} errors {:>9.1}ms avg",
                t.date, t.requests, t.errors, t.avg_duration_ms
            );
        }
    }
}

fn print_stats_json(stats: &Stats, trends: &[TrendEntry]) -> Result<()> {
    let value = serde_json::json!({
        "total_requests": stats.total_requests,
        "error_requests": stats.error_requests,
        "avg_duration_ms": stats.avg_duration_ms,
        "endpoints": stats.endpoint_stats.iter().map(|e| serde_json::json!({
            "endpoint": e.endpoint,
            "count": e.count,
            "errors": e.errors,
            "avg_duration_ms": e.avg_duration_ms,
            "max_duration_ms": e.max_duration_ms,
        })).collect::<Vec<_>>(),
        "models": stats.model_usage.iter().map(|(model, calls)| serde_json::json!({
            "model": model,
            "calls": calls,
        })).collect::<Vec<_>>(),
        "daily": trends.iter().map(|t| serde_json::json!({
            "date": t.date,
            "requests": t.requests,
            "errors": t.errors,
            "avg_duration_ms": t.avg_duration_ms,
        })).collect::<Vec<_>>(),
    });

    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

fn print_stats_csv(stats: &Stats) -> Result<()> {
    let mut writer = csv::Writer::from_writer(std::io::stdout());
    writer.write_record(["endpoint", "count", "errors", "avg_duration_ms", "max_duration_ms"])?;
    for ep in &stats.endpoint_stats {
        writer.write_record([
            ep.endpoint.clone(),
            ep.count.to_string(),
            ep.errors.to_string(),
            format!("{:.1}", ep.avg_duration_ms),
            ep.max_duration_ms.to_string(),
        ])?;
    }
    writer.flush().context("failed to flush CSV")?;
    Ok(())
}

// ---------------------------------------------------------------------------
// wastemeter health
// ---------------------------------------------------------------------------

/// Check config files, dataset, API keys, and the event log.
pub fn run_health(config: &WastemeterConfig) -> Result<()> {
    println!("{}", "wastemeter Health Check".bold().cyan());
    println!("{}", "=".repeat(40));

    // 0. Config file status
    let global_exists = config::global_config_file().is_some_and(|p| p.exists());
    let project_exists = config::project_config_file().is_some_and(|p| p.exists());
    print_health_item(
        "Global config",
        global_exists,
        if global_exists {
            "~/.wastemeter/config.toml found"
        } else {
            "not found (run `wastemeter config init` to create)"
        },
    );
    print_health_item(
        "Project config",
        project_exists,
        if project_exists {
            ".wastemeter.toml found"
        } else {
            "none (optional)"
        },
    );
    match config.validate() {
        Ok(()) => print_health_item("Thresholds", true, &format!("profile {}", config.general.profile)),
        Err(e) => print_health_item("Thresholds", false, &e.to_string()),
    }

    // 1. Dataset
    let dataset_path = sustainability::resolve_path(&config.dataset.path);
    let dataset = sustainability::load(&dataset_path);
    let (dataset_ok, dataset_detail) = match &dataset {
        Ok(Some((_, data))) => (true, format!("{} rows in {}", data.len(), dataset_path.display())),
        Ok(None) => (false, format!("not found at {}", dataset_path.display())),
        Err(e) => (false, format!("{e:#}")),
    };
    print_health_item("Sustainability dataset", dataset_ok, &dataset_detail);

    // 2. LLM endpoints
    for (name, endpoint) in [("Analysis LLM", &config.llm.analysis), ("Chat LLM", &config.llm.chat)] {
        match ChatClient::from_endpoint(endpoint, config.llm.timeout_ms) {
            Ok(client) => {
                let reachable = client.is_reachable();
                let detail = if reachable {
                    format!("{} via {}", client.model_name(), endpoint.base_url)
                } else {
                    format!("{} not reachable", endpoint.base_url)
                };
                print_health_item(name, reachable, &detail);
            }
            Err(e) => print_health_item(name, false, &e.to_string()),
        }
    }

    // 3. Event log
    let log = EventLog::from_config(&config.logging);
    match log.path() {
        Some(path) if path.exists() => print_health_item(
            "Event log",
            true,
            &format!("{} events", log.read_all().len()),
        ),
        Some(_) => print_health_item("Event log", true, "no events yet"),
        None => print_health_item("Event log", false, "disabled"),
    }

    Ok(())
}

fn print_health_item(name: &str, ok: bool, detail: &str) {
    let status = if ok {
        "✓".green().bold()
    } else {
        "✗".red().bold()
    };
    println!("  {} {:<25} {}", status, name, detail.dimmed());
}

// ---------------------------------------------------------------------------
// wastemeter config show | init | set | reset
// ---------------------------------------------------------------------------

/// Show the effective (merged) configuration as TOML.
pub fn run_config_show() -> Result<()> {
    let toml_str = config::show_effective_config()?;
    println!("{}", "Effective wastemeter Configuration".bold().cyan());
    println!("{}", "=".repeat(50));
    println!();
    println!("{toml_str}");

    // Show source info
    let global_exists = config::global_config_file().is_some_and(|p| p.exists());
    let project_exists = config::project_config_file().is_some_and(|p| p.exists());
    println!("{}", "Sources (highest priority last):".dimmed());
    println!("  {} built-in defaults", "·".dimmed());
    if global_exists {
        println!("  {} {}", "✓".green(), "~/.wastemeter/config.toml".dimmed());
    } else {
        println!(
            "  {} {}",
            "·".dimmed(),
            "~/.wastemeter/config.toml (not found)".dimmed()
        );
    }
    if project_exists {
        println!("  {} {}", "✓".green(), ".wastemeter.toml".dimmed());
    } else {
        println!("  {} {}", "·".dimmed(), ".wastemeter.toml (not found)".dimmed());
    }
    println!(
        "  {} {}",
        "·".dimmed(),
        "WASTEMETER_* environment variables".dimmed()
    );

    Ok(())
}

/// Initialize a default config file at `~/.wastemeter/config.toml`.
pub fn run_config_init(force: bool) -> Result<()> {
    let path = config::init_config(force)?;
    println!(
        "{} Config written to {}",
        "✓".green().bold(),
        path.display()
    );
    println!("  {}", "Edit the file to tune thresholds and endpoints.".dimmed());
    Ok(())
}

/// Set a single configuration value in the global config file.
pub fn run_config_set(key: &str, value: &str) -> Result<()> {
    config::set_config_value(key, value)?;
    println!("{} Set {} = {}", "✓".green().bold(), key.bold(), value);
    Ok(())
}

/// Reset configuration to defaults.
pub fn run_config_reset() -> Result<()> {
    let path = config::reset_config()?;
    println!(
        "{} Config reset to defaults at {}",
        "✓".green().bold(),
        path.display()
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Formatting helpers
// ---------------------------------------------------------------------------

/// Format a number with comma separators for readability.
fn format_number(n: usize) -> String {
    let s = n.to_string();
    let mut result = String::new();
    for (i, ch) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(ch);
    }
    result.chars().rev().collect()
}

/// Truncate a string to `max_len` characters, appending "…" if truncated.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(1)).collect();
        format!("{kept}…")
    }
}

fn pct(rate: f64) -> String {
    format!("{:.1}%", rate * 100.0)
}

fn colorize_tier(tier: Tier) -> ColoredString {
    match tier {
        Tier::Efficient => tier.label().green(),
        Tier::Moderate => tier.label().yellow(),
        Tier::Waste => tier.label().red(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
