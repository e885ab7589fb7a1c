use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use wastemeter::cli::{self, OutputFormat};
use wastemeter::config;
use wastemeter::metrics::score::ScoreInputs;
use wastemeter::web;

#[derive(Debug, Parser)]
#[command(name = "wastemeter")]
#[command(about = "Measure how efficiently AI assistance is being used")]
struct App {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Start the dashboard server
    Serve {
        /// Address to bind (overrides config)
        #[arg(long)]
        addr: Option<String>,
        /// Feed the built-in demo script into the store
        #[arg(long)]
        demo: bool,
    },
    /// Compute an efficiency snapshot for a JSONL file of records
    Analyze {
        /// Path to the records file
        path: PathBuf,
        /// Evaluate at this epoch-millisecond time instead of the newest record
        #[arg(long)]
        now: Option<i64>,
        /// Output format: table (default), json, csv
        #[arg(long, default_value = "table")]
        format: String,
    },
    /// Compute the composite efficiency score from sub-metrics
    Score {
        #[arg(long, default_value = "0")]
        redundancy: f64,
        #[arg(long, default_value = "0")]
        reuse: f64,
        #[arg(long, default_value = "0")]
        loops: f64,
        #[arg(long, default_value = "0")]
        excess: f64,
        /// Output format: table (default), json, csv
        #[arg(long, default_value = "table")]
        format: String,
    },
    /// Replay the demo script offline and report the resulting metrics
    Demo {
        /// Simulated milliseconds between demo steps
        #[arg(long)]
        interval_ms: Option<u64>,
        /// Seed for the interaction coin flips
        #[arg(long)]
        seed: Option<u64>,
        /// Output format: table (default), json, csv
        #[arg(long, default_value = "table")]
        format: String,
    },
    /// Summarize the AI sustainability dataset
    Sustainability {
        /// Dataset path (defaults to the configured one)
        path: Option<PathBuf>,
        /// Output format: table (default), json, csv
        #[arg(long, default_value = "table")]
        format: String,
    },
    /// Show dashboard request statistics
    Stats {
        /// Output format: table (default), json, csv
        #[arg(long, default_value = "table")]
        format: String,
        /// Only include the last N days of data
        #[arg(long)]
        days: Option<u32>,
    },
    /// Check config, dataset, API keys and the event log
    Health,
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Debug, Subcommand)]
enum ConfigAction {
    /// Print the effective merged configuration
    Show,
    /// Write a default config to ~/.wastemeter/config.toml
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Set a single value, e.g. `thresholds.redundancy_similarity 0.6`
    Set { key: String, value: String },
    /// Restore the default config file
    Reset,
}

fn main() -> Result<()> {
    let app = App::parse();
    // The log level lives in the config, so config problems are held back
    // until the subscriber is installed.
    let (mut config, warnings) = config::load_with_warnings();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .with_writer(std::io::stderr)
        .init();

    for warning in &warnings {
        tracing::warn!("{warning}");
    }

    match app.command {
        Commands::Serve { addr, demo } => {
            if let Some(addr) = addr {
                config.web.addr = addr;
            }
            config.demo.enabled |= demo;
            config.validate()?;
            web::serve(config)
        }
        Commands::Analyze { path, now, format } => {
            let fmt = OutputFormat::from_str_opt(Some(&format));
            cli::run_analyze(&config, &path, now, fmt)
        }
        Commands::Score {
            redundancy,
            reuse,
            loops,
            excess,
            format,
        } => {
            let inputs = ScoreInputs {
                redundancy_rate: redundancy,
                reuse_rate: reuse,
                refinement_loops: loops,
                excess_ratio: excess,
            };
            cli::run_score(inputs, OutputFormat::from_str_opt(Some(&format)))
        }
        Commands::Demo {
            interval_ms,
            seed,
            format,
        } => {
            let fmt = OutputFormat::from_str_opt(Some(&format));
            cli::run_demo(&config, interval_ms, seed, fmt)
        }
        Commands::Sustainability { path, format } => {
            let fmt = OutputFormat::from_str_opt(Some(&format));
            cli::run_sustainability(&config, path.as_deref(), fmt)
        }
        Commands::Stats { format, days } => {
            let fmt = OutputFormat::from_str_opt(Some(&format));
            cli::run_stats(&config, fmt, days)
        }
        Commands::Health => cli::run_health(&config),
        Commands::Config { action } => match action {
            ConfigAction::Show => cli::run_config_show(),
            ConfigAction::Init { force } => cli::run_config_init(force),
            ConfigAction::Set { key, value } => cli::run_config_set(&key, &value),
            ConfigAction::Reset => cli::run_config_reset(),
        },
    }
}
