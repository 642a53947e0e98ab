//! CLI for the appsweep catalog extractor.

mod commands;

use anyhow::{Context, Result};
use appsweep_core::config::{self, SweepConfig};
use appsweep_core::types::AppId;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use commands::{run_catalog, run_retry_failed, run_status, run_sweep, SweepOptions};

/// Top-level CLI for appsweep.
#[derive(Debug, Parser)]
#[command(name = "appsweep")]
#[command(about = "appsweep: resilient per-id extraction from a rate-limited app catalog", long_about = None)]
pub struct Cli {
    /// Config file (default: ~/.config/appsweep/config.toml, created if missing).
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Directory for results, exports and checkpoints (overrides config).
    #[arg(long, global = true, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Download the app list and merge it into catalog.json.
    Catalog,

    /// Classify pending ids: validate, fetch details, export failures.
    Run {
        /// Process only the first N pending ids.
        #[arg(long, value_name = "N")]
        limit: Option<usize>,
        /// Skip ids already classified in the last checkpoint.
        #[arg(long)]
        resume: bool,
        /// Fetch details directly without the existence check.
        #[arg(long)]
        no_validate: bool,
        /// Explicit ids instead of the catalog plan (comma separated).
        #[arg(long, value_delimiter = ',', value_name = "ID,...")]
        ids: Vec<AppId>,
    },

    /// Re-run ids from all_failed_app_ids.json until none are left.
    RetryFailed {
        /// Maximum number of retry rounds.
        #[arg(long, default_value = "5", value_name = "N")]
        max_rounds: u32,
        /// Pause between rounds in seconds.
        #[arg(long, default_value = "5", value_name = "SECS")]
        round_pause_secs: u64,
    },

    /// Show catalog, results, failures and checkpoint state.
    Status,
}

fn load_config(path: Option<&Path>) -> Result<SweepConfig> {
    match path {
        Some(p) => config::load_from_path(p)
            .with_context(|| format!("loading config from {}", p.display())),
        None => config::load_or_init(),
    }
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = load_config(cli.config.as_deref())?;
        tracing::debug!("loaded config: {:?}", cfg);
        let output_dir = match cli.output_dir {
            Some(dir) => dir,
            None => cfg.output_dir().context("resolving output dir")?,
        };

        match cli.command {
            CliCommand::Catalog => run_catalog(&cfg, &output_dir).await?,
            CliCommand::Run {
                limit,
                resume,
                no_validate,
                ids,
            } => {
                let opts = SweepOptions {
                    limit,
                    resume,
                    no_validate,
                    ids,
                };
                run_sweep(&cfg, &output_dir, opts).await?;
            }
            CliCommand::RetryFailed {
                max_rounds,
                round_pause_secs,
            } => run_retry_failed(&cfg, &output_dir, max_rounds, round_pause_secs).await?,
            CliCommand::Status => run_status(&output_dir)?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
