//! innate-rnn: train a random recurrent rate network on its own innate
//! trajectory, then fit and test a linear readout.
//!
//! # Usage
//!
//! ```bash
//! # Reference experiment with built-in defaults
//! cargo run --release
//!
//! # Custom config, JSON summary and checkpoint
//! ./innate-rnn --config innate.toml --summary out/summary.json --checkpoint out/run.json
//!
//! # Print the effective configuration and exit
//! ./innate-rnn --dump-config
//! ```
//!
//! # Environment Variables
//!
//! - `INNATE_CONFIG`: path to a TOML config (used when `--config` is absent)
//! - `RUST_LOG`: logging level (default: info)

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use innate_rnn::checkpoint::{save_json, RunCheckpoint};
use innate_rnn::config::ExperimentConfig;

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "innate-rnn")]
#[command(about = "Innate-trajectory training of a random recurrent rate network")]
#[command(version)]
struct CliArgs {
    /// TOML experiment config (otherwise $INNATE_CONFIG, ./innate.toml, defaults)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the random seed from the config
    #[arg(long)]
    seed: Option<u64>,

    /// Write the training summary as JSON to this path
    #[arg(long)]
    summary: Option<PathBuf>,

    /// Write weights, innate trajectory and summary as JSON to this path
    #[arg(long)]
    checkpoint: Option<PathBuf>,

    /// Print the effective config as TOML and exit
    #[arg(long)]
    dump_config: bool,

    /// Stop after harvesting the innate trajectory
    #[arg(long)]
    skip_training: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,
}

fn init_logging(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_logging(args.log_json);

    let mut config = match &args.config {
        Some(path) => ExperimentConfig::load_from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => ExperimentConfig::load(),
    };
    if let Some(seed) = args.seed {
        config.training.seed = seed;
    }

    if args.dump_config {
        print!("{}", config.to_toml().context("serializing config")?);
        return Ok(());
    }

    let mut trainer = config.build_trainer().context("building network")?;
    info!(
        n_units = trainer.weights().n_units(),
        n_plastic = trainer.weights().n_plastic(),
        connections = trainer.weights().w_rec.nnz(),
        n_steps = trainer.timing().n_steps(),
        seed = trainer.seed(),
        activation = trainer.params().activation.name(),
        update_every = trainer.params().update_every,
        "Network initialized"
    );

    if args.skip_training {
        trainer.harvest_innate().context("harvesting innate trajectory")?;
    } else {
        let summary = trainer.run().context("training")?;
        match summary.test.mean_mse {
            Some(mse) => info!(mean_mse = mse, "Run complete"),
            None => info!("Run complete (no test trials)"),
        }
        if let Some(path) = &args.summary {
            save_json(&summary, path).with_context(|| format!("writing summary {}", path.display()))?;
            info!(path = %path.display(), "Summary written");
        }
    }

    if let Some(path) = &args.checkpoint {
        save_json(&RunCheckpoint::from_trainer(&trainer), path)
            .with_context(|| format!("writing checkpoint {}", path.display()))?;
        info!(path = %path.display(), "Checkpoint written");
    }

    Ok(())
}
