// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # pexch
//!
//! Command-line interface for the partial exchange scheduler.
//!
//! ## Usage
//! ```bash
//! # Convert an epoch schedule to step thresholds
//! pexch schedule --schedule 0:0.1,10:0.5,20:1.0 --batch-size 32 --num-train 50000 --peers 4
//!
//! # Show how a model's tensors pack at a given fraction
//! pexch plan --manifest ./gpt2-small.json --fraction 0.25
//!
//! # Run a few steps over an in-process cluster
//! pexch simulate --manifest ./gpt2-small.json --fixed-fraction 0.3 --steps 12 --peers 4
//! pexch -c exchange.toml simulate --manifest ./gpt2-small.json --steps 100
//! ```

mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "pexch",
    about = "Adaptive partial gradient exchange scheduler",
    version,
    author
)]
struct Cli {
    /// Path to a TOML exchange configuration (used by `simulate`).
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,

    /// Enable verbose logging (repeat for more: -v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a schedule and print its step thresholds.
    Schedule {
        /// Schedule string, e.g. "0:0.1,10:0.5".
        #[arg(short, long)]
        schedule: String,

        /// Per-peer batch size.
        #[arg(short, long)]
        batch_size: u64,

        /// Number of training examples.
        #[arg(short, long)]
        num_train: u64,

        /// Number of peers in the cluster.
        #[arg(short, long, default_value_t = 1)]
        peers: u64,
    },

    /// Pack a model's tensors at a fraction and print the partitions.
    Plan {
        /// Path to a JSON tensor manifest.
        #[arg(short, long)]
        manifest: std::path::PathBuf,

        /// Budget fraction in (0, 1].
        #[arg(short, long)]
        fraction: f64,

        /// Raise the budget to the largest tensor instead of failing.
        #[arg(long)]
        adjust_budget: bool,

        /// Print the assignment as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Run the exchange for a number of steps over in-process peers.
    Simulate {
        /// Path to a JSON tensor manifest.
        #[arg(short, long)]
        manifest: std::path::PathBuf,

        /// Schedule string (ignored when --config is given).
        #[arg(short, long, conflicts_with = "fixed_fraction")]
        schedule: Option<String>,

        /// Constant fraction (ignored when --config is given).
        #[arg(long)]
        fixed_fraction: Option<f64>,

        /// Per-peer batch size, required with --schedule.
        #[arg(short, long)]
        batch_size: Option<u64>,

        /// Number of training examples, required with --schedule.
        #[arg(short, long)]
        num_train: Option<u64>,

        /// Number of training steps to run.
        #[arg(long, default_value_t = 10)]
        steps: u64,

        /// Number of in-process peers.
        #[arg(short, long, default_value_t = 2)]
        peers: usize,

        /// Reduce the whole active partition in one call.
        #[arg(long)]
        grouped: bool,

        /// Divide reduced gradients by the number of peers.
        #[arg(long)]
        average: bool,

        /// Raise too-small budgets to the largest tensor.
        #[arg(long)]
        adjust_budget: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing/logging based on verbosity.
    commands::init_tracing(cli.verbose);

    match cli.command {
        Commands::Schedule {
            schedule,
            batch_size,
            num_train,
            peers,
        } => commands::schedule::execute(schedule, batch_size, num_train, peers),
        Commands::Plan {
            manifest,
            fraction,
            adjust_budget,
            json,
        } => commands::plan::execute(manifest, fraction, adjust_budget, json),
        Commands::Simulate {
            manifest,
            schedule,
            fixed_fraction,
            batch_size,
            num_train,
            steps,
            peers,
            grouped,
            average,
            adjust_budget,
        } => {
            let config = match cli.config {
                Some(path) => partial_exchange::ExchangeConfig::from_file(&path)?,
                None => partial_exchange::ExchangeConfig {
                    fixed_fraction: if schedule.is_some() {
                        None
                    } else {
                        Some(fixed_fraction.unwrap_or(0.3))
                    },
                    schedule,
                    batch_size,
                    num_train,
                    initial_fraction: None,
                    adjust_budget,
                    reduce: if grouped {
                        partial_exchange::ReduceMode::Grouped
                    } else {
                        partial_exchange::ReduceMode::PerTensor
                    },
                    average,
                },
            };
            commands::simulate::execute(manifest, config, steps, peers)
        }
    }
}
