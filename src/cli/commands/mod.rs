//! Command implementations for the mpjob CLI

use anyhow::Result;
use clap::{Parser, Subcommand};

use super::output::Output;

pub mod barrier;
pub mod config;
pub mod partition;

#[derive(Parser)]
#[command(
    name = "mpjob",
    version = env!("CARGO_PKG_VERSION"),
    about = "Partition ordered work into molecules and dispatch them across a worker pool",
    long_about = "mpjob splits a collection of atoms into contiguous molecules, runs a function \
                  over every molecule on a bounded pool of workers, and merges the partial \
                  results back into atom order while reporting progress and ETA."
)]
pub struct Cli {
    /// Increase verbosity (can be repeated)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output, including progress
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Use custom configuration file
    #[arg(long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print molecule boundaries for a number of atoms
    Partition(partition::PartitionArgs),
    /// Run the barrier-touch workload on synthetic price paths
    Barrier(barrier::BarrierArgs),
    /// Show the merged configuration
    Config(config::ConfigArgs),
}

impl Cli {
    pub fn run(self) -> Result<()> {
        setup_logging(self.verbose, self.quiet);
        let output = Output::new(self.verbose > 0, self.quiet);

        match self.command {
            Commands::Partition(args) => partition::execute(args, &output),
            Commands::Barrier(args) => barrier::execute(args, self.config.as_deref(), &output),
            Commands::Config(args) => config::execute(args, self.config.as_deref()),
        }
    }
}

fn setup_logging(verbose: u8, quiet: bool) {
    if quiet {
        return;
    }

    let filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| match verbose {
            0 => tracing_subscriber::EnvFilter::new("warn"),
            1 => tracing_subscriber::EnvFilter::new("info"),
            2 => tracing_subscriber::EnvFilter::new("debug"),
            _ => tracing_subscriber::EnvFilter::new("trace"),
        });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
