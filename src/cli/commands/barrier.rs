use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use serde_json::json;
use std::io::{self, BufWriter, Write};

use crate::cli::output::Output;
use crate::config::ConfigLoader;
use crate::engine::Engine;
use crate::parallel::{Params, PartitionPolicy, ProgressMode};
use crate::workloads::barrier::{BarrierTouch, DEFAULT_WIDTH, WIDTH_PARAM, synthetic_paths};

#[derive(Args)]
pub struct BarrierArgs {
    /// Number of price paths (atoms)
    #[arg(long, default_value_t = 1000)]
    pub paths: usize,

    /// Returns per path
    #[arg(long, default_value_t = 250)]
    pub steps: usize,

    /// Barrier on the cumulative log-return
    #[arg(long, default_value_t = DEFAULT_WIDTH)]
    pub width: f64,

    /// Worker threads (0 = auto-detect)
    #[arg(long)]
    pub threads: Option<usize>,

    /// Molecules per worker
    #[arg(long)]
    pub batches: Option<usize>,

    /// Partitioning policy
    #[arg(long, value_enum)]
    pub partition: Option<PartitionPolicy>,

    /// Where progress goes
    #[arg(long, value_enum)]
    pub progress: Option<ProgressMode>,
}

/// CLI values that override file and environment configuration
#[derive(Serialize)]
struct Overrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    threads: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    batches: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    partition: Option<PartitionPolicy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    progress: Option<ProgressMode>,
}

pub fn execute(args: BarrierArgs, config_path: Option<&str>, output: &Output) -> Result<()> {
    let progress = if output.is_quiet() {
        Some(ProgressMode::None)
    } else {
        args.progress
    };
    let config = ConfigLoader::load_with_custom_config(config_path)?
        .with_overrides(Overrides {
            threads: args.threads,
            batches: args.batches,
            partition: args.partition,
            progress,
        })
        .extract()?;

    output.info(&format!("Scanning {} paths of {} steps", args.paths, args.steps));
    output.verbose(&format!(
        "{} workers, {} molecules ({} policy)",
        config.workers(),
        config.molecule_count(),
        config.partition
    ));

    let paths = synthetic_paths(args.paths, args.steps);
    let mut params = Params::new();
    params.insert(WIDTH_PARAM.to_string(), json!(args.width));

    let workers = config.workers();
    let table = Engine::new(config)
        .run(BarrierTouch, "paths", &paths, &params)
        .context("Barrier-touch dispatch failed")?
        .into_table()
        .context("Barrier-touch returned opaque results")?;

    let mut stdout = BufWriter::new(io::stdout().lock());
    for (path, touch) in table.rows() {
        match touch {
            Some(step) => writeln!(stdout, "{path}\t{step}")?,
            None => writeln!(stdout, "{path}\t-")?,
        }
    }
    stdout.flush()?;

    let touched = table.values().filter(|touch| touch.is_some()).count();
    output.success(&format!(
        "{touched} of {} paths touched the ±{} barrier",
        table.len(),
        args.width
    ));
    output.table_row("workers", &workers.to_string());
    output.table_row("first touch (min)", &first_touch_summary(table.values().flatten().min()));
    output.table_row("first touch (max)", &first_touch_summary(table.values().flatten().max()));
    Ok(())
}

fn first_touch_summary(step: Option<&usize>) -> String {
    step.map_or_else(|| "-".to_string(), ToString::to_string)
}
