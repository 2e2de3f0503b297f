//! Configuration management for mpjob
//!
//! [`DispatchConfig`] holds every knob of a dispatch. [`core::ConfigLoader`]
//! layers it from embedded defaults, config files and `MPJOB_` environment
//! variables.

pub mod core;

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

use crate::parallel::{ExecutionStrategy, PartitionPolicy, Partitioner, ProgressMode};

pub use self::core::ConfigLoader;

/// Settings for one engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Worker threads (0 = auto-detect)
    pub threads: usize,

    /// Percentage of CPU cores to use when auto-detecting (1-100)
    pub thread_percentage: u8,

    /// Molecules per worker
    pub batches: usize,

    /// Partitioning policy
    pub partition: PartitionPolicy,

    /// Mirror nested partitions so the widest molecule comes last
    pub upper_triangle: bool,

    /// Whether `batches` still subdivides work when running on one worker
    pub sequential_batching: bool,

    /// Where progress lines go
    pub progress: ProgressMode,

    /// Progress label (defaults to the target function's name)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    /// Channel buffer size multiplier (buffer = workers * multiplier)
    pub channel_buffer_multiplier: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            threads: 0,
            thread_percentage: 75,
            batches: 1,
            partition: PartitionPolicy::Linear,
            upper_triangle: false,
            sequential_batching: false,
            progress: ProgressMode::Stderr,
            label: None,
            channel_buffer_multiplier: 2,
        }
    }
}

impl DispatchConfig {
    pub fn validate(&self) -> Result<()> {
        if self.batches == 0 {
            bail!("batches must be at least 1");
        }
        if !(1..=100).contains(&self.thread_percentage) {
            bail!(
                "thread_percentage must be between 1 and 100, got {}",
                self.thread_percentage
            );
        }
        if self.channel_buffer_multiplier == 0 {
            bail!("channel_buffer_multiplier must be at least 1");
        }
        Ok(())
    }

    /// Number of workers after resolving `threads = 0`
    pub fn workers(&self) -> usize {
        if self.threads > 0 {
            self.threads
        } else {
            ExecutionStrategy::calculate_optimal_workers(0, self.thread_percentage)
        }
    }

    pub fn strategy(&self) -> ExecutionStrategy {
        ExecutionStrategy::from_concurrency(self.workers())
    }

    /// Target molecule count: workers times batches, unless batching is off for sequential runs
    pub fn molecule_count(&self) -> usize {
        let workers = self.workers();
        if workers == 1 && !self.sequential_batching {
            1
        } else {
            workers * self.batches.max(1)
        }
    }

    pub fn partitioner(&self) -> Box<dyn Partitioner> {
        self.partition.partitioner(self.upper_triangle)
    }
}
