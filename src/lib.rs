//! # mpjob - Molecule-parallel job dispatch
//!
//! Splits an ordered collection of *atoms* into contiguous *molecules*, runs a
//! target function over every molecule on a bounded pool of worker threads, and
//! merges the per-molecule partial results back into atom order.
//!
//! ## Features
//!
//! - **Partitioning**: equal-size (`linear`) and triangular-workload (`nested`) policies
//! - **Dispatch**: sequential or bounded-parallel, results in completion order
//! - **Fail fast**: the first worker error cancels the rest of the batch
//! - **Progress**: timestamped percentage and ETA lines, a progress bar, or tracing events
//! - **Layered config**: embedded defaults, user and project files, `MPJOB_` environment
//!
//! ## Quick Start
//!
//! ```bash
//! # Show the molecule boundaries for 10 atoms in 4 molecules
//! mpjob partition 10 4
//!
//! # Run the barrier-touch workload on 8 threads
//! mpjob barrier --paths 5000 --threads 8
//! ```

pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod parallel;
pub mod workloads;

pub use config::{ConfigLoader, DispatchConfig};
pub use engine::Engine;
pub use error::{DispatchError, Result};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");
pub const PKG_DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
