//! Generic molecule dispatch framework
//!
//! This module splits an ordered collection of atoms into molecules, runs a
//! target function over every molecule, and merges the partial results back
//! into atom order.
//!
//! # Architecture Responsibilities
//!
//! ```text
//! atoms ─▶ partition ─▶ job ─▶ core (Dispatcher) ─▶ aggregate ─▶ result
//!                                │      │
//!                                │      └─▶ invoke × N (worker threads)
//!                                └─▶ progress (collecting thread only)
//! ```
//!
//! - **partition**: boundary indices for a molecule count (linear or nested policy)
//! - **job**: one self-contained descriptor per molecule
//! - **invoke**: calls the target function for one descriptor
//! - **core**: Sequential vs Parallel execution with crossbeam channels
//! - **progress**: percent complete and ETA after each completion
//! - **aggregate**: sorts table-like partials by atom index
//!
//! Completion order is not result order. Only the aggregator restores order,
//! and only for table-like partials.
//!
//! # Example Usage
//!
//! ```rust
//! use mpjob::parallel::{
//!     Molecule, Params, Partial, SilentReporter, Table, aggregate, build_jobs, dispatch,
//!     lin_parts, molecule_fn,
//! };
//!
//! let atoms: Vec<u64> = (0..10).collect();
//! let double = molecule_fn("double", |m: &Molecule<'_, u64>, _p: &Params| {
//!     Ok(Partial::Table(m.indexed().map(|(i, a)| (i, a * 2)).collect::<Table<u64>>()))
//! });
//!
//! let boundaries = lin_parts(atoms.len(), 4)?;
//! let jobs = build_jobs(double, "molecule", &atoms, &boundaries, &Params::new())?;
//! let partials = dispatch(&jobs, 4, None, &mut SilentReporter)?;
//! let table = aggregate(partials)?.into_table().unwrap();
//!
//! let values: Vec<u64> = table.values().copied().collect();
//! assert_eq!(values, vec![0, 2, 4, 6, 8, 10, 12, 14, 16, 18]);
//! # Ok::<(), mpjob::DispatchError>(())
//! ```

pub mod aggregate;
pub mod cancel;
pub mod core;
pub mod invoke;
pub mod job;
pub mod partition;
pub mod progress;

// Re-export main types for easier access
pub use aggregate::{Aggregated, Partial, Table, aggregate};
pub use cancel::CancelToken;
pub use self::core::{Dispatcher, ExecutionStrategy, dispatch};
pub use invoke::invoke;
pub use job::{
    FUNC_KEY, JobDescriptor, Molecule, MoleculeFn, NamedFn, Params, build_jobs, molecule_fn,
};
pub use partition::{
    LinearParts, NestedParts, PartitionPolicy, Partitioner, lin_parts, nested_parts,
};
pub use progress::{
    BarReporter, LineReporter, ProgressMode, ProgressReporter, ProgressSnapshot, SilentReporter,
    TracingReporter,
};
