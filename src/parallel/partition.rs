//! Molecule boundaries over an ordered atom collection
//!
//! A partition of `n` atoms into `g` molecules is a vector of `min(g, n) + 1`
//! boundary indices starting at `0` and ending at `n`. Molecule `i` covers the
//! half-open range `boundaries[i]..boundaries[i + 1]`.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::{DispatchError, Result};

/// Splitting policy used to place molecule boundaries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PartitionPolicy {
    /// Equal-width molecules
    #[default]
    Linear,
    /// Molecules sized for a triangular cost profile
    Nested,
}

impl PartitionPolicy {
    /// Resolve the policy into a concrete partitioner
    pub fn partitioner(self, upper_triangle: bool) -> Box<dyn Partitioner> {
        match self {
            PartitionPolicy::Linear => Box::new(LinearParts),
            PartitionPolicy::Nested => Box::new(NestedParts { upper_triangle }),
        }
    }
}

impl std::fmt::Display for PartitionPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PartitionPolicy::Linear => write!(f, "linear"),
            PartitionPolicy::Nested => write!(f, "nested"),
        }
    }
}

/// Strategy computing molecule boundaries
pub trait Partitioner: Send + Sync {
    fn partition(&self, num_atoms: usize, num_groups: usize) -> Result<Vec<usize>>;
}

/// Equal-width splitting, each boundary rounded up
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearParts;

impl Partitioner for LinearParts {
    fn partition(&self, num_atoms: usize, num_groups: usize) -> Result<Vec<usize>> {
        lin_parts(num_atoms, num_groups)
    }
}

/// Splitting for workloads where the cost of atom `i` grows (or shrinks) linearly with `i`
#[derive(Debug, Clone, Copy, Default)]
pub struct NestedParts {
    /// Mirror the widths so the widest molecule comes last
    pub upper_triangle: bool,
}

impl Partitioner for NestedParts {
    fn partition(&self, num_atoms: usize, num_groups: usize) -> Result<Vec<usize>> {
        nested_parts(num_atoms, num_groups, self.upper_triangle)
    }
}

fn validate_counts(num_atoms: usize, num_groups: usize) -> Result<()> {
    if num_atoms == 0 {
        return Err(DispatchError::invalid_partition("number of atoms must be positive"));
    }
    if num_groups == 0 {
        return Err(DispatchError::invalid_partition("number of molecules must be positive"));
    }
    Ok(())
}

/// Linear partition: `ceil(i * n / g)` for `i` in `0..=g`, with `g = min(num_groups, num_atoms)`
pub fn lin_parts(num_atoms: usize, num_groups: usize) -> Result<Vec<usize>> {
    validate_counts(num_atoms, num_groups)?;

    let groups = num_groups.min(num_atoms) as u128;
    let atoms = num_atoms as u128;

    Ok((0..=groups)
        .map(|i| (i * atoms).div_ceil(groups) as usize)
        .collect())
}

/// Nested partition balancing the area of a lower (or upper) triangle per molecule
pub fn nested_parts(
    num_atoms: usize,
    num_groups: usize,
    upper_triangle: bool,
) -> Result<Vec<usize>> {
    validate_counts(num_atoms, num_groups)?;

    let groups = num_groups.min(num_atoms);
    let n = num_atoms as f64;
    let share = n * (n + 1.0) / groups as f64;

    let mut parts = Vec::with_capacity(groups + 1);
    let mut previous = 0.0_f64;
    parts.push(0);
    for _ in 0..groups {
        let discriminant = 1.0 + 4.0 * (previous * previous + previous + share);
        previous = (-1.0 + discriminant.sqrt()) / 2.0;
        parts.push(previous.round() as usize);
    }

    if upper_triangle {
        let widths: Vec<usize> = parts
            .windows(2)
            .rev()
            .map(|w| w[1].saturating_sub(w[0]))
            .collect();
        let mut acc = 0;
        parts = std::iter::once(0)
            .chain(widths.into_iter().map(|w| {
                acc += w;
                acc
            }))
            .collect();
    }

    enforce_nonempty(&mut parts, num_atoms);
    Ok(parts)
}

/// Pin the endpoints and nudge interior boundaries so every molecule keeps at least one atom.
/// Requires `parts.len() - 1 <= num_atoms`.
fn enforce_nonempty(parts: &mut [usize], num_atoms: usize) {
    let last = parts.len() - 1;
    parts[0] = 0;
    parts[last] = num_atoms;
    for i in 1..=last {
        let lower = parts[i - 1] + 1;
        let upper = num_atoms - (last - i);
        parts[i] = parts[i].clamp(lower, upper);
    }
}

/// Check that `boundaries` is a partition of `num_atoms` atoms
pub fn validate_boundaries(boundaries: &[usize], num_atoms: usize) -> Result<()> {
    match (boundaries.first(), boundaries.last()) {
        (Some(0), Some(&end)) if end == num_atoms && boundaries.len() >= 2 => {}
        _ => {
            return Err(DispatchError::invalid_partition(format!(
                "boundaries must start at 0 and end at {num_atoms}, got {boundaries:?}"
            )));
        }
    }
    if let Some(w) = boundaries.windows(2).find(|w| w[1] < w[0]) {
        return Err(DispatchError::invalid_partition(format!(
            "boundaries decrease from {} to {}",
            w[0], w[1]
        )));
    }
    Ok(())
}

/// Adjacent boundary pairs as `(start, end)` molecule spans
pub fn molecule_spans(boundaries: &[usize]) -> impl Iterator<Item = (usize, usize)> + '_ {
    boundaries.windows(2).map(|w| (w[0], w[1]))
}
