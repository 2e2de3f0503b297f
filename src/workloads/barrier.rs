use anyhow::{Context, bail};

use crate::parallel::{Molecule, MoleculeFn, Params, Partial, Table};

/// Parameter holding the symmetric barrier on the cumulative log-return
pub const WIDTH_PARAM: &str = "width";

pub const DEFAULT_WIDTH: f64 = 0.5;

/// For each price path, the first step at which the cumulative log-return
/// reaches `+width` or `-width`
///
/// Each atom is one path of simple returns. Paths that never touch either
/// barrier map to `None`.
#[derive(Debug, Clone, Copy, Default)]
pub struct BarrierTouch;

impl MoleculeFn<Vec<f64>> for BarrierTouch {
    type Output = Option<usize>;

    fn name(&self) -> &str {
        "barrier_touch"
    }

    fn call(
        &self,
        molecule: &Molecule<'_, Vec<f64>>,
        params: &Params,
    ) -> anyhow::Result<Partial<Option<usize>>> {
        let width = match params.get(WIDTH_PARAM) {
            Some(value) => value
                .as_f64()
                .with_context(|| format!("'{WIDTH_PARAM}' must be a number, got {value}"))?,
            None => DEFAULT_WIDTH,
        };
        if !(width > 0.0) {
            bail!("'{WIDTH_PARAM}' must be positive, got {width}");
        }

        let mut table = Table::with_capacity(molecule.len());
        for (index, returns) in molecule.indexed() {
            if molecule.is_cancelled() {
                break;
            }
            table.push(index, first_touch(returns, width));
        }
        Ok(Partial::Table(table))
    }
}

/// Index of the earliest step whose cumulative log-return leaves `(-width, width)`
pub fn first_touch(returns: &[f64], width: f64) -> Option<usize> {
    let mut log_price = 0.0;
    for (step, r) in returns.iter().enumerate() {
        log_price += (1.0 + r).ln();
        if log_price >= width || log_price <= -width {
            return Some(step);
        }
    }
    None
}

/// Deterministic oscillating return paths with a small per-path drift
pub fn synthetic_paths(paths: usize, steps: usize) -> Vec<Vec<f64>> {
    (0..paths)
        .map(|path| {
            let drift = ((path % 5) as f64 - 2.0) * 0.004;
            (0..steps)
                .map(|step| 0.03 * (0.7 * step as f64 + 1.3 * path as f64).sin() + drift)
                .collect()
        })
        .collect()
}
