use std::panic::{AssertUnwindSafe, catch_unwind};

use super::aggregate::Partial;
use super::cancel::CancelToken;
use super::job::{JobDescriptor, MoleculeFn};
use crate::error::{DispatchError, Result};

/// Call the target function on one job's molecule
///
/// The function's result, including any error, is returned unchanged.
pub fn invoke<A, F>(
    job: &JobDescriptor<'_, A, F>,
    cancel: &CancelToken,
) -> anyhow::Result<Partial<F::Output>>
where
    F: MoleculeFn<A>,
{
    let molecule = job.molecule(cancel.clone());
    job.func().call(&molecule, job.params())
}

/// Run one job at the worker boundary: failures and panics become a
/// [`DispatchError::WorkerError`] tagged with the molecule
pub(crate) fn run_job<A, F>(
    job: &JobDescriptor<'_, A, F>,
    cancel: &CancelToken,
) -> Result<Partial<F::Output>>
where
    F: MoleculeFn<A>,
{
    let (start, end) = job.span();
    let outcome = catch_unwind(AssertUnwindSafe(|| invoke(job, cancel))).unwrap_or_else(|payload| {
        Err(anyhow::anyhow!("panicked: {}", panic_message(payload.as_ref())))
    });

    outcome.map_err(|source| DispatchError::WorkerError {
        molecule: job.position(),
        start,
        end,
        source,
    })
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        *message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic payload"
    }
}
