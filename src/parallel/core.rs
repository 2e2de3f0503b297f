use crossbeam::channel::{Receiver, Sender, bounded};
use std::time::Instant;

use super::aggregate::Partial;
use super::cancel::CancelToken;
use super::invoke::run_job;
use super::job::{JobDescriptor, MoleculeFn};
use super::progress::{ProgressReporter, ProgressSnapshot};
use crate::error::{DispatchError, Result};

/// Execution strategy: in-process loop or bounded worker pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStrategy {
    Sequential,
    Parallel { workers: usize },
}

impl ExecutionStrategy {
    /// One worker runs in-process; anything more gets a pool
    pub fn from_concurrency(concurrency: usize) -> Self {
        if concurrency <= 1 {
            ExecutionStrategy::Sequential
        } else {
            ExecutionStrategy::Parallel {
                workers: concurrency,
            }
        }
    }

    pub fn workers(&self) -> usize {
        match self {
            ExecutionStrategy::Sequential => 1,
            ExecutionStrategy::Parallel { workers } => *workers,
        }
    }

    /// Calculate optimal workers based on available system resources and configuration limits
    ///
    /// # Algorithm
    /// ```text
    /// 1. Detect available CPU cores: num_cpus::get()
    /// 2. Apply percentage: cores * thread_percentage / 100
    /// 3. Apply config limit: min(max_threads_config, percentage_result) if max_threads_config > 0
    /// 4. Ensure minimum: max(1, final_result)
    /// ```
    ///
    /// # Examples
    /// ```rust
    /// use mpjob::parallel::ExecutionStrategy;
    ///
    /// let workers = ExecutionStrategy::calculate_optimal_workers(0, 75);
    /// assert!(workers >= 1);
    ///
    /// let workers = ExecutionStrategy::calculate_optimal_workers(8, 75);
    /// assert!(workers <= 8);
    /// ```
    pub fn calculate_optimal_workers(max_threads_config: usize, thread_percentage: u8) -> usize {
        let available_cores = num_cpus::get();

        let workers_by_percentage =
            std::cmp::max(1, (available_cores * thread_percentage as usize) / 100);

        if max_threads_config > 0 {
            std::cmp::min(max_threads_config, workers_by_percentage)
        } else {
            workers_by_percentage
        }
    }
}

/// Context for worker threads to avoid too many function parameters
struct WorkerContext<'j, 'a, A, F, R> {
    worker_id: usize,
    work_rx: Receiver<&'j JobDescriptor<'a, A, F>>,
    result_tx: Sender<Result<Partial<R>>>,
    cancel: CancelToken,
}

/// Runs job descriptors and collects their partial results
///
/// Results come back in submission order when sequential and in completion
/// order when pooled. The first worker failure cancels everything still queued;
/// jobs already running are drained and the failure is returned.
///
/// A molecule that returns after the cancel token fired is not counted as
/// completed, since it may have stopped early. Cancelling while the last
/// molecule runs therefore still yields `Cancelled { completed: total - 1 }`.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    strategy: ExecutionStrategy,
    buffer_multiplier: usize,
    cancel: CancelToken,
}

impl Dispatcher {
    pub fn new(strategy: ExecutionStrategy) -> Self {
        Self {
            strategy,
            buffer_multiplier: 2,
            cancel: CancelToken::new(),
        }
    }

    /// Channel buffer size multiplier (buffer = workers * multiplier)
    pub fn with_buffer_multiplier(mut self, multiplier: usize) -> Self {
        self.buffer_multiplier = multiplier.max(1);
        self
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn strategy(&self) -> ExecutionStrategy {
        self.strategy
    }

    /// Run every job, reporting progress after each completion
    ///
    /// `label` defaults to the target function's name.
    pub fn dispatch<A, F>(
        &self,
        jobs: &[JobDescriptor<'_, A, F>],
        label: Option<&str>,
        reporter: &mut dyn ProgressReporter,
    ) -> Result<Vec<Partial<F::Output>>>
    where
        A: Sync,
        F: MoleculeFn<A>,
    {
        let Some(first) = jobs.first() else {
            return Ok(Vec::new());
        };
        let label = label.unwrap_or_else(|| first.func().name());

        tracing::info!(
            "Dispatching {} molecules of '{}' ({:?})",
            jobs.len(),
            label,
            self.strategy
        );
        let started = Instant::now();

        let outcome = match self.strategy {
            ExecutionStrategy::Sequential => self.run_sequential(jobs, label, reporter, started),
            ExecutionStrategy::Parallel { workers } => {
                self.run_parallel(workers, jobs, label, reporter, started)
            }
        };
        reporter.finish();

        match &outcome {
            Ok(results) => tracing::info!(
                "Finished '{}': {} molecules in {:.2}s",
                label,
                results.len(),
                started.elapsed().as_secs_f64()
            ),
            Err(DispatchError::Cancelled { completed, total }) => {
                tracing::warn!(
                    "Dispatch of '{}' cancelled after {}/{} molecules",
                    label,
                    completed,
                    total
                )
            }
            Err(e) => tracing::warn!("Dispatch of '{}' failed: {}", label, e),
        }
        outcome
    }

    fn run_sequential<A, F>(
        &self,
        jobs: &[JobDescriptor<'_, A, F>],
        label: &str,
        reporter: &mut dyn ProgressReporter,
        started: Instant,
    ) -> Result<Vec<Partial<F::Output>>>
    where
        F: MoleculeFn<A>,
    {
        let total = jobs.len();
        let mut results = Vec::with_capacity(total);

        for job in jobs {
            if self.cancel.is_cancelled() {
                return Err(DispatchError::Cancelled {
                    completed: results.len(),
                    total,
                });
            }

            let partial = run_job(job, &self.cancel)?;
            // The molecule may have seen the token and returned a truncated partial
            if self.cancel.is_cancelled() {
                return Err(DispatchError::Cancelled {
                    completed: results.len(),
                    total,
                });
            }
            results.push(partial);

            reporter.report(&ProgressSnapshot::new(results.len(), total, started), label);
        }

        Ok(results)
    }

    /// Producer-consumer pool: one producer feeds job references to the
    /// workers, and the calling thread collects results and reports progress
    fn run_parallel<A, F>(
        &self,
        workers: usize,
        jobs: &[JobDescriptor<'_, A, F>],
        label: &str,
        reporter: &mut dyn ProgressReporter,
        started: Instant,
    ) -> Result<Vec<Partial<F::Output>>>
    where
        A: Sync,
        F: MoleculeFn<A>,
    {
        let total = jobs.len();
        let actual_workers = std::cmp::min(workers.max(1), total);
        let buffer_size = actual_workers * self.buffer_multiplier;

        let (work_tx, work_rx) = bounded(buffer_size);
        let (result_tx, result_rx) = bounded(buffer_size);

        // Tripped by the first failure; also observes the caller's token
        let abort = self.cancel.child();

        // Use crossbeam::thread::scope for safe borrowing of the jobs
        crossbeam::thread::scope(|s| {
            for worker_id in 0..actual_workers {
                let ctx = WorkerContext {
                    worker_id,
                    work_rx: work_rx.clone(),
                    result_tx: result_tx.clone(),
                    cancel: abort.clone(),
                };

                s.spawn(move |_| worker_thread(ctx));
            }

            // Producer thread: send work to workers
            let producer_cancel = abort.clone();
            s.spawn(move |_| {
                for job in jobs {
                    if producer_cancel.is_cancelled() {
                        tracing::debug!("Producer stopped at molecule {}", job.position());
                        break;
                    }
                    if work_tx.send(job).is_err() {
                        break; // Workers dropped
                    }
                }
            });

            // Drop our ends so the channels close once producer and workers are done
            drop(work_rx);
            drop(result_tx);

            self.collect_results(result_rx, total, &abort, label, reporter, started)
        })
        .map_err(|_| DispatchError::ThreadPanic)?
    }

    fn collect_results<R>(
        &self,
        result_rx: Receiver<Result<Partial<R>>>,
        total: usize,
        abort: &CancelToken,
        label: &str,
        reporter: &mut dyn ProgressReporter,
        started: Instant,
    ) -> Result<Vec<Partial<R>>> {
        let mut results = Vec::with_capacity(total);
        let mut first_error = None;

        // Runs until every worker has hung up, so in-flight jobs are always drained
        for outcome in result_rx.iter() {
            match outcome {
                Ok(partial) if first_error.is_none() && !abort.is_cancelled() => {
                    results.push(partial);
                    reporter.report(&ProgressSnapshot::new(results.len(), total, started), label);
                }
                Ok(_) => {}
                Err(e) => {
                    if first_error.is_none() && !self.cancel.is_cancelled() {
                        tracing::warn!("{}; cancelling remaining molecules", e);
                        abort.cancel();
                        first_error = Some(e);
                    }
                }
            }
        }

        if let Some(e) = first_error {
            return Err(e);
        }
        if self.cancel.is_cancelled() || results.len() < total {
            return Err(DispatchError::Cancelled {
                completed: results.len(),
                total,
            });
        }
        Ok(results)
    }
}

fn worker_thread<A, F>(ctx: WorkerContext<'_, '_, A, F, F::Output>)
where
    F: MoleculeFn<A>,
{
    while let Ok(job) = ctx.work_rx.recv() {
        // Keep draining after cancellation so the producer never blocks
        if ctx.cancel.is_cancelled() {
            continue;
        }

        let (start, end) = job.span();
        tracing::trace!(
            "worker-{} running molecule {} ({}..{})",
            ctx.worker_id,
            job.position(),
            start,
            end
        );
        let result = run_job(job, &ctx.cancel);

        if ctx.result_tx.send(result).is_err() {
            break; // Receiver dropped
        }
    }
}

/// Run jobs with `concurrency` workers: `1` runs in-process, more uses a pool
pub fn dispatch<A, F>(
    jobs: &[JobDescriptor<'_, A, F>],
    concurrency: usize,
    label: Option<&str>,
    reporter: &mut dyn ProgressReporter,
) -> Result<Vec<Partial<F::Output>>>
where
    A: Sync,
    F: MoleculeFn<A>,
{
    Dispatcher::new(ExecutionStrategy::from_concurrency(concurrency))
        .dispatch(jobs, label, reporter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parallel::aggregate::{Table, aggregate};
    use crate::parallel::job::{Molecule, Params, build_jobs, molecule_fn};
    use crate::parallel::partition::lin_parts;
    use crate::parallel::progress::SilentReporter;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::thread;
    use std::time::Duration;

    struct Doubler;

    impl MoleculeFn<u64> for Doubler {
        type Output = u64;

        fn call(
            &self,
            molecule: &Molecule<'_, u64>,
            _params: &Params,
        ) -> anyhow::Result<Partial<u64>> {
            Ok(Partial::Table(
                molecule.indexed().map(|(i, a)| (i, a * 2)).collect::<Table<u64>>(),
            ))
        }
    }

    /// Records every snapshot it receives
    #[derive(Clone, Default)]
    struct Recorder {
        seen: Arc<Mutex<Vec<(usize, usize, String)>>>,
    }

    impl ProgressReporter for Recorder {
        fn report(&mut self, snapshot: &ProgressSnapshot, label: &str) {
            self.seen
                .lock()
                .unwrap()
                .push((snapshot.completed, snapshot.total, label.to_string()));
        }
    }

    #[test]
    fn test_strategy_from_concurrency() {
        assert_eq!(ExecutionStrategy::from_concurrency(0), ExecutionStrategy::Sequential);
        assert_eq!(ExecutionStrategy::from_concurrency(1), ExecutionStrategy::Sequential);
        assert_eq!(
            ExecutionStrategy::from_concurrency(4),
            ExecutionStrategy::Parallel { workers: 4 }
        );
        assert_eq!(ExecutionStrategy::Parallel { workers: 3 }.workers(), 3);
    }

    #[test]
    fn test_sequential_keeps_submission_order() {
        let atoms: Vec<u64> = (0..10).collect();
        let boundaries = lin_parts(10, 4).unwrap();
        let jobs = build_jobs(Doubler, "molecule", &atoms, &boundaries, &Params::new()).unwrap();

        let results = dispatch(&jobs, 1, None, &mut SilentReporter).unwrap();
        let firsts: Vec<usize> = results
            .iter()
            .map(|p| match p {
                Partial::Table(t) => t.rows()[0].0,
                Partial::Opaque(_) => unreachable!(),
            })
            .collect();
        assert_eq!(firsts, vec![0, 3, 5, 8]);
    }

    #[test]
    fn test_parallel_matches_sequential_after_aggregation() {
        let atoms: Vec<u64> = (0..500).collect();
        let boundaries = lin_parts(atoms.len(), 32).unwrap();
        let jobs = build_jobs(Doubler, "molecule", &atoms, &boundaries, &Params::new()).unwrap();

        let sequential = aggregate(dispatch(&jobs, 1, None, &mut SilentReporter).unwrap()).unwrap();
        for workers in [2, 3, 8] {
            let partials = dispatch(&jobs, workers, None, &mut SilentReporter).unwrap();
            let parallel = aggregate(partials).unwrap();
            assert_eq!(parallel, sequential);
        }
    }

    #[test]
    fn test_progress_reported_once_per_completion() {
        let atoms: Vec<u64> = (0..40).collect();
        let boundaries = lin_parts(40, 10).unwrap();
        let jobs = build_jobs(Doubler, "molecule", &atoms, &boundaries, &Params::new()).unwrap();

        let recorder = Recorder::default();
        let mut reporter = recorder.clone();
        dispatch(&jobs, 4, None, &mut reporter).unwrap();

        let seen = recorder.seen.lock().unwrap();
        let counts: Vec<usize> = seen.iter().map(|(done, _, _)| *done).collect();
        assert_eq!(counts, (1..=10).collect::<Vec<_>>());
        assert!(seen.iter().all(|(_, total, label)| *total == 10 && label == "Doubler"));
    }

    #[test]
    fn test_explicit_label_overrides_function_name() {
        let atoms: Vec<u64> = (0..4).collect();
        let jobs = build_jobs(Doubler, "molecule", &atoms, &[0, 2, 4], &Params::new()).unwrap();

        let recorder = Recorder::default();
        let mut reporter = recorder.clone();
        dispatch(&jobs, 1, Some("doubling"), &mut reporter).unwrap();
        assert!(recorder.seen.lock().unwrap().iter().all(|(_, _, label)| label == "doubling"));
    }

    #[test]
    fn test_worker_error_fails_whole_dispatch() {
        let atoms: Vec<u64> = (0..40).collect();
        let failing = molecule_fn("failing", |m: &Molecule<'_, u64>, _p: &Params| {
            if m.position == 2 {
                anyhow::bail!("molecule {} is poisoned", m.position);
            }
            Ok(Partial::Opaque(m.len()))
        });
        let boundaries = lin_parts(40, 4).unwrap();
        let jobs = build_jobs(failing, "molecule", &atoms, &boundaries, &Params::new()).unwrap();

        for concurrency in [1, 4] {
            let err = dispatch(&jobs, concurrency, None, &mut SilentReporter).unwrap_err();
            match err {
                DispatchError::WorkerError { molecule, start, end, .. } => {
                    assert_eq!((molecule, start, end), (2, 20, 30));
                }
                other => panic!("unexpected error: {other}"),
            }
        }
    }

    #[test]
    fn test_cancelled_before_start() {
        let atoms: Vec<u64> = (0..20).collect();
        let boundaries = lin_parts(20, 5).unwrap();
        let jobs = build_jobs(Doubler, "molecule", &atoms, &boundaries, &Params::new()).unwrap();

        let strategies = [
            ExecutionStrategy::Sequential,
            ExecutionStrategy::Parallel { workers: 2 },
        ];
        for strategy in strategies {
            let token = CancelToken::new();
            token.cancel();
            let err = Dispatcher::new(strategy)
                .with_cancel_token(token)
                .dispatch(&jobs, None, &mut SilentReporter)
                .unwrap_err();
            assert!(matches!(err, DispatchError::Cancelled { completed: 0, total: 5 }));
        }
    }

    #[test]
    fn test_cancel_from_inside_molecule() {
        let atoms: Vec<u64> = (0..16).collect();
        let token = CancelToken::new();
        let trigger = token.clone();
        let cancelling = molecule_fn("cancelling", move |m: &Molecule<'_, u64>, _p: &Params| {
            if m.position == 1 {
                trigger.cancel();
            }
            Ok(Partial::Opaque(m.is_cancelled()))
        });
        let boundaries = lin_parts(16, 8).unwrap();
        let jobs = build_jobs(cancelling, "molecule", &atoms, &boundaries, &Params::new()).unwrap();

        let err = Dispatcher::new(ExecutionStrategy::Sequential)
            .with_cancel_token(token)
            .dispatch(&jobs, None, &mut SilentReporter)
            .unwrap_err();
        assert!(matches!(err, DispatchError::Cancelled { completed: 1, total: 8 }));
    }

    #[test]
    fn test_cancel_during_last_molecule_is_not_completion() {
        let atoms: Vec<u64> = (0..8).collect();
        let token = CancelToken::new();
        let trigger = token.clone();
        let cancelling = molecule_fn("cancelling", move |m: &Molecule<'_, u64>, _p: &Params| {
            if m.position == 3 {
                trigger.cancel();
            }
            Ok(Partial::Opaque(m.len()))
        });
        let boundaries = lin_parts(8, 4).unwrap();
        let jobs = build_jobs(cancelling, "molecule", &atoms, &boundaries, &Params::new()).unwrap();

        let err = Dispatcher::new(ExecutionStrategy::Sequential)
            .with_cancel_token(token)
            .dispatch(&jobs, None, &mut SilentReporter)
            .unwrap_err();
        assert!(matches!(err, DispatchError::Cancelled { completed: 3, total: 4 }));
    }

    #[test]
    fn test_pool_failure_stops_queued_molecules() {
        let atoms: Vec<u64> = (0..200).collect();
        let calls = AtomicUsize::new(0);
        let failing = molecule_fn("failing", |m: &Molecule<'_, u64>, _p: &Params| {
            calls.fetch_add(1, Ordering::SeqCst);
            if m.position == 0 {
                anyhow::bail!("boom");
            }
            thread::sleep(Duration::from_millis(2));
            Ok(Partial::Opaque(m.len()))
        });
        let boundaries = lin_parts(200, 200).unwrap();
        let jobs = build_jobs(failing, "molecule", &atoms, &boundaries, &Params::new()).unwrap();

        let err = dispatch(&jobs, 2, None, &mut SilentReporter).unwrap_err();
        assert!(matches!(err, DispatchError::WorkerError { molecule: 0, start: 0, end: 1, .. }));
        let ran = calls.load(Ordering::SeqCst);
        assert!(ran < 50, "{ran} of 200 molecules ran after the first failure");
    }

    #[test]
    fn test_pool_cancel_mid_run() {
        let atoms: Vec<u64> = (0..100).collect();
        let calls = AtomicUsize::new(0);
        let token = CancelToken::new();
        let trigger = token.clone();
        let cancelling = molecule_fn("cancelling", |m: &Molecule<'_, u64>, _p: &Params| {
            calls.fetch_add(1, Ordering::SeqCst);
            if m.position == 5 {
                trigger.cancel();
            }
            thread::sleep(Duration::from_millis(2));
            Ok(Partial::Opaque(m.len()))
        });
        let boundaries = lin_parts(100, 100).unwrap();
        let jobs = build_jobs(cancelling, "molecule", &atoms, &boundaries, &Params::new()).unwrap();

        let err = Dispatcher::new(ExecutionStrategy::Parallel { workers: 3 })
            .with_cancel_token(token.clone())
            .dispatch(&jobs, None, &mut SilentReporter)
            .unwrap_err();
        match err {
            DispatchError::Cancelled { completed, total } => {
                assert_eq!(total, 100);
                assert!(completed < total);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(token.is_cancelled());
        assert!(calls.load(Ordering::SeqCst) < 50);
    }

    #[test]
    fn test_empty_jobs_dispatch_to_nothing() {
        let jobs: Vec<JobDescriptor<'_, u64, Doubler>> = Vec::new();
        assert!(dispatch(&jobs, 4, None, &mut SilentReporter).unwrap().is_empty());
    }
}
