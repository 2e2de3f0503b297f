//! One-call entry point: partition, build jobs, dispatch and aggregate

use crate::config::DispatchConfig;
use crate::error::Result;
use crate::parallel::{
    Aggregated, CancelToken, Dispatcher, MoleculeFn, Params, ProgressReporter, aggregate,
    build_jobs,
};

/// Runs a molecule function over a whole atom collection
///
/// ```rust
/// use mpjob::{DispatchConfig, Engine};
/// use mpjob::parallel::{Molecule, Params, Partial, ProgressMode, Table, molecule_fn};
///
/// let config = DispatchConfig { threads: 4, progress: ProgressMode::None, ..Default::default() };
/// let square = molecule_fn("square", |m: &Molecule<'_, i64>, _p: &Params| {
///     Ok(Partial::Table(m.indexed().map(|(i, a)| (i, a * a)).collect::<Table<i64>>()))
/// });
///
/// let atoms: Vec<i64> = (0..6).collect();
/// let table = Engine::new(config)
///     .run(square, "molecule", &atoms, &Params::new())?
///     .into_table()
///     .unwrap();
/// assert_eq!(table.values().copied().collect::<Vec<_>>(), vec![0, 1, 4, 9, 16, 25]);
/// # Ok::<(), mpjob::DispatchError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct Engine {
    config: DispatchConfig,
    cancel: CancelToken,
}

impl Engine {
    pub fn new(config: DispatchConfig) -> Self {
        Self {
            config,
            cancel: CancelToken::new(),
        }
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that cancels any dispatch this engine runs
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Run with the progress sink selected by configuration
    pub fn run<A, F>(
        &self,
        func: F,
        atoms_param: &str,
        atoms: &[A],
        params: &Params,
    ) -> Result<Aggregated<F::Output>>
    where
        A: Sync,
        F: MoleculeFn<A>,
    {
        let mut reporter = self.config.progress.reporter();
        self.run_with_reporter(func, atoms_param, atoms, params, reporter.as_mut())
    }

    pub fn run_with_reporter<A, F>(
        &self,
        func: F,
        atoms_param: &str,
        atoms: &[A],
        params: &Params,
        reporter: &mut dyn ProgressReporter,
    ) -> Result<Aggregated<F::Output>>
    where
        A: Sync,
        F: MoleculeFn<A>,
    {
        let molecules = self.config.molecule_count();
        let boundaries = self.config.partitioner().partition(atoms.len(), molecules)?;
        tracing::debug!(
            "Partitioned {} atoms into {} molecules ({} policy)",
            atoms.len(),
            boundaries.len() - 1,
            self.config.partition
        );

        let jobs = build_jobs(func, atoms_param, atoms, &boundaries, params)?;

        let dispatcher = Dispatcher::new(self.config.strategy())
            .with_buffer_multiplier(self.config.channel_buffer_multiplier)
            .with_cancel_token(self.cancel.clone());
        let partials = dispatcher.dispatch(&jobs, self.config.label.as_deref(), reporter)?;

        aggregate(partials)
    }
}
