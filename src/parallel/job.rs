//! Job descriptors: one self-contained invocation per molecule

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use super::aggregate::Partial;
use super::cancel::CancelToken;
use super::partition::{molecule_spans, validate_boundaries};
use crate::error::{DispatchError, Result};

/// Named auxiliary parameters passed to every molecule
pub type Params = BTreeMap<String, serde_json::Value>;

/// Key reserved for the target function in a job descriptor
pub const FUNC_KEY: &str = "func";

/// A contiguous run of atoms handed to one invocation of the target function
pub struct Molecule<'a, A> {
    /// Position of this molecule in the partition
    pub position: usize,
    /// Index of the first atom in the original collection
    pub start: usize,
    /// One past the index of the last atom
    pub end: usize,
    pub atoms: &'a [A],
    cancel: CancelToken,
}

impl<'a, A> Molecule<'a, A> {
    pub fn new(position: usize, start: usize, atoms: &'a [A]) -> Self {
        Self {
            position,
            start,
            end: start + atoms.len(),
            atoms,
            cancel: CancelToken::new(),
        }
    }

    pub(crate) fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Atoms paired with their index in the original collection
    pub fn indexed(&self) -> impl Iterator<Item = (usize, &'a A)> + '_ {
        (self.start..self.end).zip(self.atoms.iter())
    }

    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    /// Long-running functions should poll this and return early once set
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Function run over each molecule
///
/// Implementors are plain values: the function identity is the type and any
/// state it closes over must be `Send + Sync` so one instance can be shared by
/// every worker.
pub trait MoleculeFn<A>: Send + Sync {
    type Output: Send;

    /// Name used as the default progress label
    fn name(&self) -> &str {
        // `a::Foo<b::Bar>` names as `Foo`
        let full = std::any::type_name::<Self>();
        let path = full.split('<').next().unwrap_or(full);
        path.rsplit("::").next().unwrap_or(path)
    }

    fn call(
        &self,
        molecule: &Molecule<'_, A>,
        params: &Params,
    ) -> anyhow::Result<Partial<Self::Output>>;
}

/// Named closure adapter for [`MoleculeFn`]
pub struct NamedFn<F> {
    name: String,
    f: F,
}

/// Wrap a closure as a molecule function with an explicit name
pub fn molecule_fn<A, V, F>(name: impl Into<String>, f: F) -> NamedFn<F>
where
    F: Fn(&Molecule<'_, A>, &Params) -> anyhow::Result<Partial<V>> + Send + Sync,
    V: Send,
{
    NamedFn { name: name.into(), f }
}

impl<A, V, F> MoleculeFn<A> for NamedFn<F>
where
    F: Fn(&Molecule<'_, A>, &Params) -> anyhow::Result<Partial<V>> + Send + Sync,
    V: Send,
{
    type Output = V;

    fn name(&self) -> &str {
        &self.name
    }

    fn call(&self, molecule: &Molecule<'_, A>, params: &Params) -> anyhow::Result<Partial<V>> {
        (self.f)(molecule, params)
    }
}

/// Everything needed to process one molecule
pub struct JobDescriptor<'a, A, F> {
    position: usize,
    start: usize,
    end: usize,
    atoms_param: Arc<str>,
    atoms: &'a [A],
    func: Arc<F>,
    params: Params,
}

impl<'a, A, F> JobDescriptor<'a, A, F> {
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn span(&self) -> (usize, usize) {
        (self.start, self.end)
    }

    /// Name the molecule is bound to
    pub fn atoms_param(&self) -> &str {
        &self.atoms_param
    }

    pub fn atoms(&self) -> &'a [A] {
        self.atoms
    }

    pub fn func(&self) -> &F {
        &self.func
    }

    /// Extra parameters, excluding the reserved keys
    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn molecule(&self, cancel: CancelToken) -> Molecule<'a, A> {
        Molecule::new(self.position, self.start, self.atoms).with_cancel_token(cancel)
    }
}

impl<A, F> fmt::Debug for JobDescriptor<'_, A, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobDescriptor")
            .field("position", &self.position)
            .field(&self.atoms_param, &(self.start..self.end))
            .field("params", &self.params)
            .finish()
    }
}

/// Check that no extra parameter shadows a reserved key
pub fn check_reserved_keys(atoms_param: &str, extra_params: &Params) -> Result<()> {
    if atoms_param.is_empty() || atoms_param == FUNC_KEY {
        return Err(DispatchError::MalformedJob {
            key: atoms_param.to_string(),
        });
    }
    for reserved in [FUNC_KEY, atoms_param] {
        if extra_params.contains_key(reserved) {
            return Err(DispatchError::MalformedJob {
                key: reserved.to_string(),
            });
        }
    }
    Ok(())
}

/// Build one job descriptor per adjacent boundary pair
///
/// Every descriptor gets its own copy of `extra_params`; only the function
/// value is shared.
pub fn build_jobs<'a, A, F>(
    func: F,
    atoms_param: &str,
    atoms: &'a [A],
    boundaries: &[usize],
    extra_params: &Params,
) -> Result<Vec<JobDescriptor<'a, A, F>>>
where
    F: MoleculeFn<A>,
{
    check_reserved_keys(atoms_param, extra_params)?;
    validate_boundaries(boundaries, atoms.len())?;

    let func = Arc::new(func);
    let atoms_param: Arc<str> = Arc::from(atoms_param);

    let jobs: Vec<_> = molecule_spans(boundaries)
        .enumerate()
        .map(|(position, (start, end))| JobDescriptor {
            position,
            start,
            end,
            atoms_param: atoms_param.clone(),
            atoms: &atoms[start..end],
            func: func.clone(),
            params: extra_params.clone(),
        })
        .collect();

    tracing::debug!(
        "Built {} jobs over {} atoms bound to '{}'",
        jobs.len(),
        atoms.len(),
        atoms_param
    );
    Ok(jobs)
}
