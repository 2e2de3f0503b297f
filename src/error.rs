//! Error taxonomy for partitioning, job construction, dispatch and aggregation

use thiserror::Error;

/// Result type alias for dispatch operations
pub type Result<T> = std::result::Result<T, DispatchError>;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Invalid partition: {0}")]
    InvalidPartition(String),

    #[error("Malformed job: parameter '{key}' collides with a reserved key")]
    MalformedJob { key: String },

    #[error("Worker failed on molecule {molecule} (atoms {start}..{end}): {source}")]
    WorkerError {
        molecule: usize,
        start: usize,
        end: usize,
        #[source]
        source: anyhow::Error,
    },

    #[error("Overlapping partition: atom index {index} returned by more than one molecule")]
    OverlappingPartition { index: usize },

    #[error("Partial results mix table-like and opaque kinds")]
    MixedPartials,

    #[error("Dispatch cancelled after {completed}/{total} molecules")]
    Cancelled { completed: usize, total: usize },

    #[error("Thread panic occurred during parallel dispatch")]
    ThreadPanic,
}

impl DispatchError {
    pub(crate) fn invalid_partition(message: impl Into<String>) -> Self {
        Self::InvalidPartition(message.into())
    }

    /// Boundaries of the failing molecule, if this is a worker failure
    pub fn molecule_span(&self) -> Option<(usize, usize)> {
        match self {
            Self::WorkerError { start, end, .. } => Some((*start, *end)),
            _ => None,
        }
    }
}
