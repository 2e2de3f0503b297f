//! Reassembly of partial results into one ordered result
//!
//! Completion order is not result order: table-like partials are merged and
//! sorted by atom index, while opaque partials are handed back in the order
//! their molecules finished.

use rayon::prelude::*;

use crate::error::{DispatchError, Result};

/// Rows keyed by atom index
#[derive(Debug, Clone, PartialEq)]
pub struct Table<V> {
    rows: Vec<(usize, V)>,
}

impl<V> Default for Table<V> {
    fn default() -> Self {
        Self { rows: Vec::new() }
    }
}

impl<V> Table<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            rows: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, index: usize, value: V) {
        self.rows.push((index, value));
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[(usize, V)] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<(usize, V)> {
        self.rows
    }

    pub fn indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.rows.iter().map(|(index, _)| *index)
    }

    pub fn values(&self) -> impl Iterator<Item = &V> + '_ {
        self.rows.iter().map(|(_, value)| value)
    }

    /// Value stored for `index`; assumes rows are sorted
    pub fn get(&self, index: usize) -> Option<&V> {
        self.rows
            .binary_search_by_key(&index, |(i, _)| *i)
            .ok()
            .map(|pos| &self.rows[pos].1)
    }
}

impl<V> FromIterator<(usize, V)> for Table<V> {
    fn from_iter<I: IntoIterator<Item = (usize, V)>>(iter: I) -> Self {
        Self {
            rows: iter.into_iter().collect(),
        }
    }
}

/// Output of one molecule
#[derive(Debug, Clone, PartialEq)]
pub enum Partial<V> {
    /// Rows keyed by the atom index they were computed from
    Table(Table<V>),
    /// A value with no ordering key
    Opaque(V),
}

impl<V> Partial<V> {
    pub fn is_table(&self) -> bool {
        matches!(self, Partial::Table(_))
    }
}

/// Merged output of a whole dispatch
#[derive(Debug, Clone, PartialEq)]
pub enum Aggregated<V> {
    /// Every row from every molecule, sorted by atom index
    Table(Table<V>),
    /// Opaque partials in completion order
    List(Vec<V>),
}

impl<V> Aggregated<V> {
    pub fn as_table(&self) -> Option<&Table<V>> {
        match self {
            Aggregated::Table(table) => Some(table),
            Aggregated::List(_) => None,
        }
    }

    pub fn into_table(self) -> Option<Table<V>> {
        match self {
            Aggregated::Table(table) => Some(table),
            Aggregated::List(_) => None,
        }
    }

    pub fn into_list(self) -> Option<Vec<V>> {
        match self {
            Aggregated::List(list) => Some(list),
            Aggregated::Table(_) => None,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Aggregated::Table(table) => table.len(),
            Aggregated::List(list) => list.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Merge partial results
///
/// Table-like partials are concatenated and sorted by atom index; a repeated
/// index fails with [`DispatchError::OverlappingPartition`]. Opaque partials
/// are returned unchanged. Mixing both kinds fails with
/// [`DispatchError::MixedPartials`]. No partials at all yields an empty table.
pub fn aggregate<V: Send>(partials: Vec<Partial<V>>) -> Result<Aggregated<V>> {
    let Some(first) = partials.first() else {
        return Ok(Aggregated::Table(Table::new()));
    };

    if first.is_table() {
        let capacity = partials
            .iter()
            .map(|partial| match partial {
                Partial::Table(table) => table.len(),
                Partial::Opaque(_) => 0,
            })
            .sum();
        let mut rows = Vec::with_capacity(capacity);
        for partial in partials {
            match partial {
                Partial::Table(table) => rows.extend(table.into_rows()),
                Partial::Opaque(_) => return Err(DispatchError::MixedPartials),
            }
        }

        rows.par_sort_unstable_by_key(|(index, _)| *index);
        if let Some(w) = rows.windows(2).find(|w| w[0].0 == w[1].0) {
            return Err(DispatchError::OverlappingPartition { index: w[0].0 });
        }

        tracing::trace!("Aggregated {} rows", rows.len());
        Ok(Aggregated::Table(Table { rows }))
    } else {
        partials
            .into_iter()
            .map(|partial| match partial {
                Partial::Opaque(value) => Ok(value),
                Partial::Table(_) => Err(DispatchError::MixedPartials),
            })
            .collect::<Result<Vec<_>>>()
            .map(Aggregated::List)
    }
}
