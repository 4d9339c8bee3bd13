//! Sets of indices into the prime chain of a context.

use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};

/// An ordered set of indices of primes in a [`super::Context`].
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PrimeSet(BTreeSet<usize>);

impl PrimeSet {
    /// The empty set.
    pub fn new() -> Self {
        Self(BTreeSet::new())
    }

    /// The set {start, ..., end - 1}.
    pub fn range(start: usize, end: usize) -> Self {
        Self((start..end).collect())
    }

    /// Number of primes in the set.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns whether the index belongs to the set.
    pub fn contains(&self, i: usize) -> bool {
        self.0.contains(&i)
    }

    /// Insert an index.
    pub fn insert(&mut self, i: usize) -> bool {
        self.0.insert(i)
    }

    /// Iterate over the indices in increasing order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.0.iter().copied()
    }

    /// The largest index, if any.
    pub fn last(&self) -> Option<usize> {
        self.0.last().copied()
    }

    /// Position of the index `i` within the set.
    pub fn position(&self, i: usize) -> Option<usize> {
        self.0.iter().position(|j| *j == i)
    }

    /// Set union.
    pub fn union(&self, other: &Self) -> Self {
        Self(self.0.union(&other.0).copied().collect())
    }

    /// Set intersection.
    pub fn intersection(&self, other: &Self) -> Self {
        Self(self.0.intersection(&other.0).copied().collect())
    }

    /// Elements of `self` that are not in `other`.
    pub fn difference(&self, other: &Self) -> Self {
        Self(self.0.difference(&other.0).copied().collect())
    }

    /// Returns whether `self` is contained in `other`.
    pub fn is_subset(&self, other: &Self) -> bool {
        self.0.is_subset(&other.0)
    }

    /// Returns whether the sets are disjoint.
    pub fn is_disjoint(&self, other: &Self) -> bool {
        self.0.is_disjoint(&other.0)
    }

    /// The indices as a vector.
    pub fn to_vec(&self) -> Vec<usize> {
        self.iter().collect()
    }
}

impl FromIterator<usize> for PrimeSet {
    fn from_iter<T: IntoIterator<Item = usize>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl From<&[usize]> for PrimeSet {
    fn from(indices: &[usize]) -> Self {
        indices.iter().copied().collect()
    }
}

impl Display for PrimeSet {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "[")?;
        for (k, i) in self.iter().enumerate() {
            if k > 0 {
                write!(f, " ")?;
            }
            write!(f, "{i}")?;
        }
        write!(f, "]")
    }
}
