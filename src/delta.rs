//! Deltas: the unit of change propagated through the dataflow.
//!
//! A delta is a pair of disjoint tuple sets, `adds` and `removes`. Ordered
//! sets keep downstream processing deterministic. Accumulation cancels:
//! recording an add for a tuple currently in `removes` erases the remove
//! instead, so a 0→1 followed by a 1→0 transition inside one probe pass
//! nets out to nothing and the disjointness invariant holds by construction.

use crate::value::Tuple;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// A set of insertions and a disjoint set of deletions over one relation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delta {
    adds: BTreeSet<Tuple>,
    removes: BTreeSet<Tuple>,
}

impl Delta {
    /// The empty delta.
    pub fn new() -> Self {
        Delta::default()
    }

    /// A delta consisting only of insertions.
    pub fn adds_only(tuples: impl IntoIterator<Item = Tuple>) -> Self {
        Delta {
            adds: tuples.into_iter().collect(),
            removes: BTreeSet::new(),
        }
    }

    /// A delta consisting only of deletions.
    pub fn removes_only(tuples: impl IntoIterator<Item = Tuple>) -> Self {
        Delta {
            adds: BTreeSet::new(),
            removes: tuples.into_iter().collect(),
        }
    }

    /// Build a delta from both parts. The parts must already be disjoint;
    /// a tuple in both would be an ill-formed base update rather than
    /// something to silently cancel.
    pub fn from_parts(
        adds: impl IntoIterator<Item = Tuple>,
        removes: impl IntoIterator<Item = Tuple>,
    ) -> Self {
        let delta = Delta {
            adds: adds.into_iter().collect(),
            removes: removes.into_iter().collect(),
        };
        debug_assert!(
            delta.adds.is_disjoint(&delta.removes),
            "delta adds and removes must be disjoint"
        );
        delta
    }

    /// Inserted tuples, in ascending order.
    pub fn adds(&self) -> &BTreeSet<Tuple> {
        &self.adds
    }

    /// Deleted tuples, in ascending order.
    pub fn removes(&self) -> &BTreeSet<Tuple> {
        &self.removes
    }

    /// True when the delta carries no change.
    pub fn is_empty(&self) -> bool {
        self.adds.is_empty() && self.removes.is_empty()
    }

    /// Total number of tuples across both parts.
    pub fn len(&self) -> usize {
        self.adds.len() + self.removes.len()
    }

    /// Record an insertion, cancelling against a pending removal.
    pub fn push_add(&mut self, tuple: Tuple) {
        if !self.removes.remove(&tuple) {
            self.adds.insert(tuple);
        }
    }

    /// Record a deletion, cancelling against a pending insertion.
    pub fn push_remove(&mut self, tuple: Tuple) {
        if !self.adds.remove(&tuple) {
            self.removes.insert(tuple);
        }
    }

    /// Fold another delta into this one, with cancellation.
    pub fn merge(&mut self, other: Delta) {
        for tuple in other.adds {
            self.push_add(tuple);
        }
        for tuple in other.removes {
            self.push_remove(tuple);
        }
    }
}

impl fmt::Display for Delta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "+{} -{}", self.adds.len(), self.removes.len())
    }
}
