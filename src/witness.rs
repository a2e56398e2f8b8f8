//! Witness multiplicity table.
//!
//! LFTJ+ discovers each output binding once per witnessing source-atom
//! probe. The table counts those witnesses per output tuple so that only
//! 0→1 and 1→0 transitions reach the outside: repeated derivations of the
//! same output collapse, making the exposed delta multiset-stable.

use crate::value::Tuple;
use std::collections::HashMap;

/// Probe sign: one pass per delta side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Sign {
    Add,
    Remove,
}

/// Transition event produced by a counter update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum WitnessEvent {
    /// Count went 0→1: the tuple entered the result.
    Add(Tuple),
    /// Count went 1→0: the tuple left the result.
    Remove(Tuple),
}

/// A decrement hit a zero count. The join owning the table turns this into
/// a full `WitnessUnderflow` error with node context.
#[derive(Debug)]
pub(crate) struct Underflow(pub Tuple);

/// Multiplicity map from output-tuple encoding to a positive witness count.
///
/// Owned exclusively by one join node; entries at zero are erased, so `len`
/// is exactly the current result cardinality.
#[derive(Debug, Default)]
pub(crate) struct WitnessTable {
    counts: HashMap<Vec<u8>, u64>,
}

impl WitnessTable {
    pub fn new() -> Self {
        WitnessTable::default()
    }

    /// Apply one signed witness and report the transition, if any.
    pub fn apply(&mut self, tuple: &Tuple, sign: Sign) -> Result<Option<WitnessEvent>, Underflow> {
        let key = tuple.to_bytes();
        match sign {
            Sign::Add => {
                let count = self.counts.entry(key).or_insert(0);
                *count += 1;
                Ok((*count == 1).then(|| WitnessEvent::Add(tuple.clone())))
            }
            Sign::Remove => match self.counts.get_mut(&key) {
                None => Err(Underflow(tuple.clone())),
                Some(count) if *count == 1 => {
                    self.counts.remove(&key);
                    Ok(Some(WitnessEvent::Remove(tuple.clone())))
                }
                Some(count) => {
                    *count -= 1;
                    Ok(None)
                }
            },
        }
    }

    /// Number of output tuples with a positive count.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Erase every entry.
    pub fn reset(&mut self) {
        self.counts.clear();
    }
}
