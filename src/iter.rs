//! Level iterators and the iterator factory.
//!
//! A [`LevelIterator`] is a cursor over the distinct atoms at one trie level
//! under a fixed bound prefix. It snapshots the ascending key list at
//! construction, so it never borrows the trie and cannot outlive the probe
//! that created it; `seek_ge` and `next` are binary-search / O(1) over that
//! snapshot and only ever move forward.
//!
//! The [`IteratorFactory`] is the seam between the join and storage: a
//! per-plan registry from relation name to trie, handing out iterators
//! without the join ever touching a trie directly.

use crate::error::{EngineError, EngineResult};
use crate::trie::{RelationTrie, Rewind};
use crate::value::{Atom, Tuple};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Cursor over the distinct key atoms of one trie level.
#[derive(Debug, Clone)]
pub struct LevelIterator {
    keys: Vec<Atom>,
    pos: usize,
}

impl LevelIterator {
    fn from_keys(keys: Vec<Atom>) -> Self {
        LevelIterator { keys, pos: 0 }
    }

    /// Position on the smallest remaining atom `>= key`.
    ///
    /// `seek_ge(None)` rewinds to the start. Seeks never move backwards:
    /// with non-decreasing keys the cursor visits a strictly increasing
    /// subsequence of the underlying atoms. An exhausted iterator stays
    /// exhausted.
    pub fn seek_ge(&mut self, key: Option<&Atom>) {
        match key {
            None => self.pos = 0,
            Some(key) => {
                if !self.at_end() {
                    self.pos += self.keys[self.pos..].partition_point(|a| a < key);
                }
            }
        }
    }

    /// The current atom, or `IteratorAtEnd` when exhausted.
    pub fn key(&self) -> EngineResult<&Atom> {
        self.current().ok_or(EngineError::IteratorAtEnd)
    }

    /// The current atom, if any.
    pub fn current(&self) -> Option<&Atom> {
        self.keys.get(self.pos)
    }

    /// Advance one position.
    pub fn next(&mut self) {
        if !self.at_end() {
            self.pos += 1;
        }
    }

    /// True iff no atoms remain.
    pub fn at_end(&self) -> bool {
        self.pos >= self.keys.len()
    }
}

/// Shared handle to a relation's trie.
pub type TrieHandle = Rc<RefCell<RelationTrie>>;

/// Registry from relation name to trie; isolates joins from storage.
#[derive(Debug, Default)]
pub struct IteratorFactory {
    tries: HashMap<String, TrieHandle>,
}

impl IteratorFactory {
    /// Create an empty factory.
    pub fn new() -> Self {
        IteratorFactory::default()
    }

    /// Register the trie backing a relation. Re-registering a name replaces
    /// the previous handle.
    pub fn register_trie(&mut self, relation: impl Into<String>, trie: TrieHandle) {
        self.tries.insert(relation.into(), trie);
    }

    /// True if a trie is registered under this name.
    pub fn has_relation(&self, relation: &str) -> bool {
        self.tries.contains_key(relation)
    }

    /// The trie registered for a relation.
    pub fn trie(&self, relation: &str) -> EngineResult<&TrieHandle> {
        self.tries
            .get(relation)
            .ok_or_else(|| EngineError::UnknownRelation(relation.to_string()))
    }

    /// Arity of a registered relation.
    pub fn arity(&self, relation: &str) -> EngineResult<usize> {
        Ok(self.trie(relation)?.borrow().arity())
    }

    /// Iterator over the atoms at `level` below `prefix`.
    ///
    /// The bound prefix must have exactly `level` atoms, and the level must
    /// be within the relation's arity.
    pub fn level_iter(
        &self,
        relation: &str,
        level: usize,
        prefix: &Tuple,
    ) -> EngineResult<LevelIterator> {
        if prefix.arity() != level {
            return Err(EngineError::InvalidPrefix {
                level,
                got: prefix.arity(),
            });
        }
        let trie = self.trie(relation)?.borrow();
        if level >= trie.arity() {
            return Err(EngineError::InvalidPrefix {
                level,
                got: prefix.arity(),
            });
        }
        Ok(LevelIterator::from_keys(trie.sorted_atoms(prefix)))
    }

    /// Iterator over the atoms at the `targets` columns of tuples matching
    /// the per-column `bindings` (see [`RelationTrie::constrained_atoms`]).
    pub fn constrained_iter(
        &self,
        relation: &str,
        targets: &[usize],
        bindings: &[Option<Atom>],
    ) -> EngineResult<LevelIterator> {
        self.constrained_iter_rewound(relation, targets, bindings, Rewind::default())
    }

    /// [`constrained_iter`](Self::constrained_iter) against the adjusted
    /// view described by `rewind`.
    pub fn constrained_iter_rewound(
        &self,
        relation: &str,
        targets: &[usize],
        bindings: &[Option<Atom>],
        rewind: Rewind<'_>,
    ) -> EngineResult<LevelIterator> {
        let trie = self.trie(relation)?.borrow();
        Ok(LevelIterator::from_keys(trie.constrained_atoms_rewound(
            targets, bindings, rewind,
        )))
    }
}
