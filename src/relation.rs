//! Base-relation ingestion.
//!
//! An [`InputRelation`] couples a relation's trie with its scan node and
//! enforces the ingestion contract: every update mutates the trie first and
//! pushes the scan second, and the pushed delta contains exactly the tuples
//! that actually changed the trie. Idempotent inserts and removes of absent
//! tuples drop out of the delta, so re-inserting a present tuple reaches
//! the dataflow as an empty push and a stray remove never underflows a
//! downstream witness table.

use crate::dataflow::{Node, NodeId, NodeRef, ScanNode};
use crate::delta::Delta;
use crate::error::EngineResult;
use crate::iter::TrieHandle;
use crate::trie::RelationTrie;
use crate::value::Tuple;
use std::cell::RefCell;
use std::rc::Rc;

/// One base relation: trie storage plus the scan surfacing its deltas.
pub struct InputRelation {
    name: String,
    trie: TrieHandle,
    scan: Rc<RefCell<ScanNode>>,
}

impl InputRelation {
    /// Create an empty relation of the given arity.
    pub fn new(name: impl Into<String>, arity: usize) -> Self {
        let name = name.into();
        let trie = Rc::new(RefCell::new(RelationTrie::new(arity)));
        let scan = Rc::new(RefCell::new(ScanNode::new(name.clone(), Rc::clone(&trie))));
        InputRelation { name, trie, scan }
    }

    /// Relation name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The storage-of-record trie.
    pub fn trie(&self) -> &TrieHandle {
        &self.trie
    }

    /// The scan node surfacing this relation's deltas.
    pub fn scan(&self) -> &Rc<RefCell<ScanNode>> {
        &self.scan
    }

    /// Identifier of the scan node, for input mapping.
    pub fn scan_id(&self) -> NodeId {
        self.scan.borrow().id()
    }

    /// Wire a consumer downstream of this relation's scan.
    pub fn add_consumer(&self, consumer: NodeRef) {
        self.scan.borrow_mut().add_output(consumer);
    }

    /// Number of tuples currently stored.
    pub fn len(&self) -> usize {
        self.trie.borrow().len()
    }

    /// True when no tuples are stored.
    pub fn is_empty(&self) -> bool {
        self.trie.borrow().is_empty()
    }

    /// True iff the tuple is currently stored.
    pub fn contains(&self, tuple: &Tuple) -> bool {
        self.trie.borrow().contains(tuple)
    }

    /// Insert tuples and push the effective delta. Returns that delta;
    /// tuples already present contribute nothing.
    pub fn insert(&self, tuples: impl IntoIterator<Item = Tuple>) -> EngineResult<Delta> {
        self.apply(&Delta::adds_only(tuples))
    }

    /// Remove tuples and push the effective delta. Returns that delta;
    /// absent tuples contribute nothing.
    pub fn remove(&self, tuples: impl IntoIterator<Item = Tuple>) -> EngineResult<Delta> {
        self.apply(&Delta::removes_only(tuples))
    }

    /// Apply a full delta: mutate the trie, then push exactly the tuples
    /// that changed it. The push happens even when the effective delta is
    /// empty, so downstream sinks observe one event per update.
    pub fn apply(&self, delta: &Delta) -> EngineResult<Delta> {
        let mut effective = Delta::new();
        {
            let mut trie = self.trie.borrow_mut();
            for tuple in delta.removes() {
                if trie.remove(tuple) {
                    effective.push_remove(tuple.clone());
                }
            }
            for tuple in delta.adds() {
                if trie.insert(tuple) {
                    effective.push_add(tuple.clone());
                }
            }
        }
        if effective.len() != delta.len() {
            tracing::debug!(
                relation = %self.name,
                requested = delta.len(),
                effective = effective.len(),
                "update_partially_absorbed"
            );
        }
        self.scan.borrow_mut().push(&effective)?;
        Ok(effective)
    }
}
