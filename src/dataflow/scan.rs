//! Scan nodes: the entry points of the dataflow.

use super::{forward, Node, NodeId, NodeRef};
use crate::delta::Delta;
use crate::error::EngineResult;
use crate::iter::TrieHandle;

/// Surfaces one base relation's deltas into the graph.
///
/// The surrounding system pushes each base update here *after* applying it
/// to the relation's trie; the scan forwards the delta unchanged. Pushing
/// before the trie mutation is undefined behavior (downstream joins would
/// probe a different world than the delta claims), so debug builds
/// cross-check the delta against the trie.
pub struct ScanNode {
    id: NodeId,
    relation: String,
    trie: TrieHandle,
    outputs: Vec<NodeRef>,
}

impl ScanNode {
    /// Create a scan over one base relation.
    pub fn new(relation: impl Into<String>, trie: TrieHandle) -> Self {
        ScanNode {
            id: NodeId::fresh(),
            relation: relation.into(),
            trie,
            outputs: Vec::new(),
        }
    }

    /// Name of the scanned relation.
    pub fn relation(&self) -> &str {
        &self.relation
    }

    /// The trie this scan is required to agree with.
    pub fn trie(&self) -> &TrieHandle {
        &self.trie
    }

    /// Hand a base-relation delta to the dataflow.
    ///
    /// The delta's adds must be exactly the tuples just inserted into the
    /// trie since the previous push, and its removes exactly those just
    /// removed.
    pub fn push(&mut self, delta: &Delta) -> EngineResult<()> {
        #[cfg(debug_assertions)]
        self.check_trie_agreement(delta)?;

        tracing::debug!(
            relation = %self.relation,
            node = %self.id,
            adds = delta.adds().len(),
            removes = delta.removes().len(),
            "scan_push"
        );
        forward(&self.outputs, self.id, delta)
    }

    /// Adds must already be present and removes already absent.
    #[cfg(debug_assertions)]
    fn check_trie_agreement(&self, delta: &Delta) -> EngineResult<()> {
        use crate::error::EngineError;

        let trie = self.trie.borrow();
        for tuple in delta.adds() {
            if !trie.contains(tuple) {
                return Err(EngineError::UpstreamOrderingViolation {
                    relation: self.relation.clone(),
                    tuple: tuple.clone(),
                });
            }
        }
        for tuple in delta.removes() {
            if trie.contains(tuple) {
                return Err(EngineError::UpstreamOrderingViolation {
                    relation: self.relation.clone(),
                    tuple: tuple.clone(),
                });
            }
        }
        Ok(())
    }
}

impl Node for ScanNode {
    fn id(&self) -> NodeId {
        self.id
    }

    /// Scans transform nothing: a delta received from upstream is forwarded
    /// unchanged, exactly like an external push.
    fn on_delta_received(&mut self, _source: NodeId, delta: &Delta) -> EngineResult<()> {
        self.push(delta)
    }

    fn add_output(&mut self, output: NodeRef) {
        self.outputs.push(output);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataflow::OutputNode;
    use crate::trie::RelationTrie;
    use crate::value::{Atom, Tuple};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn edge(a: i64, b: i64) -> Tuple {
        Tuple::new(vec![Atom::Int(a), Atom::Int(b)])
    }

    #[test]
    fn test_push_forwards_unchanged() {
        let trie = Rc::new(RefCell::new(RelationTrie::new(2)));
        let mut scan = ScanNode::new("edge", Rc::clone(&trie));
        let sink = Rc::new(RefCell::new(OutputNode::new()));
        scan.add_output(sink.clone());

        trie.borrow_mut().insert(&edge(1, 2));
        let delta = Delta::adds_only(vec![edge(1, 2)]);
        scan.push(&delta).unwrap();

        let received = sink.borrow().received().to_vec();
        assert_eq!(received, vec![(scan.id(), delta)]);
    }

    #[test]
    #[cfg(debug_assertions)]
    fn test_push_before_trie_mutation_is_rejected() {
        let trie = Rc::new(RefCell::new(RelationTrie::new(2)));
        let mut scan = ScanNode::new("edge", trie);
        // The add was never applied to the trie.
        let err = scan.push(&Delta::adds_only(vec![edge(1, 2)])).unwrap_err();
        assert!(matches!(
            err,
            crate::error::EngineError::UpstreamOrderingViolation { .. }
        ));
    }
}
