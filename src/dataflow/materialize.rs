//! Materialization nodes: joins feeding joins.
//!
//! A downstream join probes its atoms through tries, so an upstream join's
//! output must be materialized as a relation before the downstream scan
//! fires. [`MaterializeNode`] does exactly that: it applies every incoming
//! delta to an [`InputRelation`] (trie first, scan second), which makes the
//! intermediate relation indistinguishable from a base relation for
//! everything wired below it.

use super::{Node, NodeId, NodeRef};
use crate::delta::Delta;
use crate::error::EngineResult;
use crate::relation::InputRelation;

/// Applies received deltas to an intermediate relation.
pub struct MaterializeNode {
    id: NodeId,
    relation: InputRelation,
}

impl MaterializeNode {
    /// Materialize into the given relation.
    pub fn new(relation: InputRelation) -> Self {
        MaterializeNode {
            id: NodeId::fresh(),
            relation,
        }
    }

    /// The materialized relation.
    pub fn relation(&self) -> &InputRelation {
        &self.relation
    }
}

impl Node for MaterializeNode {
    fn id(&self) -> NodeId {
        self.id
    }

    fn on_delta_received(&mut self, _source: NodeId, delta: &Delta) -> EngineResult<()> {
        self.relation.apply(delta)?;
        Ok(())
    }

    /// Consumers attach below the relation's scan, not below this node.
    fn add_output(&mut self, output: NodeRef) {
        self.relation.add_consumer(output);
    }
}
