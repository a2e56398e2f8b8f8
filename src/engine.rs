//! Single-plan engine facade.
//!
//! [`QueryEngine`] assembles the full pipeline for one conjunctive plan:
//! a trie and scan per distinct relation, one join node with every input
//! mapped, and an output sink. It is a convenience over the wiring API;
//! everything it does can be done by hand with [`InputRelation`],
//! [`JoinNode`] and [`OutputNode`].

use crate::dataflow::{JoinNode, JoinStats, Node, OutputNode};
use crate::delta::Delta;
use crate::error::{EngineError, EngineResult};
use crate::iter::IteratorFactory;
use crate::plan::QueryPlan;
use crate::relation::InputRelation;
use crate::value::Tuple;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// A fully wired incremental evaluation of one query plan.
pub struct QueryEngine {
    relations: HashMap<String, InputRelation>,
    join: Rc<RefCell<JoinNode>>,
    output: Rc<RefCell<OutputNode>>,
}

impl QueryEngine {
    /// Build tries, scans, join and sink for the plan and wire them up.
    pub fn new(plan: QueryPlan) -> EngineResult<Self> {
        let mut factory = IteratorFactory::new();
        let mut relations: HashMap<String, InputRelation> = HashMap::new();
        for atom in plan.atoms() {
            if !relations.contains_key(&atom.relation) {
                let relation = InputRelation::new(&atom.relation, atom.arity());
                factory.register_trie(&atom.relation, Rc::clone(relation.trie()));
                relations.insert(atom.relation.clone(), relation);
            }
        }

        let join = JoinNode::new(plan.clone(), Rc::new(factory))?;
        let join = Rc::new(RefCell::new(join));
        let output = Rc::new(RefCell::new(OutputNode::new()));
        join.borrow_mut().add_output(output.clone());

        for (index, atom) in plan.atoms().iter().enumerate() {
            let relation = &relations[&atom.relation];
            join.borrow_mut()
                .map_input_to_atom(relation.scan_id(), index)?;
        }
        // Wire each scan once, after mapping: a self-joined relation still
        // pushes a single delta, and the join probes it once per occurrence.
        for relation in relations.values() {
            relation.add_consumer(join.clone());
        }

        tracing::info!(
            relations = relations.len(),
            atoms = plan.atoms().len(),
            variables = plan.num_variables(),
            "query_engine_wired"
        );

        Ok(QueryEngine {
            relations,
            join,
            output,
        })
    }

    fn relation(&self, name: &str) -> EngineResult<&InputRelation> {
        self.relations
            .get(name)
            .ok_or_else(|| EngineError::UnknownRelation(name.to_string()))
    }

    /// Insert tuples into a base relation and run the dataflow. Returns the
    /// effective base delta.
    pub fn insert(
        &self,
        relation: &str,
        tuples: impl IntoIterator<Item = Tuple>,
    ) -> EngineResult<Delta> {
        self.relation(relation)?.insert(tuples)
    }

    /// Remove tuples from a base relation and run the dataflow.
    pub fn remove(
        &self,
        relation: &str,
        tuples: impl IntoIterator<Item = Tuple>,
    ) -> EngineResult<Delta> {
        self.relation(relation)?.remove(tuples)
    }

    /// Apply a mixed delta to a base relation and run the dataflow.
    pub fn apply(&self, relation: &str, delta: &Delta) -> EngineResult<Delta> {
        self.relation(relation)?.apply(delta)
    }

    /// Number of tuples currently stored in a base relation.
    pub fn relation_len(&self, relation: &str) -> EngineResult<usize> {
        Ok(self.relation(relation)?.len())
    }

    /// The output sink.
    pub fn output(&self) -> &Rc<RefCell<OutputNode>> {
        &self.output
    }

    /// Drain and return the output events accumulated so far.
    pub fn take_output(&self) -> Vec<Delta> {
        self.output
            .borrow_mut()
            .take_received()
            .into_iter()
            .map(|(_, delta)| delta)
            .collect()
    }

    /// Drain the output and fold it into one net delta.
    pub fn take_net_output(&self) -> Delta {
        let mut net = Delta::new();
        for delta in self.take_output() {
            net.merge(delta);
        }
        net
    }

    /// Number of distinct tuples currently in the query's result.
    pub fn result_len(&self) -> usize {
        self.join.borrow().witness_len()
    }

    /// Work counters of the join.
    pub fn join_stats(&self) -> JoinStats {
        self.join.borrow().stats()
    }

    /// Clear the join's witness table and the output sink, for replays.
    pub fn reset(&self) {
        self.join.borrow_mut().reset();
        self.output.borrow_mut().take_received();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::AtomSpec;
    use crate::value::Atom;

    fn edge(a: i64, b: i64) -> Tuple {
        Tuple::new(vec![Atom::Int(a), Atom::Int(b)])
    }

    fn two_hop_engine() -> QueryEngine {
        let plan = QueryPlan::new(
            ["x", "y", "z"],
            vec![
                AtomSpec::new("edge", ["x", "y"]),
                AtomSpec::new("edge", ["y", "z"]),
            ],
        )
        .unwrap();
        QueryEngine::new(plan).unwrap()
    }

    #[test]
    fn test_self_join_single_scan() {
        let engine = two_hop_engine();
        engine
            .insert("edge", vec![edge(1, 2), edge(2, 3), edge(2, 4)])
            .unwrap();
        let net = engine.take_net_output();
        let adds: Vec<Tuple> = net.adds().iter().cloned().collect();
        assert_eq!(
            adds,
            vec![
                Tuple::new(vec![Atom::Int(1), Atom::Int(2), Atom::Int(3)]),
                Tuple::new(vec![Atom::Int(1), Atom::Int(2), Atom::Int(4)]),
            ]
        );
        assert_eq!(engine.result_len(), 2);
    }

    #[test]
    fn test_unknown_relation_rejected() {
        let engine = two_hop_engine();
        assert!(engine.insert("vertex", vec![edge(1, 2)]).is_err());
    }

    #[test]
    fn test_reset_allows_replay() {
        let engine = two_hop_engine();
        engine.insert("edge", vec![edge(1, 2), edge(2, 3)]).unwrap();
        assert_eq!(engine.result_len(), 1);

        engine.reset();
        assert_eq!(engine.result_len(), 0);
        assert!(engine.take_output().is_empty());
    }
}
