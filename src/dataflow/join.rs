//! The LFTJ+ join node.
//!
//! For every tuple of an incoming source delta, the join binds the source
//! atom's columns to a partial assignment and enumerates the remaining
//! bindings by leapfrog intersection, walking the variable order level by
//! level. The source atom itself is excluded from every intersection: its
//! witness is fixed to the driving tuple, and the outer loop over the delta
//! already accounts for it; including it would re-derive the tuple and
//! double-count.
//!
//! Every complete assignment becomes one signed witness on the output tuple.
//! The witness table collapses duplicate derivations, so the emitted delta
//! carries exactly the 0→1 and 1→0 transitions of the query's answer.
//!
//! When the changed relation backs several atoms, each occurrence gets its
//! own probe pass, and occurrences after the pass's source atom are
//! enumerated in the pre-delta state (see [`Rewind`]): every combination of
//! delta tuples is then derived by exactly one pass, which keeps the
//! witness counts balanced between insertion and removal.

use super::{forward, Node, NodeId, NodeRef};
use crate::delta::Delta;
use crate::error::{EngineError, EngineResult};
use crate::iter::{IteratorFactory, LevelIterator};
use crate::plan::QueryPlan;
use crate::trie::Rewind;
use crate::value::{Atom, Tuple};
use crate::witness::{Sign, WitnessEvent, WitnessTable};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::rc::Rc;

/// Counters describing the work a join has done.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JoinStats {
    /// Source deltas processed.
    pub deltas_processed: u64,
    /// Source tuples probed.
    pub probes_run: u64,
    /// Tuples emitted into output deltas (both signs).
    pub tuples_emitted: u64,
    /// Source tuples skipped because a repeated variable carried two
    /// different atoms.
    pub drivers_skipped: u64,
}

/// Incremental multi-way join over one conjunctive plan.
pub struct JoinNode {
    id: NodeId,
    plan: QueryPlan,
    factory: Rc<IteratorFactory>,
    witness: WitnessTable,
    inputs: Vec<NodeId>,
    input_atoms: HashMap<NodeId, Vec<usize>>,
    atom_inputs: Vec<Option<NodeId>>,
    outputs: Vec<NodeRef>,
    stats: JoinStats,
    halted: bool,
}

impl std::fmt::Debug for JoinNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JoinNode")
            .field("id", &self.id)
            .field("plan", &self.plan)
            .field("witness", &self.witness)
            .field("inputs", &self.inputs)
            .field("input_atoms", &self.input_atoms)
            .field("atom_inputs", &self.atom_inputs)
            .field("outputs_len", &self.outputs.len())
            .field("stats", &self.stats)
            .field("halted", &self.halted)
            .finish()
    }
}

impl JoinNode {
    /// Create a join over a validated plan.
    ///
    /// Fails with `InvalidPlan` if any atom's relation is missing from the
    /// factory or its arity disagrees with the registered trie.
    pub fn new(plan: QueryPlan, factory: Rc<IteratorFactory>) -> EngineResult<Self> {
        for (a, atom) in plan.atoms().iter().enumerate() {
            if !factory.has_relation(&atom.relation) {
                return Err(EngineError::InvalidPlan {
                    reason: format!(
                        "atom {a} ('{}') has no registered trie",
                        atom.relation
                    ),
                });
            }
            let arity = factory.arity(&atom.relation)?;
            if arity != atom.arity() {
                return Err(EngineError::InvalidPlan {
                    reason: format!(
                        "atom {a} ('{}') has {} variables but the trie has arity {arity}",
                        atom.relation,
                        atom.arity()
                    ),
                });
            }
        }
        let atom_inputs = vec![None; plan.atoms().len()];
        Ok(JoinNode {
            id: NodeId::fresh(),
            plan,
            factory,
            witness: WitnessTable::new(),
            inputs: Vec::new(),
            input_atoms: HashMap::new(),
            atom_inputs,
            outputs: Vec::new(),
            stats: JoinStats::default(),
            halted: false,
        })
    }

    /// The plan this join evaluates.
    pub fn plan(&self) -> &QueryPlan {
        &self.plan
    }

    /// Record an upstream node, in wiring order.
    pub fn add_input(&mut self, input: NodeId) {
        if !self.inputs.contains(&input) {
            self.inputs.push(input);
        }
    }

    /// Upstream nodes, in wiring order.
    pub fn inputs(&self) -> &[NodeId] {
        &self.inputs
    }

    /// Bind an input node to the atom whose deltas it carries. Every atom
    /// must be mapped to exactly one input before deltas flow; one input may
    /// feed several atoms when the same relation occurs more than once in
    /// the plan.
    pub fn map_input_to_atom(&mut self, input: NodeId, atom_index: usize) -> EngineResult<()> {
        if atom_index >= self.plan.atoms().len() {
            return Err(EngineError::InvalidPlan {
                reason: format!("atom index {atom_index} out of range"),
            });
        }
        if let Some(existing) = self.atom_inputs[atom_index] {
            if existing != input {
                return Err(EngineError::InvalidPlan {
                    reason: format!("atom {atom_index} is already mapped to input {existing}"),
                });
            }
            return Ok(());
        }
        self.atom_inputs[atom_index] = Some(input);
        let atoms = self.input_atoms.entry(input).or_default();
        atoms.push(atom_index);
        atoms.sort_unstable();
        self.add_input(input);
        Ok(())
    }

    /// Number of distinct tuples currently in the join's result.
    pub fn witness_len(&self) -> usize {
        self.witness.len()
    }

    /// Work counters.
    pub fn stats(&self) -> JoinStats {
        self.stats
    }

    /// True once a fatal error has stopped this join.
    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Clear the witness table and lift a halt, for replays and teardown.
    pub fn reset(&mut self) {
        self.witness.reset();
        self.halted = false;
    }

    /// Probe one source atom's delta and return the induced output delta.
    ///
    /// A `WitnessUnderflow` halts the join: the error is surfaced, nothing
    /// is forwarded, and the witness table is undefined until `reset`.
    pub fn process_delta(&mut self, source_atom: usize, delta: &Delta) -> EngineResult<Delta> {
        if self.halted {
            return Err(EngineError::JoinHalted { node: self.id });
        }
        if source_atom >= self.plan.atoms().len() {
            return Err(EngineError::InvalidPlan {
                reason: format!("source atom index {source_atom} out of range"),
            });
        }

        tracing::debug!(
            node = %self.id,
            source_atom,
            adds = delta.adds().len(),
            removes = delta.removes().len(),
            "join_delta_received"
        );

        let result = self.run_probes(source_atom, delta);
        match &result {
            Ok(out) => {
                tracing::debug!(
                    node = %self.id,
                    emitted_adds = out.adds().len(),
                    emitted_removes = out.removes().len(),
                    result_size = self.witness.len(),
                    "join_delta_processed"
                );
            }
            Err(EngineError::WitnessUnderflow { .. }) => {
                self.halted = true;
                tracing::error!(node = %self.id, source_atom, "join_halted_on_underflow");
            }
            Err(_) => {}
        }
        result
    }

    fn run_probes(&mut self, source_atom: usize, delta: &Delta) -> EngineResult<Delta> {
        self.stats.deltas_processed += 1;
        let mut out = Delta::new();
        // Removals are conceptually applied before additions; the rewind
        // views in `Probe::atom_iter` assume that trajectory.
        for (tuples, sign) in [(delta.removes(), Sign::Remove), (delta.adds(), Sign::Add)] {
            let mut drivers: Vec<&Tuple> = tuples.iter().collect();
            sort_drivers(&mut drivers, self.plan.vo_projection(source_atom));

            let mut probe = Probe {
                node: self.id,
                plan: &self.plan,
                factory: &self.factory,
                witness: &mut self.witness,
                stats: &mut self.stats,
                delta,
                source_atom,
                sign,
            };
            for tuple in drivers {
                probe.run(tuple, &mut out)?;
            }
        }
        Ok(out)
    }
}

impl Node for JoinNode {
    fn id(&self) -> NodeId {
        self.id
    }

    fn on_delta_received(&mut self, source: NodeId, delta: &Delta) -> EngineResult<()> {
        let atom_indices = self
            .input_atoms
            .get(&source)
            .cloned()
            .ok_or(EngineError::UnmappedInput {
                node: self.id,
                input: source,
            })?;
        // One probe pass per atom this input feeds; a self-joined relation
        // contributes once per occurrence.
        let mut out = Delta::new();
        for atom_index in atom_indices {
            out.merge(self.process_delta(atom_index, delta)?);
        }
        forward(&self.outputs, self.id, &out)
    }

    fn add_output(&mut self, output: NodeRef) {
        self.outputs.push(output);
    }
}

/// Sort delta tuples by their projection onto the variable order: tuples
/// sharing a long variable-order prefix cluster, so the per-level trie
/// walks of consecutive probes stay close. Ties (impossible among distinct
/// set members, but kept deterministic) break by byte encoding.
fn sort_drivers(drivers: &mut [&Tuple], vo_projection: &[usize]) {
    drivers.sort_by(|a, b| {
        for &c in vo_projection {
            match a.get(c).cmp(&b.get(c)) {
                Ordering::Equal => {}
                other => return other,
            }
        }
        a.to_bytes().cmp(&b.to_bytes())
    });
}

/// One signed pass over one source tuple.
struct Probe<'a> {
    node: NodeId,
    plan: &'a QueryPlan,
    factory: &'a IteratorFactory,
    witness: &'a mut WitnessTable,
    stats: &'a mut JoinStats,
    /// The source delta being processed, for rewind views of the changed
    /// relation's other occurrences.
    delta: &'a Delta,
    source_atom: usize,
    sign: Sign,
}

impl Probe<'_> {
    fn run(&mut self, tuple: &Tuple, out: &mut Delta) -> EngineResult<()> {
        self.stats.probes_run += 1;
        tracing::trace!(node = %self.node, source_atom = self.source_atom, %tuple, sign = ?self.sign, "probe");

        let n = self.plan.num_variables();
        let mut assignment: Vec<Option<Atom>> = vec![None; n];

        // Bind the source prefix. A variable appearing at two source
        // columns must carry identical atoms, else the tuple cannot join.
        for level in 0..n {
            for &c in self.plan.columns_of(self.source_atom, level) {
                let atom = &tuple[c];
                match &assignment[level] {
                    Some(bound) if bound != atom => {
                        self.stats.drivers_skipped += 1;
                        return Ok(());
                    }
                    _ => assignment[level] = Some(atom.clone()),
                }
            }
        }

        self.enumerate(0, &mut assignment, out)
    }

    /// Walk the variable order from `level`, extending `assignment` with
    /// every combination satisfying the remaining atoms, and emit each
    /// complete assignment as one signed witness.
    fn enumerate(
        &mut self,
        level: usize,
        assignment: &mut Vec<Option<Atom>>,
        out: &mut Delta,
    ) -> EngineResult<()> {
        if level == self.plan.num_variables() {
            return self.emit(assignment, out);
        }

        // Atoms other than the source that mention this variable.
        let group: Vec<usize> = self
            .plan
            .level_group(level)
            .iter()
            .copied()
            .filter(|&a| a != self.source_atom)
            .collect();

        if let Some(bound) = assignment[level].clone() {
            // Source-bound level: every remaining atom must contain the
            // bound atom here, or the probe dead-ends.
            for &a in &group {
                let mut iter = self.atom_iter(a, level, assignment)?;
                iter.seek_ge(Some(&bound));
                if iter.current() != Some(&bound) {
                    return Ok(());
                }
            }
            return self.enumerate(level + 1, assignment, out);
        }

        if group.is_empty() {
            // Unreachable for validated plans: an unbound variable must be
            // mentioned by some non-source atom.
            return Err(EngineError::InvalidPlan {
                reason: format!(
                    "variable '{}' is neither bound nor constrained",
                    self.plan.variable_order()[level]
                ),
            });
        }

        let mut iters: Vec<LevelIterator> = Vec::with_capacity(group.len());
        for &a in &group {
            iters.push(self.atom_iter(a, level, assignment)?);
        }
        for iter in &mut iters {
            iter.seek_ge(None);
        }

        // Leapfrog intersection: repeatedly lift the laggards to the
        // current maximum; when all cursors agree the key is a match.
        loop {
            let mut k_max: Option<Atom> = None;
            for iter in &iters {
                match iter.current() {
                    None => return Ok(()),
                    Some(k) => {
                        if k_max.as_ref().map_or(true, |m| k > m) {
                            k_max = Some(k.clone());
                        }
                    }
                }
            }
            let Some(k_max) = k_max else {
                return Ok(());
            };

            let mut aligned = true;
            for iter in &mut iters {
                if iter.current().is_some_and(|k| *k < k_max) {
                    iter.seek_ge(Some(&k_max));
                }
                match iter.current() {
                    None => return Ok(()),
                    Some(k) => {
                        if *k != k_max {
                            aligned = false;
                        }
                    }
                }
            }
            if !aligned {
                continue;
            }

            assignment[level] = Some(k_max);
            self.enumerate(level + 1, assignment, out)?;
            assignment[level] = None;

            // Deterministic advance: the first iterator of the group.
            iters[0].next();
            if iters[0].at_end() {
                return Ok(());
            }
        }
    }

    /// Constrained iterator over the columns of atom `atom_index` carrying
    /// the variable at `level`, under every binding the assignment already
    /// fixes for that atom's other variables.
    ///
    /// Other occurrences of the changed relation are viewed along the
    /// removes-then-adds trajectory: occurrences before the source atom see
    /// the post-delta state of the current sign's step, occurrences after
    /// it the pre-delta state. Unrelated relations are viewed as-is.
    fn atom_iter(
        &self,
        atom_index: usize,
        level: usize,
        assignment: &[Option<Atom>],
    ) -> EngineResult<LevelIterator> {
        let spec = &self.plan.atoms()[atom_index];
        let targets = self.plan.columns_of(atom_index, level);
        let mut bindings: Vec<Option<Atom>> = vec![None; spec.arity()];
        for c in 0..spec.arity() {
            if targets.contains(&c) {
                continue;
            }
            let var = self.plan.column_variable(atom_index, c);
            bindings[c] = assignment[var].clone();
        }

        let rewind = if spec.relation == self.plan.atoms()[self.source_atom].relation {
            let after_source = atom_index > self.source_atom;
            match self.sign {
                Sign::Add => Rewind {
                    hide: after_source.then(|| self.delta.adds()),
                    restore: None,
                },
                Sign::Remove => Rewind {
                    hide: Some(self.delta.adds()),
                    restore: after_source.then(|| self.delta.removes()),
                },
            }
        } else {
            Rewind::default()
        };

        self.factory
            .constrained_iter_rewound(&spec.relation, targets, &bindings, rewind)
    }

    fn emit(&mut self, assignment: &[Option<Atom>], out: &mut Delta) -> EngineResult<()> {
        let mut atoms = Vec::with_capacity(assignment.len());
        for (i, slot) in assignment.iter().enumerate() {
            match slot {
                Some(atom) => atoms.push(atom.clone()),
                None => {
                    return Err(EngineError::InvalidPlan {
                        reason: format!(
                            "variable '{}' left unbound at emission",
                            self.plan.variable_order()[i]
                        ),
                    })
                }
            }
        }
        let output = Tuple::new(atoms);

        match self.witness.apply(&output, self.sign) {
            Ok(Some(WitnessEvent::Add(tuple))) => {
                self.stats.tuples_emitted += 1;
                out.push_add(tuple);
            }
            Ok(Some(WitnessEvent::Remove(tuple))) => {
                self.stats.tuples_emitted += 1;
                out.push_remove(tuple);
            }
            Ok(None) => {}
            Err(underflow) => {
                return Err(EngineError::WitnessUnderflow {
                    node: self.node,
                    atom_index: self.source_atom,
                    tuple: underflow.0,
                })
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iter::TrieHandle;
    use crate::plan::AtomSpec;
    use crate::trie::RelationTrie;
    use std::cell::RefCell;

    fn handle(arity: usize, tuples: &[Tuple]) -> TrieHandle {
        let mut trie = RelationTrie::new(arity);
        for t in tuples {
            trie.insert(t);
        }
        Rc::new(RefCell::new(trie))
    }

    fn pair(a: i64, b: i64) -> Tuple {
        Tuple::new(vec![Atom::Int(a), Atom::Int(b)])
    }

    fn triple(a: i64, b: i64, c: i64) -> Tuple {
        Tuple::new(vec![Atom::Int(a), Atom::Int(b), Atom::Int(c)])
    }

    /// Edge(x, y) join Edge(y, z) over one shared trie.
    fn two_hop_join(edges: &[(i64, i64)]) -> (JoinNode, TrieHandle) {
        let tuples: Vec<Tuple> = edges.iter().map(|(a, b)| pair(*a, *b)).collect();
        let trie = handle(2, &tuples);
        let mut factory = IteratorFactory::new();
        factory.register_trie("edge", Rc::clone(&trie));
        let plan = QueryPlan::new(
            ["x", "y", "z"],
            vec![
                AtomSpec::new("edge", ["x", "y"]),
                AtomSpec::new("edge", ["y", "z"]),
            ],
        )
        .unwrap();
        (JoinNode::new(plan, Rc::new(factory)).unwrap(), trie)
    }

    #[test]
    fn test_rejects_unregistered_relation() {
        let plan = QueryPlan::new(["x"], vec![AtomSpec::new("missing", ["x"])]).unwrap();
        let err = JoinNode::new(plan, Rc::new(IteratorFactory::new())).unwrap_err();
        assert!(matches!(err, EngineError::InvalidPlan { .. }));
    }

    #[test]
    fn test_rejects_arity_mismatch() {
        let mut factory = IteratorFactory::new();
        factory.register_trie("edge", handle(2, &[]));
        let plan = QueryPlan::new(["x"], vec![AtomSpec::new("edge", ["x"])]).unwrap();
        assert!(JoinNode::new(plan, Rc::new(factory)).is_err());
    }

    #[test]
    fn test_self_join_probe() {
        // Edge = {(1,2),(2,3),(2,4)}; the trie already holds all edges, and
        // we replay the (1,2) insertion as the source delta on atom 0.
        let (mut join, _trie) = two_hop_join(&[(1, 2), (2, 3), (2, 4)]);
        let out = join
            .process_delta(0, &Delta::adds_only(vec![pair(1, 2)]))
            .unwrap();
        let adds: Vec<Tuple> = out.adds().iter().cloned().collect();
        assert_eq!(adds, vec![triple(1, 2, 3), triple(1, 2, 4)]);
        assert!(out.removes().is_empty());
        assert_eq!(join.witness_len(), 2);
    }

    #[test]
    fn test_probe_excludes_source_atom() {
        // With Edge = {(1,2)} an insertion of (1,2) probed on atom 0 finds
        // no (2, z) continuation; the source tuple itself must not satisfy
        // the second atom's x=2 branch.
        let (mut join, _trie) = two_hop_join(&[(1, 2)]);
        let out = join
            .process_delta(0, &Delta::adds_only(vec![pair(1, 2)]))
            .unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_both_atoms_witness_same_output() {
        // Edge = {(1,2),(2,3)}: the output (1,2,3) is witnessed once via
        // atom 0's delta for (1,2) and once via atom 1's delta for (2,3).
        // Only the first emits; the second only bumps the count.
        let (mut join, _trie) = two_hop_join(&[(1, 2), (2, 3)]);
        let out0 = join
            .process_delta(0, &Delta::adds_only(vec![pair(1, 2)]))
            .unwrap();
        assert_eq!(out0.adds().len(), 1);
        let out1 = join
            .process_delta(1, &Delta::adds_only(vec![pair(2, 3)]))
            .unwrap();
        assert!(out1.is_empty(), "duplicate witness must not re-emit");
        assert_eq!(join.witness_len(), 1);
    }

    #[test]
    fn test_self_join_batch_witnesses_balance() {
        // Insert a batch that joins with itself, then remove it again: every
        // derivation must be counted by exactly one occurrence pass, so the
        // witness table drains back to empty.
        let (mut join, trie) = two_hop_join(&[]);
        let batch = [pair(1, 2), pair(2, 3), pair(2, 2)];

        for t in &batch {
            trie.borrow_mut().insert(t);
        }
        let adds = Delta::adds_only(batch.to_vec());
        let mut out = Delta::new();
        out.merge(join.process_delta(0, &adds).unwrap());
        out.merge(join.process_delta(1, &adds).unwrap());
        // (1,2,3), (1,2,2), (2,2,3), (2,2,2).
        assert_eq!(out.adds().len(), 4);
        assert_eq!(join.witness_len(), 4);

        for t in &batch {
            trie.borrow_mut().remove(t);
        }
        let removes = Delta::removes_only(batch.to_vec());
        let mut out = Delta::new();
        out.merge(join.process_delta(0, &removes).unwrap());
        out.merge(join.process_delta(1, &removes).unwrap());
        assert_eq!(out.removes().len(), 4);
        assert_eq!(join.witness_len(), 0);
    }

    #[test]
    fn test_underflow_halts_join() {
        let (mut join, _trie) = two_hop_join(&[(1, 2), (2, 3)]);
        // Remove a derivation that was never added.
        let err = join
            .process_delta(0, &Delta::removes_only(vec![pair(1, 2)]))
            .unwrap_err();
        assert!(matches!(err, EngineError::WitnessUnderflow { .. }));
        assert!(join.is_halted());

        let err = join
            .process_delta(0, &Delta::adds_only(vec![pair(1, 2)]))
            .unwrap_err();
        assert!(matches!(err, EngineError::JoinHalted { .. }));

        join.reset();
        assert!(!join.is_halted());
        assert_eq!(join.witness_len(), 0);
    }

    #[test]
    fn test_unmapped_input() {
        let (mut join, _trie) = two_hop_join(&[]);
        let stranger = NodeId::fresh();
        let err = join
            .on_delta_received(stranger, &Delta::new())
            .unwrap_err();
        assert_eq!(
            err,
            EngineError::UnmappedInput {
                node: join.id(),
                input: stranger
            }
        );
    }

    #[test]
    fn test_remap_conflict_rejected() {
        let (mut join, _trie) = two_hop_join(&[]);
        let a = NodeId::fresh();
        let b = NodeId::fresh();
        join.map_input_to_atom(a, 0).unwrap();
        assert!(join.map_input_to_atom(a, 0).is_ok()); // same mapping, fine
        assert!(join.map_input_to_atom(b, 0).is_err());
        assert!(join.map_input_to_atom(a, 5).is_err());
    }

    #[test]
    fn test_driver_with_conflicting_repeated_variable_is_skipped() {
        // Loop(x, x) ⋈ Edge(x, y): a source tuple (1, 2) for Loop cannot
        // bind x twice, so it contributes nothing.
        let mut factory = IteratorFactory::new();
        factory.register_trie("loop", handle(2, &[]));
        factory.register_trie("edge", handle(2, &[pair(1, 9)]));
        let plan = QueryPlan::new(
            ["x", "y"],
            vec![
                AtomSpec::new("loop", ["x", "x"]),
                AtomSpec::new("edge", ["x", "y"]),
            ],
        )
        .unwrap();
        let mut join = JoinNode::new(plan, Rc::new(factory)).unwrap();

        let out = join
            .process_delta(0, &Delta::adds_only(vec![pair(1, 2)]))
            .unwrap();
        assert!(out.is_empty());
        assert_eq!(join.stats().drivers_skipped, 1);

        let out = join
            .process_delta(0, &Delta::adds_only(vec![pair(1, 1)]))
            .unwrap();
        assert_eq!(out.adds().len(), 1);
    }
}
