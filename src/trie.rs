//! Ordered relation tries.
//!
//! A [`RelationTrie`] indexes one relation as a prefix tree: level *i*
//! corresponds to tuple position *i*, siblings are kept ordered and distinct
//! by `BTreeMap`, and a tuple is present iff a root-to-leaf path with exactly
//! its atoms exists. Tries are the storage-of-record for the lifetime of a
//! query; scans and joins only ever read them.
//!
//! Enumeration comes in two forms:
//!
//! - [`sorted_atoms`](RelationTrie::sorted_atoms): the ascending child atoms
//!   below a bound prefix, the classic trie-walk used by level iterators.
//! - [`constrained_atoms`](RelationTrie::constrained_atoms): the ascending
//!   atoms at one or more target columns of tuples matching per-column
//!   equality constraints. This is what lets a join bind variables in an
//!   order different from the relation's column order; when the constraints
//!   happen to form a contiguous column prefix it degenerates to a plain
//!   child listing.

use crate::value::{Atom, Tuple};
use std::collections::{BTreeMap, BTreeSet};

/// A view adjustment letting probes see a relation as it stood on the far
/// side of the delta currently being processed: `hide` masks tuples the
/// delta just inserted, `restore` resurrects tuples it just removed. Both
/// default to no adjustment.
///
/// Joins need this when the same relation backs several atoms: occurrences
/// after the probe's source atom must be enumerated in the pre-delta state,
/// or a batch that joins with itself is counted more than once on insert
/// and missed entirely on remove.
#[derive(Debug, Clone, Copy, Default)]
pub struct Rewind<'a> {
    /// Tuples to treat as absent even though the trie holds them.
    pub hide: Option<&'a BTreeSet<Tuple>>,
    /// Tuples to treat as present even though the trie lost them.
    pub restore: Option<&'a BTreeSet<Tuple>>,
}

impl Rewind<'_> {
    fn is_noop(&self) -> bool {
        self.hide.is_none_or(|s| s.is_empty()) && self.restore.is_none_or(|s| s.is_empty())
    }
}

#[derive(Debug, Clone, Default)]
struct TrieNode {
    children: BTreeMap<Atom, TrieNode>,
}

/// Prefix-tree index over the tuples of one relation.
#[derive(Debug, Clone)]
pub struct RelationTrie {
    arity: usize,
    root: TrieNode,
    len: usize,
}

impl RelationTrie {
    /// Create an empty trie for tuples of the given arity.
    pub fn new(arity: usize) -> Self {
        RelationTrie {
            arity,
            root: TrieNode::default(),
            len: 0,
        }
    }

    /// Arity of the indexed relation.
    pub fn arity(&self) -> usize {
        self.arity
    }

    /// Number of tuples currently present.
    pub fn len(&self) -> usize {
        self.len
    }

    /// True when no tuples are present.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Insert a tuple. Returns `true` if the trie changed (idempotent:
    /// re-inserting a present tuple is a no-op).
    pub fn insert(&mut self, tuple: &Tuple) -> bool {
        assert_eq!(tuple.arity(), self.arity, "tuple arity mismatch on insert");
        let mut node = &mut self.root;
        let mut created = false;
        for atom in tuple.atoms() {
            created |= !node.children.contains_key(atom);
            node = node.children.entry(atom.clone()).or_default();
        }
        if created {
            self.len += 1;
        }
        created
    }

    /// Remove a tuple, pruning every ancestor left without children.
    /// Returns `true` if the tuple was present (absent removes are no-ops).
    pub fn remove(&mut self, tuple: &Tuple) -> bool {
        assert_eq!(tuple.arity(), self.arity, "tuple arity mismatch on remove");
        let removed = Self::remove_rec(&mut self.root, tuple.atoms());
        if removed {
            self.len -= 1;
        }
        removed
    }

    fn remove_rec(node: &mut TrieNode, path: &[Atom]) -> bool {
        let Some((head, rest)) = path.split_first() else {
            return true;
        };
        let Some(child) = node.children.get_mut(head) else {
            return false;
        };
        if !Self::remove_rec(child, rest) {
            return false;
        }
        if child.children.is_empty() {
            node.children.remove(head);
        }
        true
    }

    /// True iff the tuple is present.
    pub fn contains(&self, tuple: &Tuple) -> bool {
        if tuple.arity() != self.arity {
            return false;
        }
        let mut node = &self.root;
        for atom in tuple.atoms() {
            match node.children.get(atom) {
                Some(child) => node = child,
                None => return false,
            }
        }
        true
    }

    /// Ascending child atoms below the node reached by `prefix`, i.e. the
    /// distinct atoms appearing at position `prefix.arity()` of tuples
    /// extending the prefix. Empty if no tuple extends it.
    pub fn sorted_atoms(&self, prefix: &Tuple) -> Vec<Atom> {
        assert!(
            prefix.arity() < self.arity,
            "bound prefix must be shorter than the arity"
        );
        let mut node = &self.root;
        for atom in prefix.atoms() {
            match node.children.get(atom) {
                Some(child) => node = child,
                None => return Vec::new(),
            }
        }
        node.children.keys().cloned().collect()
    }

    /// Ascending set of atoms `v` such that some stored tuple carries `v` at
    /// every column in `targets` and matches every equality in `bindings`
    /// (one optional bound atom per column; target columns must be unbound).
    ///
    /// Multiple target columns express a repeated variable within the atom.
    pub fn constrained_atoms(&self, targets: &[usize], bindings: &[Option<Atom>]) -> Vec<Atom> {
        self.constrained_atoms_rewound(targets, bindings, Rewind::default())
    }

    /// [`constrained_atoms`](Self::constrained_atoms) against the adjusted
    /// view described by `rewind`.
    pub fn constrained_atoms_rewound(
        &self,
        targets: &[usize],
        bindings: &[Option<Atom>],
        rewind: Rewind<'_>,
    ) -> Vec<Atom> {
        debug_assert_eq!(bindings.len(), self.arity, "one binding slot per column");
        debug_assert!(targets.iter().all(|t| bindings[*t].is_none()));

        if rewind.is_noop() {
            // Contiguous-prefix shortcut: a single target right after the
            // bound columns is a plain child listing at the prefix node.
            if let [target] = targets {
                if bindings[..*target].iter().all(Option::is_some)
                    && bindings[*target..].iter().all(Option::is_none)
                {
                    let mut node = &self.root;
                    for atom in bindings[..*target].iter().flatten() {
                        match node.children.get(atom) {
                            Some(child) => node = child,
                            None => return Vec::new(),
                        }
                    }
                    return node.children.keys().cloned().collect();
                }
            }

            let mut out = BTreeSet::new();
            Self::collect_rec(&self.root, 0, targets, bindings, None, &mut out);
            return out.into_iter().collect();
        }

        let mut out = BTreeSet::new();
        match rewind.hide {
            // Hidden tuples no longer support a candidate, so the walk must
            // check each supporting tuple instead of stopping at the first.
            Some(hidden) if !hidden.is_empty() => {
                let mut path = Vec::with_capacity(self.arity);
                Self::collect_hiding(
                    &self.root, targets, bindings, None, hidden, &mut path, &mut out,
                );
            }
            _ => Self::collect_rec(&self.root, 0, targets, bindings, None, &mut out),
        }
        if let Some(restored) = rewind.restore {
            for tuple in restored {
                if let Some(atom) = Self::match_constraints(tuple, targets, bindings) {
                    out.insert(atom);
                }
            }
        }
        out.into_iter().collect()
    }

    /// The atom a free-standing tuple contributes at the target columns, if
    /// it satisfies the constraints.
    fn match_constraints(
        tuple: &Tuple,
        targets: &[usize],
        bindings: &[Option<Atom>],
    ) -> Option<Atom> {
        let mut current: Option<&Atom> = None;
        for (c, atom) in tuple.atoms().iter().enumerate() {
            if let Some(bound) = &bindings[c] {
                if bound != atom {
                    return None;
                }
            } else if targets.contains(&c) {
                match current {
                    Some(picked) if picked != atom => return None,
                    _ => current = Some(atom),
                }
            }
        }
        current.cloned()
    }

    fn collect_rec(
        node: &TrieNode,
        column: usize,
        targets: &[usize],
        bindings: &[Option<Atom>],
        current: Option<&Atom>,
        out: &mut BTreeSet<Atom>,
    ) {
        if column == bindings.len() {
            if let Some(atom) = current {
                out.insert(atom.clone());
            }
            return;
        }
        if let Some(bound) = &bindings[column] {
            if let Some(child) = node.children.get(bound) {
                Self::collect_rec(child, column + 1, targets, bindings, current, out);
            }
        } else if targets.contains(&column) {
            match current {
                // A later occurrence of the target variable: equality with
                // the atom picked at its first occurrence.
                Some(picked) => {
                    if let Some(child) = node.children.get(picked) {
                        Self::collect_rec(child, column + 1, targets, bindings, current, out);
                    }
                }
                None => {
                    for (atom, child) in &node.children {
                        Self::collect_rec(child, column + 1, targets, bindings, Some(atom), out);
                    }
                }
            }
        } else {
            for child in node.children.values() {
                Self::collect_rec(child, column + 1, targets, bindings, current, out);
            }
        }
    }

    /// Like `collect_rec`, but tracks the full path so hidden tuples can be
    /// rejected at the leaf.
    fn collect_hiding(
        node: &TrieNode,
        targets: &[usize],
        bindings: &[Option<Atom>],
        current: Option<&Atom>,
        hidden: &BTreeSet<Tuple>,
        path: &mut Vec<Atom>,
        out: &mut BTreeSet<Atom>,
    ) {
        let column = path.len();
        if column == bindings.len() {
            if let Some(atom) = current {
                if !hidden.contains(&Tuple::new(path.clone())) {
                    out.insert(atom.clone());
                }
            }
            return;
        }
        if let Some(bound) = &bindings[column] {
            if let Some(child) = node.children.get(bound) {
                path.push(bound.clone());
                Self::collect_hiding(child, targets, bindings, current, hidden, path, out);
                path.pop();
            }
        } else if targets.contains(&column) {
            match current {
                Some(picked) => {
                    if let Some(child) = node.children.get(picked) {
                        path.push(picked.clone());
                        Self::collect_hiding(child, targets, bindings, current, hidden, path, out);
                        path.pop();
                    }
                }
                None => {
                    for (atom, child) in &node.children {
                        path.push(atom.clone());
                        Self::collect_hiding(child, targets, bindings, Some(atom), hidden, path, out);
                        path.pop();
                    }
                }
            }
        } else {
            for (atom, child) in &node.children {
                path.push(atom.clone());
                Self::collect_hiding(child, targets, bindings, current, hidden, path, out);
                path.pop();
            }
        }
    }
}
