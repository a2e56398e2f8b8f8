//! # DeltaLeap
//!
//! An incremental multi-way join engine: leapfrog triejoin driven by delta
//! streams (LFTJ+). Given base relations receiving insertions and removals,
//! the engine maintains the exact answer of a fixed conjunctive query and
//! emits, per input delta, only the change it induces: the building block
//! for incremental view maintenance and streaming Datalog-style evaluation.
//!
//! ## Pipeline Architecture
//!
//! ```text
//! base update (insert / remove tuples)
//!     ↓
//! [RelationTrie]        → ordered prefix tree, storage of record
//!     ↓
//! [ScanNode]            → surfaces the relation's delta into the graph
//!     ↓
//! [JoinNode]            → LFTJ+: per-source delta probes, leapfrog
//!     │                    intersection, witness multiplicity table
//!     ↓
//! [OutputNode]          → multiset-stable output delta
//! ```
//!
//! The join walks a fixed variable order. For each tuple of a source delta
//! it binds the source atom's columns, then intersects the remaining atoms'
//! level iterators; the witness table collapses duplicate derivations so
//! the emitted delta carries exactly the 0→1 and 1→0 transitions of the
//! query's answer.
//!
//! ## Usage
//!
//! ```rust
//! use deltaleap::{Atom, AtomSpec, QueryEngine, QueryPlan, Tuple};
//!
//! // users(user_id, name) ⋈ orders(order_id, user_id, amount)
//! let plan = QueryPlan::new(
//!     ["user_id", "name", "order_id", "amount"],
//!     vec![
//!         AtomSpec::new("users", ["user_id", "name"]),
//!         AtomSpec::new("orders", ["order_id", "user_id", "amount"]),
//!     ],
//! )?;
//! let engine = QueryEngine::new(plan)?;
//!
//! engine.insert("users", vec![Tuple::new(vec![Atom::id("u1"), Atom::str("Alice")])])?;
//! engine.insert("orders", vec![Tuple::new(vec![
//!     Atom::id("o1"), Atom::id("u1"), Atom::Int(100),
//! ])])?;
//!
//! let net = engine.take_net_output();
//! assert_eq!(net.adds().len(), 1); // (u1, "Alice", o1, 100)
//! # Ok::<(), deltaleap::EngineError>(())
//! ```
//!
//! ## Module Organization
//!
//! | Module | Purpose |
//! |--------|---------|
//! | `value` | Atoms and tuples: total order, canonical byte encoding |
//! | `delta` | `(adds, removes)` change sets with cancelling accumulation |
//! | `trie` | Ordered prefix trees indexing base relations |
//! | `iter` | Level iterators and the trie registry behind the join |
//! | `plan` | Variable orders, atom specs, plan validation |
//! | `dataflow` | Node contract, scans, the LFTJ+ join, output sinks |
//! | `relation` | Trie + scan coupling enforcing mutate-then-push |
//! | `engine` | Single-plan facade wiring the whole pipeline |
//!
//! The scheduling model is single-threaded and synchronous: a delta is
//! fully processed through the downstream graph before the injecting call
//! returns, and deltas must be injected serially.

pub mod dataflow;
pub mod delta;
pub mod engine;
pub mod error;
pub mod iter;
pub mod plan;
pub mod relation;
pub mod trie;
pub mod value;

mod witness;

pub use dataflow::{
    JoinNode, JoinStats, MaterializeNode, Node, NodeId, NodeRef, OutputNode, ScanNode,
};
pub use delta::Delta;
pub use engine::QueryEngine;
pub use error::{EngineError, EngineResult};
pub use iter::{IteratorFactory, LevelIterator, TrieHandle};
pub use plan::{AtomSpec, QueryPlan};
pub use relation::InputRelation;
pub use trie::{RelationTrie, Rewind};
pub use value::{Atom, Tuple};
