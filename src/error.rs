//! Engine Error Types

use crate::dataflow::NodeId;
use crate::value::Tuple;
use thiserror::Error;

/// Errors surfaced by the join engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Variable order / atom spec validation failed
    #[error("invalid plan: {reason}")]
    InvalidPlan { reason: String },

    /// Level iterator constructed with a bound prefix of the wrong length
    #[error("invalid bound prefix for level {level}: expected length {level}, got {got}")]
    InvalidPrefix { level: usize, got: usize },

    /// `key()` called on an exhausted level iterator
    #[error("level iterator is at end")]
    IteratorAtEnd,

    /// Relation was never registered with the iterator factory
    #[error("relation '{0}' is not registered")]
    UnknownRelation(String),

    /// Delta arrived from an input node that was never mapped to an atom
    #[error("node {node} received a delta from unmapped input {input}")]
    UnmappedInput { node: NodeId, input: NodeId },

    /// A remove probe would drive a witness count below zero.
    ///
    /// Signals an upstream invariant violation (a remove of a tuple that was
    /// never derived). Fatal for the join: the node halts and its witness
    /// table is left in an undefined state until `reset`.
    #[error("witness underflow at node {node} (source atom {atom_index}) for output {tuple}")]
    WitnessUnderflow {
        node: NodeId,
        atom_index: usize,
        tuple: Tuple,
    },

    /// Delivery to a join that was halted by an earlier fatal error
    #[error("join node {node} is halted after a fatal error")]
    JoinHalted { node: NodeId },

    /// A scan's delta disagrees with its relation trie (debug builds only).
    ///
    /// Base updates must mutate the trie first and push the scan second;
    /// an add that is absent from the trie (or a remove that is still
    /// present) means that ordering was violated.
    #[error("scan delta for '{relation}' disagrees with its trie at {tuple}")]
    UpstreamOrderingViolation { relation: String, tuple: Tuple },
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
