//! Dataflow graph: nodes and delta propagation.
//!
//! ```text
//! base updates ──► RelationTrie (mutate first)
//!                      │
//!                      ▼
//!                  ScanNode ──push──► JoinNode ──► OutputNode
//!                                        │
//!                                        └──► further JoinNodes ...
//! ```
//!
//! Delta passing is a direct synchronous call chain: a node's
//! `on_delta_received` runs its transform and forwards the result to each
//! output in wiring order before returning. There is no queue and no
//! back-pressure; a delta is fully processed leaf-to-sink before control
//! returns to the injector.
//!
//! Ownership runs downstream: producers hold strong references
//! (`Rc<RefCell<dyn Node>>`) to their consumers, and a consumer knows its
//! producers only by [`NodeId`]: dispatch source resolution is a lookup,
//! never an owning back-edge, so valid (acyclic) graphs cannot leak.

mod join;
mod materialize;
mod output;
mod scan;

pub use join::{JoinNode, JoinStats};
pub use materialize::MaterializeNode;
pub use output::OutputNode;
pub use scan::ScanNode;

use crate::delta::Delta;
use crate::error::EngineResult;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counter backing fresh node identifiers.
static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(0);

/// Stable identifier of a dataflow node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(u64);

impl NodeId {
    /// Allocate a fresh identifier.
    pub fn fresh() -> Self {
        NodeId(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// Shared handle to a dataflow node.
pub type NodeRef = Rc<RefCell<dyn Node>>;

/// A dataflow vertex.
pub trait Node {
    /// Stable identifier of this node.
    fn id(&self) -> NodeId;

    /// The single inbound message: a delta arriving from an upstream node.
    fn on_delta_received(&mut self, source: NodeId, delta: &Delta) -> EngineResult<()>;

    /// Wire a downstream consumer. Forwarding order is wiring order.
    fn add_output(&mut self, output: NodeRef);
}

/// Deliver a delta to each output in order, with `source` as the sender.
fn forward(outputs: &[NodeRef], source: NodeId, delta: &Delta) -> EngineResult<()> {
    for output in outputs {
        output.borrow_mut().on_delta_received(source, delta)?;
    }
    Ok(())
}
