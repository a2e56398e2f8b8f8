//! Output nodes: terminal sinks.

use super::{Node, NodeId, NodeRef};
use crate::delta::Delta;
use crate::error::EngineResult;

/// Collects the deltas delivered to it, in arrival order, for inspection by
/// the outside world.
#[derive(Debug)]
pub struct OutputNode {
    id: NodeId,
    received: Vec<(NodeId, Delta)>,
}

impl OutputNode {
    /// Create an empty sink.
    pub fn new() -> Self {
        OutputNode {
            id: NodeId::fresh(),
            received: Vec::new(),
        }
    }

    /// Every `(source, delta)` event received so far, oldest first.
    pub fn received(&self) -> &[(NodeId, Delta)] {
        &self.received
    }

    /// The most recent event, if any.
    pub fn last(&self) -> Option<&(NodeId, Delta)> {
        self.received.last()
    }

    /// Drain the recorded events.
    pub fn take_received(&mut self) -> Vec<(NodeId, Delta)> {
        std::mem::take(&mut self.received)
    }
}

impl Node for OutputNode {
    fn id(&self) -> NodeId {
        self.id
    }

    fn on_delta_received(&mut self, source: NodeId, delta: &Delta) -> EngineResult<()> {
        self.received.push((source, delta.clone()));
        Ok(())
    }

    /// Output nodes are terminal; wiring a consumer below one is a no-op.
    fn add_output(&mut self, _output: NodeRef) {}
}
