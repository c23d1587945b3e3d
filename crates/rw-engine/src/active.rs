//! The active index: every node eligible for waiting, in creation order.
//!
//! Positions in the index decide which shard waits on a node and, within a
//! shard, which of several fired signals is handled first.

use rw_core::FxHashSet;

use crate::node::NodeId;
use crate::signal::Signal;

/// A node and the signal a shard waits on for it.
#[derive(Debug, Clone)]
pub(crate) struct ActiveEntry {
    pub(crate) node: NodeId,
    pub(crate) signal: Signal,
}

#[derive(Debug, Default)]
pub(crate) struct ActiveIndex {
    entries: Vec<ActiveEntry>,
}

impl ActiveIndex {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, node: NodeId, signal: Signal) {
        self.entries.push(ActiveEntry { node, signal });
    }

    /// Removes the given nodes, keeping the order of the rest.
    ///
    /// Returns the number of entries removed.
    pub(crate) fn remove_all(&mut self, nodes: &[NodeId]) -> usize {
        if nodes.is_empty() {
            return 0;
        }
        let doomed: FxHashSet<NodeId> = nodes.iter().copied().collect();
        let before = self.entries.len();
        self.entries.retain(|entry| !doomed.contains(&entry.node));
        before - self.entries.len()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn entries(&self) -> &[ActiveEntry] {
        &self.entries
    }
}
