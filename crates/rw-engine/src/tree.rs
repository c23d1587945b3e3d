//! The watch tree.
//!
//! Nodes live in an arena and refer to each other by [`NodeId`]. The sentinel
//! root is implicit: the tree keeps one top-level node per root name in use,
//! and those are created and pruned like any other node, so a tree with no
//! listeners anywhere is empty.
//!
//! # Node states
//!
//! ```text
//!            open + arm ok
//!   absent ───────────────► present ──┐ fired, arm ok: change
//!     ▲                       │  ▲    │
//!     │  arm gone / not live  │  └────┘
//!     └───────────────────────┘
//!          delete (+ poke)
//! ```
//!
//! A node is present exactly when it holds an open handle. Creation opens and
//! arms without reporting anything. After that every transition is reported
//! to the node's listeners: `add` when an absent node is found to exist,
//! `change` when a present node fires, `delete` when a present node is found
//! gone. A node that goes from present to gone sets its own signal, so a
//! recreation is only observed on a later reconcile and a node never reports
//! `delete` and `add` in the same pass.
//!
//! Deleting a key deletes everything below it. Unloading a node therefore
//! unloads its subtree first and reports `delete` for every present
//! descendant with listeners, deepest first, before the node itself.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::Arc;

use rw_core::{EventKind, KeyPath};
use smallvec::SmallVec;
use tracing::{debug, trace, warn};

use crate::node::{NodeId, NodeShared, WatchNode};
use crate::queue::PendingChange;
use crate::signal::Signal;
use crate::source::{ArmStatus, ResourceSource};

type ChildIds = SmallVec<[NodeId; 8]>;

struct Slot<H> {
    generation: u32,
    node: Option<WatchNode<H>>,
}

/// Arena-backed tree of watch nodes over one resource source.
pub(crate) struct WatchTree<S: ResourceSource> {
    source: S,
    slots: Vec<Slot<S::Handle>>,
    free: Vec<u32>,
    top: BTreeMap<String, NodeId>,
    len: usize,
}

impl<S: ResourceSource> WatchTree<S> {
    pub(crate) fn new(source: S) -> Self {
        Self {
            source,
            slots: Vec::new(),
            free: Vec::new(),
            top: BTreeMap::new(),
            len: 0,
        }
    }

    pub(crate) fn source(&self) -> &S {
        &self.source
    }

    /// Number of nodes in the tree.
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub(crate) fn node(&self, id: NodeId) -> Option<&WatchNode<S::Handle>> {
        let slot = self.slots.get(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.node.as_ref()
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut WatchNode<S::Handle>> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.node.as_mut()
    }

    pub(crate) fn contains(&self, id: NodeId) -> bool {
        self.node(id).is_some()
    }

    pub(crate) fn shared(&self, id: NodeId) -> Option<&Arc<NodeShared>> {
        self.node(id).map(|node| &node.shared)
    }

    pub(crate) fn signal(&self, id: NodeId) -> Option<Signal> {
        self.node(id).map(|node| node.signal().clone())
    }

    /// The full key of a node.
    pub(crate) fn key(&self, id: NodeId) -> Option<&str> {
        self.node(id).map(|node| node.shared.key())
    }

    /// Number of open handles held by the tree.
    pub(crate) fn present_count(&self) -> usize {
        self.slots
            .iter()
            .filter_map(|slot| slot.node.as_ref())
            .filter(|node| node.is_present())
            .count()
    }

    pub(crate) fn find(&self, path: &KeyPath) -> Option<NodeId> {
        let mut id = *self.top.get(path.root())?;
        for segment in path.segments() {
            id = *self.node(id)?.children.get(segment)?;
        }
        Some(id)
    }

    /// Number of nodes a walk to `path` would have to create.
    pub(crate) fn missing_nodes(&self, path: &KeyPath) -> usize {
        let Some(&top) = self.top.get(path.root()) else {
            return path.depth() + 1;
        };
        let mut id = top;
        for (depth, segment) in path.segments().iter().enumerate() {
            match self.node(id).and_then(|node| node.children.get(segment)) {
                Some(&child) => id = child,
                None => return path.depth() - depth,
            }
        }
        0
    }

    /// Walks to `path`, creating missing nodes on the way.
    ///
    /// Returns the terminal node and the ids created, outermost first.
    pub(crate) fn ensure(&mut self, path: &KeyPath) -> (NodeId, Vec<NodeId>) {
        let mut created = Vec::new();
        let mut id = if let Some(&top) = self.top.get(path.root()) {
            top
        } else {
            let top = self.create(None, KeyPath::from_root(path.root()));
            created.push(top);
            top
        };

        for segment in path.segments() {
            let existing = self
                .node(id)
                .and_then(|node| node.children.get(segment).copied());
            id = if let Some(child) = existing {
                child
            } else {
                let child_path = self
                    .node(id)
                    .map_or_else(|| path.child(segment), |node| node.path.child(segment));
                let child = self.create(Some(id), child_path);
                created.push(child);
                child
            };
        }
        (id, created)
    }

    /// Creates a node, opening and arming it if its key exists.
    ///
    /// Creation never reports anything.
    fn create(&mut self, parent: Option<NodeId>, path: KeyPath) -> NodeId {
        let name = path.name().to_owned();
        let mut node = WatchNode::new(parent, path);
        let may_exist = parent.is_none_or(|p| self.node(p).is_some_and(WatchNode::is_present));
        if may_exist {
            node.handle = self.open_armed(&node.path, node.signal());
        }
        debug!(
            key = node.shared.key(),
            present = node.is_present(),
            "Created watch node"
        );

        let id = self.insert(node);
        match parent.and_then(|p| self.node_mut(p)) {
            Some(parent) => {
                parent.children.insert(name, id);
            }
            None => {
                self.top.insert(name, id);
            }
        }
        id
    }

    fn insert(&mut self, node: WatchNode<S::Handle>) -> NodeId {
        self.len += 1;
        if let Some(index) = self.free.pop() {
            if let Some(slot) = self.slots.get_mut(index as usize) {
                slot.node = Some(node);
                return NodeId {
                    index,
                    generation: slot.generation,
                };
            }
        }
        // Node count is bounded by the engine's capacity limit.
        #[allow(clippy::cast_possible_truncation)]
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            node: Some(node),
        });
        NodeId {
            index,
            generation: 0,
        }
    }

    fn remove(&mut self, id: NodeId) -> Option<WatchNode<S::Handle>> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        let node = slot.node.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.len -= 1;
        Some(node)
    }

    /// Removes `id` and then each ancestor that is left with no listeners
    /// and no children. Returns the removed ids, deepest first.
    pub(crate) fn prune(&mut self, id: NodeId) -> Vec<NodeId> {
        let mut removed = Vec::new();
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            let Some(node) = self.node(current) else {
                break;
            };
            if !node.is_prunable() {
                break;
            }
            let parent = node.parent;
            let name = node.name().to_owned();
            match parent.and_then(|p| self.node_mut(p)) {
                Some(parent) => {
                    parent.children.remove(&name);
                }
                None => {
                    self.top.remove(&name);
                }
            }
            if let Some(node) = self.remove(current) {
                debug!(key = node.shared.key(), "Pruned watch node");
            }
            removed.push(current);
            cursor = parent;
        }
        removed
    }

    /// Re-checks a node after its signal fired.
    ///
    /// Returns `true` if the node or anything below it changed state.
    pub(crate) fn reconcile(&mut self, id: NodeId, out: &mut Vec<PendingChange>) -> bool {
        let Some(node) = self.node(id) else {
            return false;
        };
        let Some(handle) = node.handle.as_ref() else {
            if self.resolve(id, out) {
                return true;
            }
            return self.settle_absent(id, out);
        };

        match self.source.arm_notification(handle, node.signal()) {
            ArmStatus::Armed => {
                trace!(key = node.shared.key(), "Re-armed");
                self.emit(id, EventKind::Change, out);
                for child in self.child_ids(id) {
                    self.load(child, out);
                }
                true
            }
            ArmStatus::Gone => {
                self.unload(id, out);
                self.poke(id);
                true
            }
            ArmStatus::Failed(reason) => {
                warn!(
                    key = node.shared.key(),
                    reason = %reason,
                    "Failed to re-arm change notification"
                );
                false
            }
        }
    }

    /// Brings a child in line with its key: a dead present child is
    /// unloaded, an absent child whose key now exists is opened.
    fn load(&mut self, id: NodeId, out: &mut Vec<PendingChange>) -> bool {
        let Some(node) = self.node(id) else {
            return false;
        };
        let live = node
            .handle
            .as_ref()
            .map(|handle| self.source.is_live(handle));
        match live {
            Some(true) => false,
            Some(false) => {
                self.unload(id, out);
                self.poke(id);
                true
            }
            None => self.resolve(id, out),
        }
    }

    /// Tries to open an absent node. Reports `add` and loads its children
    /// on success.
    fn resolve(&mut self, id: NodeId, out: &mut Vec<PendingChange>) -> bool {
        let Some(node) = self.node(id) else {
            return false;
        };
        let parent_present = node
            .parent
            .is_none_or(|p| self.node(p).is_some_and(WatchNode::is_present));
        if !parent_present {
            return false;
        }
        let Some(handle) = self.open_armed(&node.path, node.signal()) else {
            return false;
        };
        debug!(key = node.shared.key(), "Key appeared");

        if let Some(node) = self.node_mut(id) {
            node.handle = Some(handle);
        }
        self.emit(id, EventKind::Add, out);
        for child in self.child_ids(id) {
            self.load(child, out);
        }
        true
    }

    /// Closes the handles of a node and its subtree, reporting `delete` for
    /// every node that was present.
    pub(crate) fn unload(&mut self, id: NodeId, out: &mut Vec<PendingChange>) {
        for child in self.child_ids(id) {
            self.unload(child, out);
        }
        let closed = self.node_mut(id).and_then(|node| node.handle.take());
        if closed.is_some() {
            if let Some(key) = self.key(id) {
                debug!(key, "Key gone");
            }
            self.emit(id, EventKind::Delete, out);
        }
    }

    /// Reports `delete` for an absent node whose listeners were last told
    /// it exists. This happens when that `delete` was dropped because the
    /// node still had a record waiting.
    fn settle_absent(&self, id: NodeId, out: &mut Vec<PendingChange>) -> bool {
        let Some(node) = self.node(id) else {
            return false;
        };
        if node.is_present() || node.shared.reported_present() != Some(true) {
            return false;
        }
        debug!(key = node.shared.key(), "Reporting missed delete");
        self.emit(id, EventKind::Delete, out);
        true
    }

    fn open_armed(&self, path: &KeyPath, signal: &Signal) -> Option<S::Handle> {
        if !self.source.exists(path) {
            return None;
        }
        let handle = self.source.open_for_notify(path)?;
        match self.source.arm_notification(&handle, signal) {
            ArmStatus::Armed => Some(handle),
            ArmStatus::Gone => None,
            ArmStatus::Failed(reason) => {
                warn!(key = %path, reason = %reason, "Failed to arm change notification");
                None
            }
        }
    }

    /// Queues a record for a node with listeners.
    ///
    /// A `change` for a node whose listeners were last told it was deleted
    /// is reported as `add`.
    fn emit(&self, id: NodeId, kind: EventKind, out: &mut Vec<PendingChange>) {
        let Some(node) = self.node(id) else {
            return;
        };
        if !node.shared.has_listeners() {
            node.shared.forget_reported();
            return;
        }
        let kind = match (kind, node.shared.reported_present()) {
            (EventKind::Change, Some(false)) => EventKind::Add,
            (kind, _) => kind,
        };
        out.push(PendingChange::new(Arc::downgrade(&node.shared), kind));
    }

    fn poke(&self, id: NodeId) {
        if let Some(node) = self.node(id) {
            node.signal().set();
        }
    }

    fn child_ids(&self, id: NodeId) -> ChildIds {
        self.node(id)
            .map(|node| node.children.values().copied().collect())
            .unwrap_or_default()
    }

    /// Renders the tree for diagnostics.
    ///
    /// One line per node, indented two spaces per level, marked `+` when
    /// present and `-` when absent.
    pub(crate) fn print(&self) -> String {
        let mut out = String::new();
        for &id in self.top.values() {
            self.print_node(id, 0, &mut out);
        }
        out
    }

    fn print_node(&self, id: NodeId, depth: usize, out: &mut String) {
        let Some(node) = self.node(id) else {
            return;
        };
        let count = node.shared.listener_count();
        let marker = if node.is_present() { '+' } else { '-' };
        let plural = if count == 1 { "" } else { "s" };
        let _ = writeln!(
            out,
            "{:indent$}{marker} {} ({count} listener{plural})",
            "",
            node.name(),
            indent = depth * 2
        );
        for &child in node.children.values() {
            self.print_node(child, depth + 1, out);
        }
    }
}
