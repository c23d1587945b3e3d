//! Watch nodes and their ids.
//!
//! A [`WatchNode`] is the watch state for one key segment. The parts the
//! dispatcher needs from another thread (the full key, the signal and the
//! listener list) live in [`NodeShared`] behind an `Arc`; everything else is
//! owned by the tree and only touched by the tree owner thread.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use parking_lot::Mutex;
use rw_core::{EventKind, KeyPath};
use smallvec::SmallVec;

use crate::listener::Listener;
use crate::signal::Signal;

/// Inline capacity of a node's listener list.
const INLINE_LISTENERS: usize = 2;

/// Stable address of a node in the tree arena.
///
/// Ids carry the generation of their slot, so an id that outlives its node
/// never resolves to whatever node reuses the slot later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct NodeId {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

const REPORTED_NONE: u8 = 0;
const REPORTED_PRESENT: u8 = 1;
const REPORTED_ABSENT: u8 = 2;

/// Node state shared with the dispatcher.
///
/// Besides the listeners, a node remembers what its listeners will have
/// been told once the queue drains (`reported`) and whether a record for it
/// was dropped while another one was waiting (`stale`). A stale node is
/// signalled again when its queued record is delivered, so the tree gets
/// another look at it and reports whatever state the key is in by then.
#[derive(Debug)]
pub(crate) struct NodeShared {
    key: String,
    signal: Signal,
    listeners: Mutex<SmallVec<[Listener; INLINE_LISTENERS]>>,
    reported: AtomicU8,
    stale: AtomicBool,
}

impl NodeShared {
    pub(crate) fn new(key: String) -> Self {
        Self {
            key,
            signal: Signal::new(),
            listeners: Mutex::new(SmallVec::new()),
            reported: AtomicU8::new(REPORTED_NONE),
            stale: AtomicBool::new(false),
        }
    }

    /// The full key, root included.
    pub(crate) fn key(&self) -> &str {
        &self.key
    }

    /// The signal shards wait on for this node.
    pub(crate) fn signal(&self) -> &Signal {
        &self.signal
    }

    /// Records that a record of `kind` was queued for this node.
    pub(crate) fn note_queued(&self, kind: EventKind) {
        let reported = match kind {
            EventKind::Add | EventKind::Change => REPORTED_PRESENT,
            EventKind::Delete => REPORTED_ABSENT,
        };
        self.reported.store(reported, Ordering::Release);
    }

    /// Whether the listeners were last told the key exists, if told anything.
    pub(crate) fn reported_present(&self) -> Option<bool> {
        match self.reported.load(Ordering::Acquire) {
            REPORTED_PRESENT => Some(true),
            REPORTED_ABSENT => Some(false),
            _ => None,
        }
    }

    /// Forgets what was reported, for a transition nobody listened to.
    pub(crate) fn forget_reported(&self) {
        self.reported.store(REPORTED_NONE, Ordering::Release);
    }

    /// Marks that a record for this node was dropped.
    pub(crate) fn mark_stale(&self) {
        self.stale.store(true, Ordering::Release);
    }

    /// Clears the stale mark, returning whether it was set.
    pub(crate) fn take_stale(&self) -> bool {
        self.stale.swap(false, Ordering::AcqRel)
    }

    pub(crate) fn add_listener(&self, listener: Listener) {
        self.listeners.lock().push(listener);
    }

    /// Removes every registration of `listener`. Returns `true` if any was found.
    pub(crate) fn remove_listener(&self, listener: &Listener) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|registered| !registered.same_as(listener));
        listeners.len() != before
    }

    pub(crate) fn has_listeners(&self) -> bool {
        !self.listeners.lock().is_empty()
    }

    pub(crate) fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    /// Copies the current listener list for one delivery.
    pub(crate) fn snapshot(&self) -> SmallVec<[Listener; INLINE_LISTENERS]> {
        self.listeners.lock().clone()
    }
}

/// Watch state for one key segment.
///
/// `handle` is `Some` exactly when the last check found the key to exist.
/// The signal is created with the node and lives as long as it does.
pub(crate) struct WatchNode<H> {
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: BTreeMap<String, NodeId>,
    pub(crate) shared: Arc<NodeShared>,
    pub(crate) handle: Option<H>,
    pub(crate) path: KeyPath,
}

impl<H> WatchNode<H> {
    pub(crate) fn new(parent: Option<NodeId>, path: KeyPath) -> Self {
        Self {
            parent,
            children: BTreeMap::new(),
            shared: Arc::new(NodeShared::new(path.to_string())),
            handle: None,
            path,
        }
    }

    /// The key segment this node stands for.
    pub(crate) fn name(&self) -> &str {
        self.path.name()
    }

    pub(crate) fn signal(&self) -> &Signal {
        self.shared.signal()
    }

    pub(crate) fn is_present(&self) -> bool {
        self.handle.is_some()
    }

    /// A node that may be pruned: nothing listens to it and nothing hangs below it.
    pub(crate) fn is_prunable(&self) -> bool {
        self.children.is_empty() && !self.shared.has_listeners()
    }
}

impl<H> fmt::Debug for WatchNode<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchNode")
            .field("key", &self.shared.key())
            .field("parent", &self.parent)
            .field("children", &self.children.len())
            .field("present", &self.is_present())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rw_core::RootSet;

    fn node() -> WatchNode<()> {
        let path = KeyPath::parse("HKLM\\Software", &RootSet::registry()).unwrap();
        WatchNode::new(None, path)
    }

    #[test]
    fn test_key_is_full_path() {
        let node = node();
        assert_eq!(node.name(), "Software");
        assert_eq!(node.shared.key(), "HKEY_LOCAL_MACHINE\\Software");
        assert!(!node.is_present());
        assert!(node.is_prunable());
    }

    #[test]
    fn test_remove_listener_removes_all_registrations() {
        let node = node();
        let a = Listener::new(|_| {});
        let b = Listener::new(|_| {});
        node.shared.add_listener(a.clone());
        node.shared.add_listener(b.clone());
        node.shared.add_listener(a.clone());
        assert_eq!(node.shared.listener_count(), 3);

        assert!(node.shared.remove_listener(&a));
        assert_eq!(node.shared.listener_count(), 1);
        assert!(!node.shared.remove_listener(&a));
        assert!(!node.is_prunable());

        assert!(node.shared.remove_listener(&b));
        assert!(node.is_prunable());
    }

    #[test]
    fn test_snapshot_is_unaffected_by_later_removal() {
        let node = node();
        let a = Listener::new(|_| {});
        node.shared.add_listener(a.clone());

        let snapshot = node.shared.snapshot();
        node.shared.remove_listener(&a);
        assert_eq!(snapshot.len(), 1);
        assert!(!node.shared.has_listeners());
    }

    #[test]
    fn test_reported_presence_follows_queued_kind() {
        let node = node();
        assert_eq!(node.shared.reported_present(), None);

        node.shared.note_queued(EventKind::Add);
        assert_eq!(node.shared.reported_present(), Some(true));
        node.shared.note_queued(EventKind::Delete);
        assert_eq!(node.shared.reported_present(), Some(false));
        node.shared.note_queued(EventKind::Change);
        assert_eq!(node.shared.reported_present(), Some(true));

        node.shared.forget_reported();
        assert_eq!(node.shared.reported_present(), None);
    }

    #[test]
    fn test_stale_mark_is_taken_once() {
        let node = node();
        assert!(!node.shared.take_stale());
        node.shared.mark_stale();
        node.shared.mark_stale();
        assert!(node.shared.take_stale());
        assert!(!node.shared.take_stale());
    }

    #[test]
    fn test_node_id_display() {
        let id = NodeId {
            index: 4,
            generation: 2,
        };
        assert_eq!(id.to_string(), "4v2");
    }
}
