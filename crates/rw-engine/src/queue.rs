//! The pending-change queue between the tree owner and the dispatcher.
//!
//! The tree owner pushes records as reconciles produce them; the dispatcher
//! pops them one at a time on the consumer side. The queue lock is held only
//! for a push or a pop, never across a listener call, so a listener may
//! subscribe or unsubscribe without deadlocking against delivery.

use std::collections::VecDeque;
use std::sync::Weak;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use rw_core::EventKind;
use tokio::sync::Notify;
use tracing::trace;

use crate::node::NodeShared;

/// A change waiting to be delivered.
#[derive(Debug, Clone)]
pub(crate) struct PendingChange {
    pub(crate) node: Weak<NodeShared>,
    pub(crate) kind: EventKind,
}

impl PendingChange {
    pub(crate) fn new(node: Weak<NodeShared>, kind: EventKind) -> Self {
        Self { node, kind }
    }
}

/// FIFO of pending changes with at most one record per node.
#[derive(Debug, Default)]
pub(crate) struct ChangeQueue {
    pending: Mutex<VecDeque<PendingChange>>,
    wake: Notify,
    enqueued: AtomicU64,
    coalesced: AtomicU64,
}

impl ChangeQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Queues a change and wakes the consumer.
    ///
    /// If the node already has a record waiting, the new one is dropped,
    /// the node is marked stale and `false` is returned. The dispatcher
    /// signals a stale node again once its waiting record is delivered.
    pub(crate) fn push(&self, change: PendingChange) -> bool {
        let node = change.node.upgrade();
        {
            let mut pending = self.pending.lock();
            if pending
                .iter()
                .any(|queued| Weak::ptr_eq(&queued.node, &change.node))
            {
                if let Some(node) = &node {
                    node.mark_stale();
                }
                self.coalesced.fetch_add(1, Ordering::Relaxed);
                trace!(kind = %change.kind, "Coalesced pending change");
                return false;
            }
            if let Some(node) = &node {
                node.note_queued(change.kind);
            }
            pending.push_back(change);
        }
        self.enqueued.fetch_add(1, Ordering::Relaxed);
        self.wake.notify_one();
        true
    }

    /// Queues every change in order. Returns how many were accepted.
    pub(crate) fn extend(&self, changes: impl IntoIterator<Item = PendingChange>) -> usize {
        changes
            .into_iter()
            .map(|change| self.push(change))
            .filter(|accepted| *accepted)
            .count()
    }

    pub(crate) fn pop(&self) -> Option<PendingChange> {
        self.pending.lock().pop_front()
    }

    pub(crate) fn len(&self) -> usize {
        self.pending.lock().len()
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }

    /// Completes once a change has been queued since the last wake.
    pub(crate) async fn changed(&self) {
        self.wake.notified().await;
    }

    pub(crate) fn enqueued(&self) -> u64 {
        self.enqueued.load(Ordering::Relaxed)
    }

    pub(crate) fn coalesced(&self) -> u64 {
        self.coalesced.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    fn shared(key: &str) -> Arc<NodeShared> {
        Arc::new(NodeShared::new(key.to_owned()))
    }

    #[test]
    fn test_second_change_for_same_node_is_dropped() {
        let queue = ChangeQueue::new();
        let node = shared("HKEY_USERS\\a");

        assert!(queue.push(PendingChange::new(Arc::downgrade(&node), EventKind::Change)));
        assert!(!queue.push(PendingChange::new(Arc::downgrade(&node), EventKind::Delete)));
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.coalesced(), 1);
        assert_eq!(queue.enqueued(), 1);

        let popped = queue.pop().unwrap();
        assert_eq!(popped.kind, EventKind::Change);
        assert!(queue.is_empty());

        // Once drained, the node may queue again.
        assert!(queue.push(PendingChange::new(Arc::downgrade(&node), EventKind::Delete)));
    }

    #[test]
    fn test_dropped_change_marks_node_stale() {
        let queue = ChangeQueue::new();
        let node = shared("HKEY_USERS\\a");

        queue.push(PendingChange::new(Arc::downgrade(&node), EventKind::Delete));
        assert_eq!(node.reported_present(), Some(false));
        assert!(!node.take_stale());

        // The dropped add neither changes what was reported nor goes unnoticed.
        queue.push(PendingChange::new(Arc::downgrade(&node), EventKind::Add));
        assert_eq!(node.reported_present(), Some(false));
        assert!(node.take_stale());
    }

    #[test]
    fn test_fifo_across_nodes() {
        let queue = ChangeQueue::new();
        let a = shared("HKEY_USERS\\a");
        let b = shared("HKEY_USERS\\b");

        let accepted = queue.extend([
            PendingChange::new(Arc::downgrade(&b), EventKind::Add),
            PendingChange::new(Arc::downgrade(&a), EventKind::Change),
            PendingChange::new(Arc::downgrade(&b), EventKind::Change),
        ]);
        assert_eq!(accepted, 2);

        let order: Vec<_> = std::iter::from_fn(|| queue.pop())
            .map(|change| change.node.upgrade().unwrap().key().to_owned())
            .collect();
        assert_eq!(order, ["HKEY_USERS\\b", "HKEY_USERS\\a"]);
    }

    #[tokio::test]
    async fn test_push_wakes_consumer() {
        let queue = Arc::new(ChangeQueue::new());
        let node = shared("HKEY_USERS\\a");

        let producer = Arc::clone(&queue);
        let weak = Arc::downgrade(&node);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            producer.push(PendingChange::new(weak, EventKind::Change));
        });

        tokio::time::timeout(Duration::from_secs(1), queue.changed())
            .await
            .expect("push should wake the consumer");
        assert_eq!(queue.len(), 1);
    }
}
