//! Delivery of pending changes to listeners.
//!
//! The dispatcher runs on whatever thread the host drives it from. It pops
//! one record at a time, so a listener may subscribe, unsubscribe or stop a
//! watch while it is being called.
//!
//! Listener panics are not caught. A panic unwinds out of the drain pass
//! into the host; records not yet popped stay queued for the next pass.
//!
//! A node that had a record dropped while this one was waiting is signalled
//! again when the pass ends, panicking or not, so the tree re-checks it and
//! the key's final state is reported.

use std::sync::Arc;

use rw_core::ChangeEvent;
use serde::Serialize;
use smallvec::SmallVec;
use tracing::trace;

use crate::node::NodeShared;
use crate::queue::ChangeQueue;

/// Counts from one drain pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    /// Records popped for nodes that still existed.
    pub records: usize,
    /// Listener calls made.
    pub deliveries: usize,
    /// Records skipped because their node was pruned before delivery.
    pub expired: usize,
}

impl DispatchReport {
    /// Returns `true` if the pass popped nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.records == 0 && self.expired == 0
    }
}

/// Nodes to signal again once a drain pass is over.
#[derive(Default)]
struct Recheck(SmallVec<[Arc<NodeShared>; 4]>);

impl Drop for Recheck {
    fn drop(&mut self) {
        for node in self.0.drain(..) {
            trace!(key = node.key(), "Re-checking node with dropped changes");
            node.signal().set();
        }
    }
}

/// Delivers queued changes until the queue is empty.
pub(crate) fn drain(queue: &ChangeQueue) -> DispatchReport {
    let mut report = DispatchReport::default();
    let mut recheck = Recheck::default();
    while let Some(change) = queue.pop() {
        let Some(node) = change.node.upgrade() else {
            report.expired += 1;
            continue;
        };
        if node.take_stale() {
            recheck.0.push(Arc::clone(&node));
        }
        let event = ChangeEvent::new(change.kind, node.key());
        let listeners = node.snapshot();
        trace!(
            key = node.key(),
            kind = %change.kind,
            listeners = listeners.len(),
            "Delivering change"
        );
        for listener in &listeners {
            listener.call(&event);
        }
        report.records += 1;
        report.deliveries += listeners.len();
    }
    report
}
