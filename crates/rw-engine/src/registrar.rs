//! Subscribe and unsubscribe.
//!
//! The registrar turns a `(key, listener, action)` request into tree walks,
//! keeps the active index in step with the nodes it creates and prunes, and
//! tells the shard pool what to do from the index size before and after.

use rw_core::KeyPath;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::active::ActiveIndex;
use crate::error::WatchError;
use crate::listener::Listener;
use crate::source::ResourceSource;
use crate::tree::WatchTree;

/// Whether a request adds or removes a listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WatchAction {
    /// Attach the listener, creating nodes as needed.
    Subscribe,
    /// Detach the listener and prune nodes nothing needs any more.
    Unsubscribe,
}

/// What the shard pool must do after a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WorkerDirective {
    /// The first nodes were added: start waiting.
    Start,
    /// The last nodes were removed: stop all shards.
    Stop,
    /// The set of nodes changed: rebuild wait sets.
    Refresh,
    /// Nothing changed.
    Idle,
}

impl WorkerDirective {
    /// Decides from the active index size before and after a request.
    pub(crate) const fn from_counts(before: usize, after: usize) -> Self {
        match (before, after) {
            (0, 0) => Self::Idle,
            (0, _) => Self::Start,
            (_, 0) => Self::Stop,
            _ if before == after => Self::Idle,
            _ => Self::Refresh,
        }
    }
}

#[derive(Debug)]
pub(crate) struct Registrar {
    active: ActiveIndex,
    limit: usize,
}

impl Registrar {
    /// Creates a registrar that accepts at most `limit` nodes.
    pub(crate) fn new(limit: usize) -> Self {
        Self {
            active: ActiveIndex::new(),
            limit,
        }
    }

    pub(crate) fn active(&self) -> &ActiveIndex {
        &self.active
    }

    pub(crate) fn limit(&self) -> usize {
        self.limit
    }

    pub(crate) fn configure<S: ResourceSource>(
        &mut self,
        tree: &mut WatchTree<S>,
        path: &KeyPath,
        listener: &Listener,
        action: WatchAction,
    ) -> Result<WorkerDirective, WatchError> {
        let before = self.active.len();
        match action {
            WatchAction::Subscribe => self.subscribe(tree, path, listener)?,
            WatchAction::Unsubscribe => self.unsubscribe(tree, path, listener),
        }
        let directive = WorkerDirective::from_counts(before, self.active.len());
        trace!(
            key = %path,
            ?action,
            ?directive,
            before,
            after = self.active.len(),
            "Configured watch"
        );
        Ok(directive)
    }

    fn subscribe<S: ResourceSource>(
        &mut self,
        tree: &mut WatchTree<S>,
        path: &KeyPath,
        listener: &Listener,
    ) -> Result<(), WatchError> {
        tree.source().validate(path)?;
        let missing = tree.missing_nodes(path);
        let requested = self.active.len() + missing;
        if missing > 0 && requested > self.limit {
            return Err(WatchError::CapacityExceeded {
                requested,
                limit: self.limit,
            });
        }

        let (id, created) = tree.ensure(path);
        for node in created {
            if let Some(signal) = tree.signal(node) {
                self.active.insert(node, signal);
            }
        }
        if let Some(shared) = tree.shared(id) {
            shared.add_listener(listener.clone());
            debug!(
                key = shared.key(),
                listeners = shared.listener_count(),
                "Subscribed"
            );
        }
        Ok(())
    }

    fn unsubscribe<S: ResourceSource>(
        &mut self,
        tree: &mut WatchTree<S>,
        path: &KeyPath,
        listener: &Listener,
    ) {
        let Some(id) = tree.find(path) else {
            trace!(key = %path, "Unsubscribe of unwatched key ignored");
            return;
        };
        if let Some(shared) = tree.shared(id) {
            shared.remove_listener(listener);
            debug!(
                key = shared.key(),
                listeners = shared.listener_count(),
                "Unsubscribed"
            );
        }
        let pruned = tree.prune(id);
        self.active.remove_all(&pruned);
    }
}
