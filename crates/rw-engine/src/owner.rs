//! The tree owner thread.
//!
//! Every tree mutation happens here: subscribe and unsubscribe requests from
//! the consumer side and reconciles of fired nodes from the shards arrive on
//! one inbox and are handled one at a time, so the tree needs no lock.
//!
//! The inbox is an unbounded tokio channel: shards and the facade send
//! without blocking, and the owner, a plain OS thread, waits with
//! `blocking_recv`. Replies travel back on std channels because the facade
//! is synchronous and is routinely called from inside a tokio runtime,
//! where blocking on a tokio receiver panics.

use std::sync::Arc;
use std::sync::mpsc;

use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

use rw_core::KeyPath;
use serde::Serialize;
use tracing::{debug, trace};

use crate::error::WatchError;
use crate::listener::Listener;
use crate::multiplexer::ShardPool;
use crate::node::NodeId;
use crate::queue::ChangeQueue;
use crate::registrar::{Registrar, WatchAction};
use crate::source::ResourceSource;
use crate::tree::WatchTree;

/// Sending side of the owner inbox.
pub(crate) type Inbox = UnboundedSender<Command>;

/// Requests handled by the tree owner.
#[derive(Debug)]
pub(crate) enum Command {
    Configure {
        path: KeyPath,
        listener: Listener,
        action: WatchAction,
        reply: mpsc::Sender<Result<(), WatchError>>,
    },
    Fired(NodeId),
    Dump {
        reply: mpsc::Sender<String>,
    },
    Stats {
        reply: mpsc::Sender<EngineStats>,
    },
    Shutdown,
}

/// A point-in-time view of the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EngineStats {
    /// Nodes in the watch tree.
    pub nodes: usize,
    /// Nodes whose key currently exists and holds an open handle.
    pub present: usize,
    /// Maximum number of nodes the engine accepts.
    pub capacity: usize,
    /// Running worker shards.
    pub shards: usize,
    /// Nodes waited on by each shard.
    pub shard_loads: Vec<usize>,
    /// Times the workers were started from idle.
    pub worker_starts: u64,
    /// Times the workers were stopped because nothing was watched.
    pub worker_stops: u64,
    /// Shard threads spawned over the engine's lifetime.
    pub shards_spawned: u64,
    /// Records waiting for the dispatcher.
    pub pending: usize,
    /// Records ever queued.
    pub enqueued: u64,
    /// Records dropped because their node already had one queued.
    pub coalesced: u64,
}

pub(crate) struct Owner<S: ResourceSource> {
    tree: WatchTree<S>,
    registrar: Registrar,
    pool: ShardPool,
    queue: Arc<ChangeQueue>,
}

impl<S: ResourceSource> Owner<S> {
    pub(crate) fn new(
        tree: WatchTree<S>,
        registrar: Registrar,
        pool: ShardPool,
        queue: Arc<ChangeQueue>,
    ) -> Self {
        Self {
            tree,
            registrar,
            pool,
            queue,
        }
    }

    /// Handles commands until shutdown, then stops the shards and releases
    /// every handle.
    pub(crate) fn run(mut self, mut inbox: UnboundedReceiver<Command>) {
        debug!("Tree owner started");
        while let Some(command) = inbox.blocking_recv() {
            match command {
                Command::Configure {
                    path,
                    listener,
                    action,
                    reply,
                } => {
                    let result = self.configure(&path, &listener, action);
                    let _ = reply.send(result);
                }
                Command::Fired(id) => self.fired(id),
                Command::Dump { reply } => {
                    let _ = reply.send(self.tree.print());
                }
                Command::Stats { reply } => {
                    let _ = reply.send(self.stats());
                }
                Command::Shutdown => break,
            }
        }

        self.pool.stop_all();
        debug!(nodes = self.tree.len(), "Tree owner stopped");
    }

    fn configure(
        &mut self,
        path: &KeyPath,
        listener: &Listener,
        action: WatchAction,
    ) -> Result<(), WatchError> {
        let directive = self
            .registrar
            .configure(&mut self.tree, path, listener, action)?;
        self.pool.apply(directive, self.registrar.active())
    }

    fn fired(&mut self, id: NodeId) {
        if !self.tree.contains(id) {
            trace!(node = %id, "Ignoring signal from pruned node");
            return;
        }
        let mut changes = Vec::new();
        if self.tree.reconcile(id, &mut changes) {
            let produced = changes.len();
            let queued = self.queue.extend(changes);
            trace!(
                key = self.tree.key(id).unwrap_or_default(),
                produced,
                queued,
                "Reconciled"
            );
        }
    }

    fn stats(&self) -> EngineStats {
        let counters = self.pool.counters();
        EngineStats {
            nodes: self.tree.len(),
            present: self.tree.present_count(),
            capacity: self.registrar.limit(),
            shards: counters.shards,
            shard_loads: self.pool.loads(),
            worker_starts: counters.starts,
            worker_stops: counters.stops,
            shards_spawned: counters.shards_spawned,
            pending: self.queue.len(),
            enqueued: self.queue.enqueued(),
            coalesced: self.queue.coalesced(),
        }
    }
}
