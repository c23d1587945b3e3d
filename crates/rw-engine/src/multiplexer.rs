//! Worker shards that wait on node signals.
//!
//! A wait-many primitive can only block on a bounded number of objects, so
//! the active index is split into consecutive slices of at most
//! [`EngineConfig::shard_capacity`] nodes, one slice per shard. Each shard is
//! a named OS thread driving a current-thread tokio runtime:
//!
//! ```text
//!                 ┌──────────────── shard 0 ────────────────┐
//!                 │ wait_any([terminate, refresh, n0 .. nK]) │──┐
//!  ShardPool ───► └──────────────────────────────────────────┘  │ Fired(node)
//!  (tree owner)   ┌──────────────── shard 1 ────────────────┐  ├──────────► owner inbox
//!                 │ wait_any([terminate, refresh, nK+1 ..])  │──┘
//!                 └──────────────────────────────────────────┘
//! ```
//!
//! Terminate ends the shard. Refresh makes it re-read its slice. A fired
//! node is forwarded to the tree owner, which reconciles it; shards never
//! touch the tree.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;
use rw_core::EngineConfig;
use tracing::{debug, trace, warn};

use crate::active::{ActiveEntry, ActiveIndex};
use crate::error::WatchError;
use crate::owner::{Command, Inbox};
use crate::registrar::WorkerDirective;
use crate::signal::{Signal, wait_any};

/// Wait-set positions of the control signals.
const TERMINATE: usize = 0;
const REFRESH: usize = 1;

/// Handle to one running shard.
struct Shard {
    name: String,
    terminate: Signal,
    refresh: Signal,
    slice: Arc<Mutex<Vec<ActiveEntry>>>,
    thread: Option<JoinHandle<()>>,
}

impl Shard {
    fn spawn(
        name: String,
        entries: Vec<ActiveEntry>,
        owner: Inbox,
    ) -> Result<Self, WatchError> {
        let terminate = Signal::new();
        let refresh = Signal::new();
        let slice = Arc::new(Mutex::new(entries));

        let runtime = tokio::runtime::Builder::new_current_thread().build()?;
        let worker = ShardWorker {
            name: name.clone(),
            terminate: terminate.clone(),
            refresh: refresh.clone(),
            slice: Arc::clone(&slice),
            owner,
        };
        let thread = thread::Builder::new()
            .name(name.clone())
            .spawn(move || runtime.block_on(worker.run()))
            .map_err(|source| WatchError::Spawn {
                thread: name.clone(),
                source,
            })?;

        debug!(shard = %name, "Shard started");
        Ok(Self {
            name,
            terminate,
            refresh,
            slice,
            thread: Some(thread),
        })
    }

    /// Replaces the slice. The shard is only woken if its nodes changed.
    fn assign(&self, entries: &[ActiveEntry]) {
        let mut slice = self.slice.lock();
        let unchanged = slice.len() == entries.len()
            && slice.iter().zip(entries).all(|(a, b)| a.node == b.node);
        if unchanged {
            return;
        }
        *slice = entries.to_vec();
        drop(slice);
        trace!(shard = %self.name, nodes = entries.len(), "Shard refreshed");
        self.refresh.set();
    }

    fn len(&self) -> usize {
        self.slice.lock().len()
    }

    fn stop(mut self) {
        self.terminate.set();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!(shard = %self.name, "Shard thread panicked");
            }
        }
        debug!(shard = %self.name, "Shard stopped");
    }
}

/// State moved onto a shard thread.
struct ShardWorker {
    name: String,
    terminate: Signal,
    refresh: Signal,
    slice: Arc<Mutex<Vec<ActiveEntry>>>,
    owner: Inbox,
}

impl ShardWorker {
    async fn run(self) {
        loop {
            let snapshot = self.slice.lock().clone();
            let mut signals = Vec::with_capacity(snapshot.len() + 2);
            signals.push(self.terminate.clone());
            signals.push(self.refresh.clone());
            signals.extend(snapshot.iter().map(|entry| entry.signal.clone()));

            trace!(shard = %self.name, nodes = snapshot.len(), "Waiting");
            match wait_any(&signals).await {
                TERMINATE => break,
                REFRESH => {}
                index => {
                    let Some(entry) = snapshot.get(index - 2) else {
                        continue;
                    };
                    trace!(shard = %self.name, node = %entry.node, "Node fired");
                    if self.owner.send(Command::Fired(entry.node)).is_err() {
                        break;
                    }
                }
            }
        }
    }
}

/// Counters describing shard activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct PoolCounters {
    pub(crate) shards: usize,
    pub(crate) starts: u64,
    pub(crate) stops: u64,
    pub(crate) shards_spawned: u64,
}

/// Supervisor of the worker shards, owned by the tree owner.
pub(crate) struct ShardPool {
    thread_name: String,
    capacity: usize,
    owner: Inbox,
    shards: Vec<Shard>,
    starts: u64,
    stops: u64,
    shards_spawned: u64,
}

impl ShardPool {
    pub(crate) fn new(config: &EngineConfig, owner: Inbox) -> Self {
        Self {
            thread_name: config.thread_name.clone(),
            capacity: config.shard_capacity().max(1),
            owner,
            shards: Vec::new(),
            starts: 0,
            stops: 0,
            shards_spawned: 0,
        }
    }

    pub(crate) fn apply(
        &mut self,
        directive: WorkerDirective,
        active: &ActiveIndex,
    ) -> Result<(), WatchError> {
        match directive {
            WorkerDirective::Start => {
                self.starts += 1;
                debug!(nodes = active.len(), "Starting workers");
                self.rebalance(active)
            }
            WorkerDirective::Stop => {
                self.stops += 1;
                debug!("Stopping workers");
                self.stop_all();
                Ok(())
            }
            WorkerDirective::Refresh => self.rebalance(active),
            WorkerDirective::Idle => Ok(()),
        }
    }

    /// Splits the active index into consecutive slices, spawning or
    /// retiring shards so there is exactly one per slice.
    fn rebalance(&mut self, active: &ActiveIndex) -> Result<(), WatchError> {
        let needed = active.len().div_ceil(self.capacity);
        while self.shards.len() > needed {
            if let Some(shard) = self.shards.pop() {
                shard.stop();
            }
        }

        for (index, chunk) in active.entries().chunks(self.capacity).enumerate() {
            if let Some(shard) = self.shards.get(index) {
                shard.assign(chunk);
            } else {
                let name = format!("{}-shard-{index}", self.thread_name);
                let shard = Shard::spawn(name, chunk.to_vec(), self.owner.clone())?;
                self.shards.push(shard);
                self.shards_spawned += 1;
            }
        }
        Ok(())
    }

    /// Terminates and joins every shard.
    pub(crate) fn stop_all(&mut self) {
        for shard in self.shards.drain(..) {
            shard.stop();
        }
    }

    /// Number of nodes each running shard waits on.
    pub(crate) fn loads(&self) -> Vec<usize> {
        self.shards.iter().map(Shard::len).collect()
    }

    pub(crate) fn counters(&self) -> PoolCounters {
        PoolCounters {
            shards: self.shards.len(),
            starts: self.starts,
            stops: self.stops,
            shards_spawned: self.shards_spawned,
        }
    }
}

impl Drop for ShardPool {
    fn drop(&mut self) {
        self.stop_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeId;
    use std::time::Duration;
    use tokio::sync::mpsc::unbounded_channel;

    fn config(max_wait_objects: usize) -> EngineConfig {
        EngineConfig {
            max_wait_objects,
            thread_name: "test".to_owned(),
            ..EngineConfig::default()
        }
    }

    fn index(count: u32) -> ActiveIndex {
        let mut index = ActiveIndex::new();
        for i in 0..count {
            index.insert(
                NodeId {
                    index: i,
                    generation: 0,
                },
                Signal::new(),
            );
        }
        index
    }

    #[test]
    fn test_start_splits_into_bounded_shards() {
        let (owner, _commands) = unbounded_channel();
        let mut pool = ShardPool::new(&config(4), owner);
        let active = index(5);

        pool.apply(WorkerDirective::Start, &active).unwrap();
        assert_eq!(pool.loads(), [2, 2, 1]);

        pool.apply(WorkerDirective::Stop, &ActiveIndex::new()).unwrap();
        let counters = pool.counters();
        assert_eq!(counters.shards, 0);
        assert_eq!((counters.starts, counters.stops), (1, 1));
        assert_eq!(counters.shards_spawned, 3);
    }

    #[test]
    fn test_refresh_grows_and_shrinks_pool() {
        let (owner, _commands) = unbounded_channel();
        let mut pool = ShardPool::new(&config(4), owner);

        pool.apply(WorkerDirective::Start, &index(1)).unwrap();
        assert_eq!(pool.loads(), [1]);
        pool.apply(WorkerDirective::Refresh, &index(4)).unwrap();
        assert_eq!(pool.loads(), [2, 2]);
        pool.apply(WorkerDirective::Refresh, &index(2)).unwrap();
        assert_eq!(pool.loads(), [2]);
        assert_eq!(pool.counters().starts, 1);
    }

    #[tokio::test]
    async fn test_fired_node_is_forwarded_to_owner() {
        let (owner, mut commands) = unbounded_channel();
        let mut pool = ShardPool::new(&config(4), owner);
        let active = index(3);
        pool.apply(WorkerDirective::Start, &active).unwrap();

        let last = &active.entries()[2];
        last.signal.set();
        match tokio::time::timeout(Duration::from_secs(2), commands.recv()).await {
            Ok(Some(Command::Fired(node))) => assert_eq!(node, last.node),
            other => panic!("expected Fired, got {other:?}"),
        }
        pool.stop_all();
    }
}
