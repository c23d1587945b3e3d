//! The engine facade.
//!
//! [`Engine::start`] spawns the tree owner thread for a resource source.
//! Subscribe and unsubscribe calls are validated on the calling thread and
//! then handed to the owner, which replies once the tree and the worker
//! shards are updated. Changes come back through the pending-change queue;
//! the host delivers them by calling [`Engine::dispatch_pending`] whenever
//! [`Engine::changed`] completes, or lets [`Engine::run_dispatcher`] do both.

use std::future::Future;
use std::ops::AddAssign;
use std::sync::Arc;
use std::sync::mpsc;
use std::thread::{self, JoinHandle};

use rw_core::{EngineConfig, KeyPath, RootSet};
use tracing::{debug, info, warn};

use crate::dispatcher::{self, DispatchReport};
use crate::error::WatchError;
use crate::listener::Listener;
use crate::multiplexer::ShardPool;
use crate::owner::{Command, EngineStats, Inbox, Owner};
use crate::queue::ChangeQueue;
use crate::registrar::{Registrar, WatchAction};
use crate::source::ResourceSource;
use crate::tree::WatchTree;

/// Sends a request to the owner and waits for its reply.
fn request<T>(
    inbox: &Inbox,
    build: impl FnOnce(mpsc::Sender<T>) -> Command,
) -> Result<T, WatchError> {
    let (reply, response) = mpsc::channel();
    inbox
        .send(build(reply))
        .map_err(|_| WatchError::EngineStopped)?;
    response.recv().map_err(|_| WatchError::EngineStopped)
}

fn configure(
    inbox: &Inbox,
    path: KeyPath,
    listener: Listener,
    action: WatchAction,
) -> Result<(), WatchError> {
    request(inbox, |reply| Command::Configure {
        path,
        listener,
        action,
        reply,
    })?
}

/// A running watch engine.
///
/// # Lifecycle
///
/// 1. **Start**: [`Engine::start`] validates the configuration and spawns the
///    tree owner. No worker shard runs until something is watched.
/// 2. **Watch**: [`Engine::subscribe`] and [`Engine::unsubscribe`] (or
///    [`Engine::watch`]) change what is watched. Worker shards start with the
///    first watched key and stop with the last.
/// 3. **Deliver**: the host drives [`Engine::dispatch_pending`]; listeners
///    run on the thread that calls it.
/// 4. **Shutdown**: [`Engine::shutdown`], or dropping the engine, stops the
///    shards, joins the owner and closes every handle.
///
/// # Examples
///
/// ```
/// use rw_core::{EngineConfig, Value};
/// use rw_engine::{Engine, Listener, MemoryStore};
///
/// let store = MemoryStore::new();
/// store.create_key("HKCU\\Software\\demo")?;
///
/// let engine = Engine::start(store.clone(), EngineConfig::default())?;
/// let listener = Listener::new(|event| println!("{event}"));
/// engine.subscribe("HKCU\\Software\\demo", &listener)?;
///
/// store.set_value("HKCU\\Software\\demo", "x", Value::Dword(1))?;
/// // ... later, on the consumer thread:
/// engine.dispatch_pending();
///
/// engine.shutdown()?;
/// # Ok::<(), rw_engine::WatchError>(())
/// ```
pub struct Engine {
    roots: RootSet,
    config: EngineConfig,
    inbox: Inbox,
    queue: Arc<ChangeQueue>,
    owner: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("pending", &self.queue.len())
            .field("is_running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Starts an engine over `source`.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::Config`] for invalid limits and
    /// [`WatchError::Spawn`] if the owner thread cannot be started.
    pub fn start<S: ResourceSource>(source: S, config: EngineConfig) -> Result<Self, WatchError> {
        config.validate()?;

        let roots = source.roots().clone();
        let queue = Arc::new(ChangeQueue::new());
        let (inbox, commands) = tokio::sync::mpsc::unbounded_channel();

        let owner = Owner::new(
            WatchTree::new(source),
            Registrar::new(config.max_watched_nodes()),
            ShardPool::new(&config, inbox.clone()),
            Arc::clone(&queue),
        );
        let thread = format!("{}-tree", config.thread_name);
        let handle = thread::Builder::new()
            .name(thread.clone())
            .spawn(move || owner.run(commands))
            .map_err(|source| WatchError::Spawn { thread, source })?;

        info!(
            roots = roots.len(),
            capacity = config.max_watched_nodes(),
            "Watch engine started"
        );
        Ok(Self {
            roots,
            config,
            inbox,
            queue,
            owner: Some(handle),
        })
    }

    /// The roots keys may start with.
    #[must_use]
    pub fn roots(&self) -> &RootSet {
        &self.roots
    }

    /// The configuration the engine was started with.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Returns `true` until the engine has been shut down.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.owner.as_ref().is_some_and(|owner| !owner.is_finished())
    }

    /// Parses `key` against the engine's roots.
    pub fn parse(&self, key: &str) -> Result<KeyPath, WatchError> {
        Ok(KeyPath::parse(key, &self.roots)?)
    }

    /// Adds or removes a listener on `key`.
    ///
    /// Malformed keys and unknown roots are rejected before the request
    /// reaches the tree. Unsubscribing from a key that is not watched, or
    /// with a listener that is not registered, does nothing.
    ///
    /// # Errors
    ///
    /// - [`WatchError::Path`] for an invalid key
    /// - [`WatchError::CapacityExceeded`] if subscribing would need more
    ///   nodes than the engine can wait on; nothing is changed
    /// - [`WatchError::EngineStopped`] after shutdown
    pub fn configure(
        &self,
        key: &str,
        listener: &Listener,
        action: WatchAction,
    ) -> Result<(), WatchError> {
        let path = self.parse(key)?;
        configure(&self.inbox, path, listener.clone(), action)
    }

    /// Calls `listener` for every change to `key`.
    pub fn subscribe(&self, key: &str, listener: &Listener) -> Result<(), WatchError> {
        self.configure(key, listener, WatchAction::Subscribe)
    }

    /// Stops calling `listener` for changes to `key`.
    pub fn unsubscribe(&self, key: &str, listener: &Listener) -> Result<(), WatchError> {
        self.configure(key, listener, WatchAction::Unsubscribe)
    }

    /// Subscribes and returns a handle that unsubscribes when stopped or
    /// dropped.
    pub fn watch(&self, key: &str, listener: Listener) -> Result<WatchHandle, WatchError> {
        let path = self.parse(key)?;
        configure(
            &self.inbox,
            path.clone(),
            listener.clone(),
            WatchAction::Subscribe,
        )?;
        Ok(WatchHandle {
            inbox: self.inbox.clone(),
            path,
            listener,
            active: true,
        })
    }

    /// Delivers every queued change on the calling thread.
    ///
    /// # Panics
    ///
    /// A panicking listener is not caught; the panic propagates and the
    /// changes not yet delivered stay queued.
    pub fn dispatch_pending(&self) -> DispatchReport {
        dispatcher::drain(&self.queue)
    }

    /// Completes once a change has been queued since the last wake.
    pub async fn changed(&self) {
        self.queue.changed().await;
    }

    /// Delivers changes as they are queued until `shutdown` completes.
    ///
    /// Returns the totals over every drain pass.
    pub async fn run_dispatcher(&self, shutdown: impl Future<Output = ()>) -> DispatchReport {
        tokio::pin!(shutdown);
        let mut total = DispatchReport::default();
        loop {
            total += self.dispatch_pending();
            tokio::select! {
                () = &mut shutdown => break,
                () = self.changed() => {}
            }
        }
        total += self.dispatch_pending();
        total
    }

    /// Renders the watch tree for diagnostics.
    pub fn dump(&self) -> Result<String, WatchError> {
        request(&self.inbox, |reply| Command::Dump { reply })
    }

    /// Returns current engine statistics.
    pub fn stats(&self) -> Result<EngineStats, WatchError> {
        request(&self.inbox, |reply| Command::Stats { reply })
    }

    /// Stops the shards, joins the owner and closes every handle.
    pub fn shutdown(mut self) -> Result<(), WatchError> {
        self.stop_owner()
    }

    fn stop_owner(&mut self) -> Result<(), WatchError> {
        let Some(owner) = self.owner.take() else {
            return Ok(());
        };
        // The owner may already be gone if it panicked.
        let _ = self.inbox.send(Command::Shutdown);
        if owner.join().is_err() {
            warn!("Tree owner thread panicked");
            return Err(WatchError::EngineStopped);
        }
        debug!("Watch engine stopped");
        Ok(())
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        let _ = self.stop_owner();
    }
}

impl AddAssign for DispatchReport {
    fn add_assign(&mut self, other: Self) {
        self.records += other.records;
        self.deliveries += other.deliveries;
        self.expired += other.expired;
    }
}

/// A subscription that can be stopped.
///
/// Dropping the handle unsubscribes without waiting for the engine.
#[must_use = "dropping a WatchHandle unsubscribes immediately"]
pub struct WatchHandle {
    inbox: Inbox,
    path: KeyPath,
    listener: Listener,
    active: bool,
}

impl std::fmt::Debug for WatchHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchHandle")
            .field("key", &self.path.to_string())
            .field("active", &self.active)
            .finish_non_exhaustive()
    }
}

impl WatchHandle {
    /// The watched key.
    #[must_use]
    pub fn key(&self) -> &KeyPath {
        &self.path
    }

    /// Returns `true` until the handle is stopped.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Unsubscribes. Stopping an already stopped handle does nothing, and so
    /// does stopping after the engine has shut down.
    pub fn stop(&mut self) -> Result<(), WatchError> {
        if !self.active {
            return Ok(());
        }
        self.active = false;
        match configure(
            &self.inbox,
            self.path.clone(),
            self.listener.clone(),
            WatchAction::Unsubscribe,
        ) {
            Err(WatchError::EngineStopped) | Ok(()) => Ok(()),
            Err(error) => Err(error),
        }
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        if !self.active {
            return;
        }
        let (reply, _) = mpsc::channel();
        let _ = self.inbox.send(Command::Configure {
            path: self.path.clone(),
            listener: self.listener.clone(),
            action: WatchAction::Unsubscribe,
            reply,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemoryStore;
    use parking_lot::Mutex;
    use rw_core::{ChangeEvent, EventKind, PathError, Value};
    use std::time::Duration;

    type Seen = Arc<Mutex<Vec<ChangeEvent>>>;

    fn recorder() -> (Listener, Seen) {
        let seen: Seen = Arc::default();
        let sink = Arc::clone(&seen);
        (Listener::new(move |event| sink.lock().push(event.clone())), seen)
    }

    fn start(store: &MemoryStore) -> Engine {
        Engine::start(store.clone(), EngineConfig::default()).unwrap()
    }

    /// Delivers changes until none arrive for a quiet period.
    async fn settle(engine: &Engine) -> DispatchReport {
        let mut total = DispatchReport::default();
        loop {
            total += engine.dispatch_pending();
            let woke = tokio::time::timeout(Duration::from_millis(150), engine.changed()).await;
            if woke.is_err() {
                total += engine.dispatch_pending();
                return total;
            }
        }
    }

    fn events(seen: &Seen) -> Vec<(EventKind, String)> {
        seen.lock()
            .iter()
            .map(|event| (event.kind, event.key.clone()))
            .collect()
    }

    #[tokio::test]
    async fn test_value_change_is_delivered() {
        let store = MemoryStore::new();
        store.create_key("HKCU\\Software\\app").unwrap();
        let engine = start(&store);
        let (listener, seen) = recorder();

        engine.subscribe("HKCU\\Software\\app", &listener).unwrap();
        store
            .set_value("HKCU\\Software\\app", "mode", Value::String("fast".into()))
            .unwrap();
        settle(&engine).await;

        assert_eq!(
            events(&seen),
            [(EventKind::Change, "HKEY_CURRENT_USER\\Software\\app".to_owned())]
        );
    }

    #[tokio::test]
    async fn test_no_change_means_no_deliveries() {
        let store = MemoryStore::new();
        store.create_key("HKLM\\A\\B").unwrap();
        let engine = start(&store);
        let (listener, seen) = recorder();

        engine.subscribe("HKLM\\A\\B", &listener).unwrap();
        let report = settle(&engine).await;
        assert_eq!(report, DispatchReport::default());
        assert!(seen.lock().is_empty());

        insta::assert_snapshot!(engine.dump().unwrap(), @r"
        + HKEY_LOCAL_MACHINE (0 listeners)
          + A (0 listeners)
            + B (1 listener)
        ");
    }

    #[tokio::test]
    async fn test_add_and_delete_of_watched_key() {
        let store = MemoryStore::new();
        let engine = start(&store);
        let (listener, seen) = recorder();
        let key = "HKEY_USERS\\S-1\\Volatile".to_owned();

        engine.subscribe("HKU\\S-1\\Volatile", &listener).unwrap();
        store.create_key("HKU\\S-1\\Volatile").unwrap();
        settle(&engine).await;
        store.delete_key("HKU\\S-1\\Volatile").unwrap();
        settle(&engine).await;
        store.create_key("HKU\\S-1\\Volatile").unwrap();
        settle(&engine).await;

        assert_eq!(
            events(&seen),
            [
                (EventKind::Add, key.clone()),
                (EventKind::Delete, key.clone()),
                (EventKind::Add, key),
            ]
        );
    }

    #[tokio::test]
    async fn test_ancestor_delete_reaches_both_listeners_once() {
        let store = MemoryStore::new();
        store.create_key("HKCU\\A\\B").unwrap();
        let engine = start(&store);
        let (outer, outer_seen) = recorder();
        let (inner, inner_seen) = recorder();

        engine.subscribe("HKCU\\A", &outer).unwrap();
        engine.subscribe("HKCU\\A\\B", &inner).unwrap();
        store.delete_key("HKCU\\A").unwrap();
        settle(&engine).await;

        assert_eq!(
            events(&outer_seen),
            [(EventKind::Delete, "HKEY_CURRENT_USER\\A".to_owned())]
        );
        assert_eq!(
            events(&inner_seen),
            [(EventKind::Delete, "HKEY_CURRENT_USER\\A\\B".to_owned())]
        );
    }

    #[tokio::test]
    async fn test_changes_coalesce_until_drained() {
        let store = MemoryStore::new();
        store.create_key("HKCU\\busy").unwrap();
        let engine = start(&store);
        let (listener, seen) = recorder();
        engine.subscribe("HKCU\\busy", &listener).unwrap();

        for i in 0..3 {
            store
                .set_value("HKCU\\busy", "n", Value::Dword(i))
                .unwrap();
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        let report = engine.dispatch_pending();

        assert_eq!(report.records, 1);
        assert_eq!(seen.lock().len(), 1);
        assert_eq!(engine.stats().unwrap().coalesced, 2);

        // The dropped changes cause one more look, which reports the state
        // the key settled in.
        settle(&engine).await;
        assert_eq!(
            events(&seen),
            [
                (EventKind::Change, "HKEY_CURRENT_USER\\busy".to_owned()),
                (EventKind::Change, "HKEY_CURRENT_USER\\busy".to_owned()),
            ]
        );
    }

    #[tokio::test]
    async fn test_recreation_before_drain_is_still_reported() {
        let store = MemoryStore::new();
        store.create_key("HKCU\\A").unwrap();
        let engine = start(&store);
        let (listener, seen) = recorder();
        engine.subscribe("HKCU\\A", &listener).unwrap();

        store.delete_key("HKCU\\A").unwrap();
        store.create_key("HKCU\\A").unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        settle(&engine).await;

        let key = "HKEY_CURRENT_USER\\A".to_owned();
        assert_eq!(
            events(&seen),
            [(EventKind::Delete, key.clone()), (EventKind::Add, key)]
        );
        assert!(store.contains("HKCU\\A").unwrap());

        // Nothing more arrives once the listener has the final state.
        settle(&engine).await;
        assert_eq!(seen.lock().len(), 2);
    }

    #[tokio::test]
    async fn test_delete_after_queued_change_is_still_reported() {
        let store = MemoryStore::new();
        store.create_key("HKCU\\A").unwrap();
        let engine = start(&store);
        let (listener, seen) = recorder();
        engine.subscribe("HKCU\\A", &listener).unwrap();

        store.set_value("HKCU\\A", "x", Value::Dword(1)).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        store.delete_key("HKCU\\A").unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        settle(&engine).await;

        let key = "HKEY_CURRENT_USER\\A".to_owned();
        assert_eq!(
            events(&seen),
            [(EventKind::Change, key.clone()), (EventKind::Delete, key)]
        );
    }

    #[tokio::test]
    async fn test_invalid_keys_are_rejected_synchronously() {
        let store = MemoryStore::new();
        let engine = start(&store);
        let listener = Listener::new(|_| {});

        for (key, expected) in [
            ("", PathError::Empty),
            ("HKEY_NOWHERE\\x", PathError::InvalidRoot("HKEY_NOWHERE".to_owned())),
            ("HKLM", PathError::NoSubkey),
        ] {
            match engine.subscribe(key, &listener) {
                Err(WatchError::Path(error)) => assert_eq!(error, expected),
                other => panic!("expected path error for {key:?}, got {other:?}"),
            }
        }
        assert_eq!(engine.dump().unwrap(), "");
        assert_eq!(engine.stats().unwrap().nodes, 0);
    }

    #[tokio::test]
    async fn test_keys_escaping_a_directory_root_are_rejected() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = rw_core::Config {
            roots: vec![rw_core::FsRootConfig {
                name: "work".to_owned(),
                path: camino::Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap(),
            }],
            ..rw_core::Config::default()
        };
        let source = crate::source::FsSource::new(&config).unwrap();
        let engine = Engine::start(source, EngineConfig::default()).unwrap();
        let listener = Listener::new(|_| {});

        for key in ["work\\..", "work\\a\\..\\..", "work\\."] {
            assert!(
                matches!(
                    engine.subscribe(key, &listener),
                    Err(WatchError::Path(PathError::InvalidSegment { .. }))
                ),
                "{key} should be rejected"
            );
        }
        assert_eq!(engine.stats().unwrap().nodes, 0);
        engine.subscribe("work\\plain", &listener).unwrap();
        assert_eq!(engine.stats().unwrap().nodes, 2);
    }

    #[tokio::test]
    async fn test_workers_follow_watch_count() {
        let store = MemoryStore::new();
        let engine = start(&store);
        let listener = Listener::new(|_| {});

        for _ in 0..3 {
            engine.subscribe("HKCU\\a", &listener).unwrap();
            engine.subscribe("HKCU\\b", &listener).unwrap();
            engine.unsubscribe("HKCU\\a", &listener).unwrap();
            engine.unsubscribe("HKCU\\b", &listener).unwrap();
        }
        engine.unsubscribe("HKCU\\never", &listener).unwrap();

        let stats = engine.stats().unwrap();
        assert_eq!((stats.worker_starts, stats.worker_stops), (3, 3));
        assert_eq!(stats.nodes, 0);
        assert_eq!(stats.shards, 0);
        assert_eq!(store.open_handles(), 0);
    }

    #[tokio::test]
    async fn test_watches_are_sharded_and_capped() {
        let store = MemoryStore::new();
        let config = EngineConfig {
            max_wait_objects: 4,
            max_shards: 3,
            ..EngineConfig::default()
        };
        let engine = Engine::start(store.clone(), config).unwrap();
        let (listener, seen) = recorder();

        // The root node plus five keys fill three shards of two.
        for i in 0..5 {
            let key = format!("HKCU\\k{i}");
            store.create_key(&key).unwrap();
            engine.subscribe(&key, &listener).unwrap();
        }
        let stats = engine.stats().unwrap();
        assert_eq!(stats.shard_loads, [2, 2, 2]);

        let err = engine.subscribe("HKCU\\k5", &listener).unwrap_err();
        assert!(matches!(
            err,
            WatchError::CapacityExceeded {
                requested: 7,
                limit: 6
            }
        ));

        store.set_value("HKCU\\k4", "x", Value::None).unwrap();
        settle(&engine).await;
        assert_eq!(
            events(&seen),
            [(EventKind::Change, "HKEY_CURRENT_USER\\k4".to_owned())]
        );

        engine.unsubscribe("HKCU\\k0", &listener).unwrap();
        engine.unsubscribe("HKCU\\k1", &listener).unwrap();
        assert_eq!(engine.stats().unwrap().shard_loads, [2, 2]);
    }

    #[tokio::test]
    async fn test_watch_handle_stop_is_idempotent() {
        let store = MemoryStore::new();
        store.create_key("HKCU\\x").unwrap();
        let engine = start(&store);

        let mut handle = engine.watch("HKCU\\x", Listener::new(|_| {})).unwrap();
        assert_eq!(handle.key().to_string(), "HKEY_CURRENT_USER\\x");
        handle.stop().unwrap();
        handle.stop().unwrap();
        assert!(!handle.is_active());
        assert_eq!(engine.stats().unwrap().nodes, 0);

        let dropped = engine.watch("HKCU\\x", Listener::new(|_| {})).unwrap();
        drop(dropped);
        assert_eq!(engine.stats().unwrap().nodes, 0);
    }

    #[tokio::test]
    async fn test_shutdown_releases_every_handle() {
        let store = MemoryStore::new();
        store.create_key("HKCU\\a\\b").unwrap();
        let engine = start(&store);
        let listener = Listener::new(|_| {});
        engine.subscribe("HKCU\\a\\b", &listener).unwrap();
        engine.subscribe("HKLM\\missing", &listener).unwrap();
        assert_eq!(store.open_handles(), 4);

        let mut handle = engine.watch("HKCU\\a", Listener::new(|_| {})).unwrap();
        engine.shutdown().unwrap();
        assert_eq!(store.open_handles(), 0);
        handle.stop().unwrap();
    }

    #[tokio::test]
    async fn test_listener_may_reconfigure_during_delivery() {
        let store = MemoryStore::new();
        store.create_key("HKCU\\trigger").unwrap();
        store.create_key("HKCU\\other").unwrap();
        let engine = Arc::new(start(&store));
        let (other, other_seen) = recorder();

        let weak = Arc::downgrade(&engine);
        let follower = other.clone();
        let trigger = Listener::new(move |_| {
            if let Some(engine) = weak.upgrade() {
                engine.subscribe("HKCU\\other", &follower).unwrap();
            }
        });
        engine.subscribe("HKCU\\trigger", &trigger).unwrap();

        store.set_value("HKCU\\trigger", "go", Value::None).unwrap();
        settle(&engine).await;
        store.set_value("HKCU\\other", "x", Value::None).unwrap();
        settle(&engine).await;

        assert_eq!(
            events(&other_seen),
            [(EventKind::Change, "HKEY_CURRENT_USER\\other".to_owned())]
        );
    }

    #[tokio::test]
    async fn test_run_dispatcher_delivers_until_shutdown() {
        let store = MemoryStore::new();
        store.create_key("HKCU\\live").unwrap();
        let engine = start(&store);
        let (listener, seen) = recorder();
        engine.subscribe("HKCU\\live", &listener).unwrap();

        let (stop, stopped) = tokio::sync::oneshot::channel::<()>();
        let driver = async {
            store.set_value("HKCU\\live", "x", Value::None).unwrap();
            for _ in 0..100 {
                if !seen.lock().is_empty() {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            let _ = stop.send(());
        };
        let shutdown = async {
            let _ = stopped.await;
        };

        let (report, ()) = tokio::join!(engine.run_dispatcher(shutdown), driver);
        assert_eq!(report.records, 1);
        assert_eq!(seen.lock().len(), 1);
    }
}
