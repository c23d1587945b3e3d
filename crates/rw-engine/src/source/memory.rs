//! An in-process key store with registry-style change notification.
//!
//! [`MemoryStore`] is a cheaply cloneable handle onto shared state, so a test
//! or the `replay` command can hand one clone to the engine and keep another
//! to mutate keys out-of-band. Every key instance gets a fresh id: deleting a
//! key and creating it again under the same path invalidates handles opened
//! on the old instance.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use rw_core::{FxHashMap, KeyListing, KeyPath, RootSet, Value};

use super::{ArmStatus, ResourceSource, listing_key};
use crate::error::WatchError;
use crate::signal::Signal;

/// One stored key instance.
#[derive(Debug)]
struct StoredKey {
    parent: Option<u64>,
    children: BTreeMap<String, u64>,
    values: BTreeMap<String, Value>,
    armed: Vec<Signal>,
}

impl StoredKey {
    fn new(parent: Option<u64>) -> Self {
        Self {
            parent,
            children: BTreeMap::new(),
            values: BTreeMap::new(),
            armed: Vec::new(),
        }
    }
}

#[derive(Debug, Default)]
struct StoreState {
    keys: FxHashMap<u64, StoredKey>,
    roots: FxHashMap<String, u64>,
    next_id: u64,
}

impl StoreState {
    fn allocate(&mut self, parent: Option<u64>) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.keys.insert(id, StoredKey::new(parent));
        id
    }

    fn lookup(&self, path: &KeyPath) -> Option<u64> {
        let mut id = *self.roots.get(path.root())?;
        for segment in path.segments() {
            id = *self.keys.get(&id)?.children.get(segment)?;
        }
        Some(id)
    }

    /// Sets and forgets every signal armed on `id`.
    fn fire(&mut self, id: u64) {
        if let Some(key) = self.keys.get_mut(&id) {
            for signal in key.armed.drain(..) {
                signal.set();
            }
        }
    }
}

/// A hierarchical in-memory key/value store.
///
/// # Examples
///
/// ```
/// use rw_engine::MemoryStore;
/// use rw_core::Value;
///
/// let store = MemoryStore::new();
/// store.create_key("HKCU\\Software\\regwatch")?;
/// store.set_value("HKCU\\Software\\regwatch", "mode", Value::String("fast".into()))?;
/// assert!(store.contains("HKEY_CURRENT_USER\\Software\\regwatch")?);
/// # Ok::<(), rw_engine::WatchError>(())
/// ```
#[derive(Debug, Clone)]
pub struct MemoryStore {
    roots: RootSet,
    state: Arc<Mutex<StoreState>>,
    open: Arc<AtomicUsize>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Creates a store with the standard registry roots.
    #[must_use]
    pub fn new() -> Self {
        Self::with_roots(RootSet::registry())
    }

    /// Creates a store with a custom set of roots, each initially empty.
    #[must_use]
    pub fn with_roots(roots: RootSet) -> Self {
        let mut state = StoreState::default();
        for name in roots.names() {
            let id = state.allocate(None);
            state.roots.insert(name.to_owned(), id);
        }
        Self {
            roots,
            state: Arc::new(Mutex::new(state)),
            open: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn parse(&self, key: &str) -> Result<KeyPath, WatchError> {
        Ok(KeyPath::parse(key, &self.roots)?)
    }

    /// Returns `true` if `key` exists.
    pub fn contains(&self, key: &str) -> Result<bool, WatchError> {
        let path = self.parse(key)?;
        Ok(self.state.lock().lookup(&path).is_some())
    }

    /// Creates `key` and any missing ancestors.
    ///
    /// Returns `false` if the key already existed.
    pub fn create_key(&self, key: &str) -> Result<bool, WatchError> {
        let path = self.parse(key)?;
        let mut state = self.state.lock();
        let Some(&root) = state.roots.get(path.root()) else {
            return Err(WatchError::key_not_found(path.to_string()));
        };

        let mut id = root;
        let mut created = false;
        for segment in path.segments() {
            let existing = state
                .keys
                .get(&id)
                .and_then(|key| key.children.get(segment).copied());
            id = match existing {
                Some(child) => child,
                None => {
                    let child = state.allocate(Some(id));
                    if let Some(parent) = state.keys.get_mut(&id) {
                        parent.children.insert(segment.clone(), child);
                    }
                    state.fire(id);
                    created = true;
                    child
                }
            };
        }
        Ok(created)
    }

    /// Deletes `key` and everything below it.
    ///
    /// Returns `false` if the key did not exist.
    pub fn delete_key(&self, key: &str) -> Result<bool, WatchError> {
        let path = self.parse(key)?;
        let mut state = self.state.lock();
        let Some(id) = state.lookup(&path) else {
            return Ok(false);
        };

        let mut doomed = vec![id];
        let mut cursor = 0;
        while let Some(&next) = doomed.get(cursor) {
            if let Some(key) = state.keys.get(&next) {
                doomed.extend(key.children.values().copied());
            }
            cursor += 1;
        }

        let parent = state.keys.get(&id).and_then(|key| key.parent);
        for doomed_id in doomed {
            state.fire(doomed_id);
            state.keys.remove(&doomed_id);
        }
        if let Some(parent) = parent {
            if let Some(parent_key) = state.keys.get_mut(&parent) {
                parent_key.children.remove(path.name());
            }
            state.fire(parent);
        }
        Ok(true)
    }

    /// Stores a value under an existing key.
    pub fn set_value(&self, key: &str, name: &str, value: Value) -> Result<(), WatchError> {
        let path = self.parse(key)?;
        let mut state = self.state.lock();
        let id = state
            .lookup(&path)
            .ok_or_else(|| WatchError::key_not_found(path.to_string()))?;
        if let Some(stored) = state.keys.get_mut(&id) {
            stored.values.insert(name.to_owned(), value);
        }
        state.fire(id);
        Ok(())
    }

    /// Removes a value. Returns `false` if the value did not exist.
    pub fn delete_value(&self, key: &str, name: &str) -> Result<bool, WatchError> {
        let path = self.parse(key)?;
        let mut state = self.state.lock();
        let id = state
            .lookup(&path)
            .ok_or_else(|| WatchError::key_not_found(path.to_string()))?;
        let removed = state
            .keys
            .get_mut(&id)
            .is_some_and(|stored| stored.values.remove(name).is_some());
        if removed {
            state.fire(id);
        }
        Ok(removed)
    }

    /// Number of handles opened through this store and not yet dropped.
    #[must_use]
    pub fn open_handles(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }
}

/// A handle to one key instance of a [`MemoryStore`].
#[derive(Debug)]
pub struct MemoryHandle {
    id: u64,
    open: Arc<AtomicUsize>,
}

impl Drop for MemoryHandle {
    fn drop(&mut self) {
        self.open.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ResourceSource for MemoryStore {
    type Handle = MemoryHandle;

    fn roots(&self) -> &RootSet {
        &self.roots
    }

    fn exists(&self, path: &KeyPath) -> bool {
        self.state.lock().lookup(path).is_some()
    }

    fn open_for_notify(&self, path: &KeyPath) -> Option<MemoryHandle> {
        let id = self.state.lock().lookup(path)?;
        self.open.fetch_add(1, Ordering::SeqCst);
        Some(MemoryHandle {
            id,
            open: Arc::clone(&self.open),
        })
    }

    fn is_live(&self, handle: &MemoryHandle) -> bool {
        self.state.lock().keys.contains_key(&handle.id)
    }

    fn arm_notification(&self, handle: &MemoryHandle, signal: &Signal) -> ArmStatus {
        let mut state = self.state.lock();
        let Some(key) = state.keys.get_mut(&handle.id) else {
            return ArmStatus::Gone;
        };
        if !key.armed.iter().any(|armed| armed.same_as(signal)) {
            key.armed.push(signal.clone());
        }
        ArmStatus::Armed
    }

    fn list(&self, path: &KeyPath) -> Result<KeyListing, WatchError> {
        let state = self.state.lock();
        let key = state
            .lookup(path)
            .and_then(|id| state.keys.get(&id))
            .ok_or_else(|| WatchError::key_not_found(path.to_string()))?;
        Ok(KeyListing {
            resolved_root: path.root().to_owned(),
            key: listing_key(path),
            subkeys: key.children.keys().cloned().collect(),
            values: key.values.keys().cloned().collect(),
        })
    }

    fn get(&self, path: &KeyPath, name: &str) -> Result<Value, WatchError> {
        let state = self.state.lock();
        let key = state
            .lookup(path)
            .and_then(|id| state.keys.get(&id))
            .ok_or_else(|| WatchError::key_not_found(path.to_string()))?;
        key.values
            .get(name)
            .cloned()
            .ok_or_else(|| WatchError::ValueNotFound {
                key: path.to_string(),
                name: name.to_owned(),
            })
    }
}
