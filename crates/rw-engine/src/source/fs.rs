//! A resource source over directories, watched with `notify`.
//!
//! Each configured root maps a name to a base directory. Below it,
//! directories are keys and regular files are values whose data is the raw
//! file contents. A single [`notify::RecommendedWatcher`] is shared by every
//! handle; opening a handle adds a non-recursive watch on its directory and
//! dropping the last handle for a directory removes it again.
//!
//! Key segments and value names must each be a single plain path component,
//! so `..`, `.` and names containing a separator are rejected rather than
//! resolved outside the root's base directory.
//!
//! Filesystem events carry no notion of key instances. A handle records the
//! identity of the directory it opened (device and inode where the platform
//! exposes them, plus the creation time), and stops being live once the
//! path names a different directory. A directory removed and recreated
//! between two reconciles is therefore reported as `delete` then `add`.

#[cfg(unix)]
use std::os::unix::fs::MetadataExt;
use std::sync::Arc;
use std::time::SystemTime;

use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use rw_core::{Config, ConfigError, FxHashMap, KeyListing, KeyPath, PathError, RootSet, Value};
use tracing::{debug, trace, warn};

use super::{ArmStatus, ResourceSource, listing_key};
use crate::error::WatchError;
use crate::signal::Signal;

type ArmedSignals = Arc<Mutex<FxHashMap<Utf8PathBuf, Vec<Signal>>>>;

/// Which directory a path named when it was opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DirIdentity {
    #[cfg(unix)]
    device: u64,
    #[cfg(unix)]
    inode: u64,
    created: Option<SystemTime>,
}

impl DirIdentity {
    /// Reads the identity of the directory at `dir`, or `None` if there is
    /// no directory there.
    fn of(dir: &Utf8Path) -> Option<Self> {
        let metadata = std::fs::metadata(dir).ok()?;
        if !metadata.is_dir() {
            return None;
        }
        Some(Self {
            #[cfg(unix)]
            device: metadata.dev(),
            #[cfg(unix)]
            inode: metadata.ino(),
            created: metadata.created().ok(),
        })
    }
}

struct WatchedDir {
    identity: DirIdentity,
    handles: usize,
}

/// The shared watcher plus a count of open handles per directory.
struct WatchSet {
    watcher: RecommendedWatcher,
    counts: FxHashMap<Utf8PathBuf, WatchedDir>,
}

impl WatchSet {
    fn acquire(&mut self, dir: &Utf8Path, identity: DirIdentity) -> Result<(), notify::Error> {
        if let Some(watched) = self.counts.get_mut(dir) {
            if watched.identity != identity {
                // The watch still registered belongs to a removed directory.
                debug!(path = %dir, "Re-watching recreated directory");
                if let Err(error) = self.watcher.unwatch(dir.as_std_path()) {
                    trace!(path = %dir, error = %error, "Stale watch already gone");
                }
                self.watcher
                    .watch(dir.as_std_path(), RecursiveMode::NonRecursive)?;
                watched.identity = identity;
            }
            watched.handles += 1;
            return Ok(());
        }
        self.watcher
            .watch(dir.as_std_path(), RecursiveMode::NonRecursive)?;
        self.counts.insert(
            dir.to_owned(),
            WatchedDir {
                identity,
                handles: 1,
            },
        );
        trace!(path = %dir, "Watching directory");
        Ok(())
    }

    fn release(&mut self, dir: &Utf8Path) {
        let Some(watched) = self.counts.get_mut(dir) else {
            return;
        };
        watched.handles -= 1;
        if watched.handles > 0 {
            return;
        }
        self.counts.remove(dir);
        // The directory may already be gone, in which case the backend has
        // dropped the watch on its own.
        if let Err(error) = self.watcher.unwatch(dir.as_std_path()) {
            debug!(path = %dir, error = %error, "Unwatch failed");
        }
    }
}

/// Directory-backed keys with filesystem change notification.
pub struct FsSource {
    roots: RootSet,
    bases: FxHashMap<String, Utf8PathBuf>,
    watch_set: Arc<Mutex<WatchSet>>,
    armed: ArmedSignals,
}

impl std::fmt::Debug for FsSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FsSource")
            .field("bases", &self.bases)
            .finish_non_exhaustive()
    }
}

impl FsSource {
    /// Creates a source for the directory roots in `config`.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::Config`] if a root directory is missing and
    /// [`WatchError::Notify`] if the platform watcher cannot be created.
    pub fn new(config: &Config) -> Result<Self, WatchError> {
        config.validate()?;

        let mut bases = FxHashMap::default();
        for root in &config.roots {
            if !root.path.is_dir() {
                return Err(ConfigError::MissingDirectory(root.path.clone()).into());
            }
            let base = root.path.canonicalize_utf8()?;
            bases.insert(root.name.clone(), base);
        }

        let armed: ArmedSignals = Arc::default();
        let callback_armed = Arc::clone(&armed);
        let watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => fire_for_event(&callback_armed, event),
            Err(error) => warn!(error = %error, "Filesystem watcher error"),
        })?;

        Ok(Self {
            roots: config.root_set(),
            bases,
            watch_set: Arc::new(Mutex::new(WatchSet {
                watcher,
                counts: FxHashMap::default(),
            })),
            armed,
        })
    }

    /// Maps a key to its directory below the root's base.
    ///
    /// # Errors
    ///
    /// Returns [`PathError::InvalidRoot`] for a root this source does not
    /// serve and [`PathError::InvalidSegment`] for a segment that is not a
    /// plain name.
    pub fn resolve(&self, path: &KeyPath) -> Result<Utf8PathBuf, PathError> {
        let mut dir = self
            .bases
            .get(path.root())
            .ok_or_else(|| PathError::InvalidRoot(path.root().to_owned()))?
            .clone();
        for segment in path.segments() {
            check_plain(path, segment)?;
            dir.push(segment);
        }
        Ok(dir)
    }

    /// Resolves a key that must exist as a directory.
    fn existing_dir(&self, path: &KeyPath) -> Result<Utf8PathBuf, WatchError> {
        let dir = self.resolve(path)?;
        if !dir.is_dir() {
            return Err(WatchError::key_not_found(path.to_string()));
        }
        Ok(dir)
    }
}

/// Accepts `name` only if it is exactly one normal path component.
fn check_plain(path: &KeyPath, name: &str) -> Result<(), PathError> {
    let mut components = Utf8Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Utf8Component::Normal(component)), None) if component == name => Ok(()),
        _ => Err(PathError::InvalidSegment {
            key: path.to_string(),
            segment: name.to_owned(),
        }),
    }
}

/// Sets the signals armed on each event path and on its parent directory.
fn fire_for_event(armed: &ArmedSignals, event: Event) {
    let mut armed = armed.lock();
    for path in event.paths {
        let path = match Utf8PathBuf::try_from(path) {
            Ok(path) => path,
            Err(error) => {
                let invalid_path = error.into_path_buf();
                warn!(
                    path = %invalid_path.display(),
                    "Skipping non-UTF-8 path in filesystem event"
                );
                continue;
            }
        };
        trace!(path = %path, kind = ?event.kind, "Filesystem event");

        for target in std::iter::once(path.as_path()).chain(path.parent()) {
            if let Some(signals) = armed.remove(target) {
                for signal in signals {
                    signal.set();
                }
            }
        }
    }
}

/// An open watch on one directory.
pub struct FsHandle {
    dir: Utf8PathBuf,
    identity: DirIdentity,
    watch_set: Arc<Mutex<WatchSet>>,
}

impl FsHandle {
    /// The directory this handle watches.
    #[must_use]
    pub fn dir(&self) -> &Utf8Path {
        &self.dir
    }

    /// Returns `true` while the path still names the directory that was
    /// opened.
    fn names_opened_dir(&self) -> bool {
        DirIdentity::of(&self.dir) == Some(self.identity)
    }
}

impl std::fmt::Debug for FsHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FsHandle").field("dir", &self.dir).finish()
    }
}

impl Drop for FsHandle {
    fn drop(&mut self) {
        self.watch_set.lock().release(&self.dir);
    }
}

impl ResourceSource for FsSource {
    type Handle = FsHandle;

    fn roots(&self) -> &RootSet {
        &self.roots
    }

    fn validate(&self, path: &KeyPath) -> Result<(), WatchError> {
        self.resolve(path)?;
        Ok(())
    }

    fn exists(&self, path: &KeyPath) -> bool {
        self.resolve(path).is_ok_and(|dir| dir.is_dir())
    }

    fn open_for_notify(&self, path: &KeyPath) -> Option<FsHandle> {
        let dir = self.resolve(path).ok()?;
        let identity = DirIdentity::of(&dir)?;
        if let Err(error) = self.watch_set.lock().acquire(&dir, identity) {
            warn!(path = %dir, error = %error, "Failed to watch directory");
            return None;
        }
        Some(FsHandle {
            dir,
            identity,
            watch_set: Arc::clone(&self.watch_set),
        })
    }

    fn is_live(&self, handle: &FsHandle) -> bool {
        handle.names_opened_dir()
    }

    fn arm_notification(&self, handle: &FsHandle, signal: &Signal) -> ArmStatus {
        if !handle.names_opened_dir() {
            return ArmStatus::Gone;
        }
        let mut armed = self.armed.lock();
        let signals = armed.entry(handle.dir.clone()).or_default();
        if !signals.iter().any(|armed| armed.same_as(signal)) {
            signals.push(signal.clone());
        }
        ArmStatus::Armed
    }

    fn list(&self, path: &KeyPath) -> Result<KeyListing, WatchError> {
        let dir = self.existing_dir(path)?;

        let mut subkeys = Vec::new();
        let mut values = Vec::new();
        for entry in dir.read_dir_utf8()? {
            let entry = entry?;
            let file_type = entry.file_type()?;
            if file_type.is_dir() {
                subkeys.push(entry.file_name().to_owned());
            } else if file_type.is_file() {
                values.push(entry.file_name().to_owned());
            }
        }
        subkeys.sort_unstable();
        values.sort_unstable();

        Ok(KeyListing {
            resolved_root: path.root().to_owned(),
            key: listing_key(path),
            subkeys,
            values,
        })
    }

    fn get(&self, path: &KeyPath, name: &str) -> Result<Value, WatchError> {
        check_plain(path, name)?;
        let dir = self.existing_dir(path)?;
        let file = dir.join(name);
        if !file.is_file() {
            return Err(WatchError::ValueNotFound {
                key: path.to_string(),
                name: name.to_owned(),
            });
        }
        Ok(Value::from_bytes(std::fs::read(&file)?))
    }
}
