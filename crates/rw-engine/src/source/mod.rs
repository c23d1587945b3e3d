//! The resource source seam.
//!
//! The engine never touches a store directly. Everything it needs to know
//! about resources goes through [`ResourceSource`]: whether a key exists,
//! opening a handle to receive notifications, and arming a [`Signal`] so the
//! store sets it on the next change. Handles are plain owned values; dropping
//! one closes it, so a handle can be neither leaked by the tree nor closed
//! twice.
//!
//! Two sources ship with the crate:
//!
//! - [`MemoryStore`] - an in-process store with registry-style notification
//!   semantics, used by tests and the `replay` command
//! - [`FsSource`] - directories under configured base paths, watched with
//!   the `notify` crate

mod fs;
mod memory;

pub use fs::{FsHandle, FsSource};
pub use memory::{MemoryHandle, MemoryStore};

use rw_core::{KeyListing, KeyPath, RootSet, Value};

use crate::error::WatchError;
use crate::signal::Signal;

/// Outcome of arming a change notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArmStatus {
    /// The signal will be set on the next change.
    Armed,
    /// The resource behind the handle no longer exists.
    Gone,
    /// Arming failed for another reason; the node keeps its current state.
    Failed(String),
}

/// Access to a hierarchical store of keys.
///
/// Notification arming is one-shot: after the source sets an armed signal it
/// forgets it, and the engine re-arms on its next reconcile. A source must
/// set an armed signal when a value of the key changes, when an immediate
/// subkey is added or removed, and when the key itself is deleted.
pub trait ResourceSource: Send + 'static {
    /// An open handle to one key instance.
    type Handle: Send + 'static;

    /// The allow-list of root names keys may start with.
    fn roots(&self) -> &RootSet;

    /// Rejects keys this source cannot address, beyond what parsing checks.
    ///
    /// Called before a subscription touches the tree. The default accepts
    /// every parsed key.
    fn validate(&self, path: &KeyPath) -> Result<(), WatchError> {
        let _ = path;
        Ok(())
    }

    /// Returns `true` if the key currently exists.
    fn exists(&self, path: &KeyPath) -> bool;

    /// Opens a handle suitable for change notification, if the key exists.
    fn open_for_notify(&self, path: &KeyPath) -> Option<Self::Handle>;

    /// Returns `true` if the key instance behind `handle` still exists.
    ///
    /// A key deleted and recreated under the same path is a new instance, so
    /// an old handle reports `false` even though the path exists again.
    fn is_live(&self, handle: &Self::Handle) -> bool;

    /// Asks the source to set `signal` on the next change to the key.
    fn arm_notification(&self, handle: &Self::Handle, signal: &Signal) -> ArmStatus;

    /// Lists the immediate subkeys and value names of a key.
    fn list(&self, path: &KeyPath) -> Result<KeyListing, WatchError>;

    /// Reads one value of a key.
    fn get(&self, path: &KeyPath, name: &str) -> Result<Value, WatchError>;
}

/// Builds the listing key string: the segments below the root.
pub(crate) fn listing_key(path: &KeyPath) -> String {
    path.segments()
        .join(rw_core::PATH_DELIMITER.to_string().as_str())
}
