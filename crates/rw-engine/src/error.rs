//! Error types for the rw-engine crate.
//!
//! This module provides the [`WatchError`] type for errors that can occur
//! while configuring watches, running the engine, or querying a source.

use rw_core::{ConfigError, PathError};

/// Errors that can occur during watch operations.
///
/// # Error Recovery Strategy
///
/// - **Bad keys** ([`WatchError::Path`]): Recoverable - rejected before the tree is touched
/// - **Capacity** ([`WatchError::CapacityExceeded`]): Recoverable - nothing was created
/// - **Lookups** ([`WatchError::KeyNotFound`], [`WatchError::ValueNotFound`]): Recoverable
/// - **Engine stopped** ([`WatchError::EngineStopped`]): Fatal - the owner thread is gone
/// - **Spawn / config / notify / I/O**: Fatal - the engine cannot start or continue
///
/// # Examples
///
/// ```
/// use rw_engine::WatchError;
///
/// fn handle_error(err: &WatchError) {
///     if err.is_fatal() {
///         eprintln!("engine error: {err}");
///     } else {
///         eprintln!("request rejected: {err}");
///     }
/// }
/// ```
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    /// The key string failed to parse or named an unknown root.
    #[error(transparent)]
    Path(#[from] PathError),

    /// Subscribing would need more live nodes than the engine can wait on.
    #[error("cannot watch {requested} nodes: the engine is limited to {limit}")]
    CapacityExceeded {
        /// Live nodes the subscription would have required.
        requested: usize,
        /// Maximum live nodes allowed by the configuration.
        limit: usize,
    },

    /// A queried key does not exist.
    #[error("key not found: {0}")]
    KeyNotFound(String),

    /// A queried value does not exist under an existing key.
    #[error("value \"{name}\" not found under {key}")]
    ValueNotFound {
        /// The key that was queried.
        key: String,
        /// The missing value name.
        name: String,
    },

    /// The engine configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// An engine thread could not be spawned.
    #[error("failed to spawn {thread} thread: {source}")]
    Spawn {
        /// Name of the thread that failed to start.
        thread: String,
        /// The underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// The engine has shut down and no longer accepts requests.
    #[error("watch engine has stopped")]
    EngineStopped,

    /// The filesystem notification backend failed.
    #[error("notify watcher error: {0}")]
    Notify(#[from] notify::Error),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl WatchError {
    /// Creates a new [`WatchError::KeyNotFound`] error.
    #[inline]
    pub fn key_not_found(key: impl Into<String>) -> Self {
        Self::KeyNotFound(key.into())
    }

    /// Returns `true` if the request was rejected but the engine is unaffected.
    #[inline]
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Path(_)
                | Self::CapacityExceeded { .. }
                | Self::KeyNotFound(_)
                | Self::ValueNotFound { .. }
        )
    }

    /// Returns `true` if the engine cannot continue.
    #[inline]
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        !self.is_recoverable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_error_is_recoverable() {
        let err = WatchError::from(PathError::NoSubkey);
        assert!(err.is_recoverable());
        assert_eq!(
            err.to_string(),
            "expected key to contain both a root and subkey"
        );
    }

    #[test]
    fn test_capacity_exceeded_display() {
        let err = WatchError::CapacityExceeded {
            requested: 70,
            limit: 62,
        };
        assert!(err.is_recoverable());
        assert!(err.to_string().contains("70"));
        assert!(err.to_string().contains("62"));
    }

    #[test]
    fn test_engine_stopped_is_fatal() {
        let err = WatchError::EngineStopped;
        assert!(err.is_fatal());
        assert!(err.to_string().contains("stopped"));
    }

    #[test]
    fn test_spawn_error_is_fatal() {
        let err = WatchError::Spawn {
            thread: "regwatch-tree".to_owned(),
            source: std::io::Error::other("no threads left"),
        };
        assert!(err.is_fatal());
        assert!(err.to_string().contains("regwatch-tree"));
    }

    #[test]
    fn test_key_not_found_display() {
        let err = WatchError::key_not_found("HKEY_USERS\\missing");
        assert_eq!(err.to_string(), "key not found: HKEY_USERS\\missing");
    }
}
