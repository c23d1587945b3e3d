//! Error types for the rw-core crate.
//!
//! This module provides [`ConfigError`] for configuration loading and
//! validation, and [`PathError`] for keys that fail to parse. Both are user
//! input errors: they are reported synchronously and never reach the watch
//! tree.

use camino::Utf8PathBuf;

/// Errors that can occur during configuration loading and validation.
///
/// # Examples
///
/// ```
/// use rw_core::ConfigError;
/// use camino::Utf8PathBuf;
///
/// let error = ConfigError::MissingDirectory(Utf8PathBuf::from("/srv/watched"));
/// assert!(error.to_string().contains("/srv/watched"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required directory does not exist.
    #[error("missing required directory: {0}")]
    MissingDirectory(Utf8PathBuf),

    /// A configuration option has an invalid value.
    #[error("invalid configuration option '{option}': {reason}")]
    InvalidOption {
        /// The name of the invalid option.
        option: String,
        /// Explanation of why the option is invalid.
        reason: String,
    },

    /// An I/O error occurred while reading configuration.
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

impl ConfigError {
    /// Creates a new [`ConfigError::InvalidOption`] error.
    #[inline]
    pub fn invalid_option(option: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidOption {
            option: option.into(),
            reason: reason.into(),
        }
    }
}

/// Errors produced while parsing a key string into a [`KeyPath`](crate::KeyPath).
///
/// Each variant carries a stable machine-readable code via [`PathError::code`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    /// The key string was empty.
    #[error("expected key to be a non-empty string")]
    Empty,

    /// The first segment does not name a known root.
    #[error("invalid root key \"{0}\"")]
    InvalidRoot(String),

    /// The key names a root but no subkey below it.
    #[error("expected key to contain both a root and subkey")]
    NoSubkey,

    /// The key contains an empty segment (doubled or trailing delimiter).
    #[error("empty segment at position {index} in key \"{key}\"")]
    EmptySegment {
        /// The offending key string.
        key: String,
        /// Zero-based index of the empty segment.
        index: usize,
    },

    /// A segment the source cannot treat as a plain name, such as `..`.
    #[error("segment \"{segment}\" of key \"{key}\" is not a plain name")]
    InvalidSegment {
        /// The offending key.
        key: String,
        /// The rejected segment or value name.
        segment: String,
    },
}

impl PathError {
    /// Returns a stable error code for this error.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Empty | Self::EmptySegment { .. } | Self::InvalidSegment { .. } => {
                "ERR_INVALID_KEY"
            }
            Self::InvalidRoot(_) => "ERR_INVALID_ROOT",
            Self::NoSubkey => "ERR_NO_SUBKEY",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_option_display() {
        let error = ConfigError::invalid_option("max_shards", "must be at least 1");
        let msg = error.to_string();
        assert!(msg.contains("max_shards"));
        assert!(msg.contains("must be at least 1"));
    }

    #[test]
    fn test_path_error_codes() {
        assert_eq!(PathError::Empty.code(), "ERR_INVALID_KEY");
        assert_eq!(PathError::NoSubkey.code(), "ERR_NO_SUBKEY");
        assert_eq!(
            PathError::InvalidRoot("foo".to_owned()).code(),
            "ERR_INVALID_ROOT"
        );
        assert_eq!(
            PathError::InvalidSegment {
                key: "work\\..".to_owned(),
                segment: "..".to_owned(),
            }
            .code(),
            "ERR_INVALID_KEY"
        );
    }

    #[test]
    fn test_invalid_root_display() {
        let error = PathError::InvalidRoot("foo".to_owned());
        assert_eq!(error.to_string(), "invalid root key \"foo\"");
    }
}
