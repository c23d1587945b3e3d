//! Configuration structures for regwatch.
//!
//! - [`EngineConfig`] - Wait-set limits and worker thread naming
//! - [`FsRootConfig`] - A named root backed by a directory
//! - [`Config`] - Root configuration combining all settings
//!
//! All configuration types implement [`Default`]; missing fields in a JSON
//! file fall back to those defaults.

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::path::RootSet;

/// Wait slots every worker reserves for its terminate and refresh signals.
pub const RESERVED_WAIT_SLOTS: usize = 2;

/// Configuration for the watch engine.
///
/// A native wait-many primitive can only block on a bounded number of
/// objects at once. Each worker shard waits on at most
/// [`max_wait_objects`](Self::max_wait_objects) objects, two of which are its
/// own control signals; the engine runs at most
/// [`max_shards`](Self::max_shards) shards and rejects subscriptions that
/// would need more.
///
/// # Examples
///
/// ```
/// use rw_core::EngineConfig;
///
/// let config = EngineConfig::default();
/// assert_eq!(config.max_wait_objects, 64);
/// assert_eq!(config.shard_capacity(), 62);
/// assert_eq!(config.max_watched_nodes(), 62 * 16);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum objects a single worker waits on, control signals included.
    pub max_wait_objects: usize,

    /// Maximum number of worker shards.
    pub max_shards: usize,

    /// Prefix for the names of the threads the engine spawns.
    pub thread_name: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_wait_objects: 64,
            max_shards: 16,
            thread_name: "regwatch".to_owned(),
        }
    }
}

impl EngineConfig {
    /// Number of node handles one shard can wait on.
    #[inline]
    #[must_use]
    pub const fn shard_capacity(&self) -> usize {
        self.max_wait_objects.saturating_sub(RESERVED_WAIT_SLOTS)
    }

    /// Maximum number of live nodes the engine accepts.
    #[inline]
    #[must_use]
    pub const fn max_watched_nodes(&self) -> usize {
        self.shard_capacity().saturating_mul(self.max_shards)
    }

    /// Checks that the limits leave room for at least one watched node.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_wait_objects <= RESERVED_WAIT_SLOTS {
            return Err(ConfigError::invalid_option(
                "max_wait_objects",
                format!("must be greater than {RESERVED_WAIT_SLOTS}"),
            ));
        }
        if self.max_shards == 0 {
            return Err(ConfigError::invalid_option(
                "max_shards",
                "must be at least 1",
            ));
        }
        if self.thread_name.is_empty() {
            return Err(ConfigError::invalid_option(
                "thread_name",
                "must not be empty",
            ));
        }
        Ok(())
    }
}

/// A named root whose keys are the directories below `path`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FsRootConfig {
    /// Root name used as the first key segment.
    pub name: String,

    /// Directory the root maps to.
    pub path: Utf8PathBuf,
}

impl FsRootConfig {
    /// Parses a `NAME=DIR` pair.
    ///
    /// # Examples
    ///
    /// ```
    /// use rw_core::FsRootConfig;
    ///
    /// let root = FsRootConfig::parse("work=/srv/work")?;
    /// assert_eq!(root.name, "work");
    /// assert_eq!(root.path, "/srv/work");
    /// # Ok::<(), rw_core::ConfigError>(())
    /// ```
    pub fn parse(pair: &str) -> Result<Self, ConfigError> {
        let Some((name, path)) = pair.split_once('=') else {
            return Err(ConfigError::invalid_option(
                "root",
                format!("expected NAME=DIR, got '{pair}'"),
            ));
        };
        if name.is_empty() || path.is_empty() {
            return Err(ConfigError::invalid_option(
                "root",
                format!("expected NAME=DIR, got '{pair}'"),
            ));
        }
        Ok(Self {
            name: name.to_owned(),
            path: Utf8PathBuf::from(path),
        })
    }
}

/// Root configuration for regwatch.
///
/// # Examples
///
/// ```
/// use rw_core::Config;
///
/// let config: Config = serde_json::from_str(r#"{"engine": {"max_shards": 2}}"#)?;
/// assert_eq!(config.engine.max_shards, 2);
/// assert_eq!(config.engine.max_wait_objects, 64);
/// assert!(config.roots.is_empty());
/// # Ok::<(), serde_json::Error>(())
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Engine limits.
    pub engine: EngineConfig,

    /// Directory-backed roots for the filesystem source.
    pub roots: Vec<FsRootConfig>,
}

impl Config {
    /// Loads a configuration file in JSON format.
    pub fn load(path: &Utf8Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Validates engine limits and root definitions.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.engine.validate()?;
        for (index, root) in self.roots.iter().enumerate() {
            if root.name.is_empty() {
                return Err(ConfigError::invalid_option(
                    format!("roots[{index}].name"),
                    "must not be empty",
                ));
            }
            if self.roots[..index].iter().any(|r| r.name == root.name) {
                return Err(ConfigError::invalid_option(
                    format!("roots[{index}].name"),
                    format!("duplicate root '{}'", root.name),
                ));
            }
        }
        Ok(())
    }

    /// Builds the root allow-list for the configured directory roots.
    #[must_use]
    pub fn root_set(&self) -> RootSet {
        self.roots
            .iter()
            .fold(RootSet::new(), |set, root| set.with_root(root.name.as_str(), &[]))
    }
}
