//! Core types, errors, and configuration for regwatch.
//!
//! This crate provides the foundational types shared across the workspace:
//!
//! - [`KeyPath`] and [`RootSet`] for parsing and validating watched keys
//! - Event types delivered to listeners ([`ChangeEvent`], [`EventKind`])
//! - Value and listing types returned by resource queries
//! - Configuration structures ([`Config`], [`EngineConfig`])
//! - Error types for consistent error handling
//! - Type aliases for `FxHashMap`/`FxHashSet` (faster than std)

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod hash;
pub mod path;
pub mod types;

pub use config::{Config, EngineConfig, FsRootConfig, RESERVED_WAIT_SLOTS};
pub use error::{ConfigError, PathError};
pub use hash::{FxHashMap, FxHashSet};
pub use path::{KeyPath, PATH_DELIMITER, RootSet};
pub use types::{ChangeEvent, EventKind, KeyListing, Value};
