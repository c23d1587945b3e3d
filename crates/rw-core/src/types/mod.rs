//! Domain types shared by the engine, the resource sources and the CLI.
//!
//! # Module Organization
//!
//! - [`event`] - Change events delivered to listeners
//! - [`value`] - Stored values and key listings returned by queries
//!
//! All public types are re-exported here and at the crate root:
//!
//! ```
//! use rw_core::{ChangeEvent, EventKind, KeyListing, Value};
//! ```

mod event;
mod value;

pub use event::{ChangeEvent, EventKind};
pub use value::{KeyListing, Value};
