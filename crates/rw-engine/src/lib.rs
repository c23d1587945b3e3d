//! Watch engine for hierarchical key/value stores.
//!
//! This crate lets a program subscribe to keys of a hierarchical store (the
//! Windows registry model: roots, keys, subkeys and values, any of which can
//! change out-of-band) and receive `add`, `change` and `delete` events for
//! them on a thread of its choosing.
//!
//! # Overview
//!
//! - A **watch tree** holds one node per watched key segment. Nodes stay in
//!   the tree while their key is absent, so a listener survives a delete and
//!   hears the `add` when the key comes back.
//! - Every tree mutation runs on a single **owner thread**: subscribe and
//!   unsubscribe requests and the reconciles triggered by change signals.
//! - **Worker shards** wait on the nodes' signals. A wait set is bounded, so
//!   nodes are spread across shards and subscriptions beyond the configured
//!   capacity are rejected.
//! - Changes are queued with at most one pending record per node and
//!   delivered by the **dispatcher** on the consumer thread.
//!
//! # Architecture
//!
//! ```text
//!  consumer thread                     owner thread                 shard threads
//! ┌──────────────────┐  Configure    ┌──────────────────────┐     ┌──────────────┐
//! │ Engine::subscribe│ ────────────► │ Registrar            │     │ shard 0      │
//! │ Engine::watch    │  (reply)      │   WatchTree (arena)  │ ──► │ wait_any(..) │
//! └──────────────────┘ ◄──────────── │   ActiveIndex        │     ├──────────────┤
//!                                    │ ShardPool            │     │ shard N      │
//! ┌──────────────────┐               │                      │ ◄── │ Fired(node)  │
//! │ dispatch_pending │ ◄──────────── │ reconcile ─► queue   │     └──────────────┘
//! │   listeners run  │  ChangeQueue  └──────────────────────┘            ▲
//! └──────────────────┘                                                   │ signals
//!                                           ResourceSource ──────────────┘
//! ```
//!
//! # Crate Dependencies
//!
//! ```text
//! rw-cli ──► rw-engine ──► rw-core
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use rw_core::EngineConfig;
//! use rw_engine::{Engine, Listener, MemoryStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), rw_engine::WatchError> {
//!     let store = MemoryStore::new();
//!     let engine = Engine::start(store.clone(), EngineConfig::default())?;
//!
//!     let _watch = engine.watch(
//!         "HKCU\\Software\\regwatch",
//!         Listener::new(|event| println!("{} {}", event.kind, event.key)),
//!     )?;
//!
//!     store.create_key("HKCU\\Software\\regwatch")?;
//!
//!     engine
//!         .run_dispatcher(async {
//!             let _ = tokio::signal::ctrl_c().await;
//!         })
//!         .await;
//!     engine.shutdown()
//! }
//! ```
//!
//! # Delivery Guarantees
//!
//! - Events for one node arrive in detection order; a `delete` is always
//!   reported before the `add` of a recreation, never in the same pass.
//! - A change detected while the node already has a record queued is
//!   dropped. Only the final state of a key is guaranteed to be observable,
//!   not every intermediate one.
//! - Deleting a key reports `delete` to the listeners of every watched key
//!   below it as well, deepest first.
//! - Listener panics are not caught and propagate out of
//!   [`Engine::dispatch_pending`].

#![deny(clippy::all)]
#![warn(missing_docs)]

mod active;
mod dispatcher;
mod engine;
pub mod error;
mod listener;
mod multiplexer;
mod node;
mod owner;
mod queue;
mod registrar;
pub mod signal;
pub mod source;
mod tree;

pub use dispatcher::DispatchReport;
pub use engine::{Engine, WatchHandle};
pub use error::WatchError;
pub use listener::Listener;
pub use owner::EngineStats;
pub use registrar::WatchAction;
pub use signal::{Signal, wait_any};
pub use source::{ArmStatus, FsHandle, FsSource, MemoryHandle, MemoryStore, ResourceSource};
