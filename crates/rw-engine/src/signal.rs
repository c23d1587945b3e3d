//! Wait objects and the wait-many primitive.
//!
//! A [`Signal`] behaves like an auto-reset event: [`Signal::set`] leaves a
//! single permit behind if nobody is waiting, setting it again before the
//! permit is consumed has no further effect, and a wait consumes the permit.
//! Resource sources arm a node's signal and set it when the resource changes;
//! worker shards block in [`wait_any`] over many signals at once.

use std::sync::Arc;

use futures_util::future::select_all;
use tokio::sync::Notify;

/// An auto-reset wake object shared between a source and the engine.
#[derive(Debug, Clone, Default)]
pub struct Signal(Arc<Notify>);

impl Signal {
    /// Creates an unset signal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the signal, waking one waiter or storing a permit.
    #[inline]
    pub fn set(&self) {
        self.0.notify_one();
    }

    /// Waits until the signal is set, consuming the permit.
    pub async fn wait(&self) {
        self.0.notified().await;
    }

    /// Returns `true` if both handles refer to the same signal.
    #[inline]
    #[must_use]
    pub fn same_as(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// Waits until any signal in `signals` is set and returns its index.
///
/// When several signals are already set, the lowest index wins and the
/// others keep their permits for the next wait. An empty slice never
/// completes.
pub async fn wait_any(signals: &[Signal]) -> usize {
    if signals.is_empty() {
        std::future::pending::<()>().await;
    }
    let waits = signals.iter().map(|signal| Box::pin(signal.0.notified()));
    let ((), index, _rest) = select_all(waits).await;
    index
}
