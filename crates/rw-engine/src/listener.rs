//! Listener callbacks.

use std::fmt;
use std::sync::Arc;

use rw_core::ChangeEvent;

/// A callback invoked with every change delivered for a watched key.
///
/// Listeners compare by identity: clones of one `Listener` are the same
/// listener, two listeners built from identical closures are not. Removing a
/// listener removes every registration of it on the key.
///
/// # Examples
///
/// ```
/// use rw_engine::Listener;
///
/// let listener = Listener::new(|event| println!("{event}"));
/// let same = listener.clone();
/// assert!(listener.same_as(&same));
/// assert!(!listener.same_as(&Listener::new(|_| {})));
/// ```
#[derive(Clone)]
pub struct Listener(Arc<dyn Fn(&ChangeEvent) + Send + Sync>);

impl Listener {
    /// Wraps a callback.
    pub fn new(callback: impl Fn(&ChangeEvent) + Send + Sync + 'static) -> Self {
        Self(Arc::new(callback))
    }

    /// Invokes the callback.
    #[inline]
    pub fn call(&self, event: &ChangeEvent) {
        (self.0)(event);
    }

    /// Returns `true` if both values refer to the same callback.
    #[inline]
    #[must_use]
    pub fn same_as(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for Listener {
    fn eq(&self, other: &Self) -> bool {
        self.same_as(other)
    }
}

impl Eq for Listener {}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Listener")
            .field(&Arc::as_ptr(&self.0).cast::<()>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rw_core::EventKind;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_call_invokes_callback() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let listener = Listener::new(move |event| {
            assert_eq!(event.kind, EventKind::Change);
            counter.fetch_add(1, Ordering::SeqCst);
        });

        listener.call(&ChangeEvent::new(EventKind::Change, "HKEY_USERS\\x"));
        listener.clone().call(&ChangeEvent::new(EventKind::Change, "HKEY_USERS\\x"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_identity_equality() {
        let a = Listener::new(|_| {});
        let b = Listener::new(|_| {});
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }
}
