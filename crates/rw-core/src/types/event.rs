//! Change events delivered to listeners.

use std::fmt;

use serde::{Deserialize, Serialize};

/// What happened to a watched key.
///
/// # Examples
///
/// ```
/// use rw_core::EventKind;
///
/// assert_eq!(EventKind::Delete.as_str(), "delete");
/// assert_eq!(EventKind::Add.to_string(), "add");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    /// The key came into existence (or reappeared after a delete).
    Add,
    /// A value of the key, or the set of its immediate subkeys, changed.
    Change,
    /// The key stopped existing.
    Delete,
}

impl EventKind {
    /// Returns the lowercase wire name of this kind.
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Change => "change",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The payload handed to a listener: `{ "type": ..., "key": ... }`.
///
/// `key` is the full path of the node that changed, with the root spelled
/// by its canonical name.
///
/// # Examples
///
/// ```
/// use rw_core::{ChangeEvent, EventKind};
///
/// let event = ChangeEvent::new(EventKind::Change, "HKEY_CURRENT_USER\\Software");
/// let json = serde_json::to_string(&event)?;
/// assert_eq!(json, r#"{"type":"change","key":"HKEY_CURRENT_USER\\Software"}"#);
/// # Ok::<(), serde_json::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// What happened.
    #[serde(rename = "type")]
    pub kind: EventKind,

    /// Full key of the node the event is about.
    pub key: String,
}

impl ChangeEvent {
    /// Creates a new event.
    #[inline]
    #[must_use]
    pub fn new(kind: EventKind, key: impl Into<String>) -> Self {
        Self {
            kind,
            key: key.into(),
        }
    }
}

impl fmt::Display for ChangeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_kind_serialization() {
        assert_eq!(serde_json::to_string(&EventKind::Add).unwrap(), r#""add""#);
        assert_eq!(
            serde_json::to_string(&EventKind::Change).unwrap(),
            r#""change""#
        );
        assert_eq!(
            serde_json::to_string(&EventKind::Delete).unwrap(),
            r#""delete""#
        );
    }

    #[test]
    fn test_change_event_uses_type_field() {
        let event: ChangeEvent =
            serde_json::from_str(r#"{"type":"delete","key":"HKEY_USERS\\x"}"#).unwrap();
        assert_eq!(event.kind, EventKind::Delete);
        assert_eq!(event.key, "HKEY_USERS\\x");
    }

    #[test]
    fn test_change_event_display() {
        let event = ChangeEvent::new(EventKind::Add, "HKEY_USERS\\x");
        assert_eq!(event.to_string(), "add HKEY_USERS\\x");
    }
}
