//! Stored values and key listings.
//!
//! These are the shapes returned by the query side of a resource source
//! (`get` and `list`). The watch engine itself never reads values; it only
//! reports that something changed.

use serde::{Deserialize, Serialize};

/// A value stored under a key.
///
/// Serialized externally tagged, e.g. `{"string": "bar"}` or `{"dword": 1}`.
/// [`Value::None`] serializes as the bare string `"none"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    /// A value with no data.
    None,
    /// A string.
    String(String),
    /// A string that may contain unexpanded environment references.
    ExpandString(String),
    /// A list of strings.
    MultiString(Vec<String>),
    /// A 32-bit number.
    Dword(u32),
    /// A 64-bit number.
    Qword(u64),
    /// Raw bytes.
    Binary(Vec<u8>),
}

impl Value {
    /// Returns the conventional type name for this value.
    ///
    /// # Examples
    ///
    /// ```
    /// use rw_core::Value;
    ///
    /// assert_eq!(Value::Dword(1).type_name(), "REG_DWORD");
    /// assert_eq!(Value::String("x".into()).type_name(), "REG_SZ");
    /// ```
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::None => "REG_NONE",
            Self::String(_) => "REG_SZ",
            Self::ExpandString(_) => "REG_EXPAND_SZ",
            Self::MultiString(_) => "REG_MULTI_SZ",
            Self::Dword(_) => "REG_DWORD",
            Self::Qword(_) => "REG_QWORD",
            Self::Binary(_) => "REG_BINARY",
        }
    }

    /// Builds a value from raw bytes, preferring a string when they are UTF-8.
    #[must_use]
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        match String::from_utf8(bytes) {
            Ok(text) => Self::String(text),
            Err(err) => Self::Binary(err.into_bytes()),
        }
    }
}

/// The immediate contents of one key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyListing {
    /// Canonical name of the root the key lives under.
    pub resolved_root: String,

    /// The key below the root, segments joined by the delimiter.
    pub key: String,

    /// Names of the immediate subkeys, sorted.
    pub subkeys: Vec<String>,

    /// Names of the values stored directly under the key, sorted.
    pub values: Vec<String>,
}
