//! Key paths and the root allow-list.
//!
//! A watched key is written as segments joined by [`PATH_DELIMITER`], for
//! example `HKCU\Software\regwatch`. The first segment must name one of the
//! well-known roots in a [`RootSet`]; aliases such as `HKCU` are resolved to
//! their canonical name (`HKEY_CURRENT_USER`) so that every key reported back
//! to listeners uses one spelling.
//!
//! # Examples
//!
//! ```
//! use rw_core::{KeyPath, RootSet};
//!
//! let roots = RootSet::registry();
//! let path = KeyPath::parse("HKCU\\Software\\regwatch", &roots)?;
//! assert_eq!(path.root(), "HKEY_CURRENT_USER");
//! assert_eq!(path.segments(), ["Software", "regwatch"]);
//! assert_eq!(path.to_string(), "HKEY_CURRENT_USER\\Software\\regwatch");
//! # Ok::<(), rw_core::PathError>(())
//! ```

use std::fmt;

use smallvec::SmallVec;

use crate::error::PathError;

/// The single character separating key segments.
pub const PATH_DELIMITER: char = '\\';

/// One allowed root: its canonical name plus any short aliases.
#[derive(Debug, Clone, PartialEq, Eq)]
struct RootEntry {
    canonical: String,
    aliases: SmallVec<[String; 2]>,
}

/// The fixed allow-list of top-level roots a key may start with.
///
/// Matching is exact and case-sensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RootSet {
    entries: Vec<RootEntry>,
}

impl RootSet {
    /// Creates an empty root set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the standard registry hives and their short aliases.
    ///
    /// # Examples
    ///
    /// ```
    /// use rw_core::RootSet;
    ///
    /// let roots = RootSet::registry();
    /// assert_eq!(roots.resolve("HKLM"), Some("HKEY_LOCAL_MACHINE"));
    /// assert_eq!(roots.resolve("HKEY_USERS"), Some("HKEY_USERS"));
    /// assert_eq!(roots.resolve("hklm"), None);
    /// ```
    #[must_use]
    pub fn registry() -> Self {
        Self::new()
            .with_root("HKEY_CLASSES_ROOT", &["HKCR"])
            .with_root("HKEY_CURRENT_CONFIG", &["HKCC"])
            .with_root("HKEY_CURRENT_USER", &["HKCU"])
            .with_root("HKEY_CURRENT_USER_LOCAL_SETTINGS", &[])
            .with_root("HKEY_LOCAL_MACHINE", &["HKLM"])
            .with_root("HKEY_PERFORMANCE_DATA", &[])
            .with_root("HKEY_PERFORMANCE_NLSTEXT", &[])
            .with_root("HKEY_PERFORMANCE_TEXT", &[])
            .with_root("HKEY_USERS", &["HKU"])
    }

    /// Adds a root with the given aliases.
    ///
    /// Adding a canonical name twice replaces the earlier aliases.
    #[must_use]
    pub fn with_root(mut self, canonical: impl Into<String>, aliases: &[&str]) -> Self {
        let canonical = canonical.into();
        let aliases = aliases.iter().map(|alias| (*alias).to_owned()).collect();
        if let Some(entry) = self.entries.iter_mut().find(|e| e.canonical == canonical) {
            entry.aliases = aliases;
        } else {
            self.entries.push(RootEntry { canonical, aliases });
        }
        self
    }

    /// Resolves a root name or alias to its canonical name.
    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.canonical == name || e.aliases.iter().any(|a| a == name))
            .map(|e| e.canonical.as_str())
    }

    /// Returns `true` if `name` is a canonical root name or alias.
    #[inline]
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.resolve(name).is_some()
    }

    /// Iterates over the canonical root names in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.canonical.as_str())
    }

    /// Returns the number of roots.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no roots are allowed.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A validated key: a canonical root name followed by zero or more segments.
///
/// Parsed keys always have at least one segment; root-only paths are built
/// internally with [`KeyPath::from_root`] for the top level of the watch tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyPath {
    root: String,
    segments: SmallVec<[String; 6]>,
}

impl KeyPath {
    /// Parses and validates a key string against `roots`.
    ///
    /// # Errors
    ///
    /// - [`PathError::Empty`] if `input` is empty
    /// - [`PathError::InvalidRoot`] if the first segment is not in `roots`
    /// - [`PathError::NoSubkey`] if no segment follows the root
    /// - [`PathError::EmptySegment`] on a doubled or trailing delimiter
    pub fn parse(input: &str, roots: &RootSet) -> Result<Self, PathError> {
        if input.is_empty() {
            return Err(PathError::Empty);
        }

        let mut parts = input.split(PATH_DELIMITER);
        let root_name = parts.next().unwrap_or_default();
        let root = roots
            .resolve(root_name)
            .ok_or_else(|| PathError::InvalidRoot(root_name.to_owned()))?;

        let mut segments = SmallVec::new();
        for (offset, part) in parts.enumerate() {
            if part.is_empty() {
                return Err(PathError::EmptySegment {
                    key: input.to_owned(),
                    index: offset + 1,
                });
            }
            segments.push(part.to_owned());
        }

        if segments.is_empty() {
            return Err(PathError::NoSubkey);
        }

        Ok(Self {
            root: root.to_owned(),
            segments,
        })
    }

    /// Creates a path naming only a root. The name is not validated.
    #[must_use]
    pub fn from_root(root: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            segments: SmallVec::new(),
        }
    }

    /// Returns a new path with `name` appended.
    #[must_use]
    pub fn child(&self, name: &str) -> Self {
        let mut segments = self.segments.clone();
        segments.push(name.to_owned());
        Self {
            root: self.root.clone(),
            segments,
        }
    }

    /// The canonical root name.
    #[inline]
    #[must_use]
    pub fn root(&self) -> &str {
        &self.root
    }

    /// The segments below the root.
    #[inline]
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// The last segment, or the root name for a root-only path.
    #[must_use]
    pub fn name(&self) -> &str {
        self.segments.last().map_or(self.root.as_str(), String::as_str)
    }

    /// Number of segments below the root.
    #[inline]
    #[must_use]
    pub fn depth(&self) -> usize {
        self.segments.len()
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.root)?;
        for segment in &self.segments {
            write!(f, "{PATH_DELIMITER}{segment}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_resolves_alias() {
        let roots = RootSet::registry();
        let path = KeyPath::parse("HKCU\\SOFTWARE\\regwatch", &roots).unwrap();
        assert_eq!(path.root(), "HKEY_CURRENT_USER");
        assert_eq!(path.depth(), 2);
        assert_eq!(path.name(), "regwatch");
        assert_eq!(path.to_string(), "HKEY_CURRENT_USER\\SOFTWARE\\regwatch");
    }

    #[test]
    fn test_parse_rejects_empty() {
        let roots = RootSet::registry();
        assert_eq!(KeyPath::parse("", &roots), Err(PathError::Empty));
    }

    #[test]
    fn test_parse_rejects_unknown_root() {
        let roots = RootSet::registry();
        assert_eq!(
            KeyPath::parse("foo\\bar", &roots),
            Err(PathError::InvalidRoot("foo".to_owned()))
        );
    }

    #[test]
    fn test_parse_rejects_root_without_subkey() {
        let roots = RootSet::registry();
        assert_eq!(KeyPath::parse("HKLM", &roots), Err(PathError::NoSubkey));
    }

    #[test]
    fn test_parse_rejects_empty_segments() {
        let roots = RootSet::registry();
        assert!(matches!(
            KeyPath::parse("HKLM\\Software\\\\x", &roots),
            Err(PathError::EmptySegment { index: 2, .. })
        ));
        assert!(matches!(
            KeyPath::parse("HKLM\\Software\\", &roots),
            Err(PathError::EmptySegment { index: 2, .. })
        ));
    }

    #[test]
    fn test_root_matching_is_case_sensitive() {
        let roots = RootSet::registry();
        assert!(roots.contains("HKCU"));
        assert!(!roots.contains("hkcu"));
    }

    #[test]
    fn test_root_path_and_child() {
        let root = KeyPath::from_root("HKEY_USERS");
        assert_eq!(root.depth(), 0);
        assert_eq!(root.name(), "HKEY_USERS");

        let child = root.child(".DEFAULT");
        assert_eq!(child.to_string(), "HKEY_USERS\\.DEFAULT");
        assert_eq!(child.name(), ".DEFAULT");
        assert_eq!(child.depth(), 1);
    }

    #[test]
    fn test_custom_root_set() {
        let roots = RootSet::new().with_root("work", &["w"]);
        assert_eq!(roots.len(), 1);
        let path = KeyPath::parse("w\\src", &roots).unwrap();
        assert_eq!(path.to_string(), "work\\src");
        assert_eq!(roots.names().collect::<Vec<_>>(), vec!["work"]);
    }
}
