//! Fast hash map and hash set type aliases.
//!
//! The engine keys most of its internal maps by short key names or small
//! integer ids, which is exactly where the Fx hash from `rustc-hash` beats
//! the default SipHash. None of these maps are exposed to untrusted input,
//! so denial-of-service resistance is not needed.
//!
//! # Examples
//!
//! ```
//! use rw_core::FxHashMap;
//!
//! let mut handles: FxHashMap<u64, &str> = FxHashMap::default();
//! handles.insert(7, "HKEY_CURRENT_USER\\Software");
//! assert_eq!(handles.get(&7), Some(&"HKEY_CURRENT_USER\\Software"));
//! ```

/// A [`HashMap`](std::collections::HashMap) using the Fx hash algorithm.
pub type FxHashMap<K, V> = rustc_hash::FxHashMap<K, V>;

/// A [`HashSet`](std::collections::HashSet) using the Fx hash algorithm.
pub type FxHashSet<V> = rustc_hash::FxHashSet<V>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fx_hash_map_operations() {
        let mut map: FxHashMap<u64, &str> = FxHashMap::default();
        map.insert(1, "Software");
        map.insert(2, "Classes");
        assert_eq!(map.get(&1), Some(&"Software"));
        assert_eq!(map.remove(&2), Some("Classes"));
        assert!(map.get(&2).is_none());
    }

    #[test]
    fn test_fx_hash_set_operations() {
        let mut set: FxHashSet<&str> = FxHashSet::default();
        assert!(set.insert("HKCU"));
        assert!(!set.insert("HKCU"));
        assert!(set.contains("HKCU"));
        assert!(!set.contains("HKLM"));
    }
}
