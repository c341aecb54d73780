//! Generic 1:1 bidirectional map.
//!
//! [`BiMap`] keeps a forward and a reverse ordered map in lockstep and is the
//! foundation for every cache in the engine: book↔spell, spell↔scroll,
//! old-id↔new-id relocation, and fusion-pair↔result.
//!
//! `insert` overwrites the forward binding for the key and the reverse binding
//! for the value *independently* — it is not a transaction. A caller replacing
//! one side of an existing pairing must `erase_key`/`erase_value` first if it
//! needs stale reverse entries gone.

use std::collections::BTreeMap;

use crate::error::{CacheError, ForgeResult};

/// Ordered-map-backed bidirectional 1:1 index with logarithmic lookups
/// in either direction.
#[derive(Debug, Clone)]
pub struct BiMap<K, V> {
    forward: BTreeMap<K, V>,
    reverse: BTreeMap<V, K>,
}

impl<K: Ord + Clone, V: Ord + Clone> BiMap<K, V> {
    /// Create a new empty map.
    pub fn new() -> Self {
        Self {
            forward: BTreeMap::new(),
            reverse: BTreeMap::new(),
        }
    }

    /// Bind `key` ↔ `value`, overwriting any existing forward binding for
    /// `key` and any existing reverse binding for `value`.
    pub fn insert(&mut self, key: K, value: V) {
        self.forward.insert(key.clone(), value.clone());
        self.reverse.insert(value, key);
    }

    /// Forward lookup. Fails with [`CacheError::KeyNotFound`] if absent.
    pub fn get_value(&self, key: &K) -> ForgeResult<&V> {
        self.forward.get(key).ok_or(CacheError::KeyNotFound.into())
    }

    /// Forward lookup returning `None` if absent.
    pub fn get_value_opt(&self, key: &K) -> Option<&V> {
        self.forward.get(key)
    }

    /// Reverse lookup. Fails with [`CacheError::ValueNotFound`] if absent.
    pub fn get_key(&self, value: &V) -> ForgeResult<&K> {
        self.reverse
            .get(value)
            .ok_or(CacheError::ValueNotFound.into())
    }

    /// Reverse lookup returning `None` if absent.
    pub fn get_key_opt(&self, value: &V) -> Option<&K> {
        self.reverse.get(value)
    }

    /// Whether a forward binding exists for `key`.
    pub fn contains_key(&self, key: &K) -> bool {
        self.forward.contains_key(key)
    }

    /// Whether a reverse binding exists for `value`.
    pub fn contains_value(&self, value: &V) -> bool {
        self.reverse.contains_key(value)
    }

    /// Remove the forward entry for `key` and its paired reverse entry.
    pub fn erase_key(&mut self, key: &K) {
        if let Some(value) = self.forward.remove(key) {
            self.reverse.remove(&value);
        }
    }

    /// Remove the reverse entry for `value` and its paired forward entry.
    pub fn erase_value(&mut self, value: &V) {
        if let Some(key) = self.reverse.remove(value) {
            self.forward.remove(&key);
        }
    }

    /// Drop all entries.
    pub fn clear(&mut self) {
        self.forward.clear();
        self.reverse.clear();
    }

    /// Number of forward entries.
    pub fn len(&self) -> usize {
        self.forward.len()
    }

    /// Whether the map holds no entries.
    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    /// Iterate forward entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.forward.iter()
    }
}

impl<K: Ord + Clone, V: Ord + Clone> Default for BiMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_lookup_both_directions() {
        let mut map = BiMap::new();
        map.insert(1u32, "one".to_string());
        map.insert(2, "two".to_string());

        assert_eq!(map.get_value(&1).unwrap(), "one");
        assert_eq!(*map.get_key(&"two".to_string()).unwrap(), 2);
        assert!(map.contains_key(&1));
        assert!(map.contains_value(&"one".to_string()));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn missing_lookups_fail_or_return_none() {
        let map: BiMap<u32, String> = BiMap::new();
        assert!(map.get_value(&9).is_err());
        assert!(map.get_key(&"nine".to_string()).is_err());
        assert!(map.get_value_opt(&9).is_none());
        assert!(map.get_key_opt(&"nine".to_string()).is_none());
    }

    #[test]
    fn erase_key_removes_both_sides() {
        let mut map = BiMap::new();
        map.insert(1u32, 100u32);
        map.erase_key(&1);
        assert!(!map.contains_key(&1));
        assert!(!map.contains_value(&100));
        assert!(map.is_empty());
    }

    #[test]
    fn erase_value_removes_both_sides() {
        let mut map = BiMap::new();
        map.insert(1u32, 100u32);
        map.erase_value(&100);
        assert!(!map.contains_key(&1));
        assert!(!map.contains_value(&100));
    }

    #[test]
    fn insert_overwrites_sides_independently() {
        let mut map = BiMap::new();
        map.insert(1u32, 100u32);
        map.insert(1, 200);

        assert_eq!(*map.get_value(&1).unwrap(), 200);
        assert_eq!(*map.get_key(&200).unwrap(), 1);
        // The stale reverse entry for 100 is deliberately left behind;
        // callers erase first when they need clean replacement.
        assert!(map.contains_value(&100));
    }

    #[test]
    fn clear_empties_everything() {
        let mut map = BiMap::new();
        map.insert(1u32, 2u32);
        map.insert(3, 4);
        map.clear();
        assert!(map.is_empty());
        assert!(!map.contains_value(&2));
    }

    #[test]
    fn pair_keys_are_usable() {
        // Fusion cache shape: unordered pair handled at the call site by
        // probing both orders.
        let mut map = BiMap::new();
        map.insert((1u32, 2u32), 77u32);
        assert!(map.contains_key(&(1, 2)));
        assert!(!map.contains_key(&(2, 1)));
        assert_eq!(*map.get_key(&77).unwrap(), (1, 2));
    }
}
