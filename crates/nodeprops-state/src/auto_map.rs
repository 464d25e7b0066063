//! Map wrapper that materializes a value on first access.

use std::borrow::Borrow;
use std::collections::hash_map::{self, HashMap};
use std::hash::Hash;

/// A `HashMap` whose mutable lookup inserts a freshly created value on a
/// miss. Read-only lookups never insert.
pub struct AutoCreationMap<K, V> {
    entries: HashMap<K, V>,
    factory: fn(&K) -> V,
}

impl<K: Eq + Hash + Clone, V> AutoCreationMap<K, V> {
    /// Create a map that builds missing entries with `factory`.
    pub fn with_factory(factory: fn(&K) -> V) -> Self {
        Self {
            entries: HashMap::new(),
            factory,
        }
    }

    /// Get the entry for `key`, creating it first if absent.
    pub fn get_or_create(&mut self, key: &K) -> &mut V {
        let factory = self.factory;
        self.entries
            .entry(key.clone())
            .or_insert_with(|| factory(key))
    }

    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.get(key)
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.contains_key(key)
    }

    pub fn iter(&self) -> hash_map::Iter<'_, K, V> {
        self.entries.iter()
    }

    pub fn keys(&self) -> hash_map::Keys<'_, K, V> {
        self.entries.keys()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Eq + Hash + Clone, V: Default> AutoCreationMap<K, V> {
    /// Create a map that fills misses with `V::default()`.
    pub fn new() -> Self {
        Self::with_factory(|_| V::default())
    }
}

impl<K: Eq + Hash + Clone, V: Default> Default for AutoCreationMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: std::fmt::Debug, V: std::fmt::Debug> std::fmt::Debug for AutoCreationMap<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map().entries(self.entries.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_or_create_inserts_once() {
        let mut map: AutoCreationMap<String, Vec<u32>> = AutoCreationMap::new();
        map.get_or_create(&"a".to_string()).push(1);
        map.get_or_create(&"a".to_string()).push(2);
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("a"), Some(&vec![1, 2]));
    }

    #[test]
    fn test_get_does_not_insert() {
        let map: AutoCreationMap<String, Vec<u32>> = AutoCreationMap::new();
        assert!(map.get("missing").is_none());
        assert!(map.is_empty());
    }

    #[test]
    fn test_custom_factory_sees_key() {
        let mut map: AutoCreationMap<u32, String> =
            AutoCreationMap::with_factory(|k| format!("entry-{k}"));
        assert_eq!(map.get_or_create(&7), "entry-7");
        assert!(map.contains_key(&7));
    }
}
