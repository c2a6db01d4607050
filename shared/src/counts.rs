//! Counted maps keyed by catalog identity
//!
//! Both unit pools and building pools are stored as a `CountMap`: a map from a
//! catalog id to a non-negative count. Iteration follows id order, which is the
//! order entries appear in the catalog, so every pass over a pool is
//! deterministic regardless of how it was built.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Map from a catalog id to a count, iterated in catalog order
///
/// Entries whose count drops to zero are removed so that two maps describing
/// the same pool always compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CountMap<K: Ord> {
    counts: BTreeMap<K, u32>,
}

impl<K: Ord> Default for CountMap<K> {
    fn default() -> Self {
        Self {
            counts: BTreeMap::new(),
        }
    }
}

impl<K: Ord + Copy> CountMap<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the count stored for `key`, zero when absent
    pub fn get(&self, key: K) -> u32 {
        self.counts.get(&key).copied().unwrap_or(0)
    }

    /// Overwrites the count for `key`
    pub fn set(&mut self, key: K, count: u32) {
        if count == 0 {
            self.counts.remove(&key);
        } else {
            self.counts.insert(key, count);
        }
    }

    /// Increases the count for `key`, saturating at `u32::MAX`
    pub fn add(&mut self, key: K, count: u32) {
        let current = self.get(key);
        self.set(key, current.saturating_add(count));
    }

    /// Decreases the count for `key` without going below zero
    ///
    /// Returns how many were actually removed, which is less than `count`
    /// when the map held fewer.
    pub fn remove(&mut self, key: K, count: u32) -> u32 {
        let current = self.get(key);
        let removed = current.min(count);
        self.set(key, current - removed);
        removed
    }

    /// Adds every entry of `other` into this map
    pub fn merge(&mut self, other: &CountMap<K>) {
        for (key, count) in other.iter() {
            self.add(key, count);
        }
    }

    /// Iterates over non-zero entries in catalog order
    pub fn iter(&self) -> impl Iterator<Item = (K, u32)> + '_ {
        self.counts.iter().map(|(key, count)| (*key, *count))
    }

    /// Sum of all counts
    pub fn total(&self) -> u64 {
        self.counts.values().map(|count| u64::from(*count)).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Resets every count to zero
    pub fn clear(&mut self) {
        self.counts.clear();
    }
}

impl<K: Ord + Copy> FromIterator<(K, u32)> for CountMap<K> {
    fn from_iter<I: IntoIterator<Item = (K, u32)>>(iter: I) -> Self {
        let mut map = CountMap::new();
        for (key, count) in iter {
            map.add(key, count);
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_key_is_zero() {
        let map: CountMap<u16> = CountMap::new();
        assert_eq!(map.get(3), 0);
        assert!(map.is_empty());
    }

    #[test]
    fn test_add_and_remove() {
        let mut map = CountMap::new();
        map.add(1u16, 5);
        map.add(1u16, 2);
        assert_eq!(map.get(1), 7);

        assert_eq!(map.remove(1, 3), 3);
        assert_eq!(map.get(1), 4);
    }

    #[test]
    fn test_remove_never_goes_negative() {
        let mut map = CountMap::new();
        map.add(2u16, 3);

        let removed = map.remove(2, 10);
        assert_eq!(removed, 3);
        assert_eq!(map.get(2), 0);
        assert!(map.is_empty());
    }

    #[test]
    fn test_zero_entries_are_dropped() {
        let mut a = CountMap::new();
        a.add(1u16, 2);
        a.remove(1, 2);
        a.set(4, 0);

        let b: CountMap<u16> = CountMap::new();
        assert_eq!(a, b);
    }

    #[test]
    fn test_iteration_follows_key_order() {
        let map: CountMap<u16> = vec![(5, 1), (0, 2), (3, 4)].into_iter().collect();
        let keys: Vec<u16> = map.iter().map(|(key, _)| key).collect();
        assert_eq!(keys, vec![0, 3, 5]);
        assert_eq!(map.total(), 7);
    }

    #[test]
    fn test_merge_accumulates() {
        let mut a: CountMap<u16> = vec![(0, 2), (1, 1)].into_iter().collect();
        let b: CountMap<u16> = vec![(1, 4), (2, 3)].into_iter().collect();
        a.merge(&b);

        assert_eq!(a.get(0), 2);
        assert_eq!(a.get(1), 5);
        assert_eq!(a.get(2), 3);
    }
}
