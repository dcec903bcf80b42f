//! A mapping from key to value that also maintains keys in ascending value
//! order, with FIFO tie-breaking. Used by the shortest-path planner as its
//! frontier (a classic "decrease-key" priority queue would work too, but
//! this mirrors the structure the planner's reference implementation used
//! and keeps the tie-break behaviour explicit rather than incidental).

use std::collections::HashMap;
use std::hash::Hash;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValueOrderedMapError<K: std::fmt::Debug> {
    #[error("key {0:?} already present")]
    DuplicateKey(K),
}

/// Keys ordered by value ascending; ties broken by insertion order.
///
/// Insertion uses the right-hand binary search position (`partition_point`
/// over `<=`), the Rust equivalent of Python's `bisect_right`: it's what
/// preserves FIFO order among equal values, since a later insert with an
/// equal value lands after all earlier ones rather than before them.
#[derive(Debug, Clone)]
pub struct ValueOrderedMap<K, V> {
    ordered_keys: Vec<K>,
    ordered_values: Vec<V>,
    index: HashMap<K, V>,
}

impl<K, V> Default for ValueOrderedMap<K, V> {
    fn default() -> Self {
        ValueOrderedMap {
            ordered_keys: Vec::new(),
            ordered_values: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<K, V> ValueOrderedMap<K, V>
where
    K: Eq + Hash + Clone + std::fmt::Debug,
    V: Ord + Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.ordered_keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered_keys.is_empty()
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.index.contains_key(key)
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.index.get(key)
    }

    /// Inserts a new key/value pair, maintaining sort order.
    ///
    /// # Errors
    /// `DuplicateKey` if `key` is already present.
    pub fn insert(&mut self, key: K, value: V) -> Result<(), ValueOrderedMapError<K>> {
        if self.index.contains_key(&key) {
            return Err(ValueOrderedMapError::DuplicateKey(key));
        }
        let insert_at = self.ordered_values.partition_point(|v| *v <= value);
        self.ordered_keys.insert(insert_at, key.clone());
        self.ordered_values.insert(insert_at, value.clone());
        self.index.insert(key, value);
        Ok(())
    }

    /// Removes `key`, returning its value if present. O(n) in the number
    /// of entries, since the ordered vectors must stay aligned.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let value = self.index.remove(key)?;
        if let Some(pos) = self.ordered_keys.iter().position(|k| k == key) {
            self.ordered_keys.remove(pos);
            self.ordered_values.remove(pos);
        }
        Some(value)
    }

    /// Replaces the value for `key`, re-sorting it into its new position.
    /// Equivalent to `remove` followed by `insert`.
    pub fn set(&mut self, key: K, value: V) {
        self.remove(&key);
        self.insert(key, value)
            .expect("key was just removed, cannot be a duplicate");
    }

    /// Removes and returns the entry with the smallest value (ties broken
    /// by whichever was inserted first).
    pub fn pop_front(&mut self) -> Option<(K, V)> {
        if self.ordered_keys.is_empty() {
            return None;
        }
        let key = self.ordered_keys.remove(0);
        let value = self.ordered_values.remove(0);
        self.index.remove(&key);
        Some((key, value))
    }

    /// Iterates entries in ascending value order.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.ordered_keys.iter().zip(self.ordered_values.iter())
    }

    pub fn keys(&self) -> &[K] {
        &self.ordered_keys
    }

    pub fn values(&self) -> &[V] {
        &self.ordered_values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orders_by_value_with_fifo_ties() {
        let mut vom: ValueOrderedMap<&str, i64> = ValueOrderedMap::new();
        vom.insert("5th", 9).unwrap();
        vom.insert("3rd", 5).unwrap();
        vom.insert("1st", 3).unwrap();
        vom.insert("2nd", 3).unwrap();
        vom.insert("4th", 7).unwrap();

        assert_eq!(vom.keys(), &["1st", "2nd", "3rd", "4th", "5th"]);
        assert_eq!(vom.values(), &[3, 3, 5, 7, 9]);
    }

    #[test]
    fn pop_front_returns_smallest_then_next_fifo_tie() {
        let mut vom: ValueOrderedMap<&str, i64> = ValueOrderedMap::new();
        vom.insert("1st", 3).unwrap();
        vom.insert("2nd", 3).unwrap();
        vom.insert("3rd", 5).unwrap();

        assert_eq!(vom.pop_front(), Some(("1st", 3)));
        assert_eq!(vom.pop_front(), Some(("2nd", 3)));
        assert_eq!(vom.pop_front(), Some(("3rd", 5)));
        assert_eq!(vom.pop_front(), None);
    }

    #[test]
    fn insert_rejects_duplicate_keys() {
        let mut vom: ValueOrderedMap<&str, i64> = ValueOrderedMap::new();
        vom.insert("new", 8).unwrap();
        let err = vom.insert("new", 18).unwrap_err();
        assert_eq!(err, ValueOrderedMapError::DuplicateKey("new"));
        // no corruption from the rejected attempt
        assert_eq!(vom.get(&"new"), Some(&8));
    }

    #[test]
    fn set_reorders_an_existing_key() {
        let mut vom: ValueOrderedMap<&str, i64> = ValueOrderedMap::new();
        vom.insert("3rd", 5).unwrap();
        vom.insert("new", 8).unwrap();
        vom.insert("5th", 9).unwrap();
        vom.insert("4th", 7).unwrap();

        vom.set("4th", 14);

        assert_eq!(vom.keys(), &["3rd", "new", "5th", "4th"]);
        assert_eq!(vom.values(), &[5, 8, 9, 14]);
    }

    #[test]
    fn new_key_inserted_between_existing_values() {
        let mut vom: ValueOrderedMap<&str, i64> = ValueOrderedMap::new();
        vom.insert("2nd", 3).unwrap();
        vom.insert("3rd", 5).unwrap();
        vom.insert("4th", 7).unwrap();
        vom.insert("5th", 9).unwrap();

        vom.insert("new", 8).unwrap();

        assert_eq!(vom.keys(), &["2nd", "3rd", "4th", "new", "5th"]);
        assert_eq!(vom.values(), &[3, 5, 7, 8, 9]);
    }
}
