//! An insertion-ordered map backed by a vector of pairs, used for the members of a decoded
//! text object.
//!
//! Member order is meaningful to schema-less consumers, so members live in a [`Vec`] and
//! lookups are linear scans. A map built from wire-order pairs resolves repeated keys in a
//! single hashed pass.
//!
//! # Example
//!
//! ```
//! use graphwire::fieldmap::FieldMap;
//!
//! let mut members = FieldMap::new();
//! members.insert("b", 2);
//! members.insert("a", 1);
//!
//! // order of insertion is kept
//! let keys: Vec<_> = members.keys().cloned().collect();
//! assert_eq!(keys, vec!["b", "a"]);
//!
//! // a repeated key replaces the value in place
//! assert_eq!(members.insert("b", 3), Some(2));
//! assert_eq!(members.get("b"), Some(&3));
//! ```

use std::{
    borrow::Borrow,
    collections::{hash_map::Entry, HashMap},
    hash::Hash,
    iter::FromIterator,
    slice::Iter,
    vec::IntoIter,
};

#[derive(Eq, PartialEq, Clone, Hash, Debug)]
/// A map implemented as a [`Vec`] of pairs in insertion order.
///
/// See also: [module level documentation](`crate::fieldmap`).
pub struct FieldMap<K, V>(Vec<(K, V)>);

impl<K, V> Default for FieldMap<K, V> {
    fn default() -> Self { FieldMap(Vec::new()) }
}

impl<K: Eq, V> FieldMap<K, V> {
    /// Creates an empty [`FieldMap`].
    pub fn new() -> Self { Self::default() }

    /// Creates an empty [`FieldMap`] with room for `capacity` members.
    pub fn with_capacity(capacity: usize) -> Self { FieldMap(Vec::with_capacity(capacity)) }

    /// Inserts a member, returning the previous value if `key` was already present.
    ///
    /// A repeated key keeps its original position.
    ///
    /// # Arguments
    ///
    /// * `key: K` - The member name.
    /// * `value: V` - The member value.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.0.push((key, value));
                None
            }
        }
    }

    /// Returns a reference to the value stored under `key`.
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        self.0
            .iter()
            .find(|(k, _)| k.borrow() == key)
            .map(|(_, v)| v)
    }

    /// Removes `key`, returning its value. The order of the remaining members is kept.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        let index = self.0.iter().position(|(k, _)| k.borrow() == key)?;
        Some(self.0.remove(index).1)
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        self.get(key).is_some()
    }
}

impl<K: Eq + Hash, V> FieldMap<K, V> {
    /// Builds a map from pairs in wire order, in time linear in their number.
    ///
    /// A repeated key keeps the position of its first occurrence and the value of its last,
    /// the same outcome as inserting the pairs one by one.
    pub fn from_pairs(pairs: Vec<(K, V)>) -> Self {
        // output slot of every pair, and whether the pair opens that slot
        let slots: Vec<(usize, bool)> = {
            let mut first: HashMap<&K, usize> = HashMap::with_capacity(pairs.len());
            pairs
                .iter()
                .map(|(k, _)| {
                    let next = first.len();
                    match first.entry(k) {
                        Entry::Occupied(e) => (*e.get(), false),
                        Entry::Vacant(e) => {
                            e.insert(next);
                            (next, true)
                        }
                    }
                })
                .collect()
        };

        let mut members: Vec<(K, V)> = Vec::with_capacity(slots.len());
        for ((k, v), (slot, opens)) in pairs.into_iter().zip(slots) {
            if opens {
                members.push((k, v));
            } else {
                members[slot].1 = v;
            }
        }
        FieldMap(members)
    }
}

impl<K, V> FieldMap<K, V> {
    /// Returns length.
    pub fn len(&self) -> usize { self.0.len() }

    /// Indicates whether the [`FieldMap`] is empty.
    pub fn is_empty(&self) -> bool { self.0.is_empty() }

    /// Returns an [`Iter`] of the key value pairs, in insertion order.
    pub fn iter(&self) -> Iter<(K, V)> { self.0.iter() }

    /// Returns the keys, in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &K> { self.0.iter().map(|(k, _)| k) }
}

impl<K, V> IntoIterator for FieldMap<K, V> {
    type IntoIter = IntoIter<(K, V)>;
    type Item = (K, V);

    fn into_iter(self) -> IntoIter<(K, V)> { self.0.into_iter() }
}

impl<'a, K, V> IntoIterator for &'a FieldMap<K, V> {
    type IntoIter = Iter<'a, (K, V)>;
    type Item = &'a (K, V);

    fn into_iter(self) -> Iter<'a, (K, V)> { self.0.iter() }
}

impl<K: Eq + Hash, V> FromIterator<(K, V)> for FieldMap<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> FieldMap<K, V> {
        Self::from_pairs(iter.into_iter().collect())
    }
}

impl<K: Eq + Hash, V> From<Vec<(K, V)>> for FieldMap<K, V> {
    fn from(v: Vec<(K, V)>) -> Self { Self::from_pairs(v) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remove_keeps_order() {
        let mut m: FieldMap<String, i32> =
            vec![("x".into(), 1), ("y".into(), 2), ("z".into(), 3)].into();
        assert_eq!(m.remove("y"), Some(2));
        assert_eq!(m.remove("y"), None);
        let rest: Vec<_> = m.into_iter().collect();
        assert_eq!(rest, vec![("x".to_string(), 1), ("z".to_string(), 3)]);
    }

    #[test]
    fn duplicates_collapse_on_collect() {
        let m: FieldMap<&str, i32> = vec![("a", 1), ("b", 2), ("a", 3)].into_iter().collect();
        assert_eq!(m.len(), 2);
        assert_eq!(m.get("a"), Some(&3));
        assert!(m.contains_key("b"));
        assert!(!m.is_empty());
    }

    #[test]
    fn pairs_resolve_like_repeated_inserts() {
        let pairs = vec![("b", 1), ("a", 2), ("b", 3), ("c", 4), ("a", 5), ("b", 6)];
        let mut inserted = FieldMap::new();
        for (k, v) in pairs.clone() {
            inserted.insert(k, v);
        }
        let built = FieldMap::from_pairs(pairs);
        assert_eq!(built, inserted);
        assert_eq!(built.into_iter().collect::<Vec<_>>(), vec![("b", 6), ("a", 5), ("c", 4)]);
    }
}
