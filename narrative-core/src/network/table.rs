//! Insertion-ordered keyed storage for network entities.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::hash::Hash;

/// An entity stored in a [`Table`] under its own key.
pub trait Keyed {
    type Key: Clone + Eq + Hash + std::fmt::Debug;

    fn key(&self) -> &Self::Key;
}

/// Keyed collection that iterates in insertion order.
///
/// Inserting a value whose key is already present replaces the stored value
/// in place, keeping its original position. Serializes as a plain array.
#[derive(Debug, Clone)]
pub struct Table<T: Keyed> {
    items: Vec<T>,
    index: HashMap<T::Key, usize>,
}

impl<T: Keyed> Table<T> {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Insert or replace. Returns the previous value for the key, if any.
    pub fn insert(&mut self, item: T) -> Option<T> {
        match self.index.get(item.key()) {
            Some(&slot) => Some(std::mem::replace(&mut self.items[slot], item)),
            None => {
                self.index.insert(item.key().clone(), self.items.len());
                self.items.push(item);
                None
            }
        }
    }

    pub fn get(&self, key: &T::Key) -> Option<&T> {
        self.index.get(key).map(|&slot| &self.items[slot])
    }

    pub fn contains_key(&self, key: &T::Key) -> bool {
        self.index.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &T::Key> {
        self.items.iter().map(Keyed::key)
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }
}

impl<T: Keyed> Default for Table<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Keyed> FromIterator<T> for Table<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut table = Self::new();
        for item in iter {
            table.insert(item);
        }
        table
    }
}

impl<'a, T: Keyed> IntoIterator for &'a Table<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl<T: Keyed + Serialize> Serialize for Table<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(&self.items)
    }
}

impl<'de, T: Keyed + Deserialize<'de>> Deserialize<'de> for Table<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Vec::<T>::deserialize(deserializer).map(|items| items.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Row {
        id: String,
        value: u32,
    }

    impl Keyed for Row {
        type Key = String;

        fn key(&self) -> &String {
            &self.id
        }
    }

    fn row(id: &str, value: u32) -> Row {
        Row {
            id: id.to_string(),
            value,
        }
    }

    #[test]
    fn test_insertion_order_preserved() {
        let table: Table<Row> = vec![row("b", 1), row("a", 2), row("c", 3)]
            .into_iter()
            .collect();
        let keys: Vec<_> = table.keys().cloned().collect();
        assert_eq!(keys, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_replace_keeps_position() {
        let mut table = Table::new();
        table.insert(row("a", 1));
        table.insert(row("b", 2));
        let previous = table.insert(row("a", 10));

        assert_eq!(previous, Some(row("a", 1)));
        assert_eq!(table.len(), 2);
        assert_eq!(table.as_slice()[0], row("a", 10));
        assert_eq!(table.get(&"a".to_string()).map(|r| r.value), Some(10));
    }

    #[test]
    fn test_serializes_as_array() {
        let table: Table<Row> = vec![row("x", 1)].into_iter().collect();
        let json = serde_json::to_value(&table).unwrap();
        assert!(json.is_array());

        let back: Table<Row> = serde_json::from_value(json).unwrap();
        assert!(back.contains_key(&"x".to_string()));
    }
}
