//! Secondary indexes mapping a label (category or keyword) to record ids.

use std::collections::{BTreeMap, BTreeSet};

/// Label → set of record ids.
///
/// Ordered maps keep snapshot output and listing order deterministic.
/// Empty sets are dropped eagerly so `keys()` only reports live labels.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecondaryIndex {
    entries: BTreeMap<String, BTreeSet<String>>,
}

impl SecondaryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: &str, id: &str) {
        self.entries
            .entry(key.to_string())
            .or_default()
            .insert(id.to_string());
    }

    pub fn remove(&mut self, key: &str, id: &str) {
        if let Some(ids) = self.entries.get_mut(key) {
            ids.remove(id);
            if ids.is_empty() {
                self.entries.remove(key);
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&BTreeSet<String>> {
        self.entries.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }

    /// Whether any label still references `id`.
    pub fn references(&self, id: &str) -> bool {
        self.entries.values().any(|ids| ids.contains(id))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Plain id lists for snapshots.
    pub fn to_lists(&self) -> BTreeMap<String, Vec<String>> {
        self.entries
            .iter()
            .map(|(k, ids)| (k.clone(), ids.iter().cloned().collect()))
            .collect()
    }

    /// Rebuild from snapshot lists, keeping only ids accepted by `keep`.
    pub fn from_lists<F>(lists: &BTreeMap<String, Vec<String>>, keep: F) -> Self
    where
        F: Fn(&str) -> bool,
    {
        let mut index = Self::new();
        for (key, ids) in lists {
            for id in ids.iter().filter(|id| keep(id)) {
                index.insert(key, id);
            }
        }
        index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_remove_drops_empty_keys() {
        let mut index = SecondaryIndex::new();
        index.insert("billing", "a");
        index.insert("billing", "b");
        index.insert("account", "a");

        assert_eq!(index.get("billing").unwrap().len(), 2);
        assert!(index.references("a"));

        index.remove("account", "a");
        assert!(index.get("account").is_none());
        assert_eq!(index.keys().collect::<Vec<_>>(), vec!["billing"]);

        // Removing unknown pairs is a no-op
        index.remove("missing", "a");
        index.remove("billing", "zzz");
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_lists_filtered_on_restore() {
        let mut lists = BTreeMap::new();
        lists.insert("a".to_string(), vec!["1".to_string(), "2".to_string()]);
        lists.insert("b".to_string(), vec!["3".to_string()]);

        let index = SecondaryIndex::from_lists(&lists, |id| id != "3");
        assert_eq!(index.len(), 1);
        assert_eq!(index.to_lists()["a"], vec!["1", "2"]);
    }
}
