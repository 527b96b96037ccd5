use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Key to ordered values, built by repeated `write` calls.
///
/// Keys iterate in order of first appearance. Writing an existing key appends
/// to its list, and merging two maps concatenates the lists per key. The same
/// type serves as a task's partial output and as the job-wide merged map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultMap {
    keys: Vec<String>,
    values: HashMap<String, Vec<String>>,
}

impl ResultMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        match self.values.get_mut(&key) {
            Some(values) => values.push(value.into()),
            None => {
                self.keys.push(key.clone());
                self.values.insert(key, vec![value.into()]);
            }
        }
    }

    /// Appends every value of `other` after the values already held here.
    pub fn merge(&mut self, other: ResultMap) {
        let ResultMap { keys, mut values } = other;
        for key in keys {
            let incoming = values.remove(&key).unwrap_or_default();
            match self.values.get_mut(&key) {
                Some(existing) => existing.extend(incoming),
                None => {
                    self.keys.push(key.clone());
                    self.values.insert(key, incoming);
                }
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.values.get(key).map(Vec::as_slice)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Total number of writes across all keys.
    pub fn value_count(&self) -> usize {
        self.values.values().map(Vec::len).sum()
    }
}

impl IntoIterator for ResultMap {
    type Item = (String, Vec<String>);
    type IntoIter = std::vec::IntoIter<(String, Vec<String>)>;

    fn into_iter(self) -> Self::IntoIter {
        let ResultMap { keys, mut values } = self;
        keys.into_iter()
            .map(|key| {
                let v = values.remove(&key).unwrap_or_default();
                (key, v)
            })
            .collect::<Vec<_>>()
            .into_iter()
    }
}
