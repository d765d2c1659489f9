//! Per-turn result map keyed by intent or task id.
//!
//! Writers target disjoint keys, so merging is a key-disjoint union. The map
//! still checks: re-inserting an identical value is a no-op, and a differing
//! value for an existing key is reported instead of silently overwritten.

use std::collections::BTreeMap;

use thiserror::Error;

/// Two writers produced different results for the same id.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("conflicting results for id '{key}'")]
pub struct MergeConflict {
    pub key: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultMap {
    entries: BTreeMap<String, String>,
}

impl ResultMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert one result. Idempotent for identical values.
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<(), MergeConflict> {
        let key = key.into();
        let value = value.into();
        match self.entries.get(&key) {
            Some(existing) if *existing == value => Ok(()),
            Some(_) => Err(MergeConflict { key }),
            None => {
                self.entries.insert(key, value);
                Ok(())
            }
        }
    }

    /// Union `other` into `self`. On conflict, `self` keeps every entry merged
    /// before the conflicting key.
    pub fn merge(&mut self, other: ResultMap) -> Result<(), MergeConflict> {
        for (key, value) in other.entries {
            self.insert(key, value)?;
        }
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
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

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl FromIterator<(String, String)> for ResultMap {
    /// Later duplicates lose; use [`ResultMap::insert`] when conflicts matter.
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        let mut map = ResultMap::new();
        for (key, value) in iter {
            map.entries.entry(key).or_insert(value);
        }
        map
    }
}
