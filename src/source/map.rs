//! In-memory provider backed by a captured key/value map

use std::collections::HashMap;

use async_trait::async_trait;

use super::Provider;
use crate::error::FetchError;

/// Provider that answers from a map captured up front
///
/// Covers `vars`, `secrets` and `env`: the values are already in process
/// memory, so a lookup is a plain map read and never fails.
#[derive(Debug, Clone, Default)]
pub struct MapProvider {
    values: HashMap<String, String>,
}

impl MapProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(values: HashMap<String, String>) -> Self {
        Self { values }
    }

    /// Build from any iterator of pairs
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Keep only pairs whose key starts with `prefix`, with the prefix stripped
    ///
    /// Keys equal to the bare prefix are dropped (they would map to an empty
    /// name, which no token can reference).
    pub fn from_prefixed<K, V>(pairs: impl IntoIterator<Item = (K, V)>, prefix: &str) -> Self
    where
        K: AsRef<str>,
        V: Into<String>,
    {
        let values = pairs
            .into_iter()
            .filter_map(|(k, v)| {
                let stripped = k.as_ref().strip_prefix(prefix)?;
                (!stripped.is_empty()).then(|| (stripped.to_string(), v.into()))
            })
            .collect();
        Self { values }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[async_trait]
impl Provider for MapProvider {
    fn name(&self) -> &str {
        "map"
    }

    async fn lookup(&self, key: &str) -> Result<Option<String>, FetchError> {
        Ok(self.values.get(key).cloned())
    }
}
