//! Mock provider for testing
//!
//! Returns configurable values without touching the environment or network.
//! Records every lookup so tests can assert which names were fetched.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::Provider;
use crate::error::FetchError;

#[derive(Debug, Clone)]
enum Behavior {
    /// Answer from the configured values
    Values,
    /// Every lookup fails with a fetch error carrying this message
    Fail(String),
    /// Any lookup at all is a test failure
    Forbidden,
}

/// Mock provider with predefined values and recorded lookups
#[derive(Debug, Clone)]
pub struct MockProvider {
    values: HashMap<String, String>,
    behavior: Behavior,
    /// Track all lookups made (for assertions)
    lookups: Arc<Mutex<Vec<String>>>,
}

impl MockProvider {
    /// Create a mock that knows no values
    pub fn new() -> Self {
        Self {
            values: HashMap::new(),
            behavior: Behavior::Values,
            lookups: Arc::new(Mutex::new(vec![])),
        }
    }

    /// Create a mock with the given values
    pub fn with_values<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            ..Self::new()
        }
    }

    /// Create a mock whose every lookup fails
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            behavior: Behavior::Fail(message.into()),
            ..Self::new()
        }
    }

    /// Create a mock that panics if it is ever asked for a value
    pub fn forbidden() -> Self {
        Self {
            behavior: Behavior::Forbidden,
            ..Self::new()
        }
    }

    /// Shared handle to the lookup log (survives moving the mock into a registry)
    pub fn lookup_log(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.lookups)
    }

    /// Get all names looked up so far
    pub fn get_lookups(&self) -> Vec<String> {
        self.lookups.lock().unwrap().clone()
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn lookup(&self, key: &str) -> Result<Option<String>, FetchError> {
        self.lookups.lock().unwrap().push(key.to_string());

        match &self.behavior {
            Behavior::Values => Ok(self.values.get(key).cloned()),
            Behavior::Fail(message) => Err(FetchError::Http {
                status: 500,
                message: message.clone(),
            }),
            Behavior::Forbidden => panic!("unexpected lookup of '{}' on a forbidden provider", key),
        }
    }
}
