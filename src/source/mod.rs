//! # Value Sources
//!
//! The registry of named value sources that template tokens resolve against.
//!
//! ## Overview
//!
//! - [`SourceKind`] - The closed set of kinds a token may name
//! - [`Provider`] - Core trait: one async `lookup` per token
//! - [`SourceRegistry`] - `SourceKind -> Provider` mapping for one run
//! - [`MapProvider`] - Immediate read from an in-memory map (vars, secrets, env)
//! - [`KeyVaultProvider`] - On-demand fetch from Azure Key Vault (kv)
//! - [`MockProvider`] - Test provider with recording and failure simulation
//!
//! ## Provider Trait
//!
//! ```rust,ignore
//! #[async_trait]
//! pub trait Provider: Send + Sync {
//!     fn name(&self) -> &str;
//!     async fn lookup(&self, key: &str) -> Result<Option<String>, FetchError>;
//! }
//! ```
//!
//! There is no "list all" or bulk method: remote secrets are fetched one name
//! at a time, when a token asks for them.
//!
//! ## Building a registry
//!
//! ```rust
//! use manifest_subst::source::{MapProvider, SourceKind, SourceRegistry};
//!
//! let mut registry = SourceRegistry::new();
//! registry.register(SourceKind::Vars, MapProvider::from_pairs([("HOST", "db.local")]));
//!
//! assert!(registry.has(SourceKind::Vars));
//! assert!(!registry.has(SourceKind::Kv));
//! ```

pub mod credential;
mod keyvault;
pub mod loader;
mod map;
mod mock;

pub use keyvault::{validate_vault_name, vault_url, KeyVaultOptions, KeyVaultProvider, KEYVAULT_API_VERSION};
pub use map::MapProvider;
pub use mock::MockProvider;

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::FetchError;

// ============================================================================
// SOURCE KIND
// ============================================================================

/// Source kinds recognised by the token grammar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SourceKind {
    /// Named deployment variables (`vars:`)
    Vars,
    /// Secret values injected by the CI platform (`secrets:`)
    Secrets,
    /// Secrets fetched from Azure Key Vault (`kv:`)
    Kv,
    /// Process environment (`env:`)
    Env,
}

impl SourceKind {
    /// All kinds, in grammar alternation order
    pub const ALL: [SourceKind; 4] = [
        SourceKind::Vars,
        SourceKind::Secrets,
        SourceKind::Kv,
        SourceKind::Env,
    ];

    /// Identifier as written in templates
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Vars => "vars",
            SourceKind::Secrets => "secrets",
            SourceKind::Kv => "kv",
            SourceKind::Env => "env",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SourceKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| format!("Unknown source kind: '{}'. Available: vars, secrets, kv, env", s))
    }
}

// ============================================================================
// PROVIDER TRAIT (ASYNC)
// ============================================================================

/// A value source that answers lookups by name
///
/// `Ok(None)` means the value is absent. `Err` is reserved for genuine fetch
/// failures (network, authorization, timeout) so the engine can tell the two
/// apart for required tokens.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Short provider name for logs (e.g. "map", "keyvault")
    fn name(&self) -> &str;

    /// Look up a single value
    async fn lookup(&self, key: &str) -> Result<Option<String>, FetchError>;
}

// ============================================================================
// SOURCE REGISTRY
// ============================================================================

/// Mapping from source kind to provider, built once per run
///
/// A kind missing from the registry is a valid state meaning "not configured
/// for this run". The registry never caches lookups.
#[derive(Clone, Default)]
pub struct SourceRegistry {
    providers: HashMap<SourceKind, Arc<dyn Provider>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the provider for a kind
    pub fn register(&mut self, kind: SourceKind, provider: impl Provider + 'static) {
        self.register_shared(kind, Arc::new(provider));
    }

    /// Register an already shared provider
    pub fn register_shared(&mut self, kind: SourceKind, provider: Arc<dyn Provider>) {
        tracing::debug!(kind = %kind, provider = provider.name(), "Registering source");
        self.providers.insert(kind, provider);
    }

    /// Builder-style [`register`](Self::register)
    pub fn with(mut self, kind: SourceKind, provider: impl Provider + 'static) -> Self {
        self.register(kind, provider);
        self
    }

    pub fn has(&self, kind: SourceKind) -> bool {
        self.providers.contains_key(&kind)
    }

    /// Look up `name` in the provider registered for `kind`
    ///
    /// An unregistered kind yields `Ok(None)`; what absence means for a
    /// given token is the engine's decision.
    pub async fn lookup(&self, kind: SourceKind, name: &str) -> Result<Option<String>, FetchError> {
        match self.providers.get(&kind) {
            Some(provider) => provider.lookup(name).await,
            None => Ok(None),
        }
    }

    /// Registered kinds, sorted
    pub fn kinds(&self) -> Vec<SourceKind> {
        let mut kinds: Vec<_> = self.providers.keys().copied().collect();
        kinds.sort();
        kinds
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl fmt::Debug for SourceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.kinds().into_iter().map(|k| (k, self.providers[&k].name())))
            .finish()
    }
}

// ============================================================================
// TESTS
// ============================================================================
