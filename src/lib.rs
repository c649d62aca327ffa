//! manifest-subst - placeholder substitution for deployment manifests
//!
//! Replaces `${kind:name}`, `${kind:name:default}` and `${kind:name!}` tokens
//! in text files (Kubernetes manifests, Helm values, pipeline YAML) with values
//! from CI variables, CI secrets, Azure Key Vault or the process environment.
//!
//! ## Module Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                          ENGINE                              │
//! │  template/  Token scanner + resolution policy                │
//! └──────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         SOURCES                              │
//! │  source/    Provider trait, SourceRegistry, Key Vault, maps  │
//! └──────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      CROSS-CUTTING                           │
//! │  config/    Layered settings (CLI > environment > file)      │
//! │  error/     Error codes with fix suggestions                 │
//! │  util/      Timeouts, retry with backoff                     │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! | Module | Responsibility |
//! |--------|----------------|
//! | [`template`] | `tokenize`, `scan`, `substitute` |
//! | [`source`] | `SourceKind`, `Provider`, `SourceRegistry`, providers |
//! | [`config`] | `FileConfig` discovery, `Settings` resolution |
//! | [`error`] | `SubstError`, `FetchError`, `FixSuggestion` |
//! | [`util`] | Constants, `RetryPolicy` |

// ═══════════════════════════════════════════════════════════════
// ENGINE
// ═══════════════════════════════════════════════════════════════
pub mod template;

// ═══════════════════════════════════════════════════════════════
// SOURCES
// ═══════════════════════════════════════════════════════════════
pub mod source;

// ═══════════════════════════════════════════════════════════════
// CROSS-CUTTING - Error handling, configuration
// ═══════════════════════════════════════════════════════════════
pub mod config;
pub mod error;
pub mod util;

// ═══════════════════════════════════════════════════════════════
// PUBLIC API RE-EXPORTS
// ═══════════════════════════════════════════════════════════════

// Error types
pub use error::{FetchError, FixSuggestion, SubstError};

// Config types
pub use config::{FileConfig, KvMode, Settings, SourceConfig, SourceMode};

// Engine
pub use template::{scan, substitute, substitute_with_report, tokenize, Outcome, Segment, Substitution, Token};

// Sources
pub use source::loader::{build_registry, capture_env};
pub use source::{KeyVaultProvider, MapProvider, MockProvider, Provider, SourceKind, SourceRegistry};
