// The #[error] attribute from thiserror uses struct fields via string interpolation,
// but Rust's unused_assignments lint doesn't recognize this.
#![allow(unused_assignments)]

//! Error types with error codes and fix suggestions
//!
//! Error code ranges:
//! - SUBST-000-009: Substitution aborts (required token could not be resolved)
//! - SUBST-010-019: Configuration errors
//! - SUBST-020-029: IO errors
//!
//! [`FetchError`] is the provider-level failure. It never reaches the caller on
//! its own: the engine either swallows it (optional token) or wraps it into
//! [`SubstError::FetchFailure`] (required token).

use miette::Diagnostic;
use thiserror::Error;

use crate::source::SourceKind;

pub type Result<T> = std::result::Result<T, SubstError>;

/// Trait for errors that provide fix suggestions
pub trait FixSuggestion {
    fn fix_suggestion(&self) -> Option<&str>;
}

#[derive(Error, Debug, Diagnostic)]
pub enum SubstError {
    // ═══════════════════════════════════════════
    // SUBSTITUTION ABORTS (000-009)
    // ═══════════════════════════════════════════
    #[error("[SUBST-001] Source '{kind}' not configured but required for '{name}'")]
    #[diagnostic(
        code(subst::unconfigured_source),
        help("Configure the source (e.g. --keyvault-name for kv) or drop the '!' marker")
    )]
    UnconfiguredSource { kind: SourceKind, name: String },

    #[error("[SUBST-002] Required variable '{name}' from source '{kind}' is missing")]
    #[diagnostic(
        code(subst::missing_variable),
        help("Define the variable in the source, or give it a default (NAME:value) instead of '!'")
    )]
    MissingVariable { kind: SourceKind, name: String },

    #[error("[SUBST-003] Failed to retrieve required {kind} value '{name}': {source}")]
    #[diagnostic(
        code(subst::fetch_failure),
        help("Check vault name, network access and credentials")
    )]
    FetchFailure {
        kind: SourceKind,
        name: String,
        #[source]
        source: FetchError,
    },

    // ═══════════════════════════════════════════
    // CONFIGURATION ERRORS (010-019)
    // ═══════════════════════════════════════════
    #[error("[SUBST-010] Configuration error: {reason}")]
    #[diagnostic(code(subst::config_error))]
    ConfigError { reason: String },

    #[error("[SUBST-011] Invalid Key Vault name '{name}': {reason}")]
    #[diagnostic(code(subst::invalid_vault_name))]
    InvalidVaultName { name: String, reason: String },

    #[error("[SUBST-012] Failed to build HTTP client: {reason}")]
    #[diagnostic(code(subst::http_client))]
    HttpClient { reason: String },

    // ═══════════════════════════════════════════
    // IO ERRORS (020-029)
    // ═══════════════════════════════════════════
    #[error("[SUBST-020] IO error: {0}")]
    #[diagnostic(code(subst::io_error))]
    Io(#[from] std::io::Error),
}

impl SubstError {
    /// Whether this error is one of the three substitution aborts
    pub fn is_abort(&self) -> bool {
        matches!(
            self,
            Self::UnconfiguredSource { .. } | Self::MissingVariable { .. } | Self::FetchFailure { .. }
        )
    }

    /// Error code string (e.g. "SUBST-001")
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnconfiguredSource { .. } => "SUBST-001",
            Self::MissingVariable { .. } => "SUBST-002",
            Self::FetchFailure { .. } => "SUBST-003",
            Self::ConfigError { .. } => "SUBST-010",
            Self::InvalidVaultName { .. } => "SUBST-011",
            Self::HttpClient { .. } => "SUBST-012",
            Self::Io(_) => "SUBST-020",
        }
    }
}

impl FixSuggestion for SubstError {
    fn fix_suggestion(&self) -> Option<&str> {
        match self {
            SubstError::UnconfiguredSource { kind, .. } => Some(match kind {
                SourceKind::Kv => "Pass --keyvault-name (and keep --kv-source azure-keyvault)",
                _ => "Check the --vars-source / --secrets-source settings",
            }),
            SubstError::MissingVariable { kind, .. } => Some(match kind {
                SourceKind::Vars => "Export VARS_<NAME> (github mode) or <NAME> (env mode)",
                SourceKind::Secrets => "Export SECRETS_<NAME> in the job environment",
                SourceKind::Kv => "Create the secret in the Key Vault",
                SourceKind::Env => "Export the environment variable before running",
            }),
            SubstError::FetchFailure { .. } => {
                Some("Check network access to the vault and that the identity can read secrets")
            }
            SubstError::ConfigError { .. } => Some("Check the TOML syntax of the config file"),
            SubstError::InvalidVaultName { .. } => {
                Some("Vault names are 3-24 chars: letters, digits and hyphens, starting with a letter")
            }
            SubstError::HttpClient { .. } => None,
            SubstError::Io(_) => Some("Check file path and permissions"),
        }
    }
}

/// Failure of a single provider lookup (distinct from "value absent")
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("transport error: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("credential error: {reason}")]
    Credential { reason: String },

    #[error("invalid response: {reason}")]
    InvalidResponse { reason: String },
}

impl FetchError {
    /// Transient failures are worth another attempt
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Http { status, .. } => *status == 429 || (500..600).contains(status),
            FetchError::Transport(e) => e.is_connect() || e.is_timeout(),
            FetchError::Timeout { .. } => true,
            FetchError::Credential { .. } | FetchError::InvalidResponse { .. } => false,
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        FetchError::Transport(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abort_messages_name_kind_and_variable() {
        let err = SubstError::UnconfiguredSource {
            kind: SourceKind::Secrets,
            name: "TOKEN".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("secrets"));
        assert!(msg.contains("TOKEN"));
        assert!(msg.contains("SUBST-001"));

        let err = SubstError::MissingVariable {
            kind: SourceKind::Vars,
            name: "HOST".into(),
        };
        assert!(err.to_string().contains("'HOST' from source 'vars'"));
    }

    #[test]
    fn test_fetch_failure_wraps_cause() {
        use std::error::Error as _;

        let err = SubstError::FetchFailure {
            kind: SourceKind::Kv,
            name: "DB_PASS".into(),
            source: FetchError::Http {
                status: 403,
                message: "Forbidden".into(),
            },
        };
        assert!(err.to_string().contains("DB_PASS"));
        let cause = err.source().unwrap();
        assert!(cause.to_string().contains("403"));
    }

    #[test]
    fn test_is_abort() {
        assert!(SubstError::MissingVariable {
            kind: SourceKind::Env,
            name: "X".into()
        }
        .is_abort());
        assert!(!SubstError::ConfigError {
            reason: "bad".into()
        }
        .is_abort());
    }

    #[test]
    fn test_codes_match_messages() {
        let err = SubstError::InvalidVaultName {
            name: "x".into(),
            reason: "too short".into(),
        };
        assert!(err.to_string().contains(err.code()));
    }

    #[test]
    fn test_transient_classification() {
        assert!(FetchError::Http {
            status: 503,
            message: String::new()
        }
        .is_transient());
        assert!(FetchError::Http {
            status: 429,
            message: String::new()
        }
        .is_transient());
        assert!(!FetchError::Http {
            status: 401,
            message: String::new()
        }
        .is_transient());
        assert!(FetchError::Timeout { timeout_ms: 10 }.is_transient());
        assert!(!FetchError::Credential {
            reason: "no token".into()
        }
        .is_transient());
    }

    #[test]
    fn test_every_abort_has_suggestion() {
        let errs = [
            SubstError::UnconfiguredSource {
                kind: SourceKind::Kv,
                name: "A".into(),
            },
            SubstError::MissingVariable {
                kind: SourceKind::Secrets,
                name: "A".into(),
            },
        ];
        for e in &errs {
            assert!(e.fix_suggestion().is_some());
        }
    }
}
