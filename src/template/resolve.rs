//! Token resolution against a source registry
//!
//! Per token, in template order:
//!
//! | Situation | `!` required | otherwise |
//! |-----------|--------------|-----------|
//! | kind not registered | `UnconfiguredSource` | verbatim |
//! | lookup failed | `FetchFailure` | treated as absent (warn) |
//! | value present | value | value |
//! | value absent | `MissingVariable` | default, else verbatim |
//!
//! The first abort stops the run and no output is produced. Substituted
//! values are written as-is and never scanned again.

use std::borrow::Cow;

use super::{tokenize, Segment, Token};
use crate::error::{Result, SubstError};
use crate::source::{SourceKind, SourceRegistry};

/// How a token was rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Replaced by the source value
    Resolved,
    /// Replaced by the token's default text
    Defaulted,
    /// Left exactly as written
    Verbatim,
}

/// Per-token record (never carries the value)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenOutcome {
    pub kind: SourceKind,
    pub name: String,
    pub outcome: Outcome,
}

/// Rendered output plus what happened to each token
#[derive(Debug, Clone, Default)]
pub struct Substitution {
    pub output: String,
    pub tokens: Vec<TokenOutcome>,
}

impl Substitution {
    pub fn count(&self, outcome: Outcome) -> usize {
        self.tokens.iter().filter(|t| t.outcome == outcome).count()
    }
}

enum Resolution<'t> {
    Value(String),
    Default(&'t str),
    Verbatim,
}

/// Substitute every token in `template`
///
/// Returns the template borrowed unchanged when it contains no tokens.
///
/// # Example
///
/// ```rust
/// use manifest_subst::source::{MapProvider, SourceKind, SourceRegistry};
/// use manifest_subst::template::substitute;
///
/// # #[tokio::main]
/// # async fn main() {
/// let registry = SourceRegistry::new()
///     .with(SourceKind::Vars, MapProvider::from_pairs([("HOST", "db.internal")]));
///
/// let out = substitute("host: ${vars:HOST}, port: ${vars:PORT:5432}", &registry)
///     .await
///     .unwrap();
/// assert_eq!(out, "host: db.internal, port: 5432");
/// # }
/// ```
pub async fn substitute<'a>(template: &'a str, registry: &SourceRegistry) -> Result<Cow<'a, str>> {
    // Fast path: nothing that could start a token
    if !template.contains("${") {
        return Ok(Cow::Borrowed(template));
    }

    let segments = tokenize(template);
    if !segments.iter().any(|s| matches!(s, Segment::Token(_))) {
        return Ok(Cow::Borrowed(template));
    }

    render(template, segments, registry)
        .await
        .map(|done| Cow::Owned(done.output))
}

/// Like [`substitute`], also reporting the outcome of every token
pub async fn substitute_with_report(template: &str, registry: &SourceRegistry) -> Result<Substitution> {
    render(template, tokenize(template), registry).await
}

async fn render(template: &str, segments: Vec<Segment<'_>>, registry: &SourceRegistry) -> Result<Substitution> {
    let mut output = String::with_capacity(template.len());
    let mut tokens = Vec::new();

    for segment in segments {
        let token = match segment {
            Segment::Literal(text) => {
                output.push_str(text);
                continue;
            }
            Segment::Token(token) => token,
        };

        let outcome = match resolve_token(&token, registry).await? {
            Resolution::Value(value) => {
                output.push_str(&value);
                Outcome::Resolved
            }
            Resolution::Default(default) => {
                output.push_str(default);
                Outcome::Defaulted
            }
            Resolution::Verbatim => {
                output.push_str(token.raw);
                Outcome::Verbatim
            }
        };

        tracing::debug!(kind = %token.kind, name = token.name, outcome = ?outcome, "Token resolved");
        tokens.push(TokenOutcome {
            kind: token.kind,
            name: token.name.to_string(),
            outcome,
        });
    }

    Ok(Substitution { output, tokens })
}

async fn resolve_token<'t>(token: &Token<'t>, registry: &SourceRegistry) -> Result<Resolution<'t>> {
    if !registry.has(token.kind) {
        if token.required {
            return Err(SubstError::UnconfiguredSource {
                kind: token.kind,
                name: token.name.to_string(),
            });
        }
        return Ok(Resolution::Verbatim);
    }

    let value = match registry.lookup(token.kind, token.name).await {
        Ok(value) => value,
        Err(source) if token.required => {
            return Err(SubstError::FetchFailure {
                kind: token.kind,
                name: token.name.to_string(),
                source,
            });
        }
        Err(e) => {
            tracing::warn!(kind = %token.kind, name = token.name, error = %e, "Lookup failed, treating as absent");
            None
        }
    };

    match (value, token.default) {
        (Some(value), _) => Ok(Resolution::Value(value)),
        (None, _) if token.required => Err(SubstError::MissingVariable {
            kind: token.kind,
            name: token.name.to_string(),
        }),
        (None, Some(default)) => Ok(Resolution::Default(default)),
        (None, None) => Ok(Resolution::Verbatim),
    }
}
