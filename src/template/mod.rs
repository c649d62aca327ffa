//! Template Substitution - `${kind:name}` placeholders
//!
//! Three token forms, all delimited by `${` and `}`:
//!
//! ```text
//! ${vars:NAME}            plain: value, else left verbatim
//! ${vars:NAME:default}    default: value, else the default text (greedy to '}')
//! ${vars:NAME!}           required: value, else the whole run aborts
//! ```
//!
//! `kind` is one of `vars`, `secrets`, `kv`, `env`. Anything else after `${`
//! is plain text and passes through untouched.
//!
//! - `lexer`: single-pass scanner producing [`Segment`]s
//! - `resolve`: per-token policy against a [`SourceRegistry`](crate::source::SourceRegistry)

mod lexer;
mod resolve;

pub use lexer::{scan, tokenize};
pub use resolve::{substitute, substitute_with_report, Outcome, Substitution, TokenOutcome};

use std::ops::Range;

use crate::source::SourceKind;

/// A placeholder parsed from the template
///
/// `default` and `required` are never both set: the grammar reads either a
/// `:default` tail or a `!` marker, not both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: SourceKind,
    pub name: &'a str,
    pub default: Option<&'a str>,
    /// Set only by a bare `name!}`; in `${vars:X:a!}` the `!` belongs to the default `a!`
    pub required: bool,
    /// Exact source text, e.g. `${vars:NAME:default}`
    pub raw: &'a str,
    /// Byte range of `raw` in the template
    pub span: Range<usize>,
}

/// Template fragment: literal text or a token
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment<'a> {
    Literal(&'a str),
    Token(Token<'a>),
}
