//! Single-pass scanner for `${kind:name...}` tokens
//!
//! Scans left to right. At each `${` it tries to read a whole token; if the
//! candidate is malformed (unknown kind, empty name, empty default, no closing
//! brace) the `$` stays literal and scanning resumes one byte later. Tokens
//! never overlap and nothing inside a matched token is rescanned.

use super::{Segment, Token};
use crate::source::SourceKind;

/// Split a template into literal and token segments
///
/// Concatenating every segment's source text reproduces the template exactly.
pub fn tokenize(template: &str) -> Vec<Segment<'_>> {
    let mut segments = Vec::new();
    let mut literal_start = 0;
    let mut pos = 0;

    while let Some(offset) = template[pos..].find("${") {
        let start = pos + offset;

        match read_token(template, start) {
            Some(token) => {
                if start > literal_start {
                    segments.push(Segment::Literal(&template[literal_start..start]));
                }
                pos = token.span.end;
                literal_start = pos;
                segments.push(Segment::Token(token));
            }
            // '$' is one byte; the next candidate starts after it
            None => pos = start + 1,
        }
    }

    if literal_start < template.len() {
        segments.push(Segment::Literal(&template[literal_start..]));
    }

    segments
}

/// All tokens of a template, in order
pub fn scan(template: &str) -> Vec<Token<'_>> {
    tokenize(template)
        .into_iter()
        .filter_map(|segment| match segment {
            Segment::Token(token) => Some(token),
            Segment::Literal(_) => None,
        })
        .collect()
}

/// Try to read a token whose `${` starts at byte `start`
fn read_token(template: &str, start: usize) -> Option<Token<'_>> {
    let body_start = start + 2;
    let body = &template[body_start..];

    let (kind, after_kind) = SourceKind::ALL.into_iter().find_map(|kind| {
        let rest = body.strip_prefix(kind.as_str())?.strip_prefix(':')?;
        Some((kind, rest))
    })?;
    let name_start = body_start + kind.as_str().len() + 1;

    // name: one or more chars up to the first ':', '!' or '}'
    let name_len = after_kind.find(&[':', '!', '}'][..])?;
    if name_len == 0 {
        return None;
    }
    let name = &after_kind[..name_len];
    let tail = &after_kind[name_len..];

    let (default, required, tail_len) = match tail.as_bytes()[0] {
        b'}' => (None, false, 1),
        b'!' => {
            if !tail[1..].starts_with('}') {
                return None;
            }
            (None, true, 2)
        }
        _ => {
            // ':' then one or more chars up to the first '}'
            let value = &tail[1..];
            let end = value.find('}')?;
            if end == 0 {
                return None;
            }
            (Some(&value[..end]), false, end + 2)
        }
    };

    let end = name_start + name_len + tail_len;
    Some(Token {
        kind,
        name,
        default,
        required,
        raw: &template[start..end],
        span: start..end,
    })
}
