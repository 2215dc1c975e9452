//! The single-line value grammar shared by writer and reader.
//!
//! A wire value is exactly one of:
//! - the bare token [`NULL`]
//! - the bare tombstone token [`TOMBSTONE`] (patch-only, marks a removed map key)
//! - a scalar token (`827`, `true`, `-1.5`)
//! - a double-quoted, escaped string (`"hi there"`)
//! - a bare enum constant name (`ENUM1`)
//! - a block header (`Child {`, `i32 3 {`) followed by a block

use crate::WireError;

/// The token standing for an absent value, distinct from `"0"` and `""`.
pub const NULL: &str = "null";

/// The patch-only token marking a removed map key. Plain omission would be
/// ambiguous with "unchanged" in a sparse patch.
pub const TOMBSTONE: &str = "~";

/// Quotes and escapes a string for a single wire line.
///
/// Escapes `\`, `"`, and the line-breaking characters, so the result never
/// spans more than one line and never terminates the quote early.
#[must_use]
pub fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Returns true if the token looks like a quoted string.
#[must_use]
pub fn is_quoted(token: &str) -> bool {
    token.starts_with('"')
}

/// Undoes [`quote`]. `line` is carried into errors for diagnostics.
pub fn unquote(token: &str, line: usize) -> Result<String, WireError> {
    let inner = token
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .ok_or(WireError::UnterminatedString { line })?;

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some('"') => out.push('"'),
                Some('\\') => out.push('\\'),
                Some('n') => out.push('\n'),
                Some('r') => out.push('\r'),
                Some('t') => out.push('\t'),
                Some(escape) => return Err(WireError::InvalidEscape { escape, line }),
                // A trailing backslash means the closing quote was escaped.
                None => return Err(WireError::UnterminatedString { line }),
            },
            '"' => return Err(WireError::StrayQuote { line }),
            _ => out.push(c),
        }
    }
    Ok(out)
}

/// A parsed block header: `TYPETOKEN [LENGTH] {`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header<'a> {
    pub type_token: &'a str,
    pub length: Option<usize>,
}

/// Formats a block header line body (including the trailing `{`).
#[must_use]
pub fn format_header(type_token: &str, length: Option<usize>) -> String {
    match length {
        Some(n) => format!("{type_token} {n} {{"),
        None => format!("{type_token} {{"),
    }
}

/// Parses a block-header value: a type token, an optional length, then `{`.
pub fn parse_header(value: &str, line: usize) -> Result<Header<'_>, WireError> {
    let malformed = || WireError::MalformedHeader {
        text: value.to_string(),
        line,
    };

    let body = value.strip_suffix('{').ok_or_else(malformed)?;
    let mut parts = body.split_whitespace();
    let type_token = parts.next().ok_or_else(malformed)?;
    let length = match parts.next() {
        Some(tok) => Some(tok.parse::<usize>().map_err(|_| malformed())?),
        None => None,
    };
    if parts.next().is_some() {
        return Err(malformed());
    }
    Ok(Header { type_token, length })
}

/// Splits a `name=value` line. Returns `None` if the line is not a field
/// line (names never contain `=`, quotes, or whitespace).
#[must_use]
pub fn split_field(line: &str) -> Option<(&str, &str)> {
    let (name, value) = line.split_once('=')?;
    let name = name.trim_end();
    if name.is_empty() || name.contains('"') || name.contains(char::is_whitespace) {
        return None;
    }
    Some((name, value.trim_start()))
}

/// Returns true if this line opens a block: it ends in `{` and that brace is
/// not inside a quoted string.
#[must_use]
pub fn opens_block(line: &str) -> bool {
    if !line.ends_with('{') {
        return false;
    }
    let mut in_quote = false;
    let mut escaped = false;
    for c in line.chars() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_quote => escaped = true,
            '"' => in_quote = !in_quote,
            _ => {}
        }
    }
    !in_quote
}
