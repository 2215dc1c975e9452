//! Line-oriented wire framing for statewire documents.
//!
//! This crate defines the textual layer every codec shares:
//! - one semantic unit per line, UTF-8
//! - a block opens on a line ending in `{` and closes on a line that is `}`
//! - indentation is emitted for readability only; parsing tracks brace depth
//! - blank lines and `#` comments are skipped on read
//!
//! The value grammar (quoting, `null`, tombstones, block headers) lives in
//! [`token`]; [`LineWriter`] and [`LineReader`] agree on it by construction.

mod reader;
mod writer;

pub mod token;

pub use reader::LineReader;
pub use writer::LineWriter;

/// Result type alias using the crate's error type.
pub type WireResult<T> = std::result::Result<T, WireError>;

/// Errors raised by the wire layer while reading a document.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("line {line}: input ended inside an open block")]
    TruncatedInput { line: usize },

    #[error("line {line}: closing brace without an open block")]
    UnbalancedClose { line: usize },

    #[error("line {line}: unterminated string")]
    UnterminatedString { line: usize },

    #[error("line {line}: stray quote inside string")]
    StrayQuote { line: usize },

    #[error("line {line}: invalid escape `\\{escape}`")]
    InvalidEscape { escape: char, line: usize },

    #[error("line {line}: malformed block header `{text}`")]
    MalformedHeader { text: String, line: usize },
}
