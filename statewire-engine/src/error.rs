//! Error types for the engine.
//!
//! Registration mistakes are [`ConfigError`]s and surface on the first
//! operation that touches the broken type. Read-side failures are
//! [`DecodeError`]s; all of them abort the enclosing call and leave the
//! target partially mutated (callers wanting atomicity decode into a scratch
//! instance and swap it in on success).

use statewire_text::WireError;
use thiserror::Error;

/// Result type for registration-time operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result type for encoding operations (serialize, diff).
pub type EncodeResult<T> = Result<T, EncodeError>;

/// Result type for decoding operations (deserialize, merge).
pub type DecodeResult<T> = Result<T, DecodeError>;

/// Errors raised at registration time, or by any operation touching an
/// unregistered type.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The same field name was registered twice for one type.
    #[error("duplicate field `{field}` on type `{type_name}`")]
    DuplicateField {
        type_name: &'static str,
        field: &'static str,
    },

    /// Two distinct types tried to claim the same wire name.
    #[error("type name `{type_name}` is already registered to a different type")]
    DuplicateTypeName { type_name: &'static str },

    /// An omission named a field the type never registered.
    #[error("cannot omit unknown field `{field}` on type `{type_name}`")]
    UnknownField {
        type_name: &'static str,
        field: &'static str,
    },

    /// The type was never registered.
    #[error("type `{type_name}` is not registered")]
    NotRegistered { type_name: &'static str },

    /// A dynamic copy was attempted between values of different types.
    #[error("cannot copy `{found}` into `{expected}`")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },
}

/// Errors raised while writing a document or computing a diff.
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Errors raised while reading a document or applying a patch.
///
/// Every variant carries the line number it was detected on. None of these
/// have a safe substitute value; the only tolerated condition is an unknown
/// field in non-strict mode, which is logged and skipped instead of raised.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error(transparent)]
    Wire(#[from] WireError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A value token did not parse as the declared type, or a declared
    /// length disagreed with the elements actually present.
    #[error("line {line}: expected {expected}, found `{found}`")]
    MalformedValue {
        expected: String,
        found: String,
        line: usize,
    },

    /// The document's structure disagrees with the registration: wrong type
    /// header, or a field's block did not return to the enclosing depth.
    #[error("line {line}: structure mismatch, expected {expected}, found {found}")]
    StructuralMismatch {
        expected: String,
        found: String,
        line: usize,
    },

    /// An enum token named no constant of the declared enum.
    #[error("line {line}: unknown constant `{token}` for enum {enum_name}")]
    UnknownEnumConstant {
        enum_name: &'static str,
        token: String,
        line: usize,
    },

    /// A stored concrete type name has no registered factory.
    #[error("line {line}: unknown type `{name}`")]
    UnknownType { name: String, line: usize },

    /// Strict mode only: a field line named no registered field.
    #[error("line {line}: unknown field `{field}` on type `{type_name}`")]
    UnknownField {
        type_name: &'static str,
        field: String,
        line: usize,
    },
}
