//! The six whole-object walks and their field-table drivers.
//!
//! The drivers iterate a sealed field table in canonical order; everything
//! per-field is delegated to the erased accessors. The public functions at
//! the bottom are the crate's main entry points.

use std::any::Any;
use std::fmt;
use std::io::{self, BufRead, Write};

use tracing::{debug, warn};

use statewire_text::{LineReader, LineWriter, token};

use crate::error::{ConfigResult, DecodeError, DecodeResult, EncodeResult};
use crate::persist::Persist;
use crate::registry::{self, TypeEntry};

/// Decode behavior toggles.
#[derive(Debug, Clone, Copy, Default)]
pub struct DecodeOptions {
    /// Fail on unknown fields instead of skipping them. Off by default so
    /// documents written by newer schemas stay readable.
    pub strict: bool,
}

impl DecodeOptions {
    #[must_use]
    pub fn strict() -> Self {
        Self { strict: true }
    }
}

/// Merge behavior toggles.
#[derive(Debug, Clone, Copy)]
pub struct MergeOptions {
    /// Update nested values in place instead of replacing them. Defaults to
    /// on, which preserves identity for code holding references into the
    /// target graph.
    pub keep_instances: bool,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            keep_instances: true,
        }
    }
}

/// A textual delta between two values of one type, produced by [`diff`] and
/// consumed by [`merge`]. An empty patch means the values were equal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Patch {
    text: String,
}

impl Patch {
    /// Wraps patch text received from elsewhere, e.g. off the network.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }
}

impl fmt::Display for Patch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

pub(crate) fn emit_fields(
    entry: &TypeEntry,
    owner: &dyn Any,
    omit: &dyn Fn(&str) -> bool,
    w: &mut LineWriter<'_>,
) -> EncodeResult<()> {
    for field in &entry.fields {
        if omit(field.name) {
            continue;
        }
        field.ops.encode(owner, w)?;
    }
    Ok(())
}

/// Reads field lines into `owner`. With `until_close` the walk ends at the
/// enclosing block's `}`; otherwise it ends at end of input (root scope).
pub(crate) fn parse_fields(
    entry: &TypeEntry,
    owner: &mut dyn Any,
    r: &mut LineReader<'_>,
    opts: &DecodeOptions,
    until_close: bool,
) -> DecodeResult<()> {
    walk_fields(entry, r, until_close, opts.strict, |def, value, r| {
        def.ops.decode(owner, value, r, opts)
    })
}

pub(crate) fn merge_fields(
    entry: &TypeEntry,
    owner: &mut dyn Any,
    r: &mut LineReader<'_>,
    opts: &MergeOptions,
    until_close: bool,
) -> DecodeResult<()> {
    walk_fields(entry, r, until_close, false, |def, value, r| {
        def.ops.merge(owner, value, r, opts)
    })
}

/// Shared line loop for [`parse_fields`] and [`merge_fields`]: dispatches
/// each field line and enforces that every field's block returns the reader
/// to the enclosing depth.
fn walk_fields(
    entry: &TypeEntry,
    r: &mut LineReader<'_>,
    until_close: bool,
    strict: bool,
    mut apply: impl FnMut(&crate::field::FieldDef, &str, &mut LineReader<'_>) -> DecodeResult<()>,
) -> DecodeResult<()> {
    loop {
        let enclosing = if until_close {
            // Inside a block the reader sits at the block's depth.
            r.depth()
        } else {
            0
        };
        let Some(line) = r.next_line()? else {
            // The reader raises truncation itself when a block is open, so
            // this is a clean end of input at root scope.
            return Ok(());
        };
        if line == "}" {
            if until_close {
                return Ok(());
            }
            return Err(DecodeError::StructuralMismatch {
                expected: "field line".to_string(),
                found: line,
                line: r.line_number(),
            });
        }
        let Some((name, value)) = token::split_field(&line) else {
            return Err(DecodeError::MalformedValue {
                expected: "name=value field line".to_string(),
                found: line.clone(),
                line: r.line_number(),
            });
        };
        match entry.field(name) {
            Some(def) => {
                apply(def, value, r)?;
                if r.depth() != enclosing {
                    return Err(DecodeError::StructuralMismatch {
                        expected: format!("block depth {enclosing} after field `{name}`"),
                        found: format!("block depth {}", r.depth()),
                        line: r.line_number(),
                    });
                }
            }
            None if strict => {
                return Err(DecodeError::UnknownField {
                    type_name: entry.type_name,
                    field: name.to_string(),
                    line: r.line_number(),
                });
            }
            None => {
                warn!(
                    type_name = entry.type_name,
                    field = name,
                    line = r.line_number(),
                    "skipping unknown field"
                );
                r.skip_to_depth(enclosing)?;
            }
        }
    }
}

pub(crate) fn diff_fields(
    entry: &TypeEntry,
    a: &dyn Any,
    b: &dyn Any,
    omit: &dyn Fn(&str) -> bool,
    w: &mut LineWriter<'_>,
) -> EncodeResult<bool> {
    let mut changed = false;
    for field in &entry.fields {
        if omit(field.name) {
            continue;
        }
        changed |= field.ops.diff(a, b, w)?;
    }
    Ok(changed)
}

pub(crate) fn eq_fields(
    entry: &TypeEntry,
    a: &dyn Any,
    b: &dyn Any,
    omit: &dyn Fn(&str) -> bool,
) -> ConfigResult<bool> {
    for field in &entry.fields {
        if omit(field.name) {
            continue;
        }
        if !field.ops.equal(a, b)? {
            return Ok(false);
        }
    }
    Ok(true)
}

pub(crate) fn assign_fields(
    entry: &TypeEntry,
    target: &mut dyn Any,
    source: &dyn Any,
    keep_instances: bool,
) -> ConfigResult<()> {
    for field in &entry.fields {
        field.ops.assign(target, source, keep_instances)?;
    }
    Ok(())
}

/// Writes `value` as a document: its fields at root scope, no enclosing
/// block. Fields suppressed by [`Persist::omit`] are not written.
pub fn serialize<T: Persist>(value: &T, out: &mut dyn Write) -> EncodeResult<()> {
    debug!(type_name = T::TYPE_NAME, "serialize");
    let entry = registry::entry_of::<T>()?;
    let mut w = LineWriter::new(out);
    emit_fields(&entry, value, &|field| value.omit(field), &mut w)
}

/// [`serialize`] into a `String`.
pub fn serialize_to_string<T: Persist>(value: &T) -> EncodeResult<String> {
    let mut buf = Vec::new();
    serialize(value, &mut buf)?;
    Ok(String::from_utf8(buf).expect("wire text is UTF-8"))
}

/// Reads a document into `target`. Fields absent from the document keep
/// their current value; decode into `T::default()` for the usual "defaults
/// plus document" semantics.
pub fn deserialize<T: Persist>(
    target: &mut T,
    input: &mut dyn BufRead,
    opts: &DecodeOptions,
) -> DecodeResult<()> {
    debug!(type_name = T::TYPE_NAME, strict = opts.strict, "deserialize");
    let entry = registry::entry_of::<T>()?;
    let mut r = LineReader::new(input);
    parse_fields(&entry, target, &mut r, opts, false)
}

/// [`deserialize`] from an in-memory string.
pub fn deserialize_from_str<T: Persist>(
    target: &mut T,
    text: &str,
    opts: &DecodeOptions,
) -> DecodeResult<()> {
    let mut input = text.as_bytes();
    deserialize(target, &mut input, opts)
}

/// Builds a new `T` from a document.
pub fn from_document<T: Persist>(text: &str, opts: &DecodeOptions) -> DecodeResult<T> {
    let mut value = T::default();
    deserialize_from_str(&mut value, text, opts)?;
    Ok(value)
}

/// Computes the patch that turns `a` into `b`. Unchanged fields are absent
/// from the patch; equal values produce an empty one.
pub fn diff<T: Persist>(a: &T, b: &T) -> EncodeResult<Patch> {
    debug!(type_name = T::TYPE_NAME, "diff");
    let entry = registry::entry_of::<T>()?;
    let mut buf = Vec::new();
    let mut w = LineWriter::new(&mut buf);
    let omit = |field: &str| a.omit(field) || b.omit(field);
    diff_fields(&entry, a, b, &omit, &mut w)?;
    Ok(Patch {
        text: String::from_utf8(buf).expect("wire text is UTF-8"),
    })
}

/// Applies a patch to `target`. Fields absent from the patch are untouched.
pub fn merge<T: Persist>(target: &mut T, patch: &Patch, opts: &MergeOptions) -> DecodeResult<()> {
    if patch.is_empty() {
        return Ok(());
    }
    debug!(
        type_name = T::TYPE_NAME,
        keep_instances = opts.keep_instances,
        "merge"
    );
    let entry = registry::entry_of::<T>()?;
    let mut input = patch.as_str().as_bytes();
    let mut r = LineReader::new(&mut input);
    merge_fields(&entry, target, &mut r, opts, false)
}

/// A structurally independent copy: every registered field duplicated, no
/// shared mutable state between the copy and the original.
pub fn deep_copy<T: Persist>(value: &T) -> ConfigResult<T> {
    let entry = registry::entry_of::<T>()?;
    let mut copy = T::default();
    assign_fields(&entry, &mut copy, value, false)?;
    Ok(copy)
}

/// Field-by-field equality over the registered fields only. Two values are
/// equal exactly when [`diff`] of them would be empty.
pub fn structural_eq<T: Persist>(a: &T, b: &T) -> ConfigResult<bool> {
    let entry = registry::entry_of::<T>()?;
    eq_fields(&entry, a, b, &|_| false)
}

/// Makes `target` structurally equal to `source` in place. With
/// `keep_instances` nested values are updated rather than replaced, so
/// references into the target graph stay valid.
pub fn copy_from<T: Persist>(target: &mut T, source: &T, keep_instances: bool) -> ConfigResult<()> {
    let entry = registry::entry_of::<T>()?;
    assign_fields(&entry, target, source, keep_instances)
}

/// Writes `value` to a file, replacing any previous contents.
pub fn save_to_file<T: Persist>(value: &T, path: &std::path::Path) -> EncodeResult<()> {
    let file = std::fs::File::create(path)?;
    let mut out = io::BufWriter::new(file);
    serialize(value, &mut out)?;
    out.flush()?;
    Ok(())
}

/// Reads a document from a file into `target`.
pub fn load_from_file<T: Persist>(
    target: &mut T,
    path: &std::path::Path,
    opts: &DecodeOptions,
) -> DecodeResult<()> {
    let file = std::fs::File::open(path).map_err(statewire_text::WireError::Io)?;
    let mut input = io::BufReader::new(file);
    deserialize(target, &mut input, opts)
}
