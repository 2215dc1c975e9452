//! Per-field codecs.
//!
//! A [`Codec<F>`] is an immutable strategy object chosen once at registration
//! time from the field's declared type. All six walks (emit, parse, diff,
//! merge, equality, assign) dispatch through it, so nothing is decided per
//! value at runtime.
//!
//! Containers compose: `Codec::array(Codec::array(Codec::optional(
//! Codec::<i32>::scalar())))` is a ragged two-dimensional array of nullable
//! ints. The composed codec's wire token composes too (`i32?[][]`).

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::sync::Arc;

use statewire_text::token::{self, Header};
use statewire_text::{LineReader, LineWriter, WireError};

use crate::error::{ConfigError, DecodeError, EncodeError};
use crate::enums::WireEnum;
use crate::field::Category;
use crate::ops::{self, DecodeOptions, MergeOptions};
use crate::persist::Persist;
use crate::registry;

/// The erased strategy behind a [`Codec`]. One implementation per category.
pub(crate) trait ValueCodec<F>: Send + Sync {
    fn category(&self) -> Category;

    /// The token written into block headers for this type.
    fn type_token(&self) -> Cow<'static, str>;

    /// Writes the value as one field line or one block. `prefix` is the
    /// `name=` part (empty for bare container elements) and must start the
    /// first line written.
    fn emit(&self, value: &F, prefix: &str, w: &mut LineWriter<'_>) -> Result<(), EncodeError>;

    /// Reads a full value into `target`. `value` is the part after `=`; for
    /// block categories it is the header and the block body follows in `r`.
    fn parse(
        &self,
        target: &mut F,
        value: &str,
        r: &mut LineReader<'_>,
        opts: &DecodeOptions,
    ) -> Result<(), DecodeError>;

    /// Emits the delta from `a` to `b`, returning whether anything was
    /// written. Equal values write nothing.
    fn diff(&self, a: &F, b: &F, prefix: &str, w: &mut LineWriter<'_>)
    -> Result<bool, EncodeError>;

    /// Applies a patch value to `target`.
    fn merge(
        &self,
        target: &mut F,
        value: &str,
        r: &mut LineReader<'_>,
        opts: &MergeOptions,
    ) -> Result<(), DecodeError>;

    fn equal(&self, a: &F, b: &F) -> Result<bool, ConfigError>;

    fn clone_value(&self, value: &F) -> Result<F, ConfigError>;

    /// A default-constructed value, used when decoding grows a container.
    fn fresh(&self) -> F;

    /// Makes `target` structurally equal to `source`. With `keep_instances`
    /// set, existing nested values are updated in place instead of replaced.
    fn assign(&self, target: &mut F, source: &F, keep_instances: bool) -> Result<(), ConfigError>;
}

/// The codec for one field value type.
///
/// Cheap to clone; the strategy behind it is shared and immutable.
pub struct Codec<F> {
    inner: Arc<dyn ValueCodec<F>>,
}

impl<F> Clone for Codec<F> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<F: 'static> Codec<F> {
    pub(crate) fn from_inner(inner: Arc<dyn ValueCodec<F>>) -> Self {
        Self { inner }
    }

    pub(crate) fn category(&self) -> Category {
        self.inner.category()
    }

    pub(crate) fn type_token(&self) -> Cow<'static, str> {
        self.inner.type_token()
    }

    pub(crate) fn emit(
        &self,
        value: &F,
        prefix: &str,
        w: &mut LineWriter<'_>,
    ) -> Result<(), EncodeError> {
        self.inner.emit(value, prefix, w)
    }

    pub(crate) fn parse(
        &self,
        target: &mut F,
        value: &str,
        r: &mut LineReader<'_>,
        opts: &DecodeOptions,
    ) -> Result<(), DecodeError> {
        self.inner.parse(target, value, r, opts)
    }

    pub(crate) fn diff(
        &self,
        a: &F,
        b: &F,
        prefix: &str,
        w: &mut LineWriter<'_>,
    ) -> Result<bool, EncodeError> {
        self.inner.diff(a, b, prefix, w)
    }

    pub(crate) fn merge(
        &self,
        target: &mut F,
        value: &str,
        r: &mut LineReader<'_>,
        opts: &MergeOptions,
    ) -> Result<(), DecodeError> {
        self.inner.merge(target, value, r, opts)
    }

    pub(crate) fn equal(&self, a: &F, b: &F) -> Result<bool, ConfigError> {
        self.inner.equal(a, b)
    }

    pub(crate) fn clone_value(&self, value: &F) -> Result<F, ConfigError> {
        self.inner.clone_value(value)
    }

    pub(crate) fn fresh(&self) -> F {
        self.inner.fresh()
    }

    pub(crate) fn assign(
        &self,
        target: &mut F,
        source: &F,
        keep_instances: bool,
    ) -> Result<(), ConfigError> {
        self.inner.assign(target, source, keep_instances)
    }
}

/// A primitive that travels as a single bare token.
pub trait WireScalar:
    std::fmt::Display + std::str::FromStr + PartialEq + Clone + Default + Send + Sync + 'static
{
    /// The token written into array headers for this element type.
    const TOKEN: &'static str;

    /// Equality as the diff sees it. Floats override this so NaN compares
    /// equal to itself and never produces a patch line.
    fn wire_eq(&self, other: &Self) -> bool {
        self == other
    }
}

macro_rules! impl_wire_scalar {
    ($($ty:ty => $tok:literal),+ $(,)?) => {$(
        impl WireScalar for $ty {
            const TOKEN: &'static str = $tok;
        }
    )+};
}

impl_wire_scalar! {
    bool => "bool",
    i8 => "i8",
    i16 => "i16",
    i32 => "i32",
    i64 => "i64",
    u8 => "u8",
    u16 => "u16",
    u32 => "u32",
    u64 => "u64",
}

impl WireScalar for f32 {
    const TOKEN: &'static str = "f32";

    fn wire_eq(&self, other: &Self) -> bool {
        self == other || (self.is_nan() && other.is_nan())
    }
}

impl WireScalar for f64 {
    const TOKEN: &'static str = "f64";

    fn wire_eq(&self, other: &Self) -> bool {
        self == other || (self.is_nan() && other.is_nan())
    }
}

/// A map key type. Keys travel one per line, ahead of their value.
pub trait WireKey: Ord + Clone + Send + Sync + 'static {
    fn to_token(&self) -> String;

    fn from_token(token: &str, line: usize) -> Result<Self, DecodeError>;
}

impl WireKey for String {
    fn to_token(&self) -> String {
        token::quote(self)
    }

    fn from_token(tok: &str, line: usize) -> Result<Self, DecodeError> {
        if !token::is_quoted(tok) {
            return Err(DecodeError::MalformedValue {
                expected: "quoted string key".to_string(),
                found: tok.to_string(),
                line,
            });
        }
        Ok(token::unquote(tok, line)?)
    }
}

macro_rules! impl_int_wire_key {
    ($($ty:ty),+ $(,)?) => {$(
        impl WireKey for $ty {
            fn to_token(&self) -> String {
                self.to_string()
            }

            fn from_token(tok: &str, line: usize) -> Result<Self, DecodeError> {
                tok.parse().map_err(|_| DecodeError::MalformedValue {
                    expected: concat!(stringify!($ty), " key").to_string(),
                    found: tok.to_string(),
                    line,
                })
            }
        }
    )+};
}

impl_int_wire_key!(i8, i16, i32, i64, u8, u16, u32, u64);

fn truncated(r: &LineReader<'_>) -> DecodeError {
    WireError::TruncatedInput {
        line: r.line_number(),
    }
    .into()
}

/// Parses `value` as a block header and checks its type token.
fn check_header<'v>(
    value: &'v str,
    expected: &str,
    r: &LineReader<'_>,
) -> Result<Header<'v>, DecodeError> {
    let header = token::parse_header(value, r.line_number())?;
    if header.type_token != expected {
        return Err(DecodeError::StructuralMismatch {
            expected: format!("`{expected}` block"),
            found: format!("`{}` block", header.type_token),
            line: r.line_number(),
        });
    }
    Ok(header)
}

struct ScalarCodec<F>(PhantomData<fn(F)>);

impl<F: WireScalar> ValueCodec<F> for ScalarCodec<F> {
    fn category(&self) -> Category {
        Category::Scalar
    }

    fn type_token(&self) -> Cow<'static, str> {
        Cow::Borrowed(F::TOKEN)
    }

    fn emit(&self, value: &F, prefix: &str, w: &mut LineWriter<'_>) -> Result<(), EncodeError> {
        w.line(&format!("{prefix}{value}"))?;
        Ok(())
    }

    fn parse(
        &self,
        target: &mut F,
        value: &str,
        r: &mut LineReader<'_>,
        _opts: &DecodeOptions,
    ) -> Result<(), DecodeError> {
        *target = value.parse().map_err(|_| DecodeError::MalformedValue {
            expected: F::TOKEN.to_string(),
            found: value.to_string(),
            line: r.line_number(),
        })?;
        Ok(())
    }

    fn diff(
        &self,
        a: &F,
        b: &F,
        prefix: &str,
        w: &mut LineWriter<'_>,
    ) -> Result<bool, EncodeError> {
        if a.wire_eq(b) {
            return Ok(false);
        }
        self.emit(b, prefix, w)?;
        Ok(true)
    }

    fn merge(
        &self,
        target: &mut F,
        value: &str,
        r: &mut LineReader<'_>,
        _opts: &MergeOptions,
    ) -> Result<(), DecodeError> {
        self.parse(target, value, r, &DecodeOptions::default())
    }

    fn equal(&self, a: &F, b: &F) -> Result<bool, ConfigError> {
        Ok(a.wire_eq(b))
    }

    fn clone_value(&self, value: &F) -> Result<F, ConfigError> {
        Ok(value.clone())
    }

    fn fresh(&self) -> F {
        F::default()
    }

    fn assign(&self, target: &mut F, source: &F, _keep: bool) -> Result<(), ConfigError> {
        *target = source.clone();
        Ok(())
    }
}

struct StringCodec;

impl ValueCodec<String> for StringCodec {
    fn category(&self) -> Category {
        Category::String
    }

    fn type_token(&self) -> Cow<'static, str> {
        Cow::Borrowed("string")
    }

    fn emit(
        &self,
        value: &String,
        prefix: &str,
        w: &mut LineWriter<'_>,
    ) -> Result<(), EncodeError> {
        w.line(&format!("{prefix}{}", token::quote(value)))?;
        Ok(())
    }

    fn parse(
        &self,
        target: &mut String,
        value: &str,
        r: &mut LineReader<'_>,
        _opts: &DecodeOptions,
    ) -> Result<(), DecodeError> {
        if !token::is_quoted(value) {
            return Err(DecodeError::MalformedValue {
                expected: "quoted string".to_string(),
                found: value.to_string(),
                line: r.line_number(),
            });
        }
        *target = token::unquote(value, r.line_number())?;
        Ok(())
    }

    fn diff(
        &self,
        a: &String,
        b: &String,
        prefix: &str,
        w: &mut LineWriter<'_>,
    ) -> Result<bool, EncodeError> {
        if a == b {
            return Ok(false);
        }
        self.emit(b, prefix, w)?;
        Ok(true)
    }

    fn merge(
        &self,
        target: &mut String,
        value: &str,
        r: &mut LineReader<'_>,
        _opts: &MergeOptions,
    ) -> Result<(), DecodeError> {
        self.parse(target, value, r, &DecodeOptions::default())
    }

    fn equal(&self, a: &String, b: &String) -> Result<bool, ConfigError> {
        Ok(a == b)
    }

    fn clone_value(&self, value: &String) -> Result<String, ConfigError> {
        Ok(value.clone())
    }

    fn fresh(&self) -> String {
        String::new()
    }

    fn assign(&self, target: &mut String, source: &String, _keep: bool) -> Result<(), ConfigError> {
        target.clone_from(source);
        Ok(())
    }
}

struct EnumCodec<E>(PhantomData<fn(E)>);

impl<E: WireEnum> ValueCodec<E> for EnumCodec<E> {
    fn category(&self) -> Category {
        Category::Enum
    }

    fn type_token(&self) -> Cow<'static, str> {
        Cow::Borrowed(E::TYPE_NAME)
    }

    fn emit(&self, value: &E, prefix: &str, w: &mut LineWriter<'_>) -> Result<(), EncodeError> {
        w.line(&format!("{prefix}{}", value.token()))?;
        Ok(())
    }

    fn parse(
        &self,
        target: &mut E,
        value: &str,
        r: &mut LineReader<'_>,
        _opts: &DecodeOptions,
    ) -> Result<(), DecodeError> {
        *target = E::from_token(value).ok_or_else(|| DecodeError::UnknownEnumConstant {
            enum_name: E::TYPE_NAME,
            token: value.to_string(),
            line: r.line_number(),
        })?;
        Ok(())
    }

    fn diff(
        &self,
        a: &E,
        b: &E,
        prefix: &str,
        w: &mut LineWriter<'_>,
    ) -> Result<bool, EncodeError> {
        if a == b {
            return Ok(false);
        }
        self.emit(b, prefix, w)?;
        Ok(true)
    }

    fn merge(
        &self,
        target: &mut E,
        value: &str,
        r: &mut LineReader<'_>,
        _opts: &MergeOptions,
    ) -> Result<(), DecodeError> {
        self.parse(target, value, r, &DecodeOptions::default())
    }

    fn equal(&self, a: &E, b: &E) -> Result<bool, ConfigError> {
        Ok(a == b)
    }

    fn clone_value(&self, value: &E) -> Result<E, ConfigError> {
        Ok(*value)
    }

    fn fresh(&self) -> E {
        E::default()
    }

    fn assign(&self, target: &mut E, source: &E, _keep: bool) -> Result<(), ConfigError> {
        *target = *source;
        Ok(())
    }
}

struct NestedCodec<P>(PhantomData<fn(P)>);

impl<P: Persist> ValueCodec<P> for NestedCodec<P> {
    fn category(&self) -> Category {
        Category::Nested
    }

    fn type_token(&self) -> Cow<'static, str> {
        Cow::Borrowed(P::TYPE_NAME)
    }

    fn emit(&self, value: &P, prefix: &str, w: &mut LineWriter<'_>) -> Result<(), EncodeError> {
        let entry = registry::entry_of::<P>()?;
        w.open(&format!(
            "{prefix}{}",
            token::format_header(P::TYPE_NAME, None)
        ))?;
        ops::emit_fields(&entry, value, &|field| value.omit(field), w)?;
        w.close()?;
        Ok(())
    }

    fn parse(
        &self,
        target: &mut P,
        value: &str,
        r: &mut LineReader<'_>,
        opts: &DecodeOptions,
    ) -> Result<(), DecodeError> {
        let entry = registry::entry_of::<P>()?;
        let header = check_header(value, P::TYPE_NAME, r)?;
        if header.length.is_some() {
            return Err(DecodeError::MalformedValue {
                expected: "object header without length".to_string(),
                found: value.to_string(),
                line: r.line_number(),
            });
        }
        ops::parse_fields(&entry, target, r, opts, true)
    }

    fn diff(
        &self,
        a: &P,
        b: &P,
        prefix: &str,
        w: &mut LineWriter<'_>,
    ) -> Result<bool, EncodeError> {
        let entry = registry::entry_of::<P>()?;
        let omit = |field: &str| a.omit(field) || b.omit(field);
        if ops::eq_fields(&entry, a, b, &omit)? {
            return Ok(false);
        }
        w.open(&format!(
            "{prefix}{}",
            token::format_header(P::TYPE_NAME, None)
        ))?;
        ops::diff_fields(&entry, a, b, &omit, w)?;
        w.close()?;
        Ok(true)
    }

    fn merge(
        &self,
        target: &mut P,
        value: &str,
        r: &mut LineReader<'_>,
        opts: &MergeOptions,
    ) -> Result<(), DecodeError> {
        let entry = registry::entry_of::<P>()?;
        check_header(value, P::TYPE_NAME, r)?;
        if !opts.keep_instances {
            *target = P::default();
        }
        ops::merge_fields(&entry, target, r, opts, true)
    }

    fn equal(&self, a: &P, b: &P) -> Result<bool, ConfigError> {
        let entry = registry::entry_of::<P>()?;
        ops::eq_fields(&entry, a, b, &|_| false)
    }

    fn clone_value(&self, value: &P) -> Result<P, ConfigError> {
        let entry = registry::entry_of::<P>()?;
        let mut copy = P::default();
        ops::assign_fields(&entry, &mut copy, value, false)?;
        Ok(copy)
    }

    fn fresh(&self) -> P {
        P::default()
    }

    fn assign(&self, target: &mut P, source: &P, keep: bool) -> Result<(), ConfigError> {
        let entry = registry::entry_of::<P>()?;
        ops::assign_fields(&entry, target, source, keep)
    }
}

struct OptionalCodec<F> {
    inner: Codec<F>,
}

impl<F: 'static> ValueCodec<Option<F>> for OptionalCodec<F> {
    fn category(&self) -> Category {
        self.inner.category()
    }

    fn type_token(&self) -> Cow<'static, str> {
        Cow::Owned(format!("{}?", self.inner.type_token()))
    }

    fn emit(
        &self,
        value: &Option<F>,
        prefix: &str,
        w: &mut LineWriter<'_>,
    ) -> Result<(), EncodeError> {
        match value {
            None => {
                w.line(&format!("{prefix}{}", token::NULL))?;
                Ok(())
            }
            Some(v) => self.inner.emit(v, prefix, w),
        }
    }

    fn parse(
        &self,
        target: &mut Option<F>,
        value: &str,
        r: &mut LineReader<'_>,
        opts: &DecodeOptions,
    ) -> Result<(), DecodeError> {
        if value == token::NULL {
            *target = None;
            return Ok(());
        }
        match target {
            Some(v) => self.inner.parse(v, value, r, opts),
            None => {
                let mut v = self.inner.fresh();
                self.inner.parse(&mut v, value, r, opts)?;
                *target = Some(v);
                Ok(())
            }
        }
    }

    fn diff(
        &self,
        a: &Option<F>,
        b: &Option<F>,
        prefix: &str,
        w: &mut LineWriter<'_>,
    ) -> Result<bool, EncodeError> {
        match (a, b) {
            (None, None) => Ok(false),
            (Some(x), Some(y)) => self.inner.diff(x, y, prefix, w),
            // Appearing: the patch carries the full value.
            (None, Some(y)) => {
                self.inner.emit(y, prefix, w)?;
                Ok(true)
            }
            (Some(_), None) => {
                w.line(&format!("{prefix}{}", token::NULL))?;
                Ok(true)
            }
        }
    }

    fn merge(
        &self,
        target: &mut Option<F>,
        value: &str,
        r: &mut LineReader<'_>,
        opts: &MergeOptions,
    ) -> Result<(), DecodeError> {
        if value == token::NULL {
            *target = None;
            return Ok(());
        }
        match target {
            Some(v) => self.inner.merge(v, value, r, opts),
            // An appearing value travels whole, not as a sub-patch.
            slot => {
                let mut v = self.inner.fresh();
                self.inner.parse(&mut v, value, r, &DecodeOptions::default())?;
                *slot = Some(v);
                Ok(())
            }
        }
    }

    fn equal(&self, a: &Option<F>, b: &Option<F>) -> Result<bool, ConfigError> {
        match (a, b) {
            (None, None) => Ok(true),
            (Some(x), Some(y)) => self.inner.equal(x, y),
            _ => Ok(false),
        }
    }

    fn clone_value(&self, value: &Option<F>) -> Result<Option<F>, ConfigError> {
        value.as_ref().map(|v| self.inner.clone_value(v)).transpose()
    }

    fn fresh(&self) -> Option<F> {
        None
    }

    fn assign(
        &self,
        target: &mut Option<F>,
        source: &Option<F>,
        keep: bool,
    ) -> Result<(), ConfigError> {
        match (target, source) {
            (Some(t), Some(s)) if keep => self.inner.assign(t, s, true),
            (slot, Some(s)) => {
                *slot = Some(self.inner.clone_value(s)?);
                Ok(())
            }
            (slot, None) => {
                *slot = None;
                Ok(())
            }
        }
    }
}

struct BoxedCodec<F> {
    inner: Codec<F>,
}

impl<F: 'static> ValueCodec<Box<F>> for BoxedCodec<F> {
    fn category(&self) -> Category {
        self.inner.category()
    }

    fn type_token(&self) -> Cow<'static, str> {
        self.inner.type_token()
    }

    fn emit(
        &self,
        value: &Box<F>,
        prefix: &str,
        w: &mut LineWriter<'_>,
    ) -> Result<(), EncodeError> {
        self.inner.emit(value, prefix, w)
    }

    fn parse(
        &self,
        target: &mut Box<F>,
        value: &str,
        r: &mut LineReader<'_>,
        opts: &DecodeOptions,
    ) -> Result<(), DecodeError> {
        self.inner.parse(target, value, r, opts)
    }

    fn diff(
        &self,
        a: &Box<F>,
        b: &Box<F>,
        prefix: &str,
        w: &mut LineWriter<'_>,
    ) -> Result<bool, EncodeError> {
        self.inner.diff(a, b, prefix, w)
    }

    fn merge(
        &self,
        target: &mut Box<F>,
        value: &str,
        r: &mut LineReader<'_>,
        opts: &MergeOptions,
    ) -> Result<(), DecodeError> {
        self.inner.merge(target, value, r, opts)
    }

    fn equal(&self, a: &Box<F>, b: &Box<F>) -> Result<bool, ConfigError> {
        self.inner.equal(a, b)
    }

    fn clone_value(&self, value: &Box<F>) -> Result<Box<F>, ConfigError> {
        Ok(Box::new(self.inner.clone_value(value)?))
    }

    fn fresh(&self) -> Box<F> {
        Box::new(self.inner.fresh())
    }

    fn assign(&self, target: &mut Box<F>, source: &Box<F>, keep: bool) -> Result<(), ConfigError> {
        if keep {
            self.inner.assign(target, source, true)
        } else {
            *target = Box::new(self.inner.clone_value(source)?);
            Ok(())
        }
    }
}

struct ArrayCodec<F> {
    elem: Codec<F>,
}

impl<F: 'static> ValueCodec<Vec<F>> for ArrayCodec<F> {
    fn category(&self) -> Category {
        Category::Array
    }

    fn type_token(&self) -> Cow<'static, str> {
        Cow::Owned(format!("{}[]", self.elem.type_token()))
    }

    fn emit(
        &self,
        value: &Vec<F>,
        prefix: &str,
        w: &mut LineWriter<'_>,
    ) -> Result<(), EncodeError> {
        w.open(&format!(
            "{prefix}{}",
            token::format_header(&self.elem.type_token(), Some(value.len()))
        ))?;
        for v in value {
            self.elem.emit(v, "", w)?;
        }
        w.close()?;
        Ok(())
    }

    fn parse(
        &self,
        target: &mut Vec<F>,
        value: &str,
        r: &mut LineReader<'_>,
        opts: &DecodeOptions,
    ) -> Result<(), DecodeError> {
        let header = check_header(value, &self.elem.type_token(), r)?;
        let declared = header.length.ok_or_else(|| DecodeError::MalformedValue {
            expected: "array header with length".to_string(),
            found: value.to_string(),
            line: r.line_number(),
        })?;

        target.clear();
        for have in 0..declared {
            let Some(line) = r.next_line()? else {
                return Err(truncated(r));
            };
            if line == "}" {
                return Err(DecodeError::MalformedValue {
                    expected: format!("{declared} array elements"),
                    found: format!("{have} elements"),
                    line: r.line_number(),
                });
            }
            let mut element = self.elem.fresh();
            self.elem.parse(&mut element, &line, r, opts)?;
            target.push(element);
        }
        match r.next_line()? {
            Some(line) if line == "}" => Ok(()),
            Some(line) => Err(DecodeError::MalformedValue {
                expected: format!("{declared} array elements"),
                found: format!("extra line `{line}`"),
                line: r.line_number(),
            }),
            None => Err(truncated(r)),
        }
    }

    fn diff(
        &self,
        a: &Vec<F>,
        b: &Vec<F>,
        prefix: &str,
        w: &mut LineWriter<'_>,
    ) -> Result<bool, EncodeError> {
        if self.equal(a, b)? {
            return Ok(false);
        }
        // Positional diff: the header carries the new length, body lines
        // carry changed or appended indices. Shrinking may produce a
        // header-only block.
        w.open(&format!(
            "{prefix}{}",
            token::format_header(&self.elem.type_token(), Some(b.len()))
        ))?;
        for (i, bv) in b.iter().enumerate() {
            if i >= a.len() || !self.elem.equal(&a[i], bv)? {
                self.elem.emit(bv, &format!("{i}="), w)?;
            }
        }
        w.close()?;
        Ok(true)
    }

    fn merge(
        &self,
        target: &mut Vec<F>,
        value: &str,
        r: &mut LineReader<'_>,
        _opts: &MergeOptions,
    ) -> Result<(), DecodeError> {
        let header = check_header(value, &self.elem.type_token(), r)?;
        let new_len = header.length.ok_or_else(|| DecodeError::MalformedValue {
            expected: "array header with length".to_string(),
            found: value.to_string(),
            line: r.line_number(),
        })?;

        target.truncate(new_len);
        loop {
            let Some(line) = r.next_line()? else {
                return Err(truncated(r));
            };
            if line == "}" {
                break;
            }
            let Some((index, elem_value)) = token::split_field(&line) else {
                return Err(DecodeError::MalformedValue {
                    expected: "index=value patch line".to_string(),
                    found: line.clone(),
                    line: r.line_number(),
                });
            };
            let index: usize = index.parse().map_err(|_| DecodeError::MalformedValue {
                expected: "array index".to_string(),
                found: line.clone(),
                line: r.line_number(),
            })?;

            if index < target.len() {
                // Changed elements travel whole, so re-parse in place.
                self.elem
                    .parse(&mut target[index], elem_value, r, &DecodeOptions::default())?;
            } else if index == target.len() {
                let mut element = self.elem.fresh();
                self.elem
                    .parse(&mut element, elem_value, r, &DecodeOptions::default())?;
                target.push(element);
            } else {
                // Patches list appended indices in order, so a gap means the
                // patch does not match this base.
                return Err(DecodeError::StructuralMismatch {
                    expected: format!("array index at most {}", target.len()),
                    found: index.to_string(),
                    line: r.line_number(),
                });
            }
        }
        if target.len() != new_len {
            return Err(DecodeError::MalformedValue {
                expected: format!("{new_len} array elements after patch"),
                found: target.len().to_string(),
                line: r.line_number(),
            });
        }
        Ok(())
    }

    fn equal(&self, a: &Vec<F>, b: &Vec<F>) -> Result<bool, ConfigError> {
        if a.len() != b.len() {
            return Ok(false);
        }
        for (x, y) in a.iter().zip(b) {
            if !self.elem.equal(x, y)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn clone_value(&self, value: &Vec<F>) -> Result<Vec<F>, ConfigError> {
        value.iter().map(|v| self.elem.clone_value(v)).collect()
    }

    fn fresh(&self) -> Vec<F> {
        Vec::new()
    }

    fn assign(&self, target: &mut Vec<F>, source: &Vec<F>, keep: bool) -> Result<(), ConfigError> {
        if !keep {
            *target = self.clone_value(source)?;
            return Ok(());
        }
        target.truncate(source.len());
        let shared = target.len();
        for (t, s) in target.iter_mut().zip(source) {
            self.elem.assign(t, s, true)?;
        }
        for s in &source[shared..] {
            target.push(self.elem.clone_value(s)?);
        }
        Ok(())
    }
}

struct MapCodec<K, V> {
    value_codec: Codec<V>,
    _key: PhantomData<fn(K)>,
}

impl<K: WireKey, V: 'static> ValueCodec<BTreeMap<K, V>> for MapCodec<K, V> {
    fn category(&self) -> Category {
        Category::Map
    }

    fn type_token(&self) -> Cow<'static, str> {
        Cow::Borrowed("map")
    }

    fn emit(
        &self,
        value: &BTreeMap<K, V>,
        prefix: &str,
        w: &mut LineWriter<'_>,
    ) -> Result<(), EncodeError> {
        w.open(&format!("{prefix}{}", token::format_header("map", None)))?;
        for (k, v) in value {
            w.line(&k.to_token())?;
            self.value_codec.emit(v, "", w)?;
        }
        w.close()?;
        Ok(())
    }

    fn parse(
        &self,
        target: &mut BTreeMap<K, V>,
        value: &str,
        r: &mut LineReader<'_>,
        opts: &DecodeOptions,
    ) -> Result<(), DecodeError> {
        check_header(value, "map", r)?;
        target.clear();
        loop {
            let Some(line) = r.next_line()? else {
                return Err(truncated(r));
            };
            if line == "}" {
                return Ok(());
            }
            let key = K::from_token(&line, r.line_number())?;
            let Some(value_line) = r.next_line()? else {
                return Err(truncated(r));
            };
            if value_line == "}" {
                return Err(DecodeError::MalformedValue {
                    expected: "map value line".to_string(),
                    found: "}".to_string(),
                    line: r.line_number(),
                });
            }
            let mut v = self.value_codec.fresh();
            self.value_codec.parse(&mut v, &value_line, r, opts)?;
            target.insert(key, v);
        }
    }

    fn diff(
        &self,
        a: &BTreeMap<K, V>,
        b: &BTreeMap<K, V>,
        prefix: &str,
        w: &mut LineWriter<'_>,
    ) -> Result<bool, EncodeError> {
        if self.equal(a, b)? {
            return Ok(false);
        }
        w.open(&format!("{prefix}{}", token::format_header("map", None)))?;
        for (k, bv) in b {
            let changed = match a.get(k) {
                None => true,
                Some(av) => !self.value_codec.equal(av, bv)?,
            };
            if changed {
                w.line(&k.to_token())?;
                self.value_codec.emit(bv, "", w)?;
            }
        }
        for k in a.keys() {
            if !b.contains_key(k) {
                w.line(&k.to_token())?;
                w.line(token::TOMBSTONE)?;
            }
        }
        w.close()?;
        Ok(true)
    }

    fn merge(
        &self,
        target: &mut BTreeMap<K, V>,
        value: &str,
        r: &mut LineReader<'_>,
        opts: &MergeOptions,
    ) -> Result<(), DecodeError> {
        check_header(value, "map", r)?;
        loop {
            let Some(line) = r.next_line()? else {
                return Err(truncated(r));
            };
            if line == "}" {
                return Ok(());
            }
            let key = K::from_token(&line, r.line_number())?;
            let Some(value_line) = r.next_line()? else {
                return Err(truncated(r));
            };
            if value_line == token::TOMBSTONE {
                target.remove(&key);
                continue;
            }
            if opts.keep_instances {
                if let Some(existing) = target.get_mut(&key) {
                    // Changed values travel whole, so re-parse in place.
                    self.value_codec
                        .parse(existing, &value_line, r, &DecodeOptions::default())?;
                    continue;
                }
            }
            let mut v = self.value_codec.fresh();
            self.value_codec
                .parse(&mut v, &value_line, r, &DecodeOptions::default())?;
            target.insert(key, v);
        }
    }

    fn equal(&self, a: &BTreeMap<K, V>, b: &BTreeMap<K, V>) -> Result<bool, ConfigError> {
        if a.len() != b.len() {
            return Ok(false);
        }
        for (k, av) in a {
            match b.get(k) {
                Some(bv) if self.value_codec.equal(av, bv)? => {}
                _ => return Ok(false),
            }
        }
        Ok(true)
    }

    fn clone_value(&self, value: &BTreeMap<K, V>) -> Result<BTreeMap<K, V>, ConfigError> {
        value
            .iter()
            .map(|(k, v)| Ok((k.clone(), self.value_codec.clone_value(v)?)))
            .collect()
    }

    fn fresh(&self) -> BTreeMap<K, V> {
        BTreeMap::new()
    }

    fn assign(
        &self,
        target: &mut BTreeMap<K, V>,
        source: &BTreeMap<K, V>,
        keep: bool,
    ) -> Result<(), ConfigError> {
        if !keep {
            *target = self.clone_value(source)?;
            return Ok(());
        }
        target.retain(|k, _| source.contains_key(k));
        for (k, sv) in source {
            if let Some(tv) = target.get_mut(k) {
                self.value_codec.assign(tv, sv, true)?;
            } else {
                target.insert(k.clone(), self.value_codec.clone_value(sv)?);
            }
        }
        Ok(())
    }
}

type WriteFn<F> =
    Box<dyn Fn(&F, &str, &mut LineWriter<'_>) -> Result<(), EncodeError> + Send + Sync>;
type ReadFn<F> =
    Box<dyn Fn(&mut F, &str, &mut LineReader<'_>) -> Result<(), DecodeError> + Send + Sync>;
type EqualFn<F> = Box<dyn Fn(&F, &F) -> bool + Send + Sync>;
type CopyFn<F> = Box<dyn Fn(&F) -> F + Send + Sync>;

struct CustomFieldCodec<F> {
    write: WriteFn<F>,
    read: ReadFn<F>,
    equal: EqualFn<F>,
    copy: Option<CopyFn<F>>,
}

impl<F: Clone + Default + Send + Sync + 'static> ValueCodec<F> for CustomFieldCodec<F> {
    fn category(&self) -> Category {
        Category::Custom
    }

    fn type_token(&self) -> Cow<'static, str> {
        Cow::Borrowed("custom")
    }

    fn emit(&self, value: &F, prefix: &str, w: &mut LineWriter<'_>) -> Result<(), EncodeError> {
        (self.write)(value, prefix, w)
    }

    fn parse(
        &self,
        target: &mut F,
        value: &str,
        r: &mut LineReader<'_>,
        _opts: &DecodeOptions,
    ) -> Result<(), DecodeError> {
        (self.read)(target, value, r)
    }

    fn diff(
        &self,
        a: &F,
        b: &F,
        prefix: &str,
        w: &mut LineWriter<'_>,
    ) -> Result<bool, EncodeError> {
        if (self.equal)(a, b) {
            return Ok(false);
        }
        (self.write)(b, prefix, w)?;
        Ok(true)
    }

    fn merge(
        &self,
        target: &mut F,
        value: &str,
        r: &mut LineReader<'_>,
        _opts: &MergeOptions,
    ) -> Result<(), DecodeError> {
        (self.read)(target, value, r)
    }

    fn equal(&self, a: &F, b: &F) -> Result<bool, ConfigError> {
        Ok((self.equal)(a, b))
    }

    fn clone_value(&self, value: &F) -> Result<F, ConfigError> {
        match &self.copy {
            Some(copy) => Ok(copy(value)),
            None => Ok(value.clone()),
        }
    }

    fn fresh(&self) -> F {
        F::default()
    }

    fn assign(&self, target: &mut F, source: &F, _keep: bool) -> Result<(), ConfigError> {
        *target = self.clone_value(source)?;
        Ok(())
    }
}

impl<F: WireScalar> Codec<F> {
    /// Codec for a bare-token primitive (`bool`, integers, floats).
    #[must_use]
    pub fn scalar() -> Self {
        Self::from_inner(Arc::new(ScalarCodec::<F>(PhantomData)))
    }
}

impl Codec<String> {
    /// Codec for a quoted, escaped string.
    #[must_use]
    pub fn string() -> Self {
        Self::from_inner(Arc::new(StringCodec))
    }
}

impl<E: WireEnum> Codec<E> {
    /// Codec for a [`WireEnum`]: constants travel by name.
    #[must_use]
    pub fn enumeration() -> Self {
        Self::from_inner(Arc::new(EnumCodec::<E>(PhantomData)))
    }
}

impl<P: Persist> Codec<P> {
    /// Codec for a registered nested object, serialized inline as a block.
    ///
    /// The nested type must itself be registered before the first operation
    /// that walks this field, or that operation fails with
    /// [`ConfigError::NotRegistered`].
    #[must_use]
    pub fn nested() -> Self {
        Self::from_inner(Arc::new(NestedCodec::<P>(PhantomData)))
    }
}

impl<F: 'static> Codec<Option<F>> {
    /// Wraps a codec so the field may be absent, written as `null`.
    #[must_use]
    pub fn optional(inner: Codec<F>) -> Self {
        Self::from_inner(Arc::new(OptionalCodec { inner }))
    }
}

impl<F: 'static> Codec<Box<F>> {
    /// Wraps a codec for a boxed field. The box is invisible on the wire.
    #[must_use]
    pub fn boxed(inner: Codec<F>) -> Self {
        Self::from_inner(Arc::new(BoxedCodec { inner }))
    }
}

impl<F: 'static> Codec<Vec<F>> {
    /// Codec for a `Vec` of any codec-equipped element. Nest for higher
    /// ranks; wrap the element in [`Codec::optional`] for nullable slots.
    #[must_use]
    pub fn array(elem: Codec<F>) -> Self {
        Self::from_inner(Arc::new(ArrayCodec { elem }))
    }
}

impl<K: WireKey, V: 'static> Codec<BTreeMap<K, V>> {
    /// Codec for an ordered map with [`WireKey`] keys.
    #[must_use]
    pub fn map(value_codec: Codec<V>) -> Self {
        Self::from_inner(Arc::new(MapCodec {
            value_codec,
            _key: PhantomData,
        }))
    }
}

impl<F: Clone + Default + Send + Sync + 'static> Codec<F> {
    /// Codec with caller-supplied read/write/equality, for fields whose wire
    /// form the built-in categories cannot express.
    ///
    /// `write` receives the value, the `name=` prefix its first line must
    /// start with, and the writer. `read` receives the target, the part of
    /// the field line after `=`, and the reader positioned after that line.
    /// Deep copies fall back to `Clone`; use [`Codec::custom_with_copy`]
    /// when cloning would share state that must not be shared.
    pub fn custom<W, R, Q>(write: W, read: R, equal: Q) -> Self
    where
        W: Fn(&F, &str, &mut LineWriter<'_>) -> Result<(), EncodeError> + Send + Sync + 'static,
        R: Fn(&mut F, &str, &mut LineReader<'_>) -> Result<(), DecodeError> + Send + Sync + 'static,
        Q: Fn(&F, &F) -> bool + Send + Sync + 'static,
    {
        Self::from_inner(Arc::new(CustomFieldCodec {
            write: Box::new(write),
            read: Box::new(read),
            equal: Box::new(equal),
            copy: None,
        }))
    }

    /// Like [`Codec::custom`], with an explicit deep-copy function.
    pub fn custom_with_copy<W, R, Q, C>(write: W, read: R, equal: Q, copy: C) -> Self
    where
        W: Fn(&F, &str, &mut LineWriter<'_>) -> Result<(), EncodeError> + Send + Sync + 'static,
        R: Fn(&mut F, &str, &mut LineReader<'_>) -> Result<(), DecodeError> + Send + Sync + 'static,
        Q: Fn(&F, &F) -> bool + Send + Sync + 'static,
        C: Fn(&F) -> F + Send + Sync + 'static,
    {
        Self::from_inner(Arc::new(CustomFieldCodec {
            write: Box::new(write),
            read: Box::new(read),
            equal: Box::new(equal),
            copy: Some(Box::new(copy)),
        }))
    }
}
