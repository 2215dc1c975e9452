//! Erased field accessors: the bridge between a type's registered schema and
//! its concrete Rust fields.
//!
//! A [`TypedField`] pairs a [`Codec`] with getter/setter function pointers
//! for one field of one owner type. [`Projection`] rebases an accessor onto
//! an embedding type, which is how inherited fields are flattened into the
//! derived type's table.

use std::any::Any;
use std::sync::Arc;

use statewire_text::{LineReader, LineWriter};

use crate::codec::Codec;
use crate::error::{ConfigError, DecodeError, EncodeError};
use crate::ops::{DecodeOptions, MergeOptions};

/// Field category, chosen once at registration from the declared type.
///
/// The derive order is the canonical wire order: fields sort by category
/// first, then lexically by name. This keeps documents diffable by eye and
/// independent of registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Category {
    Scalar,
    String,
    Enum,
    Nested,
    Array,
    Collection,
    Map,
    Custom,
}

/// One registered field: its wire name, category, and erased operations.
pub(crate) struct FieldDef {
    pub(crate) name: &'static str,
    pub(crate) category: Category,
    pub(crate) ops: Arc<dyn ErasedField + Send + Sync>,
}

/// Object-safe per-field operations over an erased owner.
///
/// The owner is always the type the field was registered for; the registry
/// guarantees it, so implementations downcast with `expect`.
pub(crate) trait ErasedField {
    fn encode(&self, owner: &dyn Any, w: &mut LineWriter<'_>) -> Result<(), EncodeError>;

    fn decode(
        &self,
        owner: &mut dyn Any,
        value: &str,
        r: &mut LineReader<'_>,
        opts: &DecodeOptions,
    ) -> Result<(), DecodeError>;

    /// Emits the field into a patch if it differs. Returns whether it did.
    fn diff(
        &self,
        a: &dyn Any,
        b: &dyn Any,
        w: &mut LineWriter<'_>,
    ) -> Result<bool, EncodeError>;

    fn merge(
        &self,
        owner: &mut dyn Any,
        value: &str,
        r: &mut LineReader<'_>,
        opts: &MergeOptions,
    ) -> Result<(), DecodeError>;

    fn equal(&self, a: &dyn Any, b: &dyn Any) -> Result<bool, ConfigError>;

    fn assign(
        &self,
        target: &mut dyn Any,
        source: &dyn Any,
        keep_instances: bool,
    ) -> Result<(), ConfigError>;
}

/// The concrete accessor for field `F` of owner `T`.
pub(crate) struct TypedField<T, F> {
    pub(crate) name: &'static str,
    pub(crate) codec: Codec<F>,
    pub(crate) get: fn(&T) -> &F,
    pub(crate) get_mut: fn(&mut T) -> &mut F,
}

const OWNER_INVARIANT: &str = "registry dispatched a field accessor to the wrong owner type";

impl<T: 'static, F: 'static> TypedField<T, F> {
    fn view<'o>(&self, owner: &'o dyn Any) -> &'o F {
        (self.get)(owner.downcast_ref::<T>().expect(OWNER_INVARIANT))
    }

    fn view_mut<'o>(&self, owner: &'o mut dyn Any) -> &'o mut F {
        (self.get_mut)(owner.downcast_mut::<T>().expect(OWNER_INVARIANT))
    }

    fn prefix(&self) -> String {
        format!("{}=", self.name)
    }
}

impl<T: 'static, F: 'static> ErasedField for TypedField<T, F> {
    fn encode(&self, owner: &dyn Any, w: &mut LineWriter<'_>) -> Result<(), EncodeError> {
        self.codec.emit(self.view(owner), &self.prefix(), w)
    }

    fn decode(
        &self,
        owner: &mut dyn Any,
        value: &str,
        r: &mut LineReader<'_>,
        opts: &DecodeOptions,
    ) -> Result<(), DecodeError> {
        self.codec.parse(self.view_mut(owner), value, r, opts)
    }

    fn diff(
        &self,
        a: &dyn Any,
        b: &dyn Any,
        w: &mut LineWriter<'_>,
    ) -> Result<bool, EncodeError> {
        self.codec.diff(self.view(a), self.view(b), &self.prefix(), w)
    }

    fn merge(
        &self,
        owner: &mut dyn Any,
        value: &str,
        r: &mut LineReader<'_>,
        opts: &MergeOptions,
    ) -> Result<(), DecodeError> {
        self.codec.merge(self.view_mut(owner), value, r, opts)
    }

    fn equal(&self, a: &dyn Any, b: &dyn Any) -> Result<bool, ConfigError> {
        self.codec.equal(self.view(a), self.view(b))
    }

    fn assign(
        &self,
        target: &mut dyn Any,
        source: &dyn Any,
        keep_instances: bool,
    ) -> Result<(), ConfigError> {
        let source = self.view(source);
        let target = (self.get_mut)(target.downcast_mut::<T>().expect(OWNER_INVARIANT));
        self.codec.assign(target, source, keep_instances)
    }
}

/// Rebases a base type's field accessor onto a type that embeds the base.
///
/// `get`/`get_mut` project the derived owner down to the embedded base value;
/// the wrapped accessor then operates on that as its owner.
pub(crate) struct Projection<T, B> {
    pub(crate) get: fn(&T) -> &B,
    pub(crate) get_mut: fn(&mut T) -> &mut B,
    pub(crate) inner: Arc<dyn ErasedField + Send + Sync>,
}

impl<T: 'static, B: 'static> ErasedField for Projection<T, B> {
    fn encode(&self, owner: &dyn Any, w: &mut LineWriter<'_>) -> Result<(), EncodeError> {
        let base = (self.get)(owner.downcast_ref::<T>().expect(OWNER_INVARIANT));
        self.inner.encode(base, w)
    }

    fn decode(
        &self,
        owner: &mut dyn Any,
        value: &str,
        r: &mut LineReader<'_>,
        opts: &DecodeOptions,
    ) -> Result<(), DecodeError> {
        let base = (self.get_mut)(owner.downcast_mut::<T>().expect(OWNER_INVARIANT));
        self.inner.decode(base, value, r, opts)
    }

    fn diff(
        &self,
        a: &dyn Any,
        b: &dyn Any,
        w: &mut LineWriter<'_>,
    ) -> Result<bool, EncodeError> {
        let a = (self.get)(a.downcast_ref::<T>().expect(OWNER_INVARIANT));
        let b = (self.get)(b.downcast_ref::<T>().expect(OWNER_INVARIANT));
        self.inner.diff(a, b, w)
    }

    fn merge(
        &self,
        owner: &mut dyn Any,
        value: &str,
        r: &mut LineReader<'_>,
        opts: &MergeOptions,
    ) -> Result<(), DecodeError> {
        let base = (self.get_mut)(owner.downcast_mut::<T>().expect(OWNER_INVARIANT));
        self.inner.merge(base, value, r, opts)
    }

    fn equal(&self, a: &dyn Any, b: &dyn Any) -> Result<bool, ConfigError> {
        let a = (self.get)(a.downcast_ref::<T>().expect(OWNER_INVARIANT));
        let b = (self.get)(b.downcast_ref::<T>().expect(OWNER_INVARIANT));
        self.inner.equal(a, b)
    }

    fn assign(
        &self,
        target: &mut dyn Any,
        source: &dyn Any,
        keep_instances: bool,
    ) -> Result<(), ConfigError> {
        let source = (self.get)(source.downcast_ref::<T>().expect(OWNER_INVARIANT));
        let target = (self.get_mut)(target.downcast_mut::<T>().expect(OWNER_INVARIANT));
        self.inner.assign(target, source, keep_instances)
    }
}
