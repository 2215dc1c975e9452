//! The [`Persist`] trait and its object-safe counterpart [`Persistable`].

use std::any::Any;

use statewire_text::{LineReader, LineWriter};

use crate::builder::TypeBuilder;
use crate::error::{ConfigError, DecodeError, EncodeError};
use crate::ops::{self, DecodeOptions};
use crate::registry;

/// A type that participates in serialization, diffing, and copying.
///
/// `Default` doubles as the decode constructor: fields absent from a
/// document keep their default value, which is how documents written by
/// older schemas remain readable.
pub trait Persist: Default + Send + 'static {
    /// The name this type travels under. Must be process-unique.
    const TYPE_NAME: &'static str;

    /// Declares the field table. Called once, at registration.
    fn schema(builder: &mut TypeBuilder<Self>);

    /// Per-instance field suppression, consulted on every serialize and
    /// diff. Unlike [`TypeBuilder::omit`] this can vary at runtime, e.g.
    /// hiding a hand of cards from one recipient.
    fn omit(&self, _field: &str) -> bool {
        false
    }
}

/// Object-safe operations over any registered value, used where concrete
/// types are unknown at compile time (heterogeneous collections).
///
/// Implemented for every `T: Persist` via a blanket impl; never implement
/// it directly.
pub trait Persistable: Any + Send {
    fn type_name(&self) -> &'static str;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Writes the field lines of this value (not the enclosing header).
    fn emit_body(&self, w: &mut LineWriter<'_>) -> Result<(), EncodeError>;

    /// Reads field lines up to the closing brace of this value's block.
    fn parse_body(&mut self, r: &mut LineReader<'_>, opts: &DecodeOptions)
    -> Result<(), DecodeError>;

    /// Structural equality. Values of different concrete types are unequal.
    fn eq_dyn(&self, other: &dyn Persistable) -> Result<bool, ConfigError>;

    fn clone_dyn(&self) -> Result<Box<dyn Persistable>, ConfigError>;

    fn copy_from_dyn(
        &mut self,
        source: &dyn Persistable,
        keep_instances: bool,
    ) -> Result<(), ConfigError>;
}

impl<T: Persist> Persistable for T {
    fn type_name(&self) -> &'static str {
        T::TYPE_NAME
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn emit_body(&self, w: &mut LineWriter<'_>) -> Result<(), EncodeError> {
        let entry = registry::entry_of::<T>()?;
        ops::emit_fields(&entry, self, &|field| self.omit(field), w)
    }

    fn parse_body(
        &mut self,
        r: &mut LineReader<'_>,
        opts: &DecodeOptions,
    ) -> Result<(), DecodeError> {
        let entry = registry::entry_of::<T>()?;
        ops::parse_fields(&entry, self, r, opts, true)
    }

    fn eq_dyn(&self, other: &dyn Persistable) -> Result<bool, ConfigError> {
        let Some(other) = other.as_any().downcast_ref::<T>() else {
            return Ok(false);
        };
        let entry = registry::entry_of::<T>()?;
        ops::eq_fields(&entry, self, other, &|_| false)
    }

    fn clone_dyn(&self) -> Result<Box<dyn Persistable>, ConfigError> {
        let entry = registry::entry_of::<T>()?;
        let mut copy = T::default();
        ops::assign_fields(&entry, &mut copy, self, false)?;
        Ok(Box::new(copy))
    }

    fn copy_from_dyn(
        &mut self,
        source: &dyn Persistable,
        keep_instances: bool,
    ) -> Result<(), ConfigError> {
        let Some(source) = source.as_any().downcast_ref::<T>() else {
            return Err(ConfigError::TypeMismatch {
                expected: T::TYPE_NAME,
                found: source.type_name(),
            });
        };
        let entry = registry::entry_of::<T>()?;
        ops::assign_fields(&entry, self, source, keep_instances)
    }
}
