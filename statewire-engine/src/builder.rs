//! Schema declaration. [`Persist::schema`] receives a [`TypeBuilder`] and
//! declares every participating field; nothing is discovered by reflection
//! at walk time.

use std::collections::HashSet;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::codec::Codec;
use crate::error::ConfigError;
use crate::field::{FieldDef, Projection, TypedField};
use crate::persist::Persist;
use crate::registry::TypeEntry;

/// Collects the field table for one type during registration.
///
/// Declaration order is irrelevant: fields are sorted into canonical order
/// (category rank, then name) when the table is sealed. Errors are held and
/// reported from [`register`](crate::register), so the `schema` body can
/// stay declaration-shaped.
pub struct TypeBuilder<T: Persist> {
    fields: Vec<FieldDef>,
    omitted: Vec<&'static str>,
    error: Option<ConfigError>,
    _owner: PhantomData<fn(T)>,
}

impl<T: Persist> TypeBuilder<T> {
    pub(crate) fn new() -> Self {
        Self {
            fields: Vec::new(),
            omitted: Vec::new(),
            error: None,
            _owner: PhantomData,
        }
    }

    /// Declares one field: its wire name, codec, and accessors.
    pub fn field<F: 'static>(
        &mut self,
        name: &'static str,
        codec: Codec<F>,
        get: fn(&T) -> &F,
        get_mut: fn(&mut T) -> &mut F,
    ) -> &mut Self {
        let category = codec.category();
        self.fields.push(FieldDef {
            name,
            category,
            ops: Arc::new(TypedField {
                name,
                codec,
                get,
                get_mut,
            }),
        });
        self
    }

    /// Inherits every field of an embedded base type.
    ///
    /// The base's fields join this type's table as if declared here, so a
    /// name collision with a local field is a [`ConfigError::DuplicateField`]
    /// on this type. The base itself does not need to be registered.
    pub fn base<B: Persist>(
        &mut self,
        get: fn(&T) -> &B,
        get_mut: fn(&mut T) -> &mut B,
    ) -> &mut Self {
        let mut inherited = TypeBuilder::<B>::new();
        B::schema(&mut inherited);
        match inherited.resolve(B::TYPE_NAME) {
            Ok(defs) => {
                for def in defs {
                    self.fields.push(FieldDef {
                        name: def.name,
                        category: def.category,
                        ops: Arc::new(Projection::<T, B> {
                            get,
                            get_mut,
                            inner: def.ops,
                        }),
                    });
                }
            }
            Err(err) => {
                if self.error.is_none() {
                    self.error = Some(err);
                }
            }
        }
        self
    }

    /// Excludes a declared field (its own or inherited) from every walk.
    ///
    /// Naming a field that is not in the table is an error; it usually means
    /// the omission outlived a schema change.
    pub fn omit(&mut self, name: &'static str) -> &mut Self {
        self.omitted.push(name);
        self
    }

    /// Applies omissions and returns the raw field list, unsorted.
    fn resolve(mut self, type_name: &'static str) -> Result<Vec<FieldDef>, ConfigError> {
        if let Some(err) = self.error.take() {
            return Err(err);
        }
        for name in &self.omitted {
            let before = self.fields.len();
            self.fields.retain(|f| f.name != *name);
            if self.fields.len() == before {
                return Err(ConfigError::UnknownField {
                    type_name,
                    field: name,
                });
            }
        }
        Ok(self.fields)
    }

    /// Seals the table: checks duplicates and sorts into canonical order.
    pub(crate) fn finish(self, type_name: &'static str) -> Result<TypeEntry, ConfigError> {
        let mut fields = self.resolve(type_name)?;

        let mut seen = HashSet::with_capacity(fields.len());
        for field in &fields {
            if !seen.insert(field.name) {
                return Err(ConfigError::DuplicateField {
                    type_name,
                    field: field.name,
                });
            }
        }

        fields.sort_by(|x, y| x.category.cmp(&y.category).then_with(|| x.name.cmp(y.name)));
        Ok(TypeEntry { type_name, fields })
    }
}
