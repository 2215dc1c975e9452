//! The process-wide type registry.
//!
//! Registration is explicit and idempotent. Every operation looks its types
//! up here; an unregistered type fails with [`ConfigError::NotRegistered`]
//! rather than being guessed at.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock, PoisonError, RwLock};

use tracing::debug;

use crate::builder::TypeBuilder;
use crate::error::{ConfigError, ConfigResult};
use crate::field::FieldDef;
use crate::persist::{Persist, Persistable};

/// The sealed field table for one registered type.
pub(crate) struct TypeEntry {
    pub(crate) type_name: &'static str,
    pub(crate) fields: Vec<FieldDef>,
}

impl TypeEntry {
    pub(crate) fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }
}

type Factory = fn() -> Box<dyn Persistable>;

#[derive(Default)]
struct Registry {
    entries: HashMap<TypeId, Arc<TypeEntry>>,
    names: HashMap<&'static str, TypeId>,
    factories: HashMap<&'static str, Factory>,
}

static REGISTRY: LazyLock<RwLock<Registry>> = LazyLock::new(RwLock::default);

fn make_boxed<T: Persist>() -> Box<dyn Persistable> {
    Box::new(T::default())
}

/// Registers `T` under [`Persist::TYPE_NAME`]. Idempotent; registering the
/// same type twice is a no-op, two types claiming one name is an error.
///
/// The field table is built outside the lock, so `T::schema` may freely
/// construct codecs for other registered types.
pub fn register<T: Persist>() -> ConfigResult<()> {
    let type_id = TypeId::of::<T>();
    {
        let reg = REGISTRY.read().unwrap_or_else(PoisonError::into_inner);
        if reg.entries.contains_key(&type_id) {
            return Ok(());
        }
    }

    let mut builder = TypeBuilder::<T>::new();
    T::schema(&mut builder);
    let entry = Arc::new(builder.finish(T::TYPE_NAME)?);

    let mut reg = REGISTRY.write().unwrap_or_else(PoisonError::into_inner);
    if reg.entries.contains_key(&type_id) {
        // Lost a race with another thread registering the same type.
        return Ok(());
    }
    if reg.names.contains_key(T::TYPE_NAME) {
        return Err(ConfigError::DuplicateTypeName {
            type_name: T::TYPE_NAME,
        });
    }
    debug!(
        type_name = T::TYPE_NAME,
        fields = entry.fields.len(),
        "registered type"
    );
    reg.names.insert(T::TYPE_NAME, type_id);
    reg.factories.insert(T::TYPE_NAME, make_boxed::<T>);
    reg.entries.insert(type_id, entry);
    Ok(())
}

/// Whether `T` has been registered.
#[must_use]
pub fn is_registered<T: Persist>() -> bool {
    let reg = REGISTRY.read().unwrap_or_else(PoisonError::into_inner);
    reg.entries.contains_key(&TypeId::of::<T>())
}

pub(crate) fn entry_of<T: Persist>() -> Result<Arc<TypeEntry>, ConfigError> {
    let reg = REGISTRY.read().unwrap_or_else(PoisonError::into_inner);
    reg.entries
        .get(&TypeId::of::<T>())
        .cloned()
        .ok_or(ConfigError::NotRegistered {
            type_name: T::TYPE_NAME,
        })
}

/// Default-constructor for a registered type, looked up by wire name.
pub(crate) fn factory_for(name: &str) -> Option<Factory> {
    let reg = REGISTRY.read().unwrap_or_else(PoisonError::into_inner);
    reg.factories.get(name).copied()
}
