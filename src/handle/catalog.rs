//! Known slot types, by name.
//!
//! A [`DynamicHandle`](super::DynamicHandle) can only bind to a type the
//! catalog knows. Types registered with [`TypeCatalog::register`] bind to
//! their strongly-typed [`Slot<T>`](crate::Slot). Names registered with
//! [`TypeCatalog::register_opaque`] are known but have no typed binding;
//! they bind to the hub's [`SlotRegistry`](crate::SlotRegistry).

use std::collections::HashMap;
use std::fmt;

use once_cell::sync::Lazy;
use parking_lot::RwLock;

use super::ops::{registry_ops, typed_ops, SlotOps};
use super::type_ref::TypeRef;
use crate::hub::Hub;
use crate::slot::SlotValue;

static GLOBAL_CATALOG: Lazy<TypeCatalog> = Lazy::new(TypeCatalog::with_std_types);

/// Which strategy a resolved handle uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    /// Bound to the strongly-typed `Slot<T>`.
    Typed,
    /// Bound to the type-erased registry, keyed by the type name.
    Registry,
}

type TypedBinder = fn(&Hub) -> SlotOps;

#[derive(Clone, Copy)]
enum Binder {
    Typed(TypedBinder),
    Registry,
}

/// A catalog entry.
#[derive(Clone)]
pub struct TypeEntry {
    type_ref: TypeRef,
    binder: Binder,
}

impl TypeEntry {
    pub fn type_ref(&self) -> &TypeRef {
        &self.type_ref
    }

    pub fn binding(&self) -> Binding {
        match self.binder {
            Binder::Typed(_) => Binding::Typed,
            Binder::Registry => Binding::Registry,
        }
    }

    /// Assemble the operation table for this entry against `hub`.
    pub(crate) fn bind(&self, hub: &Hub) -> SlotOps {
        match self.binder {
            Binder::Typed(bind) => bind(hub),
            Binder::Registry => registry_ops(hub.registry(), self.type_ref.full_name()),
        }
    }
}

impl fmt::Debug for TypeEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeEntry")
            .field("type_ref", &self.type_ref)
            .field("binding", &self.binding())
            .finish()
    }
}

fn bind_typed<T: SlotValue>(hub: &Hub) -> SlotOps {
    typed_ops(hub.slot::<T>())
}

/// Registry of names a [`DynamicHandle`](super::DynamicHandle) can resolve.
#[derive(Default)]
pub struct TypeCatalog {
    entries: RwLock<HashMap<String, TypeEntry>>,
}

impl fmt::Debug for TypeCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeCatalog")
            .field("names", &self.names())
            .finish()
    }
}

impl TypeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// A catalog pre-populated with common std value types.
    pub fn with_std_types() -> Self {
        let catalog = Self::new();
        catalog.register::<bool>();
        catalog.register::<char>();
        catalog.register::<i8>();
        catalog.register::<i16>();
        catalog.register::<i32>();
        catalog.register::<i64>();
        catalog.register::<i128>();
        catalog.register::<isize>();
        catalog.register::<u8>();
        catalog.register::<u16>();
        catalog.register::<u32>();
        catalog.register::<u64>();
        catalog.register::<u128>();
        catalog.register::<usize>();
        catalog.register::<f32>();
        catalog.register::<f64>();
        catalog.register::<String>();
        catalog
    }

    /// The catalog used by [`DynamicHandle::materialize_global`](super::DynamicHandle::materialize_global).
    pub fn global() -> &'static TypeCatalog {
        &GLOBAL_CATALOG
    }

    /// Register `T` under its Rust type name with a typed binding.
    pub fn register<T: SlotValue>(&self) -> TypeRef {
        self.register_as::<T>(std::any::type_name::<T>())
    }

    /// Register `T` under a stable name of the caller's choosing.
    ///
    /// Rust type names are not guaranteed stable across compiler versions,
    /// so persisted handles should prefer an explicit name.
    pub fn register_as<T: SlotValue>(&self, name: impl Into<String>) -> TypeRef {
        self.insert(TypeRef::new(name), Binder::Typed(bind_typed::<T>))
    }

    /// Register a name that binds to the type-erased registry.
    pub fn register_opaque(&self, name: impl Into<String>) -> TypeRef {
        self.insert(TypeRef::new(name), Binder::Registry)
    }

    fn insert(&self, type_ref: TypeRef, binder: Binder) -> TypeRef {
        let entry = TypeEntry {
            type_ref: type_ref.clone(),
            binder,
        };
        let previous = self
            .entries
            .write()
            .insert(type_ref.full_name().to_string(), entry);
        if previous.is_some() {
            log::debug!("[TypeCatalog] Replaced entry for `{type_ref}`");
        }
        type_ref
    }

    pub fn resolve(&self, name: &str) -> Option<TypeEntry> {
        self.entries.read().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.read().contains_key(name)
    }

    /// Every registered name, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.read().keys().cloned().collect();
        names.sort_unstable();
        names
    }
}
