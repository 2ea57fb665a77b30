//! Type-erased, lazily resolved slot handles.
//!
//! A persisted slot reference is only a type name ([`TypeRef`]). Turning it
//! back into something that publishes and subscribes is a two-state
//! process:
//!
//! - **Unresolved**: the handle holds the name only. Every operation is a
//!   no-op and reads return the empty value.
//! - **Resolved**: [`DynamicHandle::materialize`] looked the name up in a
//!   [`TypeCatalog`] and assembled an operation table bound either to the
//!   typed [`Slot<T>`](crate::Slot) or to the hub's
//!   [`SlotRegistry`](crate::SlotRegistry).
//!
//! A name the catalog does not know leaves the handle Unresolved; the
//! failure is logged once per name and never returned to the caller.

pub mod catalog;
mod ops;
pub mod type_ref;

use std::any::Any;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub use self::catalog::{Binding, TypeCatalog, TypeEntry};
pub use self::type_ref::{short_type_name, TypeRef};

use self::ops::SlotOps;
use crate::error::{DispatchError, SlotError};
use crate::hub::Hub;
use crate::slot::{Callback, ErasedValue};

enum HandleState {
    Unresolved,
    Resolved { binding: Binding, ops: SlotOps },
}

/// A slot reference reconstructed from a persisted type name.
///
/// The handle does not own the slot it points at; slots are shared through
/// their hub.
pub struct DynamicHandle {
    type_ref: TypeRef,
    state: HandleState,
    /// Last name whose resolution failure was logged.
    reported: Option<String>,
}

impl fmt::Debug for DynamicHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicHandle")
            .field("type_ref", &self.type_ref)
            .field("binding", &self.binding())
            .finish()
    }
}

impl DynamicHandle {
    /// An Unresolved handle for `type_ref`.
    pub fn new(type_ref: impl Into<TypeRef>) -> Self {
        Self {
            type_ref: type_ref.into(),
            state: HandleState::Unresolved,
            reported: None,
        }
    }

    /// Create and immediately materialize against `hub` and `catalog`.
    pub fn resolved(type_ref: impl Into<TypeRef>, hub: &Hub, catalog: &TypeCatalog) -> Self {
        let mut handle = Self::new(type_ref);
        handle.materialize(hub, catalog);
        handle
    }

    /// Resolve the stored name. Returns whether the handle is now Resolved.
    ///
    /// Calling it again rebinds, e.g. after the catalog learned the type.
    pub fn materialize(&mut self, hub: &Hub, catalog: &TypeCatalog) -> bool {
        let name = self.type_ref.full_name();
        match catalog.resolve(name) {
            Some(entry) => {
                let binding = entry.binding();
                log::debug!("[DynamicHandle] Bound `{name}` via {binding:?}");
                self.state = HandleState::Resolved {
                    binding,
                    ops: entry.bind(hub),
                };
                self.reported = None;
                true
            }
            None => {
                if self.reported.as_deref() != Some(name) {
                    log::warn!(
                        "[DynamicHandle] Cannot resolve type `{name}`; handle stays unresolved"
                    );
                    self.reported = Some(name.to_string());
                }
                self.state = HandleState::Unresolved;
                false
            }
        }
    }

    /// Materialize against the global hub and catalog.
    pub fn materialize_global(&mut self) -> bool {
        self.materialize(Hub::global(), TypeCatalog::global())
    }

    /// Replace the stored name and materialize it.
    pub fn rematerialize(
        &mut self,
        type_ref: impl Into<TypeRef>,
        hub: &Hub,
        catalog: &TypeCatalog,
    ) -> bool {
        self.type_ref = type_ref.into();
        self.materialize(hub, catalog)
    }

    pub fn type_ref(&self) -> &TypeRef {
        &self.type_ref
    }

    pub fn full_name(&self) -> &str {
        self.type_ref.full_name()
    }

    pub fn short_name(&self) -> String {
        self.type_ref.short_name()
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self.state, HandleState::Resolved { .. })
    }

    /// The bound strategy, `None` while Unresolved.
    pub fn binding(&self) -> Option<Binding> {
        match &self.state {
            HandleState::Unresolved => None,
            HandleState::Resolved { binding, .. } => Some(*binding),
        }
    }

    fn ops(&self) -> Option<&SlotOps> {
        match &self.state {
            HandleState::Unresolved => None,
            HandleState::Resolved { ops, .. } => Some(ops),
        }
    }

    // -----------------------------------------------------------------------
    // Slot operations
    // -----------------------------------------------------------------------

    pub fn subscribe(&self, callback: &Callback<ErasedValue>) -> Result<(), DispatchError> {
        self.subscribe_with(callback, true)
    }

    pub fn subscribe_with(
        &self,
        callback: &Callback<ErasedValue>,
        fire_immediately: bool,
    ) -> Result<(), DispatchError> {
        match self.ops() {
            Some(ops) => (ops.subscribe)(callback, fire_immediately),
            None => Ok(()),
        }
    }

    pub fn once(&self, callback: &Callback<ErasedValue>) -> Result<(), DispatchError> {
        self.once_with(callback, true)
    }

    pub fn once_with(
        &self,
        callback: &Callback<ErasedValue>,
        fire_immediately: bool,
    ) -> Result<(), DispatchError> {
        match self.ops() {
            Some(ops) => (ops.once)(callback, fire_immediately),
            None => Ok(()),
        }
    }

    pub fn unsubscribe(&self, callback: &Callback<ErasedValue>) {
        if let Some(ops) = self.ops() {
            (ops.unsubscribe)(callback.id());
        }
    }

    /// Publish an erased value. An empty value removes.
    pub fn set(&self, value: ErasedValue) -> Result<(), SlotError> {
        match self.ops() {
            Some(ops) => (ops.set)(value),
            None => Ok(()),
        }
    }

    /// Publish a concrete value.
    pub fn set_value<T: Any + Send + Sync>(&self, value: T) -> Result<(), SlotError> {
        self.set(ErasedValue::new(value))
    }

    pub fn get(&self) -> ErasedValue {
        self.ops().map(|ops| (ops.get)()).unwrap_or_default()
    }

    /// The current value as `T`, if present and of that type.
    pub fn get_as<T: Any + Clone>(&self) -> Option<T> {
        self.get().downcast_ref::<T>().cloned()
    }

    pub fn has_value(&self) -> bool {
        self.ops().is_some_and(|ops| (ops.has_value)())
    }

    /// Remove the value; returns whether one was present.
    pub fn remove(&self) -> Result<bool, DispatchError> {
        match self.ops() {
            Some(ops) => (ops.remove)(),
            None => Ok(false),
        }
    }

    pub fn reset(&self) -> Result<(), DispatchError> {
        match self.ops() {
            Some(ops) => (ops.reset)(),
            None => Ok(()),
        }
    }

    pub fn fire(&self) -> Result<(), DispatchError> {
        match self.ops() {
            Some(ops) => (ops.fire)(),
            None => Ok(()),
        }
    }
}

impl Serialize for DynamicHandle {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.type_ref.serialize(serializer)
    }
}

/// Deserializes to an Unresolved handle; call [`DynamicHandle::materialize`] next.
impl<'de> Deserialize<'de> for DynamicHandle {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        TypeRef::deserialize(deserializer).map(DynamicHandle::new)
    }
}
