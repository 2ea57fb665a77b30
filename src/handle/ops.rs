//! Capability tables behind a resolved [`DynamicHandle`](super::DynamicHandle).
//!
//! Each table is assembled once, at resolution time, from one of two
//! strategies: the strongly-typed `Slot<T>` (values are downcast on the way
//! in and erased on the way out) or the type-erased registry entry for a
//! type name.

use std::sync::Arc;

use crate::error::{DispatchError, SlotError};
use crate::registry::SlotRegistry;
use crate::slot::{Callback, CallbackId, ErasedValue, Slot, SlotValue};

type SubscribeOp = Box<dyn Fn(&Callback<ErasedValue>, bool) -> Result<(), DispatchError> + Send + Sync>;
type UnsubscribeOp = Box<dyn Fn(&CallbackId) + Send + Sync>;
type SetOp = Box<dyn Fn(ErasedValue) -> Result<(), SlotError> + Send + Sync>;
type GetOp = Box<dyn Fn() -> ErasedValue + Send + Sync>;
type HasValueOp = Box<dyn Fn() -> bool + Send + Sync>;
type RemoveOp = Box<dyn Fn() -> Result<bool, DispatchError> + Send + Sync>;
type DispatchOp = Box<dyn Fn() -> Result<(), DispatchError> + Send + Sync>;

pub(crate) struct SlotOps {
    pub subscribe: SubscribeOp,
    pub once: SubscribeOp,
    pub unsubscribe: UnsubscribeOp,
    pub set: SetOp,
    pub get: GetOp,
    pub has_value: HasValueOp,
    pub remove: RemoveOp,
    pub reset: DispatchOp,
    pub fire: DispatchOp,
}

/// Operations bound to a strongly-typed slot.
pub(crate) fn typed_ops<T: SlotValue>(slot: Slot<T>) -> SlotOps {
    let subscribe = {
        let slot = slot.clone();
        Box::new(move |cb: &Callback<ErasedValue>, fire: bool| {
            slot.subscribe_with(&cb.contramap(ErasedValue::from_value::<T>), fire)
        }) as SubscribeOp
    };
    let once = {
        let slot = slot.clone();
        Box::new(move |cb: &Callback<ErasedValue>, fire: bool| {
            slot.once_with(&cb.contramap(ErasedValue::from_value::<T>), fire)
        }) as SubscribeOp
    };
    let unsubscribe = {
        let slot = slot.clone();
        Box::new(move |id: &CallbackId| slot.unsubscribe_id(id)) as UnsubscribeOp
    };
    let set = {
        let slot = slot.clone();
        Box::new(move |value: ErasedValue| -> Result<(), SlotError> {
            if value.is_empty() {
                slot.remove()?;
                return Ok(());
            }
            match value.downcast_ref::<T>() {
                Some(typed) => Ok(slot.set(typed.clone())?),
                None => Err(SlotError::TypeMismatch {
                    expected: std::any::type_name::<T>().to_string(),
                    found: value.type_name().unwrap_or("<unknown>").to_string(),
                }),
            }
        }) as SetOp
    };
    let get = {
        let slot = slot.clone();
        Box::new(move || ErasedValue::from_value(&slot.get())) as GetOp
    };
    let has_value = {
        let slot = slot.clone();
        Box::new(move || slot.has_value()) as HasValueOp
    };
    let remove = {
        let slot = slot.clone();
        Box::new(move || slot.remove()) as RemoveOp
    };
    let reset = {
        let slot = slot.clone();
        Box::new(move || slot.reset()) as DispatchOp
    };
    let fire = Box::new(move || slot.fire()) as DispatchOp;

    SlotOps {
        subscribe,
        once,
        unsubscribe,
        set,
        get,
        has_value,
        remove,
        reset,
        fire,
    }
}

/// Operations routed through the registry under `key`.
pub(crate) fn registry_ops(registry: &Arc<SlotRegistry>, key: &str) -> SlotOps {
    let bind = || (Arc::clone(registry), key.to_string());

    let subscribe = {
        let (registry, key) = bind();
        Box::new(move |cb: &Callback<ErasedValue>, fire: bool| registry.subscribe(&key, cb, fire))
            as SubscribeOp
    };
    let once = {
        let (registry, key) = bind();
        Box::new(move |cb: &Callback<ErasedValue>, fire: bool| registry.once(&key, cb, fire))
            as SubscribeOp
    };
    let unsubscribe = {
        let (registry, key) = bind();
        Box::new(move |id: &CallbackId| registry.unsubscribe_id(&key, id)) as UnsubscribeOp
    };
    let set = {
        let (registry, key) = bind();
        Box::new(move |value: ErasedValue| -> Result<(), SlotError> {
            Ok(registry.set(&key, value)?)
        }) as SetOp
    };
    let get = {
        let (registry, key) = bind();
        Box::new(move || registry.get(&key)) as GetOp
    };
    let has_value = {
        let (registry, key) = bind();
        Box::new(move || registry.has_value(&key)) as HasValueOp
    };
    let remove = {
        let (registry, key) = bind();
        Box::new(move || registry.remove(&key)) as RemoveOp
    };
    let reset = {
        let (registry, key) = bind();
        Box::new(move || registry.reset(&key)) as DispatchOp
    };
    let fire = {
        let (registry, key) = bind();
        Box::new(move || registry.fire(&key)) as DispatchOp
    };

    SlotOps {
        subscribe,
        once,
        unsubscribe,
        set,
        get,
        has_value,
        remove,
        reset,
        fire,
    }
}
