//! Read-only fan-in over two to four slots.
//!
//! A [`Combinator<(A, B)>`] re-publishes the tuple of its constituents'
//! current values whenever any constituent dispatches. It stores no value
//! and has no queue of its own: while it has subscribers, one internal
//! bridge callback sits on every constituent slot and fans that slot's
//! dispatch out to the combinator's subscribers. The bridge is attached
//! when the first subscriber joins and detached when the last one leaves,
//! or when the last `Combinator` handle is dropped.

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::error::DispatchError;
use crate::hub::Hub;
use crate::slot::dispatch::FailureLog;
use crate::slot::{Callback, Slot, SlotValue};

type BridgeFn = Arc<dyn Fn() -> anyhow::Result<()> + Send + Sync>;

const BRIDGE_NAME: &str = "combinator-bridge";

/// A tuple of slot value types a [`Combinator`] can join.
///
/// Implemented for tuples of two, three and four [`SlotValue`] types.
pub trait SlotTuple: Clone + Send + Sync + Sized + 'static {
    /// The constituent slots, one per tuple element.
    type Slots: Clone + Send + Sync + 'static;
    /// The bridge callbacks, one per constituent.
    type Bridge: Send + Sync + 'static;

    fn slots_in(hub: &Hub) -> Self::Slots;
    fn current(slots: &Self::Slots) -> Self;
    fn any_has_value(slots: &Self::Slots) -> bool;
    fn attach(slots: &Self::Slots, on_change: &BridgeFn) -> Self::Bridge;
    fn detach(slots: &Self::Slots, bridge: &Self::Bridge);
    fn is_attached(slots: &Self::Slots, bridge: &Self::Bridge) -> bool;
}

macro_rules! impl_slot_tuple {
    ($(($T:ident, $idx:tt)),+) => {
        impl<$($T: SlotValue),+> SlotTuple for ($($T,)+) {
            type Slots = ($(Slot<$T>,)+);
            type Bridge = ($(Callback<$T>,)+);

            fn slots_in(hub: &Hub) -> Self::Slots {
                ($(hub.slot::<$T>(),)+)
            }

            fn current(slots: &Self::Slots) -> Self {
                ($(slots.$idx.get(),)+)
            }

            fn any_has_value(slots: &Self::Slots) -> bool {
                false $(|| slots.$idx.has_value())+
            }

            fn attach(slots: &Self::Slots, on_change: &BridgeFn) -> Self::Bridge {
                // One id for every element, so a slot joined twice gets one bridge.
                let on_change = Arc::clone(on_change);
                let shared = Callback::<()>::fallible_named(BRIDGE_NAME, move |_| on_change());
                let bridge = ($(shared.contramap(|_: &$T| ()),)+);
                $(slots.$idx.attach(&bridge.$idx);)+
                bridge
            }

            fn detach(slots: &Self::Slots, bridge: &Self::Bridge) {
                $(slots.$idx.unsubscribe(&bridge.$idx);)+
            }

            fn is_attached(slots: &Self::Slots, bridge: &Self::Bridge) -> bool {
                true $(&& slots.$idx.is_attached(bridge.$idx.id()))+
            }
        }
    };
}

impl_slot_tuple!((A, 0), (B, 1));
impl_slot_tuple!((A, 0), (B, 1), (C, 2));
impl_slot_tuple!((A, 0), (B, 1), (C, 2), (D, 3));

struct Subscribers<V: SlotTuple> {
    callbacks: Vec<Callback<V>>,
    bridge: Option<V::Bridge>,
}

struct CombinatorInner<V: SlotTuple> {
    slots: V::Slots,
    subscribers: Mutex<Subscribers<V>>,
    log_failures: bool,
}

impl<V: SlotTuple> CombinatorInner<V> {
    /// Deliver the current tuple to a snapshot of the subscribers.
    fn broadcast(&self) -> Result<(), DispatchError> {
        let recipients = self.subscribers.lock().callbacks.clone();
        let value = V::current(&self.slots);
        let mut failures = FailureLog::default();
        failures.dispatch(&recipients, &value, "Combinator", self.log_failures);
        failures.into_result()
    }
}

impl<V: SlotTuple> Drop for CombinatorInner<V> {
    fn drop(&mut self) {
        if let Some(bridge) = self.subscribers.get_mut().bridge.take() {
            V::detach(&self.slots, &bridge);
        }
    }
}

/// Joined view over the slots of `V`'s element types.
///
/// Clones share subscribers.
pub struct Combinator<V: SlotTuple> {
    inner: Arc<CombinatorInner<V>>,
}

impl<V: SlotTuple> Clone for Combinator<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V: SlotTuple> fmt::Debug for Combinator<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let subscribers = self.inner.subscribers.lock();
        f.debug_struct("Combinator")
            .field("types", &std::any::type_name::<V>())
            .field("subscribers", &subscribers.callbacks.len())
            .field("bridged", &subscribers.bridge.is_some())
            .finish()
    }
}

impl<V: SlotTuple> Combinator<V> {
    /// Join the slots of `hub`.
    pub fn new(hub: &Hub) -> Self {
        Self::build(V::slots_in(hub), hub.config().log_subscriber_failures)
    }

    /// Join the process-wide slots.
    pub fn global() -> Self {
        Self::new(Hub::global())
    }

    /// Join explicit slot handles.
    pub fn from_slots(slots: V::Slots) -> Self {
        Self::build(slots, true)
    }

    fn build(slots: V::Slots, log_failures: bool) -> Self {
        Self {
            inner: Arc::new(CombinatorInner {
                slots,
                subscribers: Mutex::new(Subscribers {
                    callbacks: Vec::new(),
                    bridge: None,
                }),
                log_failures,
            }),
        }
    }

    /// Subscribe and, if any constituent has a value, receive the tuple now.
    pub fn subscribe(&self, callback: &Callback<V>) -> Result<(), DispatchError> {
        self.subscribe_with(callback, true)
    }

    /// Subscribe to every change of any constituent.
    ///
    /// With `fire_values_now` and at least one constituent holding a value,
    /// the callback receives the current tuple once before registration.
    /// Constituents without a value contribute their empty sentinel.
    pub fn subscribe_with(
        &self,
        callback: &Callback<V>,
        fire_values_now: bool,
    ) -> Result<(), DispatchError> {
        let mut failures = FailureLog::default();
        if fire_values_now && V::any_has_value(&self.inner.slots) {
            let value = V::current(&self.inner.slots);
            failures.dispatch(
                std::slice::from_ref(callback),
                &value,
                "Combinator",
                self.inner.log_failures,
            );
        }

        let mut subscribers = self.inner.subscribers.lock();
        if !subscribers.callbacks.iter().any(|c| c.id() == callback.id()) {
            subscribers.callbacks.push(callback.clone());
        }
        let attached = subscribers
            .bridge
            .as_ref()
            .is_some_and(|bridge| V::is_attached(&self.inner.slots, bridge));
        if !attached {
            // A reset of a constituent drops the bridge; re-register it everywhere.
            if let Some(stale) = subscribers.bridge.take() {
                V::detach(&self.inner.slots, &stale);
            }
            let weak = Arc::downgrade(&self.inner);
            let on_change: BridgeFn = Arc::new(move || bridge_fired(&weak));
            subscribers.bridge = Some(V::attach(&self.inner.slots, &on_change));
        }
        drop(subscribers);

        failures.into_result()
    }

    /// Remove `callback`; the last removal detaches the bridge.
    pub fn unsubscribe(&self, callback: &Callback<V>) {
        let mut subscribers = self.inner.subscribers.lock();
        subscribers.callbacks.retain(|c| c.id() != callback.id());
        if subscribers.callbacks.is_empty() {
            if let Some(bridge) = subscribers.bridge.take() {
                V::detach(&self.inner.slots, &bridge);
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.lock().callbacks.len()
    }

    /// Whether any constituent currently holds a value.
    pub fn has_value(&self) -> bool {
        V::any_has_value(&self.inner.slots)
    }

    /// Whether the bridge is attached to every constituent.
    pub fn is_bridged(&self) -> bool {
        let subscribers = self.inner.subscribers.lock();
        subscribers
            .bridge
            .as_ref()
            .is_some_and(|bridge| V::is_attached(&self.inner.slots, bridge))
    }
}

fn bridge_fired<V: SlotTuple>(weak: &Weak<CombinatorInner<V>>) -> anyhow::Result<()> {
    match weak.upgrade() {
        Some(inner) => inner.broadcast().map_err(anyhow::Error::new),
        None => Ok(()),
    }
}
