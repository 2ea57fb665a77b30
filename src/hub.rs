//! Per-type slot registry.
//!
//! A [`Hub`] owns exactly one [`Slot<T>`] per type `T`, created lazily on
//! first use, plus the type-erased [`SlotRegistry`]. The process-wide hub
//! behind [`Slot::global`] is created on first access and configured from
//! the environment. Tests that need isolation create their own `Hub`.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;

use crate::config::HubConfig;
use crate::error::DispatchError;
use crate::registry::SlotRegistry;
use crate::slot::core::SlotCore;
use crate::slot::{Slot, SlotValue};

static GLOBAL_HUB: Lazy<Hub> = Lazy::new(|| Hub::with_config(HubConfig::from_env()));

type ResetFn = Arc<dyn Fn() -> Result<(), DispatchError> + Send + Sync>;

struct HubEntry {
    core: Arc<dyn Any + Send + Sync>,
    reset: ResetFn,
    type_name: &'static str,
}

impl HubEntry {
    fn new<T: SlotValue>(core: Arc<SlotCore<T>>) -> Self {
        let slot = Slot::from_core(Arc::clone(&core));
        Self {
            core,
            reset: Arc::new(move || slot.reset()),
            type_name: std::any::type_name::<T>(),
        }
    }

    fn typed<T: SlotValue>(&self) -> Option<Arc<SlotCore<T>>> {
        Arc::clone(&self.core).downcast::<SlotCore<T>>().ok()
    }
}

/// Explicit registry of per-type slots.
pub struct Hub {
    config: HubConfig,
    slots: RwLock<HashMap<TypeId, HubEntry>>,
    registry: Arc<SlotRegistry>,
}

impl Default for Hub {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Hub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slots = self.slots.read();
        let mut names: Vec<&str> = slots.values().map(|e| e.type_name).collect();
        names.sort_unstable();
        f.debug_struct("Hub")
            .field("config", &self.config)
            .field("slots", &names)
            .field("registry", &self.registry)
            .finish()
    }
}

impl Hub {
    pub fn new() -> Self {
        Self::with_config(HubConfig::default())
    }

    pub fn with_config(config: HubConfig) -> Self {
        Self {
            config,
            slots: RwLock::new(HashMap::new()),
            registry: Arc::new(SlotRegistry::with_config(config)),
        }
    }

    /// The process-wide hub, created on first call.
    pub fn global() -> &'static Hub {
        &GLOBAL_HUB
    }

    pub fn config(&self) -> HubConfig {
        self.config
    }

    /// The slot for `T`, created on first request.
    pub fn slot<T: SlotValue>(&self) -> Slot<T> {
        let key = TypeId::of::<T>();
        if let Some(core) = self.slots.read().get(&key).and_then(HubEntry::typed::<T>) {
            return Slot::from_core(core);
        }

        let mut slots = self.slots.write();
        if let Some(core) = slots.get(&key).and_then(HubEntry::typed::<T>) {
            return Slot::from_core(core);
        }
        let core = Arc::new(SlotCore::<T>::new(self.config));
        log::debug!("[Hub] Created slot for `{}`", std::any::type_name::<T>());
        slots.insert(key, HubEntry::new(Arc::clone(&core)));
        Slot::from_core(core)
    }

    /// Whether a slot for `T` has been created.
    pub fn contains<T: SlotValue>(&self) -> bool {
        self.slots.read().contains_key(&TypeId::of::<T>())
    }

    /// Number of typed slots created so far.
    pub fn len(&self) -> usize {
        self.slots.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.read().is_empty()
    }

    /// The type-erased fallback registry.
    pub fn registry(&self) -> &Arc<SlotRegistry> {
        &self.registry
    }

    /// Reset every typed slot and registry entry.
    ///
    /// Slots stay registered and usable. Every slot is reset even if one of
    /// them reports a failure; the first failure is returned.
    pub fn reset_all(&self) -> Result<(), DispatchError> {
        // Subscribers may run during a reset; the map lock must not be held.
        let resets: Vec<ResetFn> = {
            let slots = self.slots.read();
            slots.values().map(|entry| Arc::clone(&entry.reset)).collect()
        };
        let results: Vec<Result<(), DispatchError>> =
            resets.iter().map(|reset| reset()).collect();
        let registry = self.registry.reset_all();
        results.into_iter().chain(std::iter::once(registry)).collect()
    }

    /// Forget every slot and registry entry.
    ///
    /// Existing [`Slot`] handles keep working but are no longer reachable
    /// through this hub; the next `slot::<T>()` creates a fresh slot.
    pub fn clear(&self) {
        let dropped = {
            let mut slots = self.slots.write();
            std::mem::take(&mut *slots)
        };
        self.registry.clear();
        log::debug!("[Hub] Cleared {} slot(s)", dropped.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slot::Callback;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Temperature(i32);

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Pressure(u32);

    #[test]
    fn test_slot_is_shared_per_type() {
        let hub = Hub::new();
        let a = hub.slot::<Temperature>();
        let b = hub.slot::<Temperature>();
        assert!(a.ptr_eq(&b));

        a.set(Temperature(21)).unwrap();
        assert_eq!(b.get(), Temperature(21));
        assert_eq!(hub.len(), 1);
        assert!(hub.contains::<Temperature>());
        assert!(!hub.contains::<Pressure>());
    }

    #[test]
    fn test_distinct_types_get_distinct_slots() {
        let hub = Hub::new();
        hub.slot::<Temperature>().set(Temperature(1)).unwrap();
        hub.slot::<Pressure>().set(Pressure(2)).unwrap();
        assert_eq!(hub.slot::<Temperature>().get(), Temperature(1));
        assert_eq!(hub.slot::<Pressure>().get(), Pressure(2));
        assert_eq!(hub.len(), 2);
    }

    #[test]
    fn test_hubs_are_isolated() {
        let first = Hub::new();
        let second = Hub::new();
        first.slot::<Temperature>().set(Temperature(5)).unwrap();
        assert!(!second.slot::<Temperature>().has_value());
    }

    #[test]
    fn test_reset_all_keeps_slots_usable() {
        let hub = Hub::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_in = Arc::clone(&calls);
        let slot = hub.slot::<Temperature>();
        slot.subscribe(&Callback::new(move |_: &Temperature| {
            calls_in.fetch_add(1, Ordering::SeqCst);
        }))
        .unwrap();
        slot.set(Temperature(3)).unwrap();

        hub.reset_all().unwrap();
        assert!(!slot.has_value());
        assert_eq!(slot.subscriber_count(), 0);
        assert!(hub.contains::<Temperature>());

        slot.set(Temperature(4)).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(hub.slot::<Temperature>().get(), Temperature(4));
    }

    #[test]
    fn test_reset_all_with_concurrent_subscribers_creating_slots() {
        #[derive(Debug, Clone, Default, PartialEq)]
        struct Created(u8);

        let hub = Arc::new(Hub::new());
        let stop = Arc::new(AtomicBool::new(false));
        let subscriber = {
            let hub = Arc::clone(&hub);
            let stop = Arc::clone(&stop);
            std::thread::spawn(move || {
                let slot = hub.slot::<Temperature>();
                while !stop.load(Ordering::SeqCst) {
                    let hub_in = Arc::clone(&hub);
                    let cb = Callback::new(move |_: &Temperature| {
                        hub_in.slot::<Created>();
                    });
                    slot.subscribe_with(&cb, false).unwrap();
                }
            })
        };

        for _ in 0..200 {
            hub.reset_all().unwrap();
        }
        stop.store(true, Ordering::SeqCst);
        subscriber.join().unwrap();

        hub.reset_all().unwrap();
        assert!(hub.contains::<Temperature>());
        assert_eq!(hub.slot::<Temperature>().subscriber_count(), 0);
    }

    #[test]
    fn test_clear_detaches_old_handles() {
        let hub = Hub::new();
        let old = hub.slot::<Pressure>();
        old.set(Pressure(9)).unwrap();

        hub.clear();
        assert!(hub.is_empty());
        let fresh = hub.slot::<Pressure>();
        assert!(!fresh.ptr_eq(&old));
        assert!(!fresh.has_value());
        assert_eq!(old.get(), Pressure(9));
    }

    #[test]
    fn test_global_slot_matches_global_hub() {
        #[derive(Debug, Clone, Default, PartialEq)]
        struct GlobalOnly(u8);

        let slot = Slot::<GlobalOnly>::global();
        assert!(slot.ptr_eq(&Hub::global().slot::<GlobalOnly>()));
    }
}
