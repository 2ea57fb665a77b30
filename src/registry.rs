//! Type-erased slot registry.
//!
//! The registry serves callers that only know a type by name at runtime.
//! Each key owns a [`Slot<ErasedValue>`], so ordering, reentrancy and
//! failure aggregation are exactly those of a typed slot.
//!
//! Read-only operations on a key that was never used do not create it.

use std::collections::HashMap;
use std::fmt;

use parking_lot::RwLock;

use crate::config::HubConfig;
use crate::error::DispatchError;
use crate::slot::{Callback, CallbackId, ErasedValue, Slot};

/// Last-value slots keyed by a runtime type name.
pub struct SlotRegistry {
    config: HubConfig,
    entries: RwLock<HashMap<String, Slot<ErasedValue>>>,
}

impl Default for SlotRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SlotRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlotRegistry")
            .field("keys", &self.keys())
            .finish()
    }
}

impl SlotRegistry {
    pub fn new() -> Self {
        Self::with_config(HubConfig::default())
    }

    pub fn with_config(config: HubConfig) -> Self {
        Self {
            config,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// The slot for `key`, created on first request.
    pub fn entry(&self, key: &str) -> Slot<ErasedValue> {
        if let Some(slot) = self.lookup(key) {
            return slot;
        }
        let mut entries = self.entries.write();
        entries
            .entry(key.to_string())
            .or_insert_with(|| {
                log::debug!("[SlotRegistry] Created entry for `{key}`");
                Slot::with_config(self.config)
            })
            .clone()
    }

    fn lookup(&self, key: &str) -> Option<Slot<ErasedValue>> {
        self.entries.read().get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.read().contains_key(key)
    }

    /// Every key in use, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.read().keys().cloned().collect();
        keys.sort_unstable();
        keys
    }

    pub fn subscribe(
        &self,
        key: &str,
        callback: &Callback<ErasedValue>,
        fire_immediately: bool,
    ) -> Result<(), DispatchError> {
        self.entry(key).subscribe_with(callback, fire_immediately)
    }

    pub fn once(
        &self,
        key: &str,
        callback: &Callback<ErasedValue>,
        fire_immediately: bool,
    ) -> Result<(), DispatchError> {
        self.entry(key).once_with(callback, fire_immediately)
    }

    pub fn unsubscribe(&self, key: &str, callback: &Callback<ErasedValue>) {
        self.unsubscribe_id(key, callback.id());
    }

    pub(crate) fn unsubscribe_id(&self, key: &str, id: &CallbackId) {
        if let Some(slot) = self.lookup(key) {
            slot.unsubscribe_id(id);
        }
    }

    pub fn set(&self, key: &str, value: ErasedValue) -> Result<(), DispatchError> {
        self.entry(key).set(value)
    }

    pub fn fire(&self, key: &str) -> Result<(), DispatchError> {
        self.entry(key).fire()
    }

    /// The stored value, empty for unknown keys.
    pub fn get(&self, key: &str) -> ErasedValue {
        self.lookup(key).map(|slot| slot.get()).unwrap_or_default()
    }

    pub fn has_value(&self, key: &str) -> bool {
        self.lookup(key).is_some_and(|slot| slot.has_value())
    }

    /// Clear the value and notify subscribers; returns whether one was present.
    pub fn remove(&self, key: &str) -> Result<bool, DispatchError> {
        match self.lookup(key) {
            Some(slot) => slot.remove(),
            None => Ok(false),
        }
    }

    pub fn reset(&self, key: &str) -> Result<(), DispatchError> {
        match self.lookup(key) {
            Some(slot) => slot.reset(),
            None => Ok(()),
        }
    }

    /// Reset every entry, returning the first failure.
    pub fn reset_all(&self) -> Result<(), DispatchError> {
        let slots: Vec<Slot<ErasedValue>> = self.entries.read().values().cloned().collect();
        slots.iter().map(Slot::reset).collect::<Vec<_>>().into_iter().collect()
    }

    /// Forget every entry.
    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn collector(seen: &Arc<Mutex<Vec<Option<i64>>>>) -> Callback<ErasedValue> {
        let seen = Arc::clone(seen);
        Callback::named("collector", move |v: &ErasedValue| {
            seen.lock().push(v.downcast_ref::<i64>().copied());
        })
    }

    #[test]
    fn test_set_get_by_key() {
        let registry = SlotRegistry::new();
        assert!(!registry.has_value("demo::Counter"));
        registry.set("demo::Counter", ErasedValue::new(3i64)).unwrap();
        assert!(registry.has_value("demo::Counter"));
        assert_eq!(
            registry.get("demo::Counter").downcast_ref::<i64>(),
            Some(&3)
        );
        assert!(registry.get("demo::Other").is_empty());
        assert_eq!(registry.keys(), vec!["demo::Counter".to_string()]);
    }

    #[test]
    fn test_reads_do_not_create_entries() {
        let registry = SlotRegistry::new();
        registry.get("a");
        registry.has_value("b");
        assert!(!registry.remove("c").unwrap());
        registry.reset("d").unwrap();
        assert!(registry.keys().is_empty());
    }

    #[test]
    fn test_subscribers_and_remove() {
        let registry = SlotRegistry::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let cb = collector(&seen);
        registry.subscribe("k", &cb, true).unwrap();

        registry.set("k", ErasedValue::new(1i64)).unwrap();
        assert!(registry.remove("k").unwrap());
        assert!(!registry.remove("k").unwrap());
        assert_eq!(*seen.lock(), vec![Some(1), None, None]);

        registry.unsubscribe("k", &cb);
        registry.set("k", ErasedValue::new(2i64)).unwrap();
        assert_eq!(seen.lock().len(), 3);
    }

    #[test]
    fn test_once_and_fire() {
        let registry = SlotRegistry::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        registry.set("k", ErasedValue::new(5i64)).unwrap();
        registry.once("k", &collector(&seen), false).unwrap();

        registry.fire("k").unwrap();
        registry.fire("k").unwrap();
        assert_eq!(*seen.lock(), vec![Some(5)]);
    }

    #[test]
    fn test_reset_all_and_clear() {
        let registry = SlotRegistry::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        registry.subscribe("a", &collector(&seen), false).unwrap();
        registry.set("a", ErasedValue::new(1i64)).unwrap();
        registry.set("b", ErasedValue::new(2i64)).unwrap();

        registry.reset_all().unwrap();
        assert!(!registry.has_value("a"));
        assert!(!registry.has_value("b"));
        assert_eq!(registry.keys().len(), 2);

        registry.set("a", ErasedValue::new(3i64)).unwrap();
        assert_eq!(*seen.lock(), vec![Some(1)]);

        registry.clear();
        assert!(registry.keys().is_empty());
    }
}
