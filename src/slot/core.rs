//! The per-type last-value slot and its drain loop.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use super::callback::{Callback, CallbackId};
use super::dispatch::{invoke_isolated, FailureLog};
use super::value::SlotValue;
use crate::config::HubConfig;
use crate::error::DispatchError;
use crate::hub::Hub;

struct SlotState<T> {
    value: T,
    has_value: bool,
    subscribers: Vec<Callback<T>>,
    once: Vec<Callback<T>>,
    pending: VecDeque<T>,
    /// A drain loop owns `pending` until it observes the queue empty.
    draining: bool,
}

impl<T: SlotValue> SlotState<T> {
    fn new() -> Self {
        Self {
            value: T::empty(),
            has_value: false,
            subscribers: Vec::new(),
            once: Vec::new(),
            pending: VecDeque::new(),
            draining: false,
        }
    }

    /// Pop the next pending value, store it, and fix its recipients.
    ///
    /// Once-subscribers are cleared here, before any of them runs.
    fn advance(&mut self) -> Option<(T, Vec<Callback<T>>)> {
        let next = self.pending.pop_front()?;
        self.has_value = !next.is_empty_value();
        self.value = next.clone();

        let mut recipients = self.subscribers.clone();
        for callback in self.once.drain(..) {
            if !recipients.iter().any(|r| r.id() == callback.id()) {
                recipients.push(callback);
            }
        }
        Some((next, recipients))
    }
}

pub(crate) struct SlotCore<T> {
    state: Mutex<SlotState<T>>,
    config: HubConfig,
    component: String,
}

impl<T: SlotValue> SlotCore<T> {
    pub(crate) fn new(config: HubConfig) -> Self {
        Self {
            state: Mutex::new(SlotState::new()),
            config,
            component: format!("Slot<{}>", std::any::type_name::<T>()),
        }
    }
}

/// The last published value of `T`, plus everyone listening for the next one.
///
/// `Slot` is a cheap handle; clones point at the same state. Slots obtained
/// from a [`Hub`] are shared per type: every `hub.slot::<T>()` returns a
/// handle to the same slot.
///
/// # Ordering
///
/// A subscriber may publish to the slot it is being notified by. The nested
/// `set` only enqueues its value and returns; the outermost `set` delivers
/// it after the current value has reached every recipient. Recipients of a
/// value are fixed when that value is dequeued, so a subscriber added
/// during dispatch of one value first hears about the next one.
///
/// # Threads
///
/// State is guarded by a mutex that is never held while a callback runs. A
/// `set` from one thread while another thread is draining is enqueued and
/// delivered by the draining thread, which also receives any failure.
pub struct Slot<T> {
    core: Arc<SlotCore<T>>,
}

impl<T> Clone for Slot<T> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
        }
    }
}

impl<T: SlotValue> Default for Slot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: SlotValue + fmt::Debug> fmt::Debug for Slot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.core.state.lock();
        f.debug_struct("Slot")
            .field("value", &state.value)
            .field("has_value", &state.has_value)
            .field("subscribers", &state.subscribers.len())
            .field("once", &state.once.len())
            .field("pending", &state.pending.len())
            .finish()
    }
}

impl<T: SlotValue> Slot<T> {
    /// A standalone slot, not registered in any hub.
    pub fn new() -> Self {
        Self::with_config(HubConfig::default())
    }

    /// A standalone slot with explicit configuration.
    pub fn with_config(config: HubConfig) -> Self {
        Self::from_core(Arc::new(SlotCore::new(config)))
    }

    /// The process-wide slot for `T`.
    pub fn global() -> Self {
        Hub::global().slot::<T>()
    }

    pub(crate) fn from_core(core: Arc<SlotCore<T>>) -> Self {
        Self { core }
    }

    // -----------------------------------------------------------------------
    // Subscription
    // -----------------------------------------------------------------------

    /// Subscribe and, if the slot has a value, receive it immediately.
    pub fn subscribe(&self, callback: &Callback<T>) -> Result<(), DispatchError> {
        self.subscribe_with(callback, true)
    }

    /// Subscribe to every future value.
    ///
    /// With `fire_immediately`, the current value (if any) is delivered
    /// before the callback is registered. The callback is registered even
    /// when that immediate delivery fails; the error only reports it.
    pub fn subscribe_with(
        &self,
        callback: &Callback<T>,
        fire_immediately: bool,
    ) -> Result<(), DispatchError> {
        let result = if fire_immediately {
            self.deliver_current(callback)
        } else {
            Ok(())
        };
        self.attach(callback);
        result
    }

    /// Receive the current value if there is one, otherwise only the next one.
    pub fn once(&self, callback: &Callback<T>) -> Result<(), DispatchError> {
        self.once_with(callback, true)
    }

    /// Receive at most one value.
    ///
    /// With `fire_immediately` and a present value, the callback runs now
    /// and is not registered.
    pub fn once_with(
        &self,
        callback: &Callback<T>,
        fire_immediately: bool,
    ) -> Result<(), DispatchError> {
        if fire_immediately {
            let current = {
                let state = self.core.state.lock();
                state.has_value.then(|| state.value.clone())
            };
            if let Some(value) = current {
                return self.run_single(callback, &value);
            }
        }

        let mut state = self.core.state.lock();
        if !state.once.iter().any(|c| c.id() == callback.id()) {
            state.once.push(callback.clone());
        }
        Ok(())
    }

    /// Remove `callback` from both subscriber sets. No-op if absent.
    pub fn unsubscribe(&self, callback: &Callback<T>) {
        self.unsubscribe_id(callback.id());
    }

    pub(crate) fn unsubscribe_id(&self, id: &CallbackId) {
        let mut state = self.core.state.lock();
        state.subscribers.retain(|c| c.id() != id);
        state.once.retain(|c| c.id() != id);
    }

    /// Register a persistent subscriber without any immediate delivery.
    pub(crate) fn attach(&self, callback: &Callback<T>) {
        let mut state = self.core.state.lock();
        if !state.subscribers.iter().any(|c| c.id() == callback.id()) {
            state.subscribers.push(callback.clone());
        }
    }

    /// Whether a persistent subscriber with `id` is registered.
    pub(crate) fn is_attached(&self, id: &CallbackId) -> bool {
        self.core.state.lock().subscribers.iter().any(|c| c.id() == id)
    }

    // -----------------------------------------------------------------------
    // Publishing
    // -----------------------------------------------------------------------

    /// Publish `value` to every subscriber.
    ///
    /// If a dispatch is already in progress (a subscriber publishing
    /// reentrantly, or another thread), the value is queued and this call
    /// returns `Ok(())` at once. Otherwise this call drains the queue,
    /// including everything enqueued while it runs, and only then reports
    /// the first subscriber failure together with the total failure count.
    pub fn set(&self, value: T) -> Result<(), DispatchError> {
        {
            let mut state = self.core.state.lock();
            state.pending.push_back(value);

            let depth = state.pending.len();
            let threshold = self.core.config.pending_warn_threshold;
            if threshold != 0 && depth == threshold {
                log::warn!(
                    "[{}] {depth} values pending dispatch; subscribers may be publishing in a loop",
                    self.core.component
                );
            }

            if state.draining {
                return Ok(());
            }
            state.draining = true;
        }
        self.drain()
    }

    fn drain(&self) -> Result<(), DispatchError> {
        let mut failures = FailureLog::default();
        loop {
            let next = {
                let mut state = self.core.state.lock();
                let next = state.advance();
                if next.is_none() {
                    state.draining = false;
                }
                next
            };
            let Some((value, recipients)) = next else {
                break;
            };
            failures.dispatch(
                &recipients,
                &value,
                &self.core.component,
                self.core.config.log_subscriber_failures,
            );
        }
        failures.into_result()
    }

    /// Re-publish the current value to the current subscribers.
    pub fn fire(&self) -> Result<(), DispatchError> {
        self.set(self.get())
    }

    /// Publish `transform(current, has_value)`.
    pub fn update(&self, transform: impl FnOnce(T, bool) -> T) -> Result<(), DispatchError> {
        let (value, has_value) = {
            let state = self.core.state.lock();
            (state.value.clone(), state.has_value)
        };
        self.set(transform(value, has_value))
    }

    /// The last published value, or the empty sentinel.
    pub fn get(&self) -> T {
        self.core.state.lock().value.clone()
    }

    pub fn has_value(&self) -> bool {
        self.core.state.lock().has_value
    }

    /// Publish the empty sentinel, returning whether a value was present.
    pub fn remove(&self) -> Result<bool, DispatchError> {
        let had_value = self.has_value();
        self.set(T::empty())?;
        Ok(had_value)
    }

    /// Drop every subscriber, then [`remove`](Self::remove) the value.
    ///
    /// The slot stays usable afterwards.
    pub fn reset(&self) -> Result<(), DispatchError> {
        {
            let mut state = self.core.state.lock();
            state.subscribers.clear();
            state.once.clear();
        }
        self.remove().map(|_| ())
    }

    // -----------------------------------------------------------------------
    // Diagnostics
    // -----------------------------------------------------------------------

    pub fn subscriber_count(&self) -> usize {
        self.core.state.lock().subscribers.len()
    }

    pub fn once_count(&self) -> usize {
        self.core.state.lock().once.len()
    }

    /// Whether a drain loop is currently running.
    pub fn is_dispatching(&self) -> bool {
        self.core.state.lock().draining
    }

    /// Whether both handles refer to the same slot.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.core, &other.core)
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn deliver_current(&self, callback: &Callback<T>) -> Result<(), DispatchError> {
        let current = {
            let state = self.core.state.lock();
            state.has_value.then(|| state.value.clone())
        };
        match current {
            Some(value) => self.run_single(callback, &value),
            None => Ok(()),
        }
    }

    fn run_single(&self, callback: &Callback<T>, value: &T) -> Result<(), DispatchError> {
        let mut failures = FailureLog::default();
        if let Err(failure) = invoke_isolated(callback, value) {
            if self.core.config.log_subscriber_failures {
                log::error!(
                    "[{}] Subscriber {} failed on immediate delivery: {}",
                    self.core.component,
                    failure.callback,
                    failure.message
                );
            }
            failures.record(failure);
        }
        failures.into_result()
    }
}
