//! Subscriber callbacks with stable identity.
//!
//! Closures have no identity of their own, so a [`Callback`] pairs the
//! closure with a [`CallbackId`]. Clones share the id; subscribing the same
//! callback twice is therefore a no-op and `unsubscribe` finds it again.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static CALLBACK_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier of a callback, used for set semantics and error reports.
#[derive(Clone)]
pub struct CallbackId {
    id: u64,
    name: Arc<str>,
}

impl CallbackId {
    fn next(name: impl Into<Arc<str>>) -> Self {
        Self {
            id: CALLBACK_ID_COUNTER.fetch_add(1, Ordering::Relaxed),
            name: name.into(),
        }
    }

    /// Human-readable name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Process-unique numeric id.
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl fmt::Debug for CallbackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CallbackId({}:{})", self.id, self.name)
    }
}

impl fmt::Display for CallbackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "`{}`#{}", self.name, self.id)
    }
}

impl PartialEq for CallbackId {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for CallbackId {}

impl Hash for CallbackId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

type CallbackFn<T> = dyn Fn(&T) -> anyhow::Result<()> + Send + Sync;

/// A subscriber invoked with each published value.
///
/// A callback fails when it returns `Err` or panics. Either way the failure
/// is isolated from the other subscribers and reported through
/// [`DispatchError`](crate::DispatchError).
pub struct Callback<T> {
    id: CallbackId,
    func: Arc<CallbackFn<T>>,
}

impl<T> Clone for Callback<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            func: Arc::clone(&self.func),
        }
    }
}

impl<T> fmt::Debug for Callback<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callback").field("id", &self.id).finish_non_exhaustive()
    }
}

impl<T: 'static> Callback<T> {
    /// Wrap an infallible closure, named after its Rust type.
    pub fn new<F>(func: F) -> Self
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        Self::named(std::any::type_name::<F>(), func)
    }

    /// Wrap an infallible closure under an explicit name.
    pub fn named<F>(name: impl Into<Arc<str>>, func: F) -> Self
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        Self::fallible_named(name, move |value: &T| {
            func(value);
            Ok(())
        })
    }

    /// Wrap a closure that reports failure through `anyhow`.
    pub fn fallible<F>(func: F) -> Self
    where
        F: Fn(&T) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self::fallible_named(std::any::type_name::<F>(), func)
    }

    /// Wrap a fallible closure under an explicit name.
    pub fn fallible_named<F>(name: impl Into<Arc<str>>, func: F) -> Self
    where
        F: Fn(&T) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self {
            id: CallbackId::next(name),
            func: Arc::new(func),
        }
    }

    pub fn id(&self) -> &CallbackId {
        &self.id
    }

    pub fn name(&self) -> &str {
        self.id.name()
    }

    /// A callback over `U` that converts its input and forwards to this one.
    ///
    /// The result keeps this callback's identity, so it can be unsubscribed
    /// through either form.
    pub(crate) fn contramap<U, F>(&self, convert: F) -> Callback<U>
    where
        U: 'static,
        F: Fn(&U) -> T + Send + Sync + 'static,
    {
        let inner = Arc::clone(&self.func);
        Callback {
            id: self.id.clone(),
            func: Arc::new(move |value: &U| inner(&convert(value))),
        }
    }

    pub(crate) fn call(&self, value: &T) -> anyhow::Result<()> {
        (self.func)(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_clones_share_identity() {
        let cb = Callback::<i32>::new(|_| {});
        let other = Callback::<i32>::new(|_| {});
        assert_eq!(cb.id(), cb.clone().id());
        assert_ne!(cb.id(), other.id());
    }

    #[test]
    fn test_default_name_is_closure_type() {
        let cb = Callback::<i32>::new(|_| {});
        assert!(cb.name().contains("closure"), "{}", cb.name());
        let named = Callback::<i32>::named("audit", |_| {});
        assert_eq!(named.name(), "audit");
        assert_eq!(named.id().to_string(), format!("`audit`#{}", named.id().id()));
    }

    #[test]
    fn test_fallible_reports_error() {
        let cb = Callback::<i32>::fallible(|v| {
            if *v < 0 {
                anyhow::bail!("negative: {v}");
            }
            Ok(())
        });
        assert!(cb.call(&1).is_ok());
        assert_eq!(cb.call(&-1).unwrap_err().to_string(), "negative: -1");
    }

    #[test]
    fn test_contramap_keeps_identity() {
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_in = Arc::clone(&seen);
        let cb = Callback::<usize>::new(move |v| {
            seen_in.store(*v, Ordering::SeqCst);
        });
        let mapped: Callback<String> = cb.contramap(|s: &String| s.len());
        assert_eq!(mapped.id(), cb.id());
        mapped.call(&"four".to_string()).unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 4);
    }
}
