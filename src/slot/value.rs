//! Values a slot can hold, and their type-erased form.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// A type that can live in a [`Slot`](super::Slot).
///
/// Every `Clone + Default + PartialEq + Send + Sync + 'static` type qualifies.
/// The default value is the "empty" sentinel: publishing it clears
/// [`has_value`](super::Slot::has_value), exactly like [`remove`](super::Slot::remove).
///
/// This means a legitimately published `0`, `false` or empty string reads
/// as "no value". Wrap the type in `Option<T>` when the default must count
/// as a real value; `None` then becomes the sentinel.
pub trait SlotValue: Clone + Send + Sync + 'static {
    /// The sentinel published by `remove` and returned by `get` on an empty slot.
    fn empty() -> Self;

    /// Whether this value is the sentinel.
    fn is_empty_value(&self) -> bool;
}

impl<T> SlotValue for T
where
    T: Clone + Default + PartialEq + Send + Sync + 'static,
{
    fn empty() -> Self {
        T::default()
    }

    fn is_empty_value(&self) -> bool {
        *self == T::default()
    }
}

/// A type-erased, shared slot value.
///
/// Used by the [`SlotRegistry`](crate::SlotRegistry) and by
/// [`DynamicHandle`](crate::DynamicHandle), where the concrete type is only
/// known at runtime. The empty value holds nothing. Two erased values are
/// equal when both are empty or both point at the same allocation.
#[derive(Clone, Default)]
pub struct ErasedValue {
    value: Option<Arc<dyn Any + Send + Sync>>,
    type_name: Option<&'static str>,
}

impl ErasedValue {
    /// Wrap a concrete value.
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            value: Some(Arc::new(value)),
            type_name: Some(std::any::type_name::<T>()),
        }
    }

    /// The empty value.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Erase a slot value, mapping the typed sentinel to the empty value.
    pub fn from_value<T: SlotValue>(value: &T) -> Self {
        if value.is_empty_value() {
            Self::empty()
        } else {
            Self::new(value.clone())
        }
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_none()
    }

    /// Borrow the wrapped value if it has type `T`.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.as_deref().and_then(|v| v.downcast_ref::<T>())
    }

    /// Whether the wrapped value has type `T`.
    pub fn is<T: Any>(&self) -> bool {
        self.downcast_ref::<T>().is_some()
    }

    /// Rust type name of the wrapped value, `None` when empty.
    pub fn type_name(&self) -> Option<&'static str> {
        self.type_name
    }
}

impl PartialEq for ErasedValue {
    fn eq(&self, other: &Self) -> bool {
        match (&self.value, &other.value) {
            (None, None) => true,
            (Some(a), Some(b)) => {
                std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
            }
            _ => false,
        }
    }
}

impl fmt::Debug for ErasedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.type_name {
            Some(name) => write!(f, "ErasedValue({name})"),
            None => f.write_str("ErasedValue(<empty>)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_sentinel() {
        assert!(0i32.is_empty_value());
        assert!(!7i32.is_empty_value());
        assert!(String::new().is_empty_value());
        assert_eq!(<u64 as SlotValue>::empty(), 0);
    }

    #[test]
    fn test_option_makes_default_meaningful() {
        assert!(None::<i32>.is_empty_value());
        assert!(!Some(0).is_empty_value());
    }

    #[test]
    fn test_erased_value_downcast() {
        let value = ErasedValue::new(42u8);
        assert!(value.is::<u8>());
        assert!(!value.is::<u16>());
        assert_eq!(value.downcast_ref::<u8>(), Some(&42));
        assert_eq!(value.type_name(), Some("u8"));
    }

    #[test]
    fn test_erased_value_equality_is_identity() {
        let a = ErasedValue::new(String::from("x"));
        let b = ErasedValue::new(String::from("x"));
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
        assert_eq!(ErasedValue::empty(), ErasedValue::default());
        assert!(ErasedValue::empty().is_empty_value());
        assert!(!a.is_empty_value());
    }

    #[test]
    fn test_from_value_maps_sentinel_to_empty() {
        assert!(ErasedValue::from_value(&0i32).is_empty());
        let erased = ErasedValue::from_value(&5i32);
        assert_eq!(erased.downcast_ref::<i32>(), Some(&5));
    }
}
