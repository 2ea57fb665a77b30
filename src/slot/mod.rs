//! Typed last-value slots.
//!
//! A [`Slot<T>`] holds the most recently published `T`, a set of persistent
//! subscribers, a set of one-shot subscribers and a queue that linearizes
//! publishes made from inside subscribers.

pub mod callback;
pub mod core;
pub(crate) mod dispatch;
pub mod value;

pub use self::callback::{Callback, CallbackId};
pub use self::core::Slot;
pub use self::value::{ErasedValue, SlotValue};
