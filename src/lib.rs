//! # slotcast
//!
//! Process-wide, type-indexed "last value + subscribers" broadcast slots.
//!
//! For every value type `T` a [`Hub`] holds exactly one [`Slot<T>`]: the most
//! recently published `T`, persistent and one-shot subscribers, and a queue
//! that keeps delivery in order when subscribers publish from inside a
//! notification. On top of that:
//!
//! - [`Combinator`] joins two to four slots into one read-only tuple stream.
//! - [`SlotRegistry`] offers the same semantics keyed by a runtime type name.
//! - [`DynamicHandle`] rebuilds a slot reference from a persisted [`TypeRef`],
//!   binding to the typed slot or to the registry through a [`TypeCatalog`].
//!
//! ```
//! use slotcast::{Callback, Hub};
//!
//! #[derive(Debug, Clone, Default, PartialEq)]
//! struct Volume(u8);
//!
//! let hub = Hub::new();
//! let volume = hub.slot::<Volume>();
//! volume.subscribe(&Callback::new(|v: &Volume| println!("volume is now {}", v.0)))?;
//! volume.set(Volume(7))?;
//! assert_eq!(hub.slot::<Volume>().get(), Volume(7));
//! # Ok::<(), slotcast::DispatchError>(())
//! ```

pub mod combinator;
pub mod config;
pub mod error;
pub mod handle;
pub mod hub;
pub mod registry;
pub mod slot;

pub use combinator::{Combinator, SlotTuple};
pub use config::HubConfig;
pub use error::{DispatchError, SlotError};
pub use handle::{Binding, DynamicHandle, TypeCatalog, TypeEntry, TypeRef};
pub use hub::Hub;
pub use registry::SlotRegistry;
pub use slot::{Callback, CallbackId, ErasedValue, Slot, SlotValue};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
