//! Error types for slot dispatch and dynamic handles.

use thiserror::Error;

use crate::slot::CallbackId;

/// Aggregate failure raised once after a drain loop has fully completed.
///
/// Every subscriber still runs when another one fails; only the first
/// failure is described, the rest are counted.
#[derive(Debug, Clone, Error)]
#[error("subscriber {first} failed during dispatch ({failures} failure(s) in total): {message}")]
pub struct DispatchError {
    /// Identity of the first callback that failed.
    pub first: CallbackId,
    /// Error or panic message of the first failure.
    pub message: String,
    /// Whether the first failure was a panic rather than a returned error.
    pub panicked: bool,
    /// Total number of failed invocations across every dispatched value.
    pub failures: usize,
}

/// Errors returned by type-erased publishing.
#[derive(Debug, Error)]
pub enum SlotError {
    /// One or more subscribers failed while the value was being dispatched.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// The erased value does not hold the slot's concrete type.
    #[error("value of type `{found}` cannot be published to a slot of type `{expected}`")]
    TypeMismatch { expected: String, found: String },
}

impl SlotError {
    /// The dispatch failure, if this is one.
    pub fn as_dispatch(&self) -> Option<&DispatchError> {
        match self {
            SlotError::Dispatch(e) => Some(e),
            SlotError::TypeMismatch { .. } => None,
        }
    }
}
