//! Identity-carrying values flowing through traced computations.
//!
//! The tracing machinery keys its gradient table on *which* value an operation
//! consumed, not on what the value happens to contain: two tensors with equal
//! contents are still distinct differentiation variables. [`Value`] therefore
//! wraps an immutable tensor in a cheap-clone handle with a process-unique id,
//! and compares and hashes by that id alone.
//!
//! Values are immutable snapshots. A continuation node built over a `Value`
//! can never observe mutation of the captured operand.

use core::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::tensors::Ten64;

/// Monotonic id source for values.
///
/// Relaxed ordering suffices: ids only need to be unique, never ordered
/// relative to other memory operations.
static NEXT_VALUE_ID: AtomicU64 = AtomicU64::new(0);

/// An immutable tensor snapshot with identity semantics.
///
/// Cloning a `Value` clones the handle, not the tensor; the clone compares
/// equal to the original. Constructing a new `Value` from a tensor always
/// yields a fresh identity, even for identical contents.
#[derive(Debug, Clone)]
pub struct Value {
    id: u64,
    tensor: Arc<Ten64>,
}

impl Value {
    /// Wraps a tensor in a fresh differentiation variable.
    pub fn new(tensor: Ten64) -> Self {
        Self {
            id: NEXT_VALUE_ID.fetch_add(1, Ordering::Relaxed),
            tensor: Arc::new(tensor),
        }
    }

    /// The process-unique identity of this value.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Borrows the underlying tensor.
    pub fn tensor(&self) -> &Ten64 {
        &self.tensor
    }

    /// A fresh all-ones constant shaped like this value.
    ///
    /// The result is a new untracked value; it participates in no gradient
    /// chain until an intercepted operation consumes it.
    pub fn ones_like(&self) -> Self {
        Self::new(self.tensor.ones_like())
    }

    /// A fresh all-zeros constant shaped like this value.
    pub fn zeros_like(&self) -> Self {
        Self::new(self.tensor.zeros_like())
    }
}

impl From<Ten64> for Value {
    fn from(tensor: Ten64) -> Self {
        Self::new(tensor)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Value {}

impl core::hash::Hash for Value {
    fn hash<H: core::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}
