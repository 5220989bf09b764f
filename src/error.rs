//! Error taxonomy of the differentiation engine.
//!
//! Every variant signals a programming error in how operations were registered
//! or traced, never a transient condition: callers should not retry, and the
//! current `vjp`/`grad` call aborts at the point of detection.

use core::fmt;

use crate::registry::Op;

/// Unrecoverable failures raised while tracing or walking a gradient chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdError {
    /// A tracked argument flowed into an operation that was never registered.
    /// `arg_pos` names the offending tracked position when the failure was
    /// detected at trace time; it is `None` for whole-operation lookups.
    UnregisteredOp { op: Op, arg_pos: Option<usize> },
    /// The operation is registered, but carries no VJP rule for this argument
    /// position (e.g. the exponent of `pow`).
    MissingVjpRule { op: Op, arg_pos: usize },
    /// A backward walk referenced a value never tracked in its context.
    UntrackedValue { id: u64 },
    /// A backward closure was invoked a second time. Each walk mutates shared
    /// gradient entries read by later nodes, so re-running it would read
    /// already-overwritten state.
    AlreadyConsumed,
    /// The context on top of the trace stack at pop time was not the one the
    /// current driver invocation pushed. Signals broken push/pop nesting.
    StackImbalance { expected: u64, found: Option<u64> },
}

impl fmt::Display for AdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnregisteredOp { op, arg_pos } => match arg_pos {
                Some(pos) => write!(
                    f,
                    "no VJP rules registered for operation `{op}` (tracked argument {pos})"
                ),
                None => write!(f, "no VJP rules registered for operation `{op}`"),
            },
            Self::MissingVjpRule { op, arg_pos } => {
                write!(
                    f,
                    "operation `{op}` has no VJP rule for argument position {arg_pos}"
                )
            }
            Self::UntrackedValue { id } => {
                write!(f, "value v{id} was never tracked in the active context")
            }
            Self::AlreadyConsumed => {
                write!(f, "backward closure has already been consumed")
            }
            Self::StackImbalance { expected, found } => match found {
                Some(found) => write!(
                    f,
                    "trace stack imbalance: expected context {expected} on top, found {found}"
                ),
                None => write!(
                    f,
                    "trace stack imbalance: expected context {expected} on top of an empty stack"
                ),
            },
        }
    }
}

impl std::error::Error for AdError {}
