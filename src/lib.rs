//! chaingrad: reverse-mode automatic differentiation via continuation chains.
//!
//! While a target function executes, calls to a small set of primitive
//! numeric operations are intercepted. Each traced call records, per tracked
//! argument, a backward step that knows how to propagate an output gradient
//! to that argument; the steps chain in reverse creation order, which is
//! exactly backprop order. Walking the chain from an output cotangent yields
//! the input gradients.
//!
//! # Features
//!
//! - `vjp`: primal result plus a one-shot backward closure.
//! - `grad`: derivative-as-function, composable to arbitrary order
//!   (`grad(grad(f))`) through nested tracing contexts.
//! - Typed operation registry with per-argument VJP rules and linearity tags.
//! - Zero tracing overhead when no differentiation is in progress.
//!
//! # Goals
//!
//! - Keep the tracing engine explicit: no graph rewriting, no compilation,
//!   just a dynamically built chain of immutable backward records.
//! - Prioritize correctness and explicitness over black-box abstraction.
//!
//! # Modules
//!
//! - [`tensors`] — Core tensor data structures.
//! - [`value`] — Identity-carrying values flowing through traced computations.
//! - [`registry`] — Operation identities, strengths, and VJP rule factories.
//! - [`trace`] — Tracing contexts, continuation chains, and the trace stack.
//! - [`ops`] — CPU kernels and the traced primitives built over them.
//! - [`backprop`] — The `vjp` and `grad` drivers.
//! - [`error`] — The engine's error taxonomy.
//!
//! # Example
//!
//! ```rust
//! use chaingrad::backprop::grad;
//! use chaingrad::ops::traced::{mul, tanh};
//! use chaingrad::tensor;
//! use chaingrad::value::Value;
//!
//! let x = Value::new(tensor!([0.5, -0.25]));
//!
//! // d/dx tanh(x) = 1 - tanh(x)^2
//! let dtanh = grad(tanh)(&x).unwrap();
//! let t = x.tensor().data[0].tanh();
//! assert!((dtanh.tensor().data[0] - (1.0 - t * t)).abs() < 1e-12);
//!
//! // x is consumed twice; gradients accumulate: d/dx (x * x) = 2x
//! let dsquare = grad(|x: &Value| mul(x, x))(&x).unwrap();
//! assert!((dsquare.tensor().data[1] - 2.0 * x.tensor().data[1]).abs() < 1e-12);
//! ```

pub mod backprop;
pub mod error;
pub mod ops;
pub mod registry;
pub mod tensors;
pub mod trace;
pub mod value;
