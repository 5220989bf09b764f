//! # Primitive Operation Layer
//!
//! Numeric kernels and the interception layer that makes them traceable.
//!
//! ## Submodules
//!
//! - [`cpu`] — Multi-threaded CPU kernels operating on plain tensors
//! - [`traced`] — Wrapped primitives that run a kernel and extend the active
//!   tracing context's continuation chain
//!
//! User code and VJP rules call the [`traced`] surface; the raw kernels carry
//! no tracing behavior and are reachable directly when differentiation is not
//! wanted. With no active tracing context, the traced surface is a plain
//! passthrough to [`cpu`].

pub mod cpu;
pub mod traced;
