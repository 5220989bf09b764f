//! Traced primitives: the op interceptor and the wrapped operations.
//!
//! Every function here performs the real forward computation through a CPU
//! kernel and then, only if a tracing context is active and at least one
//! argument is tracked, extends that context's continuation chain with the
//! backward steps for the call. With an empty trace stack the wrappers are a
//! passthrough: kernel output, nothing recorded, nothing allocated beyond the
//! result itself.
//!
//! VJP rule bodies use these wrappers too, which is what makes higher-order
//! differentiation work: a rule running during an inner backward pass is
//! intercepted by the outer context still sitting on the stack.
//!
//! ## Example
//!
//! ```rust
//! use chaingrad::ops::traced::exp;
//! use chaingrad::tensor;
//! use chaingrad::value::Value;
//!
//! // No context active: plain elementwise exp.
//! let x = Value::new(tensor!([0.0, 1.0]));
//! let y = exp(&x).unwrap();
//! assert_eq!(y.tensor().data[0], 1.0);
//! ```

use crate::error::AdError;
use crate::ops::cpu;
use crate::registry::{self, Op};
use crate::tensors::Ten64;
use crate::trace;
use crate::value::Value;

/// Runs a forward kernel and records backward steps in the active context.
///
/// Registry lookups for *all* tracked positions happen before the context is
/// touched, so a missing rule propagates as an error with the context exactly
/// as it was — no partially-built chain state.
pub(crate) fn intercept(
    op: Op,
    args: &[Value],
    forward: impl FnOnce(&[Value]) -> Ten64,
) -> Result<Value, AdError> {
    let result = Value::new(forward(args));

    trace::with_top(|top| {
        let Some(ctx) = top else {
            // Zero-overhead passthrough when no differentiation is active.
            return Ok(());
        };

        let tracked: Vec<usize> = args
            .iter()
            .enumerate()
            .filter(|(_, a)| ctx.is_tracked(a))
            .map(|(i, _)| i)
            .collect();

        let mut makers = Vec::with_capacity(tracked.len());
        for &i in &tracked {
            makers.push((i, registry::rule_for(op, i)?));
        }

        // All nodes from one call wrap the same downstream continuation: they
        // run after everything downstream of `result` and before everything
        // upstream of their argument.
        for (i, maker) in makers {
            ctx.extend(maker, &result, i, args);
        }
        ctx.track(&result);
        Ok(())
    })?;

    Ok(result)
}

/// Produces a traced version of a raw kernel under the given identity.
///
/// The returned closure performs the kernel's forward computation and extends
/// the active context using the VJP rules registered for `op`. This is the
/// integrator surface for custom primitives; the built-in wrappers below are
/// precomposed equivalents.
pub fn wrap<F>(raw: F, op: Op) -> impl Fn(&[Value]) -> Result<Value, AdError>
where
    F: Fn(&[Value]) -> Ten64,
{
    move |args: &[Value]| intercept(op, args, &raw)
}

/// Traced elementwise exponential.
pub fn exp(x: &Value) -> Result<Value, AdError> {
    intercept(Op::Exp, &[x.clone()], |args| cpu::exp(args[0].tensor()))
}

/// Traced elementwise hyperbolic tangent.
pub fn tanh(x: &Value) -> Result<Value, AdError> {
    intercept(Op::Tanh, &[x.clone()], |args| cpu::tanh(args[0].tensor()))
}

/// Traced elementwise negation.
pub fn neg(x: &Value) -> Result<Value, AdError> {
    intercept(Op::Neg, &[x.clone()], |args| cpu::neg(args[0].tensor()))
}

/// Traced elementwise addition.
pub fn add(a: &Value, b: &Value) -> Result<Value, AdError> {
    intercept(Op::Add, &[a.clone(), b.clone()], |args| {
        cpu::add(args[0].tensor(), args[1].tensor())
    })
}

/// Traced elementwise subtraction.
pub fn sub(a: &Value, b: &Value) -> Result<Value, AdError> {
    intercept(Op::Sub, &[a.clone(), b.clone()], |args| {
        cpu::sub(args[0].tensor(), args[1].tensor())
    })
}

/// Traced elementwise multiplication.
pub fn mul(a: &Value, b: &Value) -> Result<Value, AdError> {
    intercept(Op::Mul, &[a.clone(), b.clone()], |args| {
        cpu::mul(args[0].tensor(), args[1].tensor())
    })
}

/// Traced elementwise power.
///
/// Only the base position carries a VJP rule; differentiating with respect to
/// the exponent fails with [`AdError::MissingVjpRule`].
pub fn pow(a: &Value, b: &Value) -> Result<Value, AdError> {
    intercept(Op::Pow, &[a.clone(), b.clone()], |args| {
        cpu::pow(args[0].tensor(), args[1].tensor())
    })
}

/// Traced matrix multiplication.
pub fn matmul(a: &Value, b: &Value) -> Result<Value, AdError> {
    intercept(Op::Matmul, &[a.clone(), b.clone()], |args| {
        cpu::matmul(args[0].tensor(), args[1].tensor())
    })
}

/// Traced 2D transpose.
pub fn transpose(x: &Value) -> Result<Value, AdError> {
    intercept(Op::Transpose, &[x.clone()], |args| {
        cpu::transpose(args[0].tensor())
    })
}
