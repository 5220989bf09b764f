//! Differentiation drivers: `vjp` and `grad`.
//!
//! # Reverse-Mode Drivers
//!
//! [`vjp`] is the basic building block: it opens a tracing context, seeds the
//! inputs as tracked, runs the target function (whose primitive calls route
//! through the interceptor and extend the context's continuation chain), and
//! returns the primal result together with a [`Backward`] closure. Invoking
//! the closure with a cotangent seed walks the chain and yields the input
//! gradients.
//!
//! [`grad`] is the convenience layer: all-ones seed, single input, single
//! gradient out. It composes with itself — `grad(grad(f))` — because VJP
//! rules are written with the wrapped primitives, so an inner backward pass
//! is re-intercepted by the outer context still on the trace stack.
//!
//! The context is popped as soon as the forward pass completes; the returned
//! [`Backward`] owns it from then on, so the chain can be walked long after
//! `vjp` returned without holding up further tracing.
//!
//! ## Example
//!
//! ```rust
//! use chaingrad::backprop::grad;
//! use chaingrad::ops::traced::exp;
//! use chaingrad::tensor;
//! use chaingrad::value::Value;
//!
//! let x = Value::new(tensor!([0.0, 1.0]));
//! let df = grad(exp);
//! let dx = df(&x).unwrap();
//! // d/dx exp(x) = exp(x)
//! assert!((dx.tensor().data[1] - 1.0_f64.exp()).abs() < 1e-12);
//! ```

use crate::error::AdError;
use crate::trace::{ContextScope, TracingContext};
use crate::value::Value;

/// The backward closure produced by [`vjp`]: owns the retired tracing context
/// and walks its chain when called with a cotangent seed.
#[derive(Debug)]
pub struct Backward {
    inputs: Vec<Value>,
    output: Value,
    ctx: Option<TracingContext>,
}

impl Backward {
    /// Walks the continuation chain from the given output cotangent and
    /// returns one gradient per input, in seed order. `None` means no
    /// differentiable path reached that input.
    ///
    /// A backward walk mutates the gradient entries later nodes read, so it
    /// runs at most once; a second call fails with
    /// [`AdError::AlreadyConsumed`].
    pub fn call(&mut self, seed: &Value) -> Result<Vec<Option<Value>>, AdError> {
        let mut ctx = self.ctx.take().ok_or(AdError::AlreadyConsumed)?;
        ctx.track(&self.output);
        ctx.set_gradient(&self.output, seed.clone());
        ctx.run()?;
        Ok(self.inputs.iter().map(|x| ctx.gradient(x)).collect())
    }

    /// The primal output whose cotangent seeds the walk.
    pub fn output(&self) -> &Value {
        &self.output
    }
}

/// Evaluates `f` at `xs` under a fresh tracing context and returns the primal
/// result plus the backward closure.
///
/// The context is pushed before and popped after the forward pass on every
/// exit path; a forward pass that returns an error (or panics) cannot leave
/// the trace stack unbalanced.
pub fn vjp<F>(f: F, xs: &[Value]) -> Result<(Value, Backward), AdError>
where
    F: FnOnce(&[Value]) -> Result<Value, AdError>,
{
    let mut ctx = TracingContext::new();
    for x in xs {
        ctx.track(x);
    }

    let scope = ContextScope::enter(ctx);
    let result = f(xs);
    let ctx = scope.exit()?;
    let result = result?;

    let backward = Backward {
        inputs: xs.to_vec(),
        output: result.clone(),
        ctx: Some(ctx),
    };
    Ok((result, backward))
}

/// [`vjp`] for functions returning several outputs; `y_index` selects the
/// output whose cotangent seeds the backward pass.
///
/// # Panics
/// Panics if `y_index` is out of range for the returned outputs.
pub fn vjp_multi<F>(f: F, xs: &[Value], y_index: usize) -> Result<(Vec<Value>, Backward), AdError>
where
    F: FnOnce(&[Value]) -> Result<Vec<Value>, AdError>,
{
    let mut ctx = TracingContext::new();
    for x in xs {
        ctx.track(x);
    }

    let scope = ContextScope::enter(ctx);
    let results = f(xs);
    let ctx = scope.exit()?;
    let results = results?;

    assert!(
        y_index < results.len(),
        "output index {y_index} out of range for {} outputs",
        results.len()
    );
    let backward = Backward {
        inputs: xs.to_vec(),
        output: results[y_index].clone(),
        ctx: Some(ctx),
    };
    Ok((results, backward))
}

/// Builds the derivative of a unary function.
///
/// The returned closure runs [`vjp`], seeds the backward pass with an
/// all-ones cotangent shaped like the output, and returns the input gradient
/// (all zeros when no differentiable path reaches the input). Because the
/// result is itself traceable, `grad` nests to arbitrary order:
/// `grad(grad(f))` differentiates the backward pass of `f`.
pub fn grad<F>(f: F) -> impl Fn(&Value) -> Result<Value, AdError>
where
    F: Fn(&Value) -> Result<Value, AdError>,
{
    move |x: &Value| {
        let (result, mut backward) = vjp(|args| f(&args[0]), core::slice::from_ref(x))?;
        let grads = backward.call(&result.ones_like())?;
        Ok(match grads.into_iter().next().flatten() {
            Some(g) => g,
            None => x.zeros_like(),
        })
    }
}
