//! Tracing contexts, continuation chains, and the trace stack.
//!
//! One [`TracingContext`] exists per active differentiation request. While it
//! sits on top of the trace stack, every intercepted operation with a tracked
//! argument appends a continuation node to it: an immutable record of the VJP rule
//! to apply, the recorded output and argument tuple, and which argument the
//! resulting partial gradient belongs to. The chain is ordered by creation, so
//! walking it in reverse is exactly backprop order.
//!
//! The stack itself is thread-local. Its only legal usage pattern is strictly
//! nested push/pop matching driver call nesting, which [`ContextScope`]
//! enforces: a scope pops its context on every exit path, including unwinds
//! out of a failing forward pass, and flags mismatched nesting as
//! [`AdError::StackImbalance`]. Stack depth equals the current differentiation
//! nesting level; contexts below the top are dormant until the one above them
//! retires.

use core::sync::atomic::{AtomicU64, Ordering};
use std::cell::RefCell;
use std::collections::HashMap;

use crate::error::AdError;
use crate::ops::traced;
use crate::registry::VjpRuleMaker;
use crate::value::Value;

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(0);

/// One recorded backward step: propagates the gradient of `y` to `xs[x_pos]`.
///
/// Immutable once built; `y` and `xs` are identity handles to immutable
/// tensor snapshots.
#[derive(Debug)]
struct ChainNode {
    maker: VjpRuleMaker,
    y: Value,
    xs: Vec<Value>,
    x_pos: usize,
}

/// Per-differentiation-request state: the sparse value-to-gradient mapping and
/// the continuation chain built while this context was top of stack.
#[derive(Debug)]
pub struct TracingContext {
    id: u64,
    grads: HashMap<u64, Option<Value>>,
    chain: Vec<ChainNode>,
}

impl TracingContext {
    /// Creates a fresh context with no tracked values and an empty chain.
    pub fn new() -> Self {
        Self {
            id: NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed),
            grads: HashMap::new(),
            chain: Vec::new(),
        }
    }

    /// The unique id of this context, used for stack-discipline checks.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Marks a value as tracked with an unset gradient; no-op if already
    /// tracked (an existing gradient entry is never clobbered).
    pub fn track(&mut self, v: &Value) {
        self.grads.entry(v.id()).or_insert(None);
    }

    /// Whether this context tracks the given value.
    pub fn is_tracked(&self, v: &Value) -> bool {
        self.grads.contains_key(&v.id())
    }

    /// The gradient recorded for a value, if one has been set.
    pub fn gradient(&self, v: &Value) -> Option<Value> {
        self.grads.get(&v.id()).cloned().flatten()
    }

    /// Sets (or replaces) the gradient of a value, tracking it if needed.
    /// Used to seed the output cotangent before a backward walk.
    pub fn set_gradient(&mut self, v: &Value, g: Value) {
        self.grads.insert(v.id(), Some(g));
    }

    /// Adds a gradient contribution for a tracked value.
    ///
    /// Contributions *sum*: a value consumed by several downstream operations
    /// receives the sum of their partials, not the last one written. The sum
    /// goes through the wrapped `add`, so accumulation performed during a
    /// nested backward pass is itself recorded by the outer context.
    pub fn accumulate(&mut self, v: &Value, g: Value) -> Result<(), AdError> {
        let existing = match self.grads.get(&v.id()) {
            None => return Err(AdError::UntrackedValue { id: v.id() }),
            Some(slot) => slot.clone(),
        };
        let total = match existing {
            Some(prev) => traced::add(&prev, &g)?,
            None => g,
        };
        self.grads.insert(v.id(), Some(total));
        Ok(())
    }

    /// Appends a continuation node for one tracked argument of a traced call
    /// and marks the output tracked so downstream ops can chain off it.
    pub fn extend(&mut self, maker: VjpRuleMaker, y: &Value, x_pos: usize, xs: &[Value]) {
        self.chain.push(ChainNode {
            maker,
            y: y.clone(),
            xs: xs.to_vec(),
            x_pos,
        });
        self.track(y);
    }

    /// Number of continuation nodes recorded so far.
    pub fn chain_len(&self) -> usize {
        self.chain.len()
    }

    /// Walks the whole chain in reverse creation order, consuming it.
    ///
    /// The walk is an explicit loop rather than recursive continuation calls,
    /// so call-stack depth stays constant regardless of trace length. For each
    /// node: if the output value carries no gradient yet, the node lies on a
    /// dead branch (nothing downstream reached it) and is skipped; otherwise
    /// the rule is instantiated from the recorded primal values, applied to
    /// the upstream gradient, and the result accumulated into the argument.
    pub fn run(&mut self) -> Result<(), AdError> {
        let chain = core::mem::take(&mut self.chain);
        for node in chain.iter().rev() {
            let upstream = match self.grads.get(&node.y.id()) {
                None => return Err(AdError::UntrackedValue { id: node.y.id() }),
                Some(None) => continue,
                Some(Some(g)) => g.clone(),
            };
            let rule = (node.maker)(&node.y, &node.xs);
            let dx = rule(&upstream)?;
            self.accumulate(&node.xs[node.x_pos], dx)?;
        }
        Ok(())
    }
}

impl Default for TracingContext {
    fn default() -> Self {
        Self::new()
    }
}

thread_local! {
    /// The trace stack. Thread-local by construction: nested differentiation
    /// on one thread shares it through strict push/pop nesting, and threads
    /// never observe each other's contexts.
    static TRACE_STACK: RefCell<Vec<TracingContext>> = const { RefCell::new(Vec::new()) };
}

/// Depth of the trace stack on the current thread: 1 while a plain gradient
/// is being traced, 2 inside a gradient-of-gradient, 0 when idle.
pub fn active_contexts() -> usize {
    TRACE_STACK.with(|stack| stack.borrow().len())
}

/// Runs `f` with mutable access to the top context, or `None` when the stack
/// is empty. The interceptor only ever sees the top; dormant contexts below
/// it are untouched.
pub(crate) fn with_top<R>(f: impl FnOnce(Option<&mut TracingContext>) -> R) -> R {
    TRACE_STACK.with(|stack| f(stack.borrow_mut().last_mut()))
}

/// Scoped occupation of the trace stack by one context.
///
/// `enter` pushes; `exit` pops, verifies the popped context is the one this
/// scope pushed, and hands it back. If the scope is dropped without `exit`
/// (a forward pass returned early by panic), the context is popped and
/// discarded so the stack cannot leak.
pub struct ContextScope {
    id: u64,
    finished: bool,
}

impl ContextScope {
    /// Pushes `ctx` onto the current thread's trace stack.
    pub fn enter(ctx: TracingContext) -> Self {
        let id = ctx.id();
        TRACE_STACK.with(|stack| stack.borrow_mut().push(ctx));
        Self {
            id,
            finished: false,
        }
    }

    /// Pops and returns the context this scope pushed.
    ///
    /// Fails with [`AdError::StackImbalance`] if the top of the stack is some
    /// other context (or the stack is empty); the stack is left unchanged in
    /// that case.
    pub fn exit(mut self) -> Result<TracingContext, AdError> {
        self.finished = true;
        TRACE_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            match stack.pop() {
                Some(ctx) if ctx.id() == self.id => Ok(ctx),
                Some(ctx) => {
                    let found = ctx.id();
                    stack.push(ctx);
                    Err(AdError::StackImbalance {
                        expected: self.id,
                        found: Some(found),
                    })
                }
                None => Err(AdError::StackImbalance {
                    expected: self.id,
                    found: None,
                }),
            }
        })
    }
}

impl Drop for ContextScope {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        TRACE_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            if stack.last().map(|ctx| ctx.id()) == Some(self.id) {
                stack.pop();
            }
        });
    }
}
