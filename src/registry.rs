//! Operation registry: typed operation identities, linearity classification,
//! and per-argument VJP rule factories.
//!
//! Operations are identified by the [`Op`] enum rather than by name, so a
//! lookup failure is confined to genuinely unregistered entries instead of
//! string typos. Each registered operation carries one rule maker per
//! argument position; the maker receives the recorded output and argument
//! tuple of a traced call and returns the closure that maps an upstream
//! gradient to that argument's partial gradient.
//!
//! Rule bodies are written in terms of the *wrapped* primitives from
//! [`crate::ops::traced`], never the raw kernels. That is what makes
//! higher-order differentiation work: while a backward pass runs under an
//! outer tracing context, every operation a rule performs is intercepted
//! again and recorded into the outer chain.
//!
//! Registration happens once at first use; re-registering an operation
//! overwrites silently (last writer wins).

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use lazy_static::lazy_static;

use crate::error::AdError;
use crate::ops::traced;
use crate::value::Value;

/// Identity of a traceable primitive operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Exp,
    Tanh,
    Add,
    Sub,
    Mul,
    Neg,
    Pow,
    Matmul,
    Transpose,
}

impl core::fmt::Display for Op {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            Self::Exp => "exp",
            Self::Tanh => "tanh",
            Self::Add => "add",
            Self::Sub => "sub",
            Self::Mul => "mul",
            Self::Neg => "neg",
            Self::Pow => "pow",
            Self::Matmul => "matmul",
            Self::Transpose => "transpose",
        };
        f.write_str(name)
    }
}

/// Coarse linearity classification of an operation.
///
/// Recorded for future optimization (e.g. skipping gradient work for constant
/// ops); correctness of the engine never depends on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strength {
    Const,
    Linear,
    Poly,
    Nonlinear,
}

/// The backward closure a rule maker produces: upstream gradient in, partial
/// gradient for one argument out.
pub type VjpFn = Box<dyn Fn(&Value) -> Result<Value, AdError>>;

/// Factory of backward closures, one per (operation, argument position).
///
/// Invoked at backward-walk time with the recorded output and full argument
/// tuple of the traced call. It must be a pure function of those recorded
/// values; the engine never re-runs the forward operation on its behalf.
pub type VjpRuleMaker = fn(&Value, &[Value]) -> VjpFn;

struct OpEntry {
    strength: Strength,
    makers: Vec<VjpRuleMaker>,
}

/// Mapping from operation identity to its strength and VJP rule makers.
pub struct Registry {
    entries: HashMap<Op, OpEntry>,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Creates a registry pre-populated with the built-in primitive rules.
    pub fn with_defaults() -> Self {
        let mut reg = Self::new();
        reg.register(Op::Exp, Strength::Nonlinear, vec![exp_vjp]);
        reg.register(Op::Tanh, Strength::Nonlinear, vec![tanh_vjp]);
        reg.register(Op::Add, Strength::Linear, vec![identity_vjp, identity_vjp]);
        reg.register(Op::Sub, Strength::Linear, vec![identity_vjp, negate_vjp]);
        reg.register(Op::Mul, Strength::Linear, vec![mul_lhs_vjp, mul_rhs_vjp]);
        reg.register(Op::Neg, Strength::Linear, vec![negate_vjp]);
        // No rule for the exponent position: it would need a log primitive.
        reg.register(Op::Pow, Strength::Poly, vec![pow_base_vjp]);
        reg.register(
            Op::Matmul,
            Strength::Linear,
            vec![matmul_lhs_vjp, matmul_rhs_vjp],
        );
        reg.register(Op::Transpose, Strength::Linear, vec![transpose_vjp]);
        reg
    }

    /// Registers (or silently replaces) the rules for an operation.
    ///
    /// `makers` is ordered by argument position; an operation may carry fewer
    /// makers than its arity, in which case tracking the uncovered positions
    /// fails at trace time.
    pub fn register(&mut self, op: Op, strength: Strength, makers: Vec<VjpRuleMaker>) {
        self.entries.insert(op, OpEntry { strength, makers });
    }

    /// The ordered rule makers of an operation.
    pub fn lookup(&self, op: Op) -> Result<&[VjpRuleMaker], AdError> {
        self.entries
            .get(&op)
            .map(|entry| entry.makers.as_slice())
            .ok_or(AdError::UnregisteredOp { op, arg_pos: None })
    }

    /// The rule maker for one argument position of an operation.
    pub fn rule(&self, op: Op, arg_pos: usize) -> Result<VjpRuleMaker, AdError> {
        let makers = self.lookup(op).map_err(|err| match err {
            AdError::UnregisteredOp { op, .. } => AdError::UnregisteredOp {
                op,
                arg_pos: Some(arg_pos),
            },
            other => other,
        })?;
        makers
            .get(arg_pos)
            .copied()
            .ok_or(AdError::MissingVjpRule { op, arg_pos })
    }

    /// The strength classification of an operation, if registered.
    pub fn strength(&self, op: Op) -> Option<Strength> {
        self.entries.get(&op).map(|entry| entry.strength)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

lazy_static! {
    /// Process-wide registry, pre-populated with the built-in rules.
    ///
    /// A panic while holding the write lock poisons it; readers recover the
    /// inner value since the registry holds no partially-updated state worth
    /// protecting (inserts are atomic at the map level).
    static ref REGISTRY: RwLock<Registry> = RwLock::new(Registry::with_defaults());
}

/// Registers (or replaces) the rules for an operation in the process-wide
/// registry. Intended to run once per custom operation at setup.
pub fn register_op(op: Op, strength: Strength, makers: Vec<VjpRuleMaker>) {
    REGISTRY
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .register(op, strength, makers);
}

/// Fetches the rule maker for `(op, arg_pos)` from the process-wide registry.
pub fn rule_for(op: Op, arg_pos: usize) -> Result<VjpRuleMaker, AdError> {
    REGISTRY
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .rule(op, arg_pos)
}

/// The strength classification of an operation in the process-wide registry.
pub fn op_strength(op: Op) -> Option<Strength> {
    REGISTRY
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .strength(op)
}

// Built-in rules. Each recomputes through the wrapped primitives so that a
// backward pass running under an outer context extends the outer chain.

fn exp_vjp(_y: &Value, xs: &[Value]) -> VjpFn {
    let x = xs[0].clone();
    Box::new(move |v| traced::mul(v, &traced::exp(&x)?))
}

fn tanh_vjp(y: &Value, xs: &[Value]) -> VjpFn {
    // d tanh(x) = 1 - tanh(x)^2, with tanh(x) recomputed through the wrapped
    // op; reusing the recorded output `y` would sever the lineage an outer
    // context needs.
    let x = xs[0].clone();
    let ones = y.ones_like();
    Box::new(move |v| {
        let t = traced::tanh(&x)?;
        traced::mul(v, &traced::sub(&ones, &traced::mul(&t, &t)?)?)
    })
}

fn identity_vjp(_y: &Value, _xs: &[Value]) -> VjpFn {
    Box::new(|v| Ok(v.clone()))
}

fn negate_vjp(_y: &Value, _xs: &[Value]) -> VjpFn {
    Box::new(|v| traced::neg(v))
}

fn mul_lhs_vjp(_y: &Value, xs: &[Value]) -> VjpFn {
    let rhs = xs[1].clone();
    Box::new(move |v| traced::mul(v, &rhs))
}

fn mul_rhs_vjp(_y: &Value, xs: &[Value]) -> VjpFn {
    let lhs = xs[0].clone();
    Box::new(move |v| traced::mul(v, &lhs))
}

fn pow_base_vjp(_y: &Value, xs: &[Value]) -> VjpFn {
    // d x^n = n * x^(n-1), elementwise; n is treated as constant.
    let x = xs[0].clone();
    let n = xs[1].clone();
    Box::new(move |v| {
        let n_minus_one = traced::sub(&n, &n.ones_like())?;
        traced::mul(&traced::mul(v, &n)?, &traced::pow(&x, &n_minus_one)?)
    })
}

fn matmul_lhs_vjp(_y: &Value, xs: &[Value]) -> VjpFn {
    let rhs = xs[1].clone();
    Box::new(move |v| traced::matmul(v, &traced::transpose(&rhs)?))
}

fn matmul_rhs_vjp(_y: &Value, xs: &[Value]) -> VjpFn {
    let lhs = xs[0].clone();
    Box::new(move |v| traced::matmul(&traced::transpose(&lhs)?, v))
}

fn transpose_vjp(_y: &Value, _xs: &[Value]) -> VjpFn {
    Box::new(|v| traced::transpose(v))
}
