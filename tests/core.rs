use chaingrad::backprop::{grad, vjp, vjp_multi};
use chaingrad::error::AdError;
use chaingrad::ops::{cpu, traced};
use chaingrad::registry::{Op, Registry, Strength, op_strength};
use chaingrad::tensor;
use chaingrad::tensors::Tensor;
use chaingrad::trace::{ContextScope, TracingContext, active_contexts};
use chaingrad::value::Value;
use rand::Rng;

fn rand_value(n: usize) -> Value {
    let mut rng = rand::rng();
    let data: Vec<f64> = (0..n).map(|_| rng.random_range(-1.5..1.5)).collect();
    Value::new(Tensor::new(vec![n], data))
}

fn assert_close(actual: &Value, expected: &[f64]) {
    assert_eq!(actual.tensor().data.len(), expected.len());
    for (i, (a, e)) in actual.tensor().data.iter().zip(expected).enumerate() {
        assert!(
            (a - e).abs() < 1e-9,
            "element {i}: got {a}, expected {e}"
        );
    }
}

#[test]
fn test_grad_exp_matches_exp() {
    let x = rand_value(8);
    let dx = grad(traced::exp)(&x).unwrap();
    let expected: Vec<f64> = x.tensor().data.iter().map(|v| v.exp()).collect();
    assert_close(&dx, &expected);
}

#[test]
fn test_grad_tanh() {
    let x = rand_value(8);
    let dx = grad(traced::tanh)(&x).unwrap();
    let expected: Vec<f64> = x
        .tensor()
        .data
        .iter()
        .map(|v| 1.0 - v.tanh() * v.tanh())
        .collect();
    assert_close(&dx, &expected);
}

#[test]
fn test_second_order_exp() {
    let x = rand_value(4);
    let f_xx = grad(grad(traced::exp));
    let dx = f_xx(&x).unwrap();
    let expected: Vec<f64> = x.tensor().data.iter().map(|v| v.exp()).collect();
    assert_close(&dx, &expected);
}

#[test]
fn test_third_order_exp() {
    let x = rand_value(3);
    let f_xxx = grad(grad(grad(traced::exp)));
    let dx = f_xxx(&x).unwrap();
    let expected: Vec<f64> = x.tensor().data.iter().map(|v| v.exp()).collect();
    assert_close(&dx, &expected);
}

#[test]
fn test_second_order_tanh() {
    let x = rand_value(4);
    let f_xx = grad(grad(traced::tanh));
    let dx = f_xx(&x).unwrap();
    let expected: Vec<f64> = x
        .tensor()
        .data
        .iter()
        .map(|v| {
            let t = v.tanh();
            -2.0 * t * (1.0 - t * t)
        })
        .collect();
    assert_close(&dx, &expected);
}

#[test]
fn test_diamond_gradient_accumulates() {
    // x consumed twice by one op: d/dx (x * x) must be 2x, not x.
    let x = rand_value(6);
    let dx = grad(|x: &Value| traced::mul(x, x))(&x).unwrap();
    let expected: Vec<f64> = x.tensor().data.iter().map(|v| 2.0 * v).collect();
    assert_close(&dx, &expected);
}

#[test]
fn test_second_order_diamond() {
    let x = rand_value(5);
    let f_xx = grad(grad(|x: &Value| traced::mul(x, x)));
    let dx = f_xx(&x).unwrap();
    assert_close(&dx, &vec![2.0; 5]);
}

#[test]
fn test_linear_chain_accumulates_across_ops() {
    // f(x) = (x + x) - x: contributions 1 + 1 - 1 = 1 per element.
    let x = rand_value(4);
    let f = |x: &Value| traced::sub(&traced::add(x, x)?, x);
    let dx = grad(f)(&x).unwrap();
    assert_close(&dx, &vec![1.0; 4]);
}

#[test]
fn test_identity_gradient_is_ones() {
    let x = rand_value(4);
    let dx = grad(|x: &Value| Ok(x.clone()))(&x).unwrap();
    assert_close(&dx, &vec![1.0; 4]);
}

#[test]
fn test_constant_gradient_is_zeros() {
    let x = rand_value(4);
    let dx = grad(|x: &Value| Ok(x.ones_like()))(&x).unwrap();
    assert_close(&dx, &vec![0.0; 4]);
}

#[test]
fn test_pow_base_gradient() {
    // d/dx x^3 = 3x^2.
    let x = Value::new(tensor!([2.0, -1.5, 0.5]));
    let cube = Value::new(tensor!([3.0, 3.0, 3.0]));
    let dx = grad(move |x: &Value| traced::pow(x, &cube))(&x).unwrap();
    let expected: Vec<f64> = x.tensor().data.iter().map(|v| 3.0 * v * v).collect();
    assert_close(&dx, &expected);
}

#[test]
fn test_untraced_call_is_passthrough() {
    let x = Value::new(tensor!([0.5, 1.5, -2.0]));
    let y = traced::exp(&x).unwrap();
    assert_eq!(y.tensor(), &cpu::exp(x.tensor()));
    assert_eq!(active_contexts(), 0);
}

#[test]
fn test_vjp_honors_caller_seed() {
    let x = rand_value(4);
    let v = rand_value(4);
    let (_, mut backward) = vjp(|args| traced::exp(&args[0]), &[x.clone()]).unwrap();
    let grads = backward.call(&v).unwrap();
    let dx = grads.into_iter().next().flatten().unwrap();
    let expected: Vec<f64> = x
        .tensor()
        .data
        .iter()
        .zip(&v.tensor().data)
        .map(|(x_i, v_i)| v_i * x_i.exp())
        .collect();
    assert_close(&dx, &expected);
}

#[test]
fn test_backward_consumed_once() {
    let x = rand_value(2);
    let (result, mut backward) = vjp(|args| traced::exp(&args[0]), &[x]).unwrap();
    backward.call(&result.ones_like()).unwrap();
    let err = backward.call(&result.ones_like()).unwrap_err();
    assert_eq!(err, AdError::AlreadyConsumed);
}

#[test]
fn test_tracked_pow_exponent_is_rejected() {
    let base = Value::new(tensor!([2.0, 3.0]));
    let n = Value::new(tensor!([2.0, 2.0]));
    let err = vjp(move |args| traced::pow(&base, &args[0]), &[n]).unwrap_err();
    assert_eq!(
        err,
        AdError::MissingVjpRule {
            op: Op::Pow,
            arg_pos: 1
        }
    );
    // A failing forward pass must not leave its context behind.
    assert_eq!(active_contexts(), 0);
}

#[test]
fn test_matmul_gradients() {
    let a = Value::new(tensor!([[1.0, 2.0], [3.0, 4.0]]));
    let b = Value::new(tensor!([[5.0, 6.0], [7.0, 8.0]]));
    let (result, mut backward) =
        vjp(|args| traced::matmul(&args[0], &args[1]), &[a, b]).unwrap();
    assert_eq!(result.tensor(), &tensor!([[19.0, 22.0], [43.0, 50.0]]));

    // Identity seed: dA = seed * B^T = B^T, dB = A^T * seed = A^T.
    let seed = Value::new(tensor!([[1.0, 0.0], [0.0, 1.0]]));
    let grads = backward.call(&seed).unwrap();
    let da = grads[0].clone().unwrap();
    let db = grads[1].clone().unwrap();
    assert_eq!(da.tensor(), &tensor!([[5.0, 7.0], [6.0, 8.0]]));
    assert_eq!(db.tensor(), &tensor!([[1.0, 3.0], [2.0, 4.0]]));
}

#[test]
fn test_vjp_multi_selects_output() {
    let x = rand_value(4);
    let (outputs, mut backward) = vjp_multi(
        |args| Ok(vec![traced::exp(&args[0])?, traced::tanh(&args[0])?]),
        core::slice::from_ref(&x),
        1,
    )
    .unwrap();
    assert_eq!(outputs.len(), 2);

    // Seeding the tanh output leaves the exp branch dead; its nodes are
    // skipped instead of contributing garbage.
    let grads = backward.call(&outputs[1].ones_like()).unwrap();
    let dx = grads.into_iter().next().flatten().unwrap();
    let expected: Vec<f64> = x
        .tensor()
        .data
        .iter()
        .map(|v| 1.0 - v.tanh() * v.tanh())
        .collect();
    assert_close(&dx, &expected);
}

#[test]
fn test_wrap_routes_custom_kernel_through_registry() {
    let wrapped = traced::wrap(|args: &[Value]| cpu::exp(args[0].tensor()), Op::Exp);
    let x = rand_value(4);
    let dx = grad(|x: &Value| wrapped(core::slice::from_ref(x)))(&x).unwrap();
    let expected: Vec<f64> = x.tensor().data.iter().map(|v| v.exp()).collect();
    assert_close(&dx, &expected);
}

#[test]
fn test_unregistered_op_reports_argument_position() {
    let empty = Registry::new();
    assert_eq!(
        empty.lookup(Op::Exp).unwrap_err(),
        AdError::UnregisteredOp {
            op: Op::Exp,
            arg_pos: None
        }
    );
    // A position-level lookup on an unknown op names the tracked argument.
    assert_eq!(
        empty.rule(Op::Exp, 0).unwrap_err(),
        AdError::UnregisteredOp {
            op: Op::Exp,
            arg_pos: Some(0)
        }
    );
}

#[test]
fn test_strength_table() {
    assert_eq!(op_strength(Op::Exp), Some(Strength::Nonlinear));
    assert_eq!(op_strength(Op::Tanh), Some(Strength::Nonlinear));
    assert_eq!(op_strength(Op::Add), Some(Strength::Linear));
    assert_eq!(op_strength(Op::Mul), Some(Strength::Linear));
    assert_eq!(op_strength(Op::Matmul), Some(Strength::Linear));
    assert_eq!(op_strength(Op::Pow), Some(Strength::Poly));
}

#[test]
fn test_chain_grows_per_tracked_argument() {
    let x = Value::new(tensor!([1.0, 2.0]));
    let mut ctx = TracingContext::new();
    ctx.track(&x);
    let scope = ContextScope::enter(ctx);

    let y = traced::exp(&x).unwrap();
    let z = traced::mul(&y, &y).unwrap();

    let ctx = scope.exit().unwrap();
    assert!(ctx.is_tracked(&z));
    // One node for exp, two for mul (the same tracked value feeds both sides).
    assert_eq!(ctx.chain_len(), 3);
}

#[test]
fn test_scope_pops_on_drop() {
    let scope = ContextScope::enter(TracingContext::new());
    assert_eq!(active_contexts(), 1);
    drop(scope);
    assert_eq!(active_contexts(), 0);
}

#[test]
fn test_scope_detects_imbalance() {
    let outer = ContextScope::enter(TracingContext::new());
    let _inner = ContextScope::enter(TracingContext::new());
    let err = outer.exit().unwrap_err();
    assert!(matches!(err, AdError::StackImbalance { .. }));
}
