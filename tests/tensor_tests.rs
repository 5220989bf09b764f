use chaingrad::ops::cpu;
use chaingrad::tensor;
use chaingrad::tensors::{Ten64, Tensor};
use chaingrad::value::Value;

#[test]
fn test_tensor_shape_mismatch_panics() {
    let result = std::panic::catch_unwind(|| {
        Tensor::new(vec![2, 2], vec![1.0, 2.0, 3.0]);
    });
    assert!(result.is_err());
}

#[test]
fn test_tensor_macro_shapes() {
    let t = tensor!([[1.0, 2.0], [3.0, 4.0]]);
    assert_eq!(t.shape, vec![2, 2]);
    assert_eq!(t.data, vec![1.0, 2.0, 3.0, 4.0]);

    let s = Ten64::scalar(7.0);
    assert_eq!(s.shape, Vec::<usize>::new());
    assert_eq!(s.data, vec![7.0]);
}

#[test]
fn test_tensor_macro_negative_elements() {
    let flat = tensor!([2.0, -1.5, 0.5]);
    assert_eq!(flat.shape, vec![3]);
    assert_eq!(flat.data, vec![2.0, -1.5, 0.5]);

    let nested = tensor!([[-1.0, 2.0], [3.0, -4.0]]);
    assert_eq!(nested.shape, vec![2, 2]);
    assert_eq!(nested.data, vec![-1.0, 2.0, 3.0, -4.0]);

    let s = tensor!(-1.5);
    assert_eq!(s.shape, Vec::<usize>::new());
    assert_eq!(s.data, vec![-1.5]);
}

#[test]
fn test_ones_and_zeros_like() {
    let t = tensor!([[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]);
    let ones = t.ones_like();
    let zeros = t.zeros_like();
    assert_eq!(ones.shape, t.shape);
    assert!(ones.data.iter().all(|&v| v == 1.0));
    assert_eq!(zeros.shape, t.shape);
    assert!(zeros.data.iter().all(|&v| v == 0.0));
}

#[test]
fn test_elementwise_kernels() {
    let x = tensor!([0.0, 1.0, -1.0]);
    let y = cpu::exp(&x);
    assert!((y.data[0] - 1.0).abs() < 1e-15);
    assert!((y.data[1] - 1.0_f64.exp()).abs() < 1e-15);

    let t = cpu::tanh(&x);
    assert!((t.data[2] - (-1.0_f64).tanh()).abs() < 1e-15);

    let a = tensor!([1.0, 2.0, 3.0]);
    let b = tensor!([4.0, 5.0, 6.0]);
    assert_eq!(cpu::add(&a, &b).data, vec![5.0, 7.0, 9.0]);
    assert_eq!(cpu::sub(&a, &b).data, vec![-3.0, -3.0, -3.0]);
    assert_eq!(cpu::mul(&a, &b).data, vec![4.0, 10.0, 18.0]);
    assert_eq!(cpu::neg(&a).data, vec![-1.0, -2.0, -3.0]);

    let n = tensor!([2.0, 2.0, 2.0]);
    assert_eq!(cpu::pow(&a, &n).data, vec![1.0, 4.0, 9.0]);
}

#[test]
fn test_elementwise_shape_mismatch_panics() {
    let a = tensor!([1.0, 2.0]);
    let b = tensor!([1.0, 2.0, 3.0]);
    let result = std::panic::catch_unwind(|| cpu::add(&a, &b));
    assert!(result.is_err());
}

#[test]
fn test_matmul_values() {
    let a = tensor!([[1.0, 2.0], [3.0, 4.0]]);
    let b = tensor!([[5.0, 6.0], [7.0, 8.0]]);
    let c = cpu::matmul(&a, &b);
    assert_eq!(c, tensor!([[19.0, 22.0], [43.0, 50.0]]));
}

#[test]
fn test_matmul_shape_mismatch_panics() {
    let a = tensor!([[1.0, 2.0, 3.0]]);
    let b = tensor!([[1.0, 2.0], [3.0, 4.0]]);
    let result = std::panic::catch_unwind(|| cpu::matmul(&a, &b));
    assert!(result.is_err());
}

#[test]
fn test_transpose_values() {
    let x = tensor!([[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]);
    let t = cpu::transpose(&x);
    assert_eq!(t, tensor!([[1.0, 4.0], [2.0, 5.0], [3.0, 6.0]]));
}

#[test]
fn test_value_identity_semantics() {
    let a = Value::new(tensor!([1.0, 2.0]));
    let b = Value::new(tensor!([1.0, 2.0]));
    // Equal contents, distinct differentiation variables.
    assert_ne!(a, b);
    assert_eq!(a.tensor(), b.tensor());

    // A clone is the same variable.
    let a2 = a.clone();
    assert_eq!(a, a2);
    assert_eq!(a.id(), a2.id());
}
