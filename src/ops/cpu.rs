//! Parallel CPU tensor kernels.
//!
//! # CPU Backend
//!
//! Raw numeric kernels on [`Ten64`] with no tracing behavior of their own.
//! The traced wrappers in [`crate::ops::traced`] route through these for the
//! forward computation.
//!
//! ## Features
//!
//! - Parallel execution using [`rayon`](https://docs.rs/rayon)
//! - Deterministic results (given deterministic input and scheduling)
//! - Zero dependencies beyond `rayon`
//!
//! ## Implemented Ops
//!
//! - Elementwise: `exp`, `tanh`, `neg`, `add`, `sub`, `mul`, `pow`
//! - Matrix: `matmul`, `transpose`
//!
//! All kernels panic on shape mismatches; shape checking happens before any
//! parallel work is spawned.

use rayon::prelude::*;

use crate::tensors::{Ten64, Tensor};

fn map(x: &Ten64, f: impl Fn(f64) -> f64 + Sync) -> Ten64 {
    let data = x.data.par_iter().map(|&v| f(v)).collect();
    Tensor::new(x.shape.clone(), data)
}

fn zip(a: &Ten64, b: &Ten64, f: impl Fn(f64, f64) -> f64 + Sync) -> Ten64 {
    assert_eq!(a.shape, b.shape, "elementwise shape mismatch");
    let data = a
        .data
        .par_iter()
        .zip(b.data.par_iter())
        .map(|(&x, &y)| f(x, y))
        .collect();
    Tensor::new(a.shape.clone(), data)
}

/// Elementwise exponential.
pub fn exp(x: &Ten64) -> Ten64 {
    map(x, f64::exp)
}

/// Elementwise hyperbolic tangent.
pub fn tanh(x: &Ten64) -> Ten64 {
    map(x, f64::tanh)
}

/// Elementwise negation.
pub fn neg(x: &Ten64) -> Ten64 {
    map(x, |v| -v)
}

/// Elementwise addition.
///
/// # Panics
/// Panics if shapes do not match.
pub fn add(a: &Ten64, b: &Ten64) -> Ten64 {
    zip(a, b, |x, y| x + y)
}

/// Elementwise subtraction.
///
/// # Panics
/// Panics if shapes do not match.
pub fn sub(a: &Ten64, b: &Ten64) -> Ten64 {
    zip(a, b, |x, y| x - y)
}

/// Elementwise multiplication.
///
/// # Panics
/// Panics if shapes do not match.
pub fn mul(a: &Ten64, b: &Ten64) -> Ten64 {
    zip(a, b, |x, y| x * y)
}

/// Elementwise power `a^b`.
///
/// # Panics
/// Panics if shapes do not match.
pub fn pow(a: &Ten64, b: &Ten64) -> Ten64 {
    zip(a, b, f64::powf)
}

/// Matrix multiplication `C = A × B` for 2D tensors (`A: m×k`, `B: k×n`).
///
/// Rows of the output are computed in parallel.
///
/// # Panics
/// Panics if either operand is not 2D or the inner dimensions disagree.
pub fn matmul(a: &Ten64, b: &Ten64) -> Ten64 {
    assert_eq!(a.shape.len(), 2, "matmul expects a 2D left operand");
    assert_eq!(b.shape.len(), 2, "matmul expects a 2D right operand");
    let m = a.shape[0];
    let k = a.shape[1];
    let n = b.shape[1];
    assert_eq!(k, b.shape[0], "matmul shape mismatch");

    let a_data = &a.data;
    let b_data = &b.data;

    let mut out_data = vec![0.0; m * n];
    out_data.par_chunks_mut(n).enumerate().for_each(|(i, row)| {
        for (j, out) in row.iter_mut().enumerate() {
            let mut sum = 0.0;
            for l in 0..k {
                sum += a_data[i * k + l] * b_data[l * n + j];
            }
            *out = sum;
        }
    });

    Tensor::new(vec![m, n], out_data)
}

/// Transpose of a 2D tensor.
///
/// # Panics
/// Panics if the operand is not 2D.
pub fn transpose(x: &Ten64) -> Ten64 {
    assert_eq!(x.shape.len(), 2, "transpose expects a 2D tensor");
    let rows = x.shape[0];
    let cols = x.shape[1];
    let mut out = vec![0.0; rows * cols];
    for i in 0..rows {
        for j in 0..cols {
            out[j * rows + i] = x.data[i * cols + j];
        }
    }
    Tensor::new(vec![cols, rows], out)
}
