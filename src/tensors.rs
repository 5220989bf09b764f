//! Core tensor data structures.
//!
//! # Core Tensor Utilities
//!
//! This module defines the plain numeric container the differentiation engine
//! computes with: an N-dimensional array with a shape and flat row-major data.
//!
//! It supports:
//! - Construction of N-dimensional tensors with shape and row-major data layout
//! - `ones_like`/`zeros_like` constructors for building seed gradients
//! - Compile-time tensor literals via the `tensor!` macro
//!
//! ## Design Highlights
//! - Tensors are strongly typed: `Tensor<T>` for any element type (usually `f64`)
//! - Shape is stored as a `Vec<usize>` and enforced at runtime
//! - The `tensor!` macro supports ergonomic tensor creation from nested arrays
//!
//! ## Limitations
//! - Row-major only
//! - No broadcasting, slicing, or shape inference
//!
//! ## Example
//!
//! ```rust
//! use chaingrad::tensors::Tensor;
//! let t = Tensor::new(vec![2, 3], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
//! assert_eq!(t.shape, vec![2, 3]);
//! ```

/// Represents an N-dimensional tensor with a shape and flat row-major data.
///
/// - All elements must be the same type (`T`).
/// - `shape` defines the structure, e.g., `[2, 3]` for a 2×3 matrix.
/// - `data` holds the flattened content in row-major order.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor<T> {
    pub shape: Vec<usize>,
    pub data: Vec<T>,
}

/// The element type the differentiation engine traces over.
pub type Ten64 = Tensor<f64>;

impl<T> Tensor<T> {
    /// Creates a new tensor with the given shape and flat data.
    ///
    /// # Panics
    /// Panics if the number of elements in `data` does not match the shape product.
    pub fn new(shape: impl Into<Vec<usize>>, data: Vec<T>) -> Self {
        let shape = shape.into();
        assert_eq!(
            shape.iter().product::<usize>(),
            data.len(),
            "shape {:?} is incompatible with {} data elements",
            shape,
            data.len()
        );
        Self { shape, data }
    }

    /// Number of elements in the tensor.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the tensor holds no elements.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl Ten64 {
    /// Builds a rank-0 tensor holding a single scalar.
    pub fn scalar(v: f64) -> Self {
        Self::new(Vec::new(), vec![v])
    }

    /// Builds a tensor of the same shape filled with ones.
    ///
    /// This is the seed-gradient constructor: the backward pass of a scalar or
    /// elementwise function conventionally starts from an all-ones cotangent.
    pub fn ones_like(&self) -> Self {
        Self::new(self.shape.clone(), vec![1.0; self.data.len()])
    }

    /// Builds a tensor of the same shape filled with zeros.
    pub fn zeros_like(&self) -> Self {
        Self::new(self.shape.clone(), vec![0.0; self.data.len()])
    }
}

/// Defines a tensor from nested literal arrays.
///
/// Supports arbitrary dimensionality as long as sublists are uniform in shape.
///
/// # Example
/// ```
/// use chaingrad::tensor;
/// let t = tensor!([[1.0, 2.0], [3.0, 4.0]]);
/// assert_eq!(t.shape, vec![2, 2]);
/// ```
#[macro_export]
macro_rules! tensor {
    ($lit:literal) => {
        $crate::tensors::Tensor::new(Vec::<usize>::new(), vec![$lit])
    };

    // Nested lists: each element is itself a bracketed list.
    ([ $( [ $($inner:tt)* ] ),+ $(,)? ]) => {{
        let children = vec![ $( tensor!([ $($inner)* ]) ),+ ];
        let first_shape = &children[0].shape;
        assert!(children.iter().all(|c| c.shape == *first_shape),
            "ragged tensor literal (rows have mismatched shapes)");
        let mut shape = vec![children.len()];
        shape.extend_from_slice(first_shape);
        let mut data = Vec::with_capacity(children.len() * children[0].data.len());
        for c in children { data.extend(c.data); }
        $crate::tensors::Tensor::new(shape, data)
    }};

    // Flat list: elements match as expressions, so negated literals like
    // `-1.5` (two token trees) are accepted.
    ([ $( $elem:expr ),+ $(,)? ]) => {{
        let data: Vec<f64> = vec![ $( $elem ),+ ];
        $crate::tensors::Tensor::new(vec![data.len()], data)
    }};
}
