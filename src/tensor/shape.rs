use std::fmt;

use crate::error::{IrError, IrResult};
use crate::tensor::shape_indices::ShapeIndices;

/// Dimensions of a tensor with their row-major strides.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct Shape {
    dims: Vec<usize>,
    strides: Vec<usize>,
}

impl Shape {
    /// Instantiates a new shape (computes stride values at this point).
    ///
    /// Strides saturate when they do not fit a `usize`; use [`Shape::checked`]
    /// or [`Shape::checked_volume`] for dimensions coming from outside.
    pub fn new(dims: Vec<usize>) -> Self {
        Self {
            strides: compute_strides(&dims, usize::saturating_mul),
            dims,
        }
    }

    /// Like [`Shape::new`], but rejects dimensions whose strides or volume
    /// overflow.
    pub fn checked(dims: Vec<usize>) -> IrResult<Self> {
        let shape = Self::new(dims);
        shape.checked_volume()?;
        Ok(shape)
    }

    /// Number of elements, or an error when it or any stride overflows.
    pub fn checked_volume(&self) -> IrResult<usize> {
        let overflow = || IrError::Tensor(format!("shape {:?} overflows usize", self.dims));
        let mut stride = 1usize;
        for dim in self.dims.iter().skip(1).rev() {
            stride = stride.checked_mul(*dim).ok_or_else(overflow)?;
        }
        self.dims
            .iter()
            .try_fold(1usize, |acc, d| acc.checked_mul(*d))
            .ok_or_else(overflow)
    }

    pub fn scalar() -> Self {
        Self::new(vec![])
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    pub fn strides(&self) -> &[usize] {
        &self.strides
    }

    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    /// Number of elements; 1 for a scalar. Saturates on overflow.
    pub fn volume(&self) -> usize {
        if self.dims.contains(&0) {
            return 0;
        }
        self.dims.iter().fold(1, |acc, d| acc.saturating_mul(*d))
    }

    /// Converts a multi-dimensional index to a flat index, `None` when out of bounds.
    pub fn flat_index(&self, index: &[usize]) -> Option<usize> {
        if index.len() != self.dims.len() || index.iter().zip(&self.dims).any(|(i, d)| i >= d) {
            return None;
        }
        self.strides
            .iter()
            .zip(index.iter())
            .try_fold(0usize, |acc, (a, b)| acc.checked_add(a.checked_mul(*b)?))
    }

    /// Iterates over every index allowed by the shape, optionally pinning
    /// some axes to a fixed value (`(axis, value)` pairs).
    pub fn index_iter(&self, fixed_indices: Option<Vec<(usize, usize)>>) -> ShapeIndices {
        ShapeIndices::new(self.clone(), fixed_indices)
    }
}

impl fmt::Debug for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.dims)
    }
}

impl From<Vec<usize>> for Shape {
    fn from(dims: Vec<usize>) -> Self {
        Shape::new(dims)
    }
}

impl From<&[usize]> for Shape {
    fn from(dims: &[usize]) -> Self {
        Shape::new(dims.to_vec())
    }
}

fn compute_strides(dims: &[usize], mul: fn(usize, usize) -> usize) -> Vec<usize> {
    let mut strides = vec![1; dims.len()];
    for i in (0..dims.len().saturating_sub(1)).rev() {
        strides[i] = mul(strides[i + 1], dims[i + 1]);
    }
    strides
}
