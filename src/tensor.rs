//! Tensor implementation
//!
//! This module provides the core `Tensor` type: an N-dimensional array of
//! `f32` values in row-major order. The forward pipeline is defined over f32
//! end to end (the flat weight format is an f32 wire contract), so the type
//! is deliberately not generic over element type.

use std::fmt;

use crate::error::{AparentarError, Result};

/// N-dimensional f32 tensor with row-major storage
///
/// # Examples
///
/// ```
/// use aparentar::Tensor;
///
/// // Create a 2×3 tensor
/// let t = Tensor::from_vec(vec![2, 3], vec![
///     1.0, 2.0, 3.0,
///     4.0, 5.0, 6.0,
/// ]).unwrap();
///
/// assert_eq!(t.shape(), &[2, 3]);
/// assert_eq!(t.ndim(), 2);
/// assert_eq!(t.size(), 6);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    /// Flattened data in row-major order
    data: Vec<f32>,
    /// Shape of the tensor
    shape: Vec<usize>,
}

impl Tensor {
    /// Create a new tensor from a shape and flattened data
    ///
    /// # Arguments
    ///
    /// * `shape` - Dimensions of the tensor
    /// * `data` - Flattened data in row-major order
    ///
    /// # Errors
    ///
    /// Returns `Err` if:
    /// - Shape is empty
    /// - Shape contains zero
    /// - Data size doesn't match shape
    ///
    /// # Examples
    ///
    /// ```
    /// use aparentar::Tensor;
    ///
    /// let t = Tensor::from_vec(vec![2, 2], vec![1.0, 2.0, 3.0, 4.0]).unwrap();
    /// assert_eq!(t.shape(), &[2, 2]);
    /// ```
    pub fn from_vec(shape: Vec<usize>, data: Vec<f32>) -> Result<Self> {
        if shape.is_empty() {
            return Err(AparentarError::InvalidShape {
                reason: "Shape cannot be empty".to_string(),
            });
        }

        if shape.contains(&0) {
            return Err(AparentarError::InvalidShape {
                reason: "Shape dimensions cannot be zero".to_string(),
            });
        }

        let expected_size = shape.iter().product();

        if data.len() != expected_size {
            return Err(AparentarError::DataShapeMismatch {
                data_size: data.len(),
                shape: shape.clone(),
                expected: expected_size,
            });
        }

        Ok(Self { data, shape })
    }

    /// Get the shape of the tensor
    #[must_use]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Get the number of dimensions
    #[must_use]
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Get the total number of elements
    #[must_use]
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Get a reference to the underlying data
    ///
    /// # Examples
    ///
    /// ```
    /// use aparentar::Tensor;
    ///
    /// let t = Tensor::from_vec(vec![2], vec![1.0, 2.0]).unwrap();
    /// assert_eq!(t.data(), &[1.0, 2.0]);
    /// ```
    #[must_use]
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Consume the tensor and return its flattened data
    #[must_use]
    pub fn into_data(self) -> Vec<f32> {
        self.data
    }

    /// Reinterpret the tensor with a new shape of the same total size
    ///
    /// No data is moved; only the shape metadata changes.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the new shape is invalid or its element count
    /// differs from the current one.
    ///
    /// # Examples
    ///
    /// ```
    /// use aparentar::Tensor;
    ///
    /// let t = Tensor::from_vec(vec![1, 1, 4], vec![1.0, 2.0, 3.0, 4.0]).unwrap();
    /// let flat = t.reshape(vec![4]).unwrap();
    /// assert_eq!(flat.shape(), &[4]);
    /// ```
    pub fn reshape(self, new_shape: Vec<usize>) -> Result<Self> {
        Self::from_vec(new_shape, self.data)
    }

    /// Slice out one sample along the outermost (batch) dimension
    ///
    /// For a `[N, ...]` tensor this returns the contiguous `size / N` scalars
    /// belonging to sample `index`.
    ///
    /// # Errors
    ///
    /// Returns `Err` if `index` is out of range.
    pub fn sample(&self, index: usize) -> Result<&[f32]> {
        let batch = self.shape[0];
        if index >= batch {
            return Err(AparentarError::InvalidShape {
                reason: format!("Sample index {index} out of range for batch size {batch}"),
            });
        }
        let stride = self.data.len() / batch;
        Ok(&self.data[index * stride..(index + 1) * stride])
    }
}

impl fmt::Display for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const MAX_SHOWN: usize = 8;
        write!(f, "Tensor(shape={:?}, data=[", self.shape)?;
        for (i, val) in self.data.iter().take(MAX_SHOWN).enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{val}")?;
        }
        if self.data.len() > MAX_SHOWN {
            write!(f, ", ... {} more", self.data.len() - MAX_SHOWN)?;
        }
        write!(f, "])")
    }
}
