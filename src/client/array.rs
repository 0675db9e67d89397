//! Typed arrays ready to stream.

use crate::domain::{DType, Element};

use super::ClientError;

/// A C-contiguous, little-endian array: dtype, shape and raw bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayPayload {
    dtype: DType,
    shape: Vec<usize>,
    data: Vec<u8>,
}

impl ArrayPayload {
    /// Builds an array of the given shape from row-major values.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::ShapeMismatch`] if `values.len()` differs
    /// from the product of `shape`.
    pub fn from_slice<T: Element>(shape: Vec<usize>, values: &[T]) -> Result<Self, ClientError> {
        let expected = shape.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d));
        if expected != Some(values.len()) {
            return Err(ClientError::ShapeMismatch {
                expected: expected.unwrap_or(usize::MAX),
                actual: values.len(),
                shape,
            });
        }
        let dtype = T::dtype();
        let mut data = Vec::with_capacity(values.len() * dtype.item_size());
        for v in values {
            v.extend_le_bytes(&mut data);
        }
        Ok(Self { dtype, shape, data })
    }

    /// Builds a one-dimensional array.
    #[must_use]
    pub fn vector<T: Element>(values: &[T]) -> Self {
        let dtype = T::dtype();
        let mut data = Vec::with_capacity(values.len() * dtype.item_size());
        for v in values {
            v.extend_le_bytes(&mut data);
        }
        Self {
            dtype,
            shape: vec![values.len()],
            data,
        }
    }

    /// Element type.
    #[must_use]
    pub const fn dtype(&self) -> &DType {
        &self.dtype
    }

    /// Dimensions.
    #[must_use]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Raw element bytes in C order.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}
