// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Tensor descriptors: the identity and byte size of a gradient tensor.

use crate::{DType, Shape, TensorError};

/// Name, element type and shape of one tensor taking part in the exchange.
///
/// The name is the stable identifier that partition assignments are keyed
/// on. It must be identical across steps and across peers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct TensorDescriptor {
    pub name: String,
    pub dtype: DType,
    pub shape: Shape,
}

impl TensorDescriptor {
    /// Creates a descriptor, rejecting empty tensors and sizes that overflow.
    ///
    /// # Examples
    /// ```
    /// use tensor_core::{DType, Shape, TensorDescriptor};
    /// let d = TensorDescriptor::new("fc.weight", DType::F32, Shape::matrix(4, 8)).unwrap();
    /// assert_eq!(d.byte_size(), 128);
    /// ```
    pub fn new(name: impl Into<String>, dtype: DType, shape: Shape) -> Result<Self, TensorError> {
        let desc = Self {
            name: name.into(),
            dtype,
            shape,
        };
        desc.validate()?;
        Ok(desc)
    }

    /// Checks that the tensor has a positive, representable byte size.
    pub fn validate(&self) -> Result<(), TensorError> {
        match self.shape.checked_size_bytes(self.dtype) {
            Some(0) => Err(TensorError::ZeroSized(self.name.clone())),
            Some(_) => Ok(()),
            None => Err(TensorError::InvalidManifest(format!(
                "byte size of '{}' ({} × {}) overflows",
                self.name, self.shape, self.dtype
            ))),
        }
    }

    /// Number of bytes the tensor occupies: element count × element width.
    ///
    /// Saturates instead of panicking for descriptors that were never
    /// validated; validated descriptors always report their exact size.
    pub fn byte_size(&self) -> usize {
        self.shape
            .checked_size_bytes(self.dtype)
            .unwrap_or(usize::MAX)
    }
}

/// Sum of byte sizes across a tensor set.
pub fn total_bytes(descriptors: &[TensorDescriptor]) -> usize {
    descriptors
        .iter()
        .fold(0usize, |acc, d| acc.saturating_add(d.byte_size()))
}
