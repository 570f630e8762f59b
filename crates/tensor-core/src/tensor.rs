// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Owned gradient buffers exchanged between peers.

use crate::{DType, Shape, TensorDescriptor, TensorError};

/// A named, owned `f32` tensor in row-major order.
///
/// `Tensor` is what the training loop hands to the exchange and what the
/// collective returns. Its name must match the [`TensorDescriptor`] name the
/// partition scheduler packed.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    name: String,
    shape: Shape,
    values: Vec<f32>,
}

impl Tensor {
    /// Creates a tensor filled with zeros.
    pub fn zeros(name: impl Into<String>, shape: Shape) -> Result<Self, TensorError> {
        Self::filled(name, shape, 0.0)
    }

    /// Creates a tensor from `f32` values.
    ///
    /// # Examples
    /// ```
    /// use tensor_core::{Shape, Tensor};
    /// let t = Tensor::from_f32("bias", Shape::vector(3), vec![1.0, 2.0, 3.0]).unwrap();
    /// assert_eq!(t.as_slice(), &[1.0, 2.0, 3.0]);
    /// assert_eq!(t.size_bytes(), 12);
    /// ```
    pub fn from_f32(
        name: impl Into<String>,
        shape: Shape,
        values: Vec<f32>,
    ) -> Result<Self, TensorError> {
        let name = name.into();
        let expected = shape.checked_num_elements().ok_or_else(|| {
            TensorError::InvalidManifest(format!("element count of '{name}' overflows"))
        })?;
        if values.len() != expected {
            return Err(TensorError::BufferSizeMismatch {
                name,
                shape,
                expected,
                actual: values.len(),
            });
        }
        Ok(Self {
            name,
            shape,
            values,
        })
    }

    /// Creates a tensor with every element set to `value`.
    ///
    /// Fails if the shape's element count overflows `usize`.
    pub fn filled(
        name: impl Into<String>,
        shape: Shape,
        value: f32,
    ) -> Result<Self, TensorError> {
        let name = name.into();
        let n = shape.checked_num_elements().ok_or_else(|| {
            TensorError::InvalidManifest(format!("element count of '{name}' overflows"))
        })?;
        Ok(Self {
            name,
            shape,
            values: vec![value; n],
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn dtype(&self) -> DType {
        DType::F32
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }

    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.values
    }

    /// Memory footprint in bytes.
    pub fn size_bytes(&self) -> usize {
        self.values.len() * DType::F32.size_bytes()
    }

    /// Descriptor used for partition planning.
    pub fn descriptor(&self) -> TensorDescriptor {
        TensorDescriptor {
            name: self.name.clone(),
            dtype: DType::F32,
            shape: self.shape.clone(),
        }
    }

    /// Element-wise `self += other`. Shapes must match exactly.
    pub fn add_assign(&mut self, other: &Tensor) -> Result<(), TensorError> {
        if self.shape != other.shape {
            return Err(TensorError::ShapeMismatch {
                name: self.name.clone(),
                lhs: self.shape.clone(),
                rhs: other.shape.clone(),
            });
        }
        for (a, b) in self.values.iter_mut().zip(&other.values) {
            *a += *b;
        }
        Ok(())
    }

    /// Multiplies every element by `factor` in place.
    pub fn scale(&mut self, factor: f32) {
        self.values.iter_mut().for_each(|x| *x *= factor);
    }
}
