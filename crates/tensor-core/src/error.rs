// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for tensor descriptors, buffers and manifests.

use crate::Shape;

/// Errors that can occur when describing or handling tensors.
#[derive(Debug, thiserror::Error)]
pub enum TensorError {
    /// The provided buffer does not match the element count of the shape.
    #[error("buffer size mismatch for '{name}': shape {shape} needs {expected} elements, got {actual}")]
    BufferSizeMismatch {
        name: String,
        shape: Shape,
        expected: usize,
        actual: usize,
    },

    /// Two tensors that must agree in shape do not.
    #[error("incompatible shapes for '{name}': {lhs} vs {rhs}")]
    ShapeMismatch { name: String, lhs: Shape, rhs: Shape },

    /// A tensor with zero elements cannot be scheduled.
    #[error("tensor '{0}' has zero bytes")]
    ZeroSized(String),

    /// The dtype label is not recognised.
    #[error("unknown dtype '{0}'")]
    UnknownDType(String),

    /// The tensor manifest file could not be read.
    #[error("failed to read tensor manifest: {0}")]
    ManifestReadError(#[from] std::io::Error),

    /// The tensor manifest JSON is malformed.
    #[error("failed to parse tensor manifest: {0}")]
    ManifestParseError(#[from] serde_json::Error),

    /// The manifest parsed but is not usable (e.g. duplicate names).
    #[error("invalid tensor manifest: {0}")]
    InvalidManifest(String),
}
