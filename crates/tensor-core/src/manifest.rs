// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! JSON tensor manifest parsing.
//!
//! A manifest lists the gradient tensors of a model so that partitions can
//! be planned and simulated without any tensor data.
//!
//! # Format
//! ```json
//! {
//!   "name": "resnet50",
//!   "dtype": "f32",
//!   "tensors": [
//!     { "name": "conv1.weight", "shape": [64, 3, 7, 7] },
//!     { "name": "fc.bias", "shape": [1000], "dtype": "f16" }
//!   ]
//! }
//! ```
//!
//! A per-tensor `dtype` overrides the manifest default.

use crate::{DType, Shape, TensorDescriptor, TensorError};
use std::collections::HashSet;
use std::path::Path;

/// Top-level manifest, deserialised from JSON.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TensorManifest {
    /// Human-readable model name.
    pub name: String,
    /// Default element type for tensors that do not declare one.
    #[serde(default = "default_dtype")]
    pub dtype: DType,
    pub tensors: Vec<ManifestTensor>,
}

fn default_dtype() -> DType {
    DType::F32
}

/// A single tensor entry in the manifest.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ManifestTensor {
    pub name: String,
    pub shape: Shape,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dtype: Option<DType>,
}

impl TensorManifest {
    /// Loads a manifest from a JSON file path.
    pub fn from_file(path: &Path) -> Result<Self, TensorError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Parses a manifest from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, TensorError> {
        let manifest: Self = serde_json::from_str(json)?;
        Ok(manifest)
    }

    /// Builds a manifest from existing descriptors.
    pub fn from_descriptors(name: impl Into<String>, descriptors: &[TensorDescriptor]) -> Self {
        Self {
            name: name.into(),
            dtype: DType::F32,
            tensors: descriptors
                .iter()
                .map(|d| ManifestTensor {
                    name: d.name.clone(),
                    shape: d.shape.clone(),
                    dtype: Some(d.dtype),
                })
                .collect(),
        }
    }

    /// Validates the manifest and resolves it into descriptors, in file order.
    ///
    /// Checks:
    /// - At least one tensor is listed.
    /// - Names are unique and non-empty.
    /// - Every tensor has a positive byte size.
    pub fn descriptors(&self) -> Result<Vec<TensorDescriptor>, TensorError> {
        if self.tensors.is_empty() {
            return Err(TensorError::InvalidManifest(format!(
                "manifest '{}' lists no tensors",
                self.name
            )));
        }

        let mut seen = HashSet::with_capacity(self.tensors.len());
        let mut out = Vec::with_capacity(self.tensors.len());
        for t in &self.tensors {
            if t.name.is_empty() {
                return Err(TensorError::InvalidManifest("empty tensor name".into()));
            }
            if !seen.insert(t.name.as_str()) {
                return Err(TensorError::InvalidManifest(format!(
                    "duplicate tensor name '{}'",
                    t.name
                )));
            }
            out.push(TensorDescriptor::new(
                t.name.clone(),
                t.dtype.unwrap_or(self.dtype),
                t.shape.clone(),
            )?);
        }

        tracing::debug!(
            "manifest '{}': {} tensors, {} bytes",
            self.name,
            out.len(),
            crate::total_bytes(&out),
        );
        Ok(out)
    }

    /// Serialises the manifest to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, TensorError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_manifest_json() -> &'static str {
        r#"{
            "name": "mlp",
            "dtype": "f32",
            "tensors": [
                { "name": "fc1.weight", "shape": [256, 784] },
                { "name": "fc1.bias", "shape": [256] },
                { "name": "fc2.weight", "shape": [10, 256], "dtype": "f16" },
                { "name": "fc2.bias", "shape": [10] }
            ]
        }"#
    }

    #[test]
    fn test_parse_manifest() {
        let m = TensorManifest::from_json(sample_manifest_json()).unwrap();
        assert_eq!(m.name, "mlp");
        assert_eq!(m.tensors.len(), 4);
        assert_eq!(m.tensors[2].dtype, Some(DType::F16));
    }

    #[test]
    fn test_descriptors_resolve_dtype() {
        let m = TensorManifest::from_json(sample_manifest_json()).unwrap();
        let ds = m.descriptors().unwrap();
        assert_eq!(ds[0].byte_size(), 256 * 784 * 4);
        assert_eq!(ds[2].dtype, DType::F16);
        assert_eq!(ds[2].byte_size(), 10 * 256 * 2);
    }

    #[test]
    fn test_default_dtype() {
        let json = r#"{ "name": "x", "tensors": [{ "name": "w", "shape": [2, 2] }] }"#;
        let m = TensorManifest::from_json(json).unwrap();
        assert_eq!(m.dtype, DType::F32);
        assert_eq!(m.descriptors().unwrap()[0].byte_size(), 16);
    }

    #[test]
    fn test_empty_rejected() {
        let json = r#"{ "name": "empty", "tensors": [] }"#;
        let m = TensorManifest::from_json(json).unwrap();
        assert!(matches!(m.descriptors(), Err(TensorError::InvalidManifest(_))));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let json = r#"{
            "name": "dup",
            "tensors": [
                { "name": "w", "shape": [2] },
                { "name": "w", "shape": [3] }
            ]
        }"#;
        let m = TensorManifest::from_json(json).unwrap();
        assert!(m.descriptors().is_err());
    }

    #[test]
    fn test_zero_sized_rejected() {
        let json = r#"{ "name": "z", "tensors": [{ "name": "w", "shape": [0, 4] }] }"#;
        let m = TensorManifest::from_json(json).unwrap();
        assert!(matches!(m.descriptors(), Err(TensorError::ZeroSized(_))));
    }

    #[test]
    fn test_bad_json() {
        assert!(matches!(
            TensorManifest::from_json("{ not json"),
            Err(TensorError::ManifestParseError(_))
        ));
    }

    #[test]
    fn test_json_roundtrip_keeps_sizes() {
        let m = TensorManifest::from_json(sample_manifest_json()).unwrap();
        let ds = m.descriptors().unwrap();
        let again = TensorManifest::from_json(&m.to_json().unwrap()).unwrap();
        assert_eq!(again.descriptors().unwrap(), ds);
    }
}
