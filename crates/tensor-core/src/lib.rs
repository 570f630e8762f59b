// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # tensor-core
//!
//! Tensor metadata and host buffers for partial gradient exchange.
//!
//! This crate provides:
//! - [`TensorDescriptor`] — a stable tensor name plus dtype and shape; the
//!   unit the partition scheduler packs against a byte budget.
//! - [`Shape`] and [`DType`] — element counts and widths.
//! - [`Tensor`] — an owned `f32` buffer tagged with its name, handed to and
//!   returned from collective operations.
//! - [`TensorManifest`] — a JSON list of descriptors, so tensor sets can be
//!   planned without materialising any data.
//!
//! # Design Goals
//! - Names are the identity: assignment state everywhere is keyed on them.
//! - Byte sizes are exact integers (`num_elements × dtype width`).
//! - Clean error types via `thiserror`.

mod descriptor;
mod dtype;
mod error;
mod manifest;
mod shape;
mod tensor;

pub use descriptor::{total_bytes, TensorDescriptor};
pub use dtype::DType;
pub use error::TensorError;
pub use manifest::{ManifestTensor, TensorManifest};
pub use shape::Shape;
pub use tensor::Tensor;
