// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The [`PackingStrategy`] trait and its implementations.

pub mod first_fit;

use crate::{ByteBudget, PartitionAssignment, ScheduleError};
use std::collections::BTreeMap;
use tensor_core::TensorDescriptor;

/// Tensor name → byte size. A `BTreeMap` so that iteration order never
/// depends on how the caller happened to build it.
pub type TensorSizes = BTreeMap<String, usize>;

/// Trait for bin-packing strategies.
///
/// Each strategy takes the tensor sizes and a byte budget and produces a
/// [`PartitionAssignment`] that respects the budget. Strategies are pure:
/// peers run them independently and must arrive at identical results, so
/// an implementation may depend on nothing but its arguments.
pub trait PackingStrategy: Send + Sync {
    /// Human-readable name of this strategy.
    fn name(&self) -> &str;

    /// Packs every tensor in `sizes` into partitions under `budget`.
    ///
    /// Either returns a fully validated assignment or fails; never a
    /// partial one.
    fn pack(
        &self,
        sizes: &TensorSizes,
        budget: ByteBudget,
    ) -> Result<PartitionAssignment, ScheduleError>;
}

/// Collects descriptor sizes, rejecting empty tensors and duplicate names.
pub fn tensor_sizes(descriptors: &[TensorDescriptor]) -> Result<TensorSizes, ScheduleError> {
    let mut sizes = TensorSizes::new();
    for d in descriptors {
        d.validate()?;
        if sizes.insert(d.name.clone(), d.byte_size()).is_some() {
            return Err(ScheduleError::InvalidConfiguration(format!(
                "duplicate tensor name '{}'",
                d.name
            )));
        }
    }
    Ok(sizes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tensor_core::{DType, Shape};

    #[test]
    fn test_tensor_sizes() {
        let ds = vec![
            TensorDescriptor::new("b", DType::F32, Shape::vector(2)).unwrap(),
            TensorDescriptor::new("a", DType::F16, Shape::vector(3)).unwrap(),
        ];
        let sizes = tensor_sizes(&ds).unwrap();
        assert_eq!(sizes.get("a"), Some(&6));
        assert_eq!(sizes.get("b"), Some(&8));
    }

    #[test]
    fn test_tensor_sizes_rejects_duplicates() {
        let d = TensorDescriptor::new("w", DType::F32, Shape::vector(2)).unwrap();
        let result = tensor_sizes(&[d.clone(), d]);
        assert!(matches!(result, Err(ScheduleError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_tensor_sizes_rejects_zero_sized() {
        let d = TensorDescriptor {
            name: "z".into(),
            dtype: DType::F32,
            shape: Shape::vector(0),
        };
        assert!(matches!(tensor_sizes(&[d]), Err(ScheduleError::Tensor(_))));
    }
}
