// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Deterministic first-fit-decreasing bin-packing.
//!
//! ```text
//! sort tensors by (size desc, name asc)
//! for each tensor:
//!     place it in the first partition (creation order) with room left
//!     otherwise open a new partition
//! ```
//!
//! The partition count is not guaranteed minimal, but it is a pure
//! function of the `(name, size)` set and the budget, which is what lets
//! peers agree on partitions without exchanging a single byte.
//!
//! # Oversized tensors
//! If the largest tensor is bigger than the budget, either the budget is
//! raised to the largest size (`adjust_budget`), or packing fails with
//! [`ScheduleError::BudgetTooSmall`] carrying the smallest workable
//! fraction (`largest / total`).

use crate::assignment::AssignmentBuilder;
use crate::strategy::{PackingStrategy, TensorSizes};
use crate::{ByteBudget, PartitionAssignment, ScheduleError};

/// First-fit-decreasing packer.
#[derive(Debug, Clone, Default)]
pub struct FirstFitDecreasing {
    adjust_budget: bool,
}

impl FirstFitDecreasing {
    /// Creates a packer that rejects budgets smaller than the largest tensor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a packer that raises too-small budgets to the largest tensor.
    pub fn with_adjust_budget(adjust_budget: bool) -> Self {
        Self { adjust_budget }
    }

    pub fn adjusts_budget(&self) -> bool {
        self.adjust_budget
    }
}

impl PackingStrategy for FirstFitDecreasing {
    fn name(&self) -> &str {
        "first-fit-decreasing"
    }

    fn pack(
        &self,
        sizes: &TensorSizes,
        budget: ByteBudget,
    ) -> Result<PartitionAssignment, ScheduleError> {
        if sizes.is_empty() {
            return Err(ScheduleError::InvalidConfiguration(
                "cannot partition an empty tensor set".into(),
            ));
        }
        if let Some((name, _)) = sizes.iter().find(|&(_, &size)| size == 0) {
            return Err(ScheduleError::InvalidConfiguration(format!(
                "tensor '{name}' has zero bytes"
            )));
        }

        let mut order: Vec<(&str, usize)> =
            sizes.iter().map(|(name, &size)| (name.as_str(), size)).collect();
        order.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

        let largest = order[0].1;
        let effective = if largest > budget.as_bytes() {
            if !self.adjust_budget {
                let total: u128 = order.iter().map(|&(_, s)| s as u128).sum();
                return Err(ScheduleError::BudgetTooSmall {
                    largest_bytes: largest,
                    budget_bytes: budget.as_bytes(),
                    suggested_fraction: largest as f64 / total as f64,
                });
            }
            tracing::warn!(
                "budget {} is smaller than tensor '{}' ({} bytes); raising it",
                budget,
                order[0].0,
                largest,
            );
            ByteBudget::from_bytes(largest)
        } else {
            budget
        };

        let mut builder = AssignmentBuilder::new(self.name(), budget, effective);
        for (name, size) in order {
            let slot = builder.remaining().iter().position(|&left| left >= size);
            match slot {
                Some(index) => builder.place(index, name, size),
                None => {
                    builder.open(name, size);
                }
            }
            tracing::trace!("placed '{name}' ({size} bytes)");
        }

        let assignment = builder.build();
        assignment.validate()?;
        tracing::debug!("{}", assignment.summary());
        Ok(assignment)
    }
}
