// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for schedule parsing and partitioning.

/// Errors that can occur while parsing a schedule or computing partitions.
///
/// All of them are fatal to the scheduling step: nothing is retried, and the
/// scheduler state is left exactly as it was before the failing call.
#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    /// A schedule token is not of the form `<epoch>:<fraction>`.
    #[error("malformed schedule token '{token}': {detail}")]
    Format { token: String, detail: String },

    /// The largest tensor does not fit the budget and budget adjustment is off.
    #[error(
        "budget too small: largest tensor is {largest_bytes} bytes, budget is {budget_bytes} bytes \
         (suggested fraction {suggested_fraction:.6})"
    )]
    BudgetTooSmall {
        largest_bytes: usize,
        budget_bytes: usize,
        /// Largest tensor size divided by the total size of all tensors.
        suggested_fraction: f64,
    },

    /// Batch size, dataset size, peer count, fraction or step is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A tensor descriptor was rejected.
    #[error("tensor error: {0}")]
    Tensor(#[from] tensor_core::TensorError),
}
