// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for the exchange runtime.

/// Errors that can occur while running a partial exchange step.
#[derive(Debug, thiserror::Error)]
pub enum ExchangeError {
    /// Schedule parsing, packing or selection failed.
    #[error("scheduler error: {0}")]
    Schedule(#[from] partition_scheduler::ScheduleError),

    /// A tensor buffer was malformed or shapes disagreed.
    #[error("tensor error: {0}")]
    Tensor(#[from] tensor_core::TensorError),

    /// The collective failed to reduce a tensor.
    #[error("collective failed for '{tensor}': {detail}")]
    Collective { tensor: String, detail: String },

    /// Configuration error.
    #[error("configuration error: {0}")]
    ConfigError(String),
}
