// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # partial-exchange
//!
//! Runs the partition schedule against real gradients, one training step at
//! a time.
//!
//! The runtime takes:
//! - An [`ExchangeConfig`] (schedule or fixed fraction, reduce mode).
//! - A [`Collective`] that sums tensors across peers.
//!
//! And on every step synchronizes exactly one partition of the gradients,
//! passing the rest through untouched. Every peer that runs the same config
//! over the same tensor set picks the same partition, so the collective
//! calls line up without coordination.

mod collective;
mod config;
mod error;
mod exchange;
mod metrics;

pub use collective::{Collective, InProcessCluster, InProcessPeer, Loopback};
pub use config::{ExchangeConfig, ReduceMode};
pub use error::ExchangeError;
pub use exchange::{PartialExchange, StepOutcome};
pub use metrics::{ExchangeMetrics, StepRecord, DEFAULT_HISTORY_LIMIT};
