// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # partition-scheduler
//!
//! Decides which gradient tensors are synchronized on which training step
//! when only a fraction of the model may be exchanged per step.
//!
//! # Pipeline
//!
//! | Component | Role |
//! |---|---|
//! | [`ScheduleParser`] | `"0:0.1,10:0.5"` → step thresholds and budget fractions |
//! | [`FirstFitDecreasing`] | tensors + byte budget → [`PartitionAssignment`] |
//! | [`PartitionScheduler`] | re-packs only when the effective fraction changes |
//! | [`SyncSelector`] | step + assignment → [`SyncDecision`] per tensor |
//!
//! Every component is a pure function of its inputs (the scheduler's state
//! is owned by the caller), so peers that see the same tensors, schedule and
//! step compute the same partitions without talking to each other.
//!
//! # Example
//! ```
//! use partition_scheduler::{InitialFraction, PartitionScheduler, ScheduleParser, SyncSelector};
//! use tensor_core::{DType, Shape, TensorDescriptor};
//!
//! let schedule = ScheduleParser::new(32, 3200, 4)
//!     .unwrap()
//!     .parse("0:0.5,10:1.0")
//!     .unwrap();
//! let mut scheduler =
//!     PartitionScheduler::new(schedule, InitialFraction::FirstEntry, false).unwrap();
//!
//! let tensors = vec![
//!     TensorDescriptor::new("w", DType::F32, Shape::matrix(4, 4)).unwrap(),
//!     TensorDescriptor::new("b", DType::F32, Shape::matrix(4, 4)).unwrap(),
//! ];
//! let update = scheduler.update(1, &tensors).unwrap();
//! let active = SyncSelector::active_members(1, &update.assignment).unwrap();
//! assert_eq!(active, vec!["b"]);
//! ```

mod assignment;
mod budget;
mod error;
mod schedule;
mod scheduler;
mod selector;
pub mod strategy;

pub use assignment::{Partition, PartitionAssignment};
pub use budget::{ByteBudget, Fraction};
pub use error::ScheduleError;
pub use schedule::{Schedule, ScheduleEntry, ScheduleParser};
pub use scheduler::{InitialFraction, PartitionScheduler, ScheduleUpdate, SchedulerState};
pub use selector::{SyncDecision, SyncSelector};
pub use strategy::first_fit::FirstFitDecreasing;
pub use strategy::{tensor_sizes, PackingStrategy, TensorSizes};
