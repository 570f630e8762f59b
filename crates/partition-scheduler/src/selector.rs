// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Per-step partition activation.
//!
//! For a 1-based training step `s` and an assignment with `N` partitions
//! the active partition is `(s - 1) mod N`. A tensor is synchronized when
//! its partition is the active one and passed through unchanged otherwise.
//! Over any `N` consecutive steps with a fixed assignment, every partition
//! (and so every tensor) is active exactly once.

use crate::{PartitionAssignment, ScheduleError};

/// What to do with one tensor on the current step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub enum SyncDecision {
    /// Hand the tensor to the all-reduce collective.
    Synchronize,
    /// Return the tensor unchanged.
    PassThrough,
}

impl SyncDecision {
    pub fn is_synchronize(self) -> bool {
        matches!(self, SyncDecision::Synchronize)
    }
}

/// Stateless selector: every method is a pure function of the step and
/// the assignment.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncSelector;

impl SyncSelector {
    /// `(step - 1) mod num_partitions`.
    ///
    /// # Examples
    /// ```
    /// use partition_scheduler::SyncSelector;
    /// assert_eq!(SyncSelector::active_partition(1, 3).unwrap(), 0);
    /// assert_eq!(SyncSelector::active_partition(3, 3).unwrap(), 2);
    /// assert_eq!(SyncSelector::active_partition(4, 3).unwrap(), 0);
    /// ```
    pub fn active_partition(step: u64, num_partitions: usize) -> Result<usize, ScheduleError> {
        if step == 0 {
            return Err(ScheduleError::InvalidConfiguration(
                "training steps are 1-based; got step 0".into(),
            ));
        }
        if num_partitions == 0 {
            return Err(ScheduleError::InvalidConfiguration(
                "partition count must be at least 1".into(),
            ));
        }
        Ok(((step - 1) % num_partitions as u64) as usize)
    }

    /// Decision for a single tensor.
    pub fn decide(
        step: u64,
        assignment: &PartitionAssignment,
        name: &str,
    ) -> Result<SyncDecision, ScheduleError> {
        let active = Self::active_partition(step, assignment.num_partitions())?;
        Self::decide_with_active(active, assignment, name)
    }

    /// Decisions for `names`, in the same order.
    pub fn decisions<'a, I>(
        step: u64,
        assignment: &PartitionAssignment,
        names: I,
    ) -> Result<Vec<SyncDecision>, ScheduleError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let active = Self::active_partition(step, assignment.num_partitions())?;
        names
            .into_iter()
            .map(|name| Self::decide_with_active(active, assignment, name))
            .collect()
    }

    /// Names in the active partition, sorted by name.
    pub fn active_members(
        step: u64,
        assignment: &PartitionAssignment,
    ) -> Result<Vec<&str>, ScheduleError> {
        let active = Self::active_partition(step, assignment.num_partitions())?;
        let mut members: Vec<&str> = assignment
            .partition(active)
            .map(|p| p.members.iter().map(String::as_str).collect())
            .unwrap_or_default();
        members.sort_unstable();
        Ok(members)
    }

    fn decide_with_active(
        active: usize,
        assignment: &PartitionAssignment,
        name: &str,
    ) -> Result<SyncDecision, ScheduleError> {
        match assignment.partition_of(name) {
            Some(p) if p == active => Ok(SyncDecision::Synchronize),
            Some(_) => Ok(SyncDecision::PassThrough),
            None => Err(ScheduleError::InvalidConfiguration(format!(
                "tensor '{name}' is not part of the current assignment"
            ))),
        }
    }
}
