// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Partition assignments: the output of bin-packing.
//!
//! An assignment maps every tensor name to a 0-based partition index and
//! records the byte total of each partition. It is the contract between
//! the packer, the scheduler that caches it, and the selector that reads
//! it every step. Once built it is never mutated.

use crate::{ByteBudget, ScheduleError};
use std::collections::BTreeMap;

/// A set of tensors synchronized together on the same step.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Partition {
    pub index: usize,
    /// Tensor names in placement order (size descending, then name).
    pub members: Vec<String>,
    pub total_bytes: usize,
}

impl Partition {
    pub fn num_tensors(&self) -> usize {
        self.members.len()
    }

    pub fn is_singleton(&self) -> bool {
        self.members.len() == 1
    }
}

/// The complete tensor → partition mapping produced by a
/// [`crate::PackingStrategy`].
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct PartitionAssignment {
    /// Strategy that produced this assignment.
    pub strategy_name: String,
    /// Budget the caller asked for.
    pub requested_budget: ByteBudget,
    /// Budget actually packed against; larger than the request only when
    /// budget adjustment raised it to fit the largest tensor.
    pub effective_budget: ByteBudget,
    partitions: Vec<Partition>,
    index: BTreeMap<String, usize>,
}

impl PartitionAssignment {
    /// Number of partitions, `N`. Always at least 1 for a valid assignment.
    pub fn num_partitions(&self) -> usize {
        self.partitions.len()
    }

    pub fn num_tensors(&self) -> usize {
        self.index.len()
    }

    /// Partition index of `name`, or `None` if the tensor was not packed.
    pub fn partition_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn partitions(&self) -> &[Partition] {
        &self.partitions
    }

    pub fn partition(&self, index: usize) -> Option<&Partition> {
        self.partitions.get(index)
    }

    /// Name → partition index, ordered by name.
    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.index.iter().map(|(k, &v)| (k.as_str(), v))
    }

    /// Total bytes across all partitions.
    pub fn total_bytes(&self) -> usize {
        self.partitions.iter().map(|p| p.total_bytes).sum()
    }

    /// Largest partition total.
    pub fn peak_partition_bytes(&self) -> usize {
        self.partitions
            .iter()
            .map(|p| p.total_bytes)
            .max()
            .unwrap_or(0)
    }

    /// Validates the assignment.
    ///
    /// Checks:
    /// - At least one partition, none empty.
    /// - Partition indices are `0..N` in order.
    /// - Every member maps back to its partition and no tensor is listed twice.
    /// - Every partition total is within the effective budget.
    pub fn validate(&self) -> Result<(), ScheduleError> {
        let fail = |detail: String| -> Result<(), ScheduleError> {
            Err(ScheduleError::InvalidConfiguration(format!(
                "assignment from '{}' is inconsistent: {detail}",
                self.strategy_name
            )))
        };

        if self.partitions.is_empty() {
            return fail("no partitions".into());
        }

        let mut members_seen = 0;
        for (expected, partition) in self.partitions.iter().enumerate() {
            if partition.index != expected {
                return fail(format!(
                    "expected partition index {expected}, got {}",
                    partition.index
                ));
            }
            if partition.members.is_empty() {
                return fail(format!("partition {expected} is empty"));
            }
            for name in &partition.members {
                if self.index.get(name) != Some(&expected) {
                    return fail(format!(
                        "tensor '{name}' listed in partition {expected} but indexed as {:?}",
                        self.index.get(name)
                    ));
                }
            }
            members_seen += partition.members.len();

            if partition.total_bytes > self.effective_budget.as_bytes() {
                return fail(format!(
                    "partition {expected} holds {} bytes but budget is {} bytes",
                    partition.total_bytes,
                    self.effective_budget.as_bytes()
                ));
            }
        }

        if members_seen != self.index.len() {
            return fail(format!(
                "{} members listed but {} tensors indexed",
                members_seen,
                self.index.len()
            ));
        }

        Ok(())
    }

    /// Returns a human-readable summary of the assignment.
    pub fn summary(&self) -> String {
        let sizes: Vec<usize> = self.partitions.iter().map(|p| p.num_tensors()).collect();
        let budget = self.effective_budget.as_bytes().max(1) as f64;
        format!(
            "Assignment '{}': {} partitions, {} tensors, budget {}{}, \
             peak {} bytes ({:.0}% budget), tensors per partition: {:?}",
            self.strategy_name,
            self.num_partitions(),
            self.num_tensors(),
            self.effective_budget,
            if self.effective_budget > self.requested_budget {
                format!(" (raised from {})", self.requested_budget)
            } else {
                String::new()
            },
            self.peak_partition_bytes(),
            self.peak_partition_bytes() as f64 / budget * 100.0,
            sizes,
        )
    }
}

/// Incremental builder used by packing strategies.
///
/// Tracks the remaining capacity of every open partition so first-fit can
/// scan them in creation order.
pub(crate) struct AssignmentBuilder {
    strategy_name: String,
    requested_budget: ByteBudget,
    effective_budget: ByteBudget,
    partitions: Vec<Partition>,
    remaining: Vec<usize>,
    index: BTreeMap<String, usize>,
}

impl AssignmentBuilder {
    pub fn new(strategy_name: &str, requested: ByteBudget, effective: ByteBudget) -> Self {
        Self {
            strategy_name: strategy_name.to_string(),
            requested_budget: requested,
            effective_budget: effective,
            partitions: Vec::new(),
            remaining: Vec::new(),
            index: BTreeMap::new(),
        }
    }

    /// Remaining capacity of each open partition, in creation order.
    pub fn remaining(&self) -> &[usize] {
        &self.remaining
    }

    /// Places `name` into existing partition `index`.
    ///
    /// The caller has checked that it fits.
    pub fn place(&mut self, index: usize, name: &str, size: usize) {
        self.remaining[index] -= size;
        let partition = &mut self.partitions[index];
        partition.members.push(name.to_string());
        partition.total_bytes += size;
        self.index.insert(name.to_string(), index);
    }

    /// Opens a new partition holding only `name`. Returns its index.
    pub fn open(&mut self, name: &str, size: usize) -> usize {
        let index = self.partitions.len();
        self.partitions.push(Partition {
            index,
            members: vec![name.to_string()],
            total_bytes: size,
        });
        self.remaining
            .push(self.effective_budget.as_bytes().saturating_sub(size));
        self.index.insert(name.to_string(), index);
        index
    }

    pub fn build(self) -> PartitionAssignment {
        PartitionAssignment {
            strategy_name: self.strategy_name,
            requested_budget: self.requested_budget,
            effective_budget: self.effective_budget,
            partitions: self.partitions,
            index: self.index,
        }
    }
}
