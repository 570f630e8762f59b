// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The per-step partial exchange.
//!
//! ```text
//! step s, gradients ──► PartitionScheduler::update ──► Arc<assignment>
//!                                                          │
//!                         SyncSelector (s - 1) mod N ◄─────┘
//!                                    │
//!            ┌───────────────────────┴───────────────────────┐
//!      Synchronize                                      PassThrough
//!   (sorted by name)                                   (returned as-is)
//!            │
//!   Collective::all_reduce / group_all_reduce
//!            │
//!   optional ÷ cluster_size
//! ```
//!
//! Outputs come back in the caller's input order regardless of how the
//! active partition was ordered on the wire.

use crate::{Collective, ExchangeConfig, ExchangeError, ExchangeMetrics, ReduceMode, StepRecord};
use partition_scheduler::{PartitionScheduler, SyncDecision, SyncSelector};
use std::time::Instant;
use tensor_core::{total_bytes, Tensor, TensorDescriptor};

/// Result of one [`PartialExchange::step`].
#[derive(Debug)]
pub struct StepOutcome {
    pub step: u64,
    /// Tensors in input order; synchronized ones hold the reduced value.
    pub tensors: Vec<Tensor>,
    /// Per-tensor decisions, aligned with `tensors`.
    pub decisions: Vec<SyncDecision>,
    pub active_partition: usize,
    pub num_partitions: usize,
    /// `true` if the assignment was re-packed on this step.
    pub repartitioned: bool,
    pub synced_tensors: usize,
    pub synced_bytes: usize,
}

impl StepOutcome {
    /// Names of the tensors synchronized on this step, in input order.
    pub fn synced_names(&self) -> Vec<&str> {
        self.tensors
            .iter()
            .zip(&self.decisions)
            .filter(|(_, d)| d.is_synchronize())
            .map(|(t, _)| t.name())
            .collect()
    }
}

/// Drives one peer's gradient exchange.
///
/// # Example
/// ```
/// use partial_exchange::{Loopback, PartialExchange};
/// use tensor_core::{Shape, Tensor};
///
/// let mut exchange = PartialExchange::fixed(0.5, Loopback).unwrap();
/// let grads = vec![
///     Tensor::filled("w", Shape::vector(16), 1.0).unwrap(),
///     Tensor::filled("b", Shape::vector(16), 1.0).unwrap(),
/// ];
/// let outcome = exchange.step(1, grads).unwrap();
/// assert_eq!(outcome.num_partitions, 2);
/// assert_eq!(outcome.synced_names(), vec!["b"]);
/// ```
pub struct PartialExchange<C: Collective> {
    scheduler: PartitionScheduler,
    collective: C,
    reduce: ReduceMode,
    average: bool,
    metrics: ExchangeMetrics,
}

impl<C: Collective> PartialExchange<C> {
    /// Builds an exchange from configuration, sizing the schedule for the
    /// collective's cluster.
    pub fn new(config: &ExchangeConfig, collective: C) -> Result<Self, ExchangeError> {
        let scheduler = config.build_scheduler(collective.cluster_size())?;
        tracing::info!(
            "partial exchange on rank {}/{} using '{}', {:?} reduce{}",
            collective.self_rank(),
            collective.cluster_size(),
            scheduler.strategy_name(),
            config.reduce,
            if config.average { ", averaged" } else { "" },
        );
        Ok(Self::with_scheduler(scheduler, collective)
            .with_reduce_mode(config.reduce)
            .with_average(config.average))
    }

    /// A static exchange: the same fraction for the whole run.
    pub fn fixed(fraction: f64, collective: C) -> Result<Self, ExchangeError> {
        Self::new(&ExchangeConfig::fixed(fraction), collective)
    }

    /// Wraps an already-built scheduler.
    pub fn with_scheduler(scheduler: PartitionScheduler, collective: C) -> Self {
        Self {
            scheduler,
            collective,
            reduce: ReduceMode::default(),
            average: false,
            metrics: ExchangeMetrics::new(),
        }
    }

    pub fn with_reduce_mode(mut self, reduce: ReduceMode) -> Self {
        self.reduce = reduce;
        self
    }

    pub fn with_average(mut self, average: bool) -> Self {
        self.average = average;
        self
    }

    /// Keeps at most `limit` per-step records in the metrics history.
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.metrics = ExchangeMetrics::with_history_limit(limit);
        self
    }

    pub fn scheduler(&self) -> &PartitionScheduler {
        &self.scheduler
    }

    pub fn collective(&self) -> &C {
        &self.collective
    }

    pub fn metrics(&self) -> &ExchangeMetrics {
        &self.metrics
    }

    pub fn into_collective(self) -> C {
        self.collective
    }

    /// Exchanges the active partition of `tensors` for 1-based `step`.
    ///
    /// Steps:
    /// 1. Update the scheduler (re-packs on a fraction or tensor-set change).
    /// 2. Decide each tensor against the active partition.
    /// 3. Reduce the synchronized tensors in name order.
    /// 4. Reassemble outputs in input order.
    ///
    /// On error no outputs are produced and nothing is recorded in the
    /// metrics. A scheduling error leaves the previous assignment in place;
    /// a collective error happens after the scheduler has committed this
    /// step's assignment, which then stays in effect for the next call.
    pub fn step(&mut self, step: u64, tensors: Vec<Tensor>) -> Result<StepOutcome, ExchangeError> {
        let descriptors: Vec<TensorDescriptor> = tensors.iter().map(Tensor::descriptor).collect();
        let offered_bytes = total_bytes(&descriptors);

        let update = self.scheduler.update(step, &descriptors)?;
        let assignment = &update.assignment;
        let num_partitions = assignment.num_partitions();
        let active_partition = SyncSelector::active_partition(step, num_partitions)?;
        let decisions =
            SyncSelector::decisions(step, assignment, tensors.iter().map(Tensor::name))?;

        // ── Split ──
        let mut outputs: Vec<Option<Tensor>> = Vec::with_capacity(tensors.len());
        let mut outgoing: Vec<(usize, Tensor)> = Vec::new();
        for (i, (tensor, decision)) in tensors.into_iter().zip(&decisions).enumerate() {
            tracing::trace!("step {step}: '{}' {:?}", tensor.name(), decision);
            if decision.is_synchronize() {
                outgoing.push((i, tensor));
                outputs.push(None);
            } else {
                outputs.push(Some(tensor));
            }
        }
        outgoing.sort_by(|a, b| a.1.name().cmp(b.1.name()));
        let (indices, outgoing): (Vec<usize>, Vec<Tensor>) = outgoing.into_iter().unzip();
        let synced_tensors = outgoing.len();
        let synced_bytes: usize = outgoing.iter().map(Tensor::size_bytes).sum();

        // ── Reduce ──
        let started = Instant::now();
        let reduced = match self.reduce {
            ReduceMode::PerTensor => outgoing
                .into_iter()
                .map(|t| self.collective.all_reduce(t))
                .collect::<Result<Vec<_>, _>>()?,
            ReduceMode::Grouped => self.collective.group_all_reduce(outgoing)?,
        };
        let reduce_duration = started.elapsed();
        if reduced.len() != indices.len() {
            return Err(ExchangeError::Collective {
                tensor: format!("partition {active_partition}"),
                detail: format!(
                    "expected {} reduced tensors, got {}",
                    indices.len(),
                    reduced.len()
                ),
            });
        }

        // ── Reassemble ──
        let divisor = self.collective.cluster_size() as f32;
        for (i, mut tensor) in indices.into_iter().zip(reduced) {
            if self.average {
                tensor.scale(1.0 / divisor);
            }
            outputs[i] = Some(tensor);
        }
        let tensors = outputs
            .into_iter()
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| ExchangeError::Collective {
                tensor: format!("partition {active_partition}"),
                detail: "reduced tensor missing from output".into(),
            })?;

        tracing::debug!(
            "step {step}: partition {active_partition}/{num_partitions}, \
             {synced_tensors} tensors ({synced_bytes} B) synced in {:.2}ms",
            reduce_duration.as_secs_f64() * 1000.0,
        );

        self.metrics.record_step(StepRecord {
            step,
            active_partition,
            num_partitions,
            synced_tensors,
            synced_bytes,
            offered_bytes,
            repartitioned: update.repartitioned,
            reduce_duration,
        });

        Ok(StepOutcome {
            step,
            tensors,
            decisions,
            active_partition,
            num_partitions,
            repartitioned: update.repartitioned,
            synced_tensors,
            synced_bytes,
        })
    }
}

impl<C: Collective> std::fmt::Debug for PartialExchange<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PartialExchange")
            .field("scheduler", &self.scheduler)
            .field("rank", &self.collective.self_rank())
            .field("cluster_size", &self.collective.cluster_size())
            .field("reduce", &self.reduce)
            .field("average", &self.average)
            .finish()
    }
}
