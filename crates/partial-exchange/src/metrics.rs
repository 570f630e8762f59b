// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Exchange metrics.
//!
//! [`ExchangeMetrics`] accumulates what each step actually put on the wire,
//! which is the number to compare against a full all-reduce when tuning a
//! schedule.

use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;

/// Per-step records kept by default.
pub const DEFAULT_HISTORY_LIMIT: usize = 1024;

/// What a single step synchronized.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct StepRecord {
    pub step: u64,
    pub active_partition: usize,
    pub num_partitions: usize,
    pub synced_tensors: usize,
    pub synced_bytes: usize,
    /// Bytes of all gradients offered to the step.
    pub offered_bytes: usize,
    pub repartitioned: bool,
    /// Time spent inside the collective.
    pub reduce_duration: Duration,
}

/// Aggregate metrics over a run.
///
/// Counters cover every step ever recorded; `history` keeps only the most
/// recent `history_limit` records.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ExchangeMetrics {
    pub steps: u64,
    pub synced_tensors: u64,
    pub synced_bytes: u64,
    pub offered_bytes: u64,
    pub repartitions: u64,
    pub total_reduce_duration: Duration,
    /// Steps on which each partition index was the active one.
    pub partition_hits: BTreeMap<usize, u64>,
    /// Most recent per-step records, newest last.
    pub history: VecDeque<StepRecord>,
    history_limit: usize,
}

impl Default for ExchangeMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ExchangeMetrics {
    pub fn new() -> Self {
        Self::with_history_limit(DEFAULT_HISTORY_LIMIT)
    }

    /// Keeps at most `limit` per-step records; 0 disables history.
    pub fn with_history_limit(limit: usize) -> Self {
        Self {
            steps: 0,
            synced_tensors: 0,
            synced_bytes: 0,
            offered_bytes: 0,
            repartitions: 0,
            total_reduce_duration: Duration::ZERO,
            partition_hits: BTreeMap::new(),
            history: VecDeque::with_capacity(limit.min(DEFAULT_HISTORY_LIMIT)),
            history_limit: limit,
        }
    }

    pub fn history_limit(&self) -> usize {
        self.history_limit
    }

    /// Records one completed step.
    pub fn record_step(&mut self, record: StepRecord) {
        self.steps += 1;
        self.synced_tensors += record.synced_tensors as u64;
        self.synced_bytes += record.synced_bytes as u64;
        self.offered_bytes += record.offered_bytes as u64;
        if record.repartitioned {
            self.repartitions += 1;
        }
        self.total_reduce_duration += record.reduce_duration;
        *self.partition_hits.entry(record.active_partition).or_insert(0) += 1;
        if self.history_limit == 0 {
            return;
        }
        if self.history.len() == self.history_limit {
            self.history.pop_front();
        }
        self.history.push_back(record);
    }

    /// Share of offered gradient bytes that were synchronized.
    pub fn sync_ratio(&self) -> f64 {
        if self.offered_bytes == 0 {
            return 0.0;
        }
        self.synced_bytes as f64 / self.offered_bytes as f64
    }

    /// Returns a human-readable summary suitable for CLI output.
    pub fn summary(&self) -> String {
        let synced_mb = self.synced_bytes as f64 / (1024.0 * 1024.0);
        let offered_mb = self.offered_bytes as f64 / (1024.0 * 1024.0);
        format!(
            "Exchange: {} steps, {} tensors synced, {:.2} MB of {:.2} MB ({:.1}%), \
             {} repartitions, {:.2}ms in collective",
            self.steps,
            self.synced_tensors,
            synced_mb,
            offered_mb,
            self.sync_ratio() * 100.0,
            self.repartitions,
            self.total_reduce_duration.as_secs_f64() * 1000.0,
        )
    }
}
