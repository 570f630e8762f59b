// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Exchange configuration loaded from TOML files or constructed programmatically.
//!
//! # TOML Format
//! ```toml
//! schedule = "0:0.1,10:0.5,20:1.0"
//! batch_size = 32
//! num_train = 50000
//! initial_fraction = 0.1
//! adjust_budget = false
//! reduce = "per-tensor"
//! average = true
//! ```
//!
//! For a static partial exchange set `fixed_fraction` instead of
//! `schedule`; `batch_size` and `num_train` are then not needed.

use crate::ExchangeError;
use partition_scheduler::{InitialFraction, PartitionScheduler, Schedule, ScheduleParser};
use std::path::Path;

/// How the tensors of the active partition are handed to the collective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReduceMode {
    /// One `all_reduce` per tensor, in name order.
    #[default]
    PerTensor,
    /// One `group_all_reduce` with the whole partition, in name order.
    Grouped,
}

/// Configuration for a [`crate::PartialExchange`].
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ExchangeConfig {
    /// Piecewise schedule, `"<epoch>:<fraction>,..."`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<String>,
    /// Constant budget fraction; mutually exclusive with `schedule`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixed_fraction: Option<f64>,
    /// Per-peer batch size (required with `schedule`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<u64>,
    /// Number of training examples (required with `schedule`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_train: Option<u64>,
    /// Fraction used before the first threshold; defaults to the first entry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_fraction: Option<f64>,
    /// Raise too-small budgets to the largest tensor instead of failing.
    #[serde(default)]
    pub adjust_budget: bool,
    #[serde(default)]
    pub reduce: ReduceMode,
    /// Divide all-reduced sums by the cluster size.
    #[serde(default)]
    pub average: bool,
}

impl ExchangeConfig {
    /// A static exchange of `fraction` of the model per step.
    pub fn fixed(fraction: f64) -> Self {
        Self {
            fixed_fraction: Some(fraction),
            ..Default::default()
        }
    }

    /// A scheduled exchange.
    pub fn scheduled(schedule: impl Into<String>, batch_size: u64, num_train: u64) -> Self {
        Self {
            schedule: Some(schedule.into()),
            fixed_fraction: None,
            batch_size: Some(batch_size),
            num_train: Some(num_train),
            ..Default::default()
        }
    }

    /// Loads configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ExchangeError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ExchangeError::ConfigError(format!("cannot read config '{}': {e}", path.display()))
        })?;
        Self::from_toml(&content)
    }

    /// Parses configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, ExchangeError> {
        toml::from_str(toml_str)
            .map_err(|e| ExchangeError::ConfigError(format!("TOML parse error: {e}")))
    }

    /// Serialises configuration to TOML.
    pub fn to_toml(&self) -> Result<String, ExchangeError> {
        toml::to_string_pretty(self)
            .map_err(|e| ExchangeError::ConfigError(format!("TOML serialise error: {e}")))
    }

    /// Builds the step-based schedule for a cluster of `num_peers`.
    pub fn build_schedule(&self, num_peers: usize) -> Result<Schedule, ExchangeError> {
        match (&self.schedule, self.fixed_fraction) {
            (Some(_), Some(_)) => Err(ExchangeError::ConfigError(
                "set either 'schedule' or 'fixed_fraction', not both".into(),
            )),
            (None, None) => Err(ExchangeError::ConfigError(
                "one of 'schedule' or 'fixed_fraction' is required".into(),
            )),
            (None, Some(fraction)) => Ok(Schedule::constant(fraction)),
            (Some(text), None) => {
                let batch_size = self.batch_size.ok_or_else(|| {
                    ExchangeError::ConfigError("'batch_size' is required with 'schedule'".into())
                })?;
                let num_train = self.num_train.ok_or_else(|| {
                    ExchangeError::ConfigError("'num_train' is required with 'schedule'".into())
                })?;
                let parser = ScheduleParser::new(batch_size, num_train, num_peers as u64)?;
                Ok(parser.parse(text)?)
            }
        }
    }

    /// Resolves the fraction policy for steps before the first threshold.
    pub fn initial(&self) -> InitialFraction {
        match self.initial_fraction {
            Some(f) => InitialFraction::Explicit(f),
            None => InitialFraction::FirstEntry,
        }
    }

    /// Creates the partition scheduler described by this config.
    pub fn build_scheduler(&self, num_peers: usize) -> Result<PartitionScheduler, ExchangeError> {
        let schedule = self.build_schedule(num_peers)?;
        Ok(PartitionScheduler::new(
            schedule,
            self.initial(),
            self.adjust_budget,
        )?)
    }
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            schedule: None,
            fixed_fraction: Some(0.3),
            batch_size: None,
            num_train: None,
            initial_fraction: None,
            adjust_budget: false,
            reduce: ReduceMode::PerTensor,
            average: false,
        }
    }
}
