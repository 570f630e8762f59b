// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Integration tests: end-to-end partial exchange.
//!
//! These tests run the whole flow from configuration → schedule parsing →
//! packing → selection → collective, single-process and with several peers
//! on threads, checking that peers stay in lock-step.

use partial_exchange::{
    Collective, ExchangeConfig, ExchangeError, InProcessCluster, Loopback, PartialExchange,
    ReduceMode,
};
use partition_scheduler::ScheduleError;
use std::collections::BTreeMap;
use tensor_core::{Shape, Tensor};

// ── Helpers ────────────────────────────────────────────────────

/// Gradient set in f32 elements; byte sizes 64,64,48,48,32,32,16,16.
fn gradient_layout() -> Vec<(&'static str, usize)> {
    vec![
        ("h.0.attn", 16),
        ("h.0.mlp", 16),
        ("h.1.attn", 12),
        ("h.1.mlp", 12),
        ("ln_f", 8),
        ("wpe", 8),
        ("h.0.ln", 4),
        ("h.1.ln", 4),
    ]
}

fn gradients(value: f32) -> Vec<Tensor> {
    gradient_layout()
        .into_iter()
        .map(|(name, len)| Tensor::filled(name, Shape::vector(len), value).unwrap())
        .collect()
}

// ── Single process ─────────────────────────────────────────────

#[test]
fn test_scheduled_run_end_to_end() {
    // 100 examples / (10 × 1 peer) = 10 steps per epoch.
    let config = ExchangeConfig::scheduled("0:0.5,1:1.0", 10, 100);
    let mut ex = PartialExchange::new(&config, Loopback).unwrap();

    let mut repartition_steps = Vec::new();
    for step in 1..=15 {
        let out = ex.step(step, gradients(1.0)).unwrap();
        if out.repartitioned {
            repartition_steps.push(step);
        }
        if step <= 10 {
            assert!(out.num_partitions >= 2, "step {step}");
        } else {
            assert_eq!(out.num_partitions, 1, "step {step}");
            assert_eq!(out.synced_tensors, 8);
        }
    }
    // Threshold 10 takes effect on the step after it.
    assert_eq!(repartition_steps, vec![1, 11]);
    assert_eq!(ex.metrics().repartitions, 2);
}

#[test]
fn test_every_tensor_synced_once_per_cycle() {
    for fraction in [0.2, 0.3, 0.45, 0.7, 1.0] {
        let mut ex = PartialExchange::fixed(fraction, Loopback).unwrap();
        let first = ex.step(1, gradients(1.0)).unwrap();
        let n = first.num_partitions as u64;

        let mut counts: BTreeMap<String, u32> = BTreeMap::new();
        let mut record = |names: Vec<&str>| {
            for name in names {
                *counts.entry(name.to_string()).or_insert(0) += 1;
            }
        };
        record(first.synced_names());
        for step in 2..=n {
            let out = ex.step(step, gradients(1.0)).unwrap();
            record(out.synced_names());
        }

        assert_eq!(counts.len(), 8, "fraction {fraction}");
        assert!(counts.values().all(|&c| c == 1), "fraction {fraction}: {counts:?}");
    }
}

#[test]
fn test_tiny_fraction_needs_adjustment() {
    let mut strict = PartialExchange::fixed(0.05, Loopback).unwrap();
    let err = strict.step(1, gradients(1.0)).unwrap_err();
    match err {
        ExchangeError::Schedule(ScheduleError::BudgetTooSmall {
            largest_bytes,
            suggested_fraction,
            ..
        }) => {
            assert_eq!(largest_bytes, 64);
            assert!((suggested_fraction - 64.0 / 320.0).abs() < 1e-12);
        }
        other => panic!("unexpected error: {other}"),
    }

    let config = ExchangeConfig {
        adjust_budget: true,
        ..ExchangeConfig::fixed(0.05)
    };
    let mut lenient = PartialExchange::new(&config, Loopback).unwrap();
    let out = lenient.step(1, gradients(1.0)).unwrap();
    assert!(out.num_partitions >= 5);
}

#[test]
fn test_config_from_file() {
    let path = std::env::temp_dir().join(format!("pexch-config-{}.toml", std::process::id()));
    std::fs::write(
        &path,
        "schedule = \"0:0.25,2:0.5\"\nbatch_size = 8\nnum_train = 64\nreduce = \"grouped\"\n",
    )
    .unwrap();
    let config = ExchangeConfig::from_file(&path).unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(config.reduce, ReduceMode::Grouped);
    let schedule = config.build_schedule(2).unwrap();
    assert_eq!(schedule.steps(), vec![0, 8]);
}

#[test]
fn test_missing_config_file() {
    let err = ExchangeConfig::from_file(std::path::Path::new("/nonexistent/pexch.toml"));
    assert!(matches!(err, Err(ExchangeError::ConfigError(_))));
}

// ── Multiple peers ─────────────────────────────────────────────

/// What one peer observed on one step.
#[derive(Debug, PartialEq)]
struct Observed {
    active: usize,
    partitions: usize,
    synced: Vec<String>,
}

fn run_cluster(size: usize, config: &ExchangeConfig, steps: u64) -> Vec<Vec<Observed>> {
    let cluster = InProcessCluster::new(size).unwrap();
    std::thread::scope(|s| {
        let handles: Vec<_> = cluster
            .peers()
            .into_iter()
            .map(|peer| {
                s.spawn(move || {
                    let rank = peer.self_rank();
                    let value = (rank + 1) as f32;
                    let mut ex = PartialExchange::new(config, peer).unwrap();
                    let mut seen = Vec::new();
                    for step in 1..=steps {
                        // Each peer hands its gradients over in a different order.
                        let mut grads = gradients(value);
                        let n = grads.len();
                        grads.rotate_left(rank * 3 % n);

                        let out = ex.step(step, grads).unwrap();
                        let mut synced: Vec<String> =
                            out.synced_names().into_iter().map(String::from).collect();
                        synced.sort();

                        for (tensor, decision) in out.tensors.iter().zip(&out.decisions) {
                            let expected = if !decision.is_synchronize() {
                                value
                            } else if config.average {
                                2.0
                            } else {
                                6.0
                            };
                            assert!(
                                tensor.as_slice().iter().all(|&x| x == expected),
                                "rank {rank} step {step} '{}'",
                                tensor.name()
                            );
                        }
                        seen.push(Observed {
                            active: out.active_partition,
                            partitions: out.num_partitions,
                            synced,
                        });
                    }
                    seen
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    })
}

#[test]
fn test_peers_agree_per_tensor() {
    // 24 examples / (4 × 3 peers) = 2 steps per epoch.
    let config = ExchangeConfig::scheduled("0:0.25,1:0.5", 4, 24);
    let observed = run_cluster(3, &config, 8);
    assert_eq!(observed[0], observed[1]);
    assert_eq!(observed[1], observed[2]);
    assert!(observed[0][0].partitions > observed[0][7].partitions);
}

#[test]
fn test_peers_agree_grouped_and_averaged() {
    let config = ExchangeConfig {
        reduce: ReduceMode::Grouped,
        average: true,
        ..ExchangeConfig::fixed(0.3)
    };
    let observed = run_cluster(3, &config, 6);
    assert_eq!(observed[0], observed[1]);
    assert_eq!(observed[1], observed[2]);
}
