// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `pexch simulate` command: run the exchange over in-process peers.
//!
//! Every peer runs on its own thread with gradients filled with its rank,
//! so a synchronized tensor comes back as the sum of ranks and a skipped
//! one keeps the peer's own value. Peers must agree on every step; any
//! disagreement is reported as an error.

use partial_exchange::{Collective, ExchangeConfig, InProcessCluster, PartialExchange};
use std::path::PathBuf;
use tensor_core::{DType, Tensor, TensorManifest};

/// One row of per-step activity.
#[derive(Debug, PartialEq)]
struct StepLine {
    step: u64,
    active: usize,
    partitions: usize,
    tensors: usize,
    bytes: usize,
    repartitioned: bool,
}

pub fn execute(
    manifest: PathBuf,
    config: ExchangeConfig,
    steps: u64,
    peers: usize,
) -> anyhow::Result<()> {
    println!("╔══════════════════════════════════════════════════════╗");
    println!("║              pexch · Exchange Simulation             ║");
    println!("╚══════════════════════════════════════════════════════╝");
    println!();

    let loaded = TensorManifest::from_file(&manifest).map_err(|e| {
        anyhow::anyhow!("failed to load manifest '{}': {e}", manifest.display())
    })?;
    let descriptors = loaded.descriptors()?;
    if descriptors.iter().any(|d| d.dtype != DType::F32) {
        tracing::warn!("simulating gradients as f32; byte sizes differ from the manifest dtypes");
    }

    // Fail fast on a bad config before spawning any peer.
    config.build_scheduler(peers)?;

    println!("  Model: {} ({} tensors)", loaded.name, descriptors.len());
    println!("  Peers: {peers}");
    println!("  Steps: {steps}");
    println!("  Reduce: {:?}{}", config.reduce, if config.average { ", averaged" } else { "" });
    println!();

    let cluster = InProcessCluster::new(peers)?;
    let results: Vec<anyhow::Result<(Vec<StepLine>, String)>> = std::thread::scope(|s| {
        let handles: Vec<_> = cluster
            .peers()
            .into_iter()
            .map(|peer| {
                let config = &config;
                let descriptors = &descriptors;
                s.spawn(move || -> anyhow::Result<(Vec<StepLine>, String)> {
                    let value = (peer.self_rank() + 1) as f32;
                    let mut exchange = PartialExchange::new(config, peer)?;
                    let mut lines = Vec::new();
                    for step in 1..=steps {
                        let grads = descriptors
                            .iter()
                            .map(|d| Tensor::filled(d.name.clone(), d.shape.clone(), value))
                            .collect::<Result<Vec<Tensor>, _>>()?;
                        let out = exchange.step(step, grads)?;
                        lines.push(StepLine {
                            step,
                            active: out.active_partition,
                            partitions: out.num_partitions,
                            tensors: out.synced_tensors,
                            bytes: out.synced_bytes,
                            repartitioned: out.repartitioned,
                        });
                    }
                    Ok((lines, exchange.metrics().summary()))
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| {
                h.join()
                    .unwrap_or_else(|_| Err(anyhow::anyhow!("peer thread panicked")))
            })
            .collect()
    });

    let mut per_peer = Vec::with_capacity(results.len());
    for (rank, result) in results.into_iter().enumerate() {
        per_peer.push(result.map_err(|e| anyhow::anyhow!("peer {rank}: {e}"))?);
    }
    let Some((reference, summary)) = per_peer.first() else {
        anyhow::bail!("cluster has no peers");
    };
    for (rank, (lines, _)) in per_peer.iter().enumerate().skip(1) {
        if lines != reference {
            anyhow::bail!("peer {rank} diverged from peer 0");
        }
    }

    // ── Per-Step Activity ──────────────────────────────────────
    println!(
        "  {:>6} {:>10} {:>8} {:>12} {}",
        "Step", "Partition", "Tensors", "Bytes", ""
    );
    println!("  {}", "-".repeat(48));
    for line in reference {
        println!(
            "  {:>6} {:>4} / {:<3} {:>8} {:>12} {}",
            line.step,
            line.active,
            line.partitions,
            line.tensors,
            line.bytes,
            if line.repartitioned { "re-packed" } else { "" },
        );
    }
    println!();

    // ── Metrics ────────────────────────────────────────────────
    println!("  {summary}");
    println!("  All {} peers agreed on every step.", per_peer.len());

    Ok(())
}
