// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `pexch plan` command: pack a manifest's tensors at one fraction.
//!
//! Prints every partition with its members and bytes. When the budget is
//! smaller than the largest tensor, prints the smallest fraction that
//! would work instead.

use super::truncate;
use partition_scheduler::{
    tensor_sizes, ByteBudget, FirstFitDecreasing, Fraction, PackingStrategy, ScheduleError,
};
use std::path::PathBuf;
use tensor_core::TensorManifest;

pub fn execute(
    manifest: PathBuf,
    fraction: f64,
    adjust_budget: bool,
    json: bool,
) -> anyhow::Result<()> {
    let loaded = TensorManifest::from_file(&manifest).map_err(|e| {
        anyhow::anyhow!("failed to load manifest '{}': {e}", manifest.display())
    })?;
    let descriptors = loaded.descriptors()?;
    let sizes = tensor_sizes(&descriptors)?;
    let total = tensor_core::total_bytes(&descriptors);

    let fraction = Fraction::new(fraction)?;
    let budget = ByteBudget::from_fraction(fraction, total);
    let strategy = FirstFitDecreasing::with_adjust_budget(adjust_budget);

    let assignment = match strategy.pack(&sizes, budget) {
        Ok(a) => a,
        Err(ScheduleError::BudgetTooSmall {
            largest_bytes,
            budget_bytes,
            suggested_fraction,
        }) => {
            println!(
                "  Budget {} at fraction {fraction} cannot hold the largest tensor ({}).",
                ByteBudget::from_bytes(budget_bytes),
                ByteBudget::from_bytes(largest_bytes),
            );
            println!("  Smallest workable fraction: {suggested_fraction:.6}");
            println!("  Or pass --adjust-budget to raise the budget automatically.");
            anyhow::bail!("budget too small for fraction {fraction}");
        }
        Err(e) => return Err(e.into()),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&assignment)?);
        return Ok(());
    }

    println!("╔══════════════════════════════════════════════════════╗");
    println!("║               pexch · Partition Plan                 ║");
    println!("╚══════════════════════════════════════════════════════╝");
    println!();

    // ── Summary ────────────────────────────────────────────────
    println!("  Model: {}", loaded.name);
    println!("  Tensors: {}", descriptors.len());
    println!("  Total: {}", ByteBudget::from_bytes(total));
    println!("  Fraction: {fraction}");
    println!("  {}", assignment.summary());
    println!();

    // ── Per-Partition Detail ───────────────────────────────────
    for partition in assignment.partitions() {
        let fill = partition.total_bytes as f64
            / assignment.effective_budget.as_bytes().max(1) as f64
            * 100.0;
        println!(
            "  Partition {} · {} tensors · {} ({:.0}% of budget)",
            partition.index,
            partition.num_tensors(),
            ByteBudget::from_bytes(partition.total_bytes),
            fill,
        );
        for name in &partition.members {
            let bytes = sizes.get(name).copied().unwrap_or(0);
            println!(
                "     {:<40} {:>12}",
                truncate(name, 40),
                ByteBudget::from_bytes(bytes).to_string(),
            );
        }
    }
    println!();
    println!(
        "  Every tensor is synchronized once every {} steps.",
        assignment.num_partitions()
    );

    Ok(())
}
