// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `pexch schedule` command: show what an epoch schedule turns into.

use partition_scheduler::ScheduleParser;

pub fn execute(schedule: String, batch_size: u64, num_train: u64, peers: u64) -> anyhow::Result<()> {
    println!("╔══════════════════════════════════════════════════════╗");
    println!("║              pexch · Schedule Conversion             ║");
    println!("╚══════════════════════════════════════════════════════╝");
    println!();

    let parser = ScheduleParser::new(batch_size, num_train, peers)?;
    let parsed = parser
        .parse(&schedule)
        .map_err(|e| anyhow::anyhow!("invalid schedule '{schedule}': {e}"))?;

    // ── Summary ────────────────────────────────────────────────
    println!("  Batch size: {batch_size}");
    println!("  Training examples: {num_train}");
    println!("  Peers: {peers}");
    println!("  Steps per epoch: {}", parser.epoch_to_step(1));
    println!("  Entries: {}", parsed.len());
    println!();

    // ── Thresholds ─────────────────────────────────────────────
    println!("  {:<4} {:>12} {:>10} {:>16}", "#", "Threshold", "Fraction", "First step");
    println!("  {}", "-".repeat(46));
    for (i, entry) in parsed.entries().iter().enumerate() {
        let first_step = entry.step.saturating_add(1);
        let note = if (0.0..=1.0).contains(&entry.fraction) && entry.fraction > 0.0 {
            ""
        } else {
            "  (out of range, rejected when reached)"
        };
        println!(
            "  {:<4} {:>12} {:>10.4} {:>16}{note}",
            i, entry.step, entry.fraction, first_step,
        );
    }
    println!();

    Ok(())
}
