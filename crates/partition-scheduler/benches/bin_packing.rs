// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Benchmarks for first-fit-decreasing packing and per-step selection.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use partition_scheduler::{
    ByteBudget, FirstFitDecreasing, PackingStrategy, SyncSelector, TensorSizes,
};

/// Transformer-like size mix: a few large matrices and many small vectors.
fn model_sizes(blocks: usize) -> TensorSizes {
    let hidden = 768usize;
    let mut sizes = TensorSizes::new();
    sizes.insert("wte".into(), 50257 * hidden * 4);
    for b in 0..blocks {
        sizes.insert(format!("h.{b}.attn.c_attn.weight"), hidden * 3 * hidden * 4);
        sizes.insert(format!("h.{b}.attn.c_attn.bias"), 3 * hidden * 4);
        sizes.insert(format!("h.{b}.attn.c_proj.weight"), hidden * hidden * 4);
        sizes.insert(format!("h.{b}.mlp.c_fc.weight"), hidden * 4 * hidden * 4);
        sizes.insert(format!("h.{b}.mlp.c_proj.weight"), 4 * hidden * hidden * 4);
        sizes.insert(format!("h.{b}.ln_1.weight"), hidden * 4);
        sizes.insert(format!("h.{b}.ln_2.weight"), hidden * 4);
    }
    sizes
}

fn bench_pack(c: &mut Criterion) {
    let mut group = c.benchmark_group("first_fit_decreasing");
    for blocks in [12usize, 48] {
        let sizes = model_sizes(blocks);
        let total: usize = sizes.values().sum();
        let budget = ByteBudget::from_bytes(total / 10);
        let packer = FirstFitDecreasing::with_adjust_budget(true);
        group.bench_with_input(BenchmarkId::from_parameter(blocks), &sizes, |b, sizes| {
            b.iter(|| packer.pack(black_box(sizes), budget).unwrap())
        });
    }
    group.finish();
}

fn bench_select(c: &mut Criterion) {
    let sizes = model_sizes(48);
    let total: usize = sizes.values().sum();
    let assignment = FirstFitDecreasing::with_adjust_budget(true)
        .pack(&sizes, ByteBudget::from_bytes(total / 10))
        .unwrap();
    let names: Vec<&str> = sizes.keys().map(String::as_str).collect();

    c.bench_function("sync_decisions_48_blocks", |b| {
        let mut step = 0u64;
        b.iter(|| {
            step += 1;
            SyncSelector::decisions(step, &assignment, names.iter().copied()).unwrap()
        })
    });
}

criterion_group!(benches, bench_pack, bench_select);
criterion_main!(benches);
