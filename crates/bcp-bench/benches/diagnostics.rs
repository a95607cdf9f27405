// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use bcp_eval::{ess, rhat};
use criterion::{Criterion, black_box, criterion_group, criterion_main};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

fn ar1_chains(chains: usize, draws: usize, phi: f64) -> Vec<Vec<f64>> {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(7);
    (0..chains)
        .map(|_| {
            let mut x = 0.0;
            (0..draws)
                .map(|_| {
                    x = phi * x + rng.random::<f64>() - 0.5;
                    x
                })
                .collect()
        })
        .collect()
}

fn benchmark_diagnostics(c: &mut Criterion) {
    let mixing = ar1_chains(4, 2_000, 0.3);
    let sticky = ar1_chains(4, 2_000, 0.95);

    c.bench_function("rhat_4x2000", |b| b.iter(|| rhat(black_box(&mixing))));
    c.bench_function("ess_4x2000_phi0.3", |b| b.iter(|| ess(black_box(&mixing))));
    c.bench_function("ess_4x2000_phi0.95", |b| b.iter(|| ess(black_box(&sticky))));
}

criterion_group!(benches, benchmark_diagnostics);
criterion_main!(benches);
