// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use bcp_bench::step_series;
use bcp_core::{ExecutionContext, ReproMode};
use bcp_model::{ChangePointModelSpec, build};
use bcp_sampler::{SamplerConfig, sample};
use criterion::{Criterion, black_box, criterion_group, criterion_main};

fn bench_sampler(c: &mut Criterion, case_id: &str, spec: ChangePointModelSpec, mode: ReproMode) {
    let series = step_series(500).expect("benchmark series should be valid");
    let model = build(&series, &spec).expect("benchmark model should build");
    let config = SamplerConfig {
        chains: 4,
        draws: 200,
        tune: 200,
        ..SamplerConfig::default()
    };
    let ctx = ExecutionContext::new().with_repro_mode(mode);

    let mut group = c.benchmark_group("sampler");
    group.sample_size(10);
    group.bench_function(case_id, |b| {
        b.iter(|| {
            sample(black_box(&model), black_box(&config), black_box(&ctx))
                .expect("benchmark sampling should succeed")
        })
    });
    group.finish();
}

fn benchmark_sampler(c: &mut Criterion) {
    bench_sampler(
        c,
        "mean_shift_k1_n500_parallel",
        ChangePointModelSpec::mean_shift(1, 5),
        ReproMode::Balanced,
    );
    bench_sampler(
        c,
        "mean_shift_k1_n500_strict",
        ChangePointModelSpec::mean_shift(1, 5),
        ReproMode::Strict,
    );
    bench_sampler(
        c,
        "trend_shift_n500_parallel",
        ChangePointModelSpec::trend_shift(),
        ReproMode::Balanced,
    );
}

criterion_group!(benches, benchmark_sampler);
criterion_main!(benches);
