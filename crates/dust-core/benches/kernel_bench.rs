// ─────────────────────────────────────────────────────────────────────
// SCPN Dust Core — Collision Operator Benchmark
// Kernel coefficients, fragment tensor build, serial vs rayon gain.
// © 1998–2026 Miroslav Šotek. All rights reserved.
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use dust_core::disruption::QStarTable;
use dust_core::fragments::FragmentTensor;
use dust_core::gain::gain_rates;
use dust_core::kernel::{CollisionKernel, RelativeVelocity};
use dust_types::config::GainBackend;
use dust_types::state::{PsdState, SizeGrid};
use ndarray::Array1;
use std::hint::black_box;

fn make_psd(n: usize) -> PsdState {
    let grid = SizeGrid::log_spaced(1e-7, 1e-2, n).expect("grid");
    PsdState::power_law(grid, 3000.0, 3.5, 1e-3).expect("psd")
}

fn bench_collision_operator(c: &mut Criterion) {
    let mut group = c.benchmark_group("collision_operator");
    let v_rel = RelativeVelocity::Scalar(4000.0);
    let table = QStarTable::default();

    for &n in &[20usize, 40, 80] {
        let psd = make_psd(n);
        let heights = Array1::from_elem(n, 3.4e5);

        group.bench_with_input(BenchmarkId::new("kernel_rates", n), &psd, |b, psd| {
            b.iter(|| {
                let kernel = CollisionKernel::new(psd.sizes(), &heights, &v_rel).expect("kernel");
                black_box(kernel.rates(&psd.number).expect("rates"));
            })
        });

        group.bench_with_input(BenchmarkId::new("fragment_tensor", n), &psd, |b, psd| {
            b.iter(|| black_box(FragmentTensor::build(psd, &v_rel, 3.5, &table).expect("tensor")))
        });

        let tensor = FragmentTensor::build(&psd, &v_rel, 3.5, &table).expect("tensor");
        let rates = CollisionKernel::new(psd.sizes(), &heights, &v_rel)
            .expect("kernel")
            .rates(&psd.number)
            .expect("rates");
        for backend in [GainBackend::Serial, GainBackend::Parallel] {
            group.bench_with_input(
                BenchmarkId::new(format!("gain_{backend:?}"), n),
                &rates,
                |b, rates| b.iter(|| black_box(gain_rates(backend, rates, &tensor, psd.masses()).expect("gain"))),
            );
        }
    }

    group.finish();
}

criterion_group!(benches, bench_collision_operator);
criterion_main!(benches);
