//! Benchmarks for electrode routing and sample conversion

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use npx2_acquisition::acquisition::scale_sample;
use npx2_acquisition::constants::{NUM_CHANNELS, NUM_ELECTRODES, SAMPLE_COUNT};
use npx2_acquisition::hardware::{NeuropixApi, ProbeAddress, SimulatedApi};
use npx2_acquisition::mapping::ElectrodeMapper;

/// Every `stride`-th electrode enabled
fn strided_mask(stride: usize) -> Vec<bool> {
    (0..NUM_ELECTRODES).map(|e| e % stride == 0).collect()
}

fn bench_plan(c: &mut Criterion) {
    let mut group = c.benchmark_group("mapping_plan");

    for stride in [1, 4, 32].iter() {
        let mask = strided_mask(*stride);
        group.bench_with_input(BenchmarkId::from_parameter(stride), stride, |b, _| {
            b.iter(|| ElectrodeMapper::plan(black_box(&mask)))
        });
    }

    group.finish();
}

fn bench_apply(c: &mut Criterion) {
    let api = SimulatedApi::with_rig(&[2], 1);
    let address = ProbeAddress::new(2, 1, 1);
    api.open_basestation(2).expect("open basestation");
    api.open_probe(address).expect("open probe");

    let mapper = ElectrodeMapper::new(&api, address, 0);
    let mask = strided_mask(4);

    c.bench_function("mapping_apply", |b| {
        b.iter(|| {
            api.clear_calls();
            black_box(mapper.apply(black_box(&mask)))
        })
    });
}

fn bench_scale(c: &mut Criterion) {
    let raw: Vec<i16> = (0..SAMPLE_COUNT * NUM_CHANNELS)
        .map(|i| ((i * 37) % 8192) as i16 - 4096)
        .collect();

    c.bench_function("scale_read", |b| {
        b.iter(|| {
            let samples: Vec<f32> = raw.iter().map(|&r| scale_sample(black_box(r))).collect();
            black_box(samples)
        })
    });
}

criterion_group!(benches, bench_plan, bench_apply, bench_scale);
criterion_main!(benches);
