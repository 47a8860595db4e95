//! Codec throughput benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use sea_codec::{decode, encode, EncodeParams, RateMode};

fn tone_mix(samples: usize) -> Vec<i16> {
    let mut signal = vec![0f32; samples];
    for (frequency, gain) in [(110.0f32, 0.4f32), (880.0, 0.3), (5200.0, 0.2)] {
        let step = 2.0 * std::f32::consts::PI * frequency / 44100.0;
        for (i, sample) in signal.iter_mut().enumerate() {
            *sample += gain * (step * i as f32).sin();
        }
    }
    signal
        .iter()
        .map(|s| (s.clamp(-1.0, 1.0) * 24000.0) as i16)
        .collect()
}

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");
    let samples = tone_mix(44100);
    group.throughput(Throughput::Elements(samples.len() as u64));

    for quality in [1u8, 3, 6] {
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("q{quality}")),
            &quality,
            |b, &quality| {
                let params = EncodeParams::with_quality(quality);
                b.iter(|| {
                    encode(black_box(&samples), 44100, 1, params.clone(), "").unwrap()
                });
            },
        );
    }

    group.bench_function("vbr_4bps", |b| {
        let params = EncodeParams {
            mode: RateMode::Vbr,
            vbr_target_bps: 4.0,
            ..EncodeParams::default()
        };
        b.iter(|| encode(black_box(&samples), 44100, 1, params.clone(), "").unwrap());
    });

    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");
    let samples = tone_mix(44100);
    group.throughput(Throughput::Elements(samples.len() as u64));

    for quality in [1u8, 3, 6] {
        let params = EncodeParams::with_quality(quality);
        let encoded = encode(&samples, 44100, 1, params, "").unwrap();
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("q{quality}")),
            &encoded,
            |b, encoded| {
                b.iter(|| decode(black_box(encoded)).unwrap());
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_encode, bench_decode);
criterion_main!(benches);
