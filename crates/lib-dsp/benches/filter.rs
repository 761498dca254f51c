//! Filter and resampling performance benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use lib_dsp::filter::{design_butterworth, BandType};
use lib_dsp::resample::resample_to_dt;
use lib_types::timeseries::Timeseries;
use lib_types::units::{Hertz, Seconds};

fn bench_filtfilt(c: &mut Criterion) {
    let mut group = c.benchmark_group("filtfilt");

    for order in [2, 4, 8].iter() {
        let sos = design_butterworth(BandType::Bandpass, Hertz(0.1), Hertz(5.0), 100.0, *order).unwrap();

        for signal_len in [4096, 16384, 65536].iter() {
            let signal: Vec<f64> = (0..*signal_len).map(|i| (i as f64 * 0.01).sin()).collect();

            group.bench_with_input(
                BenchmarkId::new(format!("order{}", order), signal_len),
                &signal,
                |b, s| {
                    b.iter(|| sos.filtfilt(black_box(s)));
                },
            );
        }
    }

    group.finish();
}

fn bench_resample(c: &mut Criterion) {
    let mut group = c.benchmark_group("resample");

    let series = Timeseries::new((0..40000).map(|i| (i as f64 * 0.003).sin()).collect(), Seconds(0.005));

    for target in [0.01, 0.0125, 0.0025].iter() {
        group.bench_with_input(BenchmarkId::new("dt", target), &series, |b, s| {
            b.iter(|| resample_to_dt(black_box(s), Seconds(*target), Hertz(10.0)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_filtfilt, bench_resample);
criterion_main!(benches);
