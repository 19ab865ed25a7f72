use std::time::Duration;

use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use spine_core::measurement::{average_of_six, center_of_gravity, force_to_spine, front_of_center};
use spine_core::mocks::MockCell;
use spine_core::{Methodology, RollingBuffer, SupportSpacing};

// Deflection forces spread over the useful range, with a few out-of-range values
fn forces(n: usize) -> Vec<f32> {
    let mut state = 0x9e37_79b9u32;
    (0..n)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            (state as f32) / (u32::MAX as f32) * 2000.0 - 50.0
        })
        .collect()
}

fn bench_conversions(c: &mut Criterion) {
    let input = forces(4096);
    let mut group = c.benchmark_group("conversions");
    for m in Methodology::ALL {
        group.bench_function(m.label(), |b| {
            b.iter(|| {
                let mut acc = 0.0f32;
                for &f in &input {
                    acc += force_to_spine(black_box(f), m, SupportSpacing::Short23);
                }
                acc
            });
        });
    }
    group.bench_function("cog_foc", |b| {
        b.iter(|| {
            let mut acc = 0.0f32;
            for pair in input.chunks_exact(2) {
                let cog = center_of_gravity(pair[0], pair[1], SupportSpacing::Long28);
                acc += front_of_center(cog, 464, SupportSpacing::Long28).unwrap_or(0.0);
            }
            acc
        });
    });
    group.bench_function("average_of_six", |b| {
        let peaks = [100.0, 120.0, 110.0, 130.0, 90.0, 95.0];
        b.iter(|| average_of_six(black_box(&peaks)));
    });
    group.finish();
}

fn bench_buffer(c: &mut Criterion) {
    c.bench_function("rolling_buffer_tick_average", |b| {
        b.iter_batched(
            || {
                let a = MockCell::new();
                a.set_load(250.0);
                RollingBuffer::new([a, MockCell::new()], 10, Duration::from_millis(1))
            },
            |mut buf| {
                for _ in 0..100 {
                    buf.tick();
                    black_box(buf.total());
                }
            },
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(benches, bench_conversions, bench_buffer);
criterion_main!(benches);
