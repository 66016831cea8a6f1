//! Benchmarks for the CPU side of a frame: noise sampling, particle
//! integration and instance packing.
//!
//! Run with: `cargo bench`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use particle_field::config::ParticleSystemConfig;
use particle_field::interaction::InteractionState;
use particle_field::particles::GpuParticle;
use particle_field::{NoiseField, ParticleSystem, Vec2};

fn bench_noise(c: &mut Criterion) {
    let mut group = c.benchmark_group("noise");
    let noise = NoiseField::new(42);

    group.bench_function("noise2d", |b| {
        b.iter(|| black_box(noise.noise2d(black_box(12.34), black_box(56.78))))
    });

    group.bench_function("noise3d", |b| {
        b.iter(|| black_box(noise.noise3d(black_box(12.34), black_box(56.78), black_box(0.5))))
    });

    group.bench_function("fractal_5_octaves", |b| {
        b.iter(|| black_box(noise.fractal_noise2d(black_box(1.5), black_box(2.5), 5, 0.5, 2.0)))
    });

    group.bench_function("turbulence_3_octaves", |b| {
        b.iter(|| black_box(noise.turbulence2d(black_box(1.5), black_box(2.5), 3)))
    });

    group.finish();
}

fn bench_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("particle_update");
    let noise = NoiseField::new(42);

    let idle = InteractionState::default();
    let pressed = InteractionState {
        mouse_position: Vec2::new(640.0, 360.0),
        is_mouse_down: true,
        has_pointer: true,
        interaction_strength: 1.0,
        ..Default::default()
    };

    for count in [1_000u32, 10_000, 50_000] {
        let config = ParticleSystemConfig {
            particle_count: count,
            ..Default::default()
        };

        group.bench_with_input(BenchmarkId::new("idle", count), &config, |b, config| {
            let mut system = ParticleSystem::new(config.clone(), 1280.0, 720.0, 1);
            let mut time = 0.0;
            b.iter(|| {
                time += 1.0 / 60.0;
                system.update(1.0 / 60.0, time, &noise, &idle);
            })
        });

        group.bench_with_input(BenchmarkId::new("pointer", count), &config, |b, config| {
            let mut system = ParticleSystem::new(config.clone(), 1280.0, 720.0, 1);
            let mut time = 0.0;
            b.iter(|| {
                time += 1.0 / 60.0;
                system.update(1.0 / 60.0, time, &noise, &pressed);
            })
        });
    }

    group.finish();
}

fn bench_pack(c: &mut Criterion) {
    let config = ParticleSystemConfig {
        particle_count: 50_000,
        ..Default::default()
    };
    let system = ParticleSystem::new(config, 1280.0, 720.0, 1);
    let mut out: Vec<GpuParticle> = Vec::with_capacity(system.capacity());

    c.bench_function("pack_50k", |b| b.iter(|| black_box(system.pack_into(&mut out))));
}

criterion_group!(benches, bench_noise, bench_update, bench_pack);
criterion_main!(benches);
