//! End-to-end runs of the headless engine.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use particle_field::config::{ConfigManager, ParticleConfigPatch, PerformancePatch};
use particle_field::interaction::InteractionState;
use particle_field::{NoiseField, ParticleFieldEngine, ParticleSystem, QualityLevel};

const DT: f32 = 1.0 / 60.0;

fn manager_with(count: u32) -> ConfigManager {
    let mut config = ConfigManager::in_memory();
    config.update_particle_config(ParticleConfigPatch {
        particle_count: Some(count),
        ..Default::default()
    });
    config
}

// ============================================================================
// Scenario
// ============================================================================

#[test]
fn test_hundred_particles_for_two_seconds() {
    let mut engine = ParticleFieldEngine::headless(manager_with(100), 800, 600, 1234);

    for _ in 0..120 {
        engine.advance(DT);
    }

    let stats = engine.stats();
    assert_eq!(stats.frame, 120);
    assert_eq!(stats.particles.alive, 100);
    assert!(stats.particles.alive <= stats.particles.capacity);
    assert!(stats.particles.wraps > 0, "no particle crossed a boundary");

    for p in engine.particles() {
        assert!(p.life > 0.0 && p.life <= 1.0, "life {} out of range", p.life);
        assert!(p.position.is_finite(), "position {:?}", p.position);
        assert!(p.velocity.is_finite(), "velocity {:?}", p.velocity);
    }
}

#[test]
fn test_population_holds_over_long_runs() {
    let mut engine = ParticleFieldEngine::headless(manager_with(250), 640, 480, 99);
    let mut deaths_seen = false;
    for _ in 0..1200 {
        engine.advance(DT);
        let stats = engine.stats().particles;
        assert_eq!(stats.alive, 250);
        assert!(stats.alive <= stats.capacity);
        deaths_seen |= stats.recycled > 0;
    }
    assert!(deaths_seen, "20 simulated seconds should outlive some particles");
}

#[test]
fn test_same_seed_same_field() {
    let mut a = ParticleFieldEngine::headless(manager_with(64), 800, 600, 5);
    let mut b = ParticleFieldEngine::headless(manager_with(64), 800, 600, 5);
    let now = Instant::now();
    for _ in 0..60 {
        a.advance_at(DT, now);
        b.advance_at(DT, now);
    }
    let pa: Vec<_> = a.particles().map(|p| p.position).collect();
    let pb: Vec<_> = b.particles().map(|p| p.position).collect();
    assert_eq!(pa, pb);
}

#[test]
fn test_life_is_monotonic_per_particle() {
    let noise = NoiseField::new(3);
    let idle = InteractionState::default();
    let mut system = ParticleSystem::new(
        particle_field::config::ParticleSystemConfig {
            particle_count: 50,
            ..Default::default()
        },
        800.0,
        600.0,
        3,
    );

    let mut previous: HashMap<u64, f32> = system.particles().map(|p| (p.id, p.life)).collect();
    for tick in 1..=240 {
        system.update(DT, tick as f32 * DT, &noise, &idle);
        for p in system.particles() {
            if let Some(before) = previous.get(&p.id) {
                assert!(p.life < *before, "particle {} did not age", p.id);
            }
        }
        previous = system.particles().map(|p| (p.id, p.life)).collect();
    }
}

// ============================================================================
// Interaction
// ============================================================================

#[test]
fn test_pointer_pulls_particles() {
    let mut still = ParticleFieldEngine::headless(manager_with(200), 800, 600, 11);
    let mut pulled = ParticleFieldEngine::headless(manager_with(200), 800, 600, 11);

    let now = Instant::now();
    pulled.interaction_mut().set_viewport(800.0, 600.0);
    pulled.interaction_mut().pointer_move_at(400.0, 300.0, now);
    pulled.interaction_mut().pointer_down();

    for _ in 0..30 {
        still.advance_at(DT, now);
        pulled.advance_at(DT, now);
    }

    assert!(pulled.interaction_state().interaction_strength > 0.0);
    let differs = still
        .particles()
        .zip(pulled.particles())
        .any(|(a, b)| a.position != b.position);
    assert!(differs, "pointer force had no effect");
}

#[test]
fn test_scrolled_radius_survives_quality_change() {
    let mut engine = ParticleFieldEngine::headless(manager_with(100), 800, 600, 2);
    engine.interaction_mut().set_radius(250.0);
    engine.config_mut().apply_quality_level(QualityLevel::Medium);
    engine.advance(DT);

    assert_eq!(engine.quality_level(), QualityLevel::Medium);
    assert_eq!(engine.interaction_state().interaction_radius, 250.0);
}

// ============================================================================
// Adaptive quality
// ============================================================================

#[test]
fn test_adaptive_quality_respects_cooldown() {
    let mut engine = ParticleFieldEngine::headless(manager_with(100), 800, 600, 1);
    assert_eq!(engine.quality_level(), QualityLevel::High);

    let start = Instant::now();
    // 10 FPS frames
    for _ in 0..10 {
        engine.advance_at(0.1, start);
    }
    assert_eq!(engine.quality_level(), QualityLevel::Medium);

    // Still slow one second later, but inside the decrease cooldown.
    for _ in 0..10 {
        engine.advance_at(0.1, start + Duration::from_secs(1));
    }
    assert_eq!(engine.quality_level(), QualityLevel::Medium);

    engine.advance_at(0.1, start + Duration::from_millis(3500));
    assert_eq!(engine.quality_level(), QualityLevel::Low);

    // Already at the bottom.
    engine.advance_at(0.1, start + Duration::from_secs(8));
    assert_eq!(engine.quality_level(), QualityLevel::Low);
    assert_eq!(engine.particle_system().target_count(), 800);
}

#[test]
fn test_adaptive_quality_can_be_disabled() {
    let mut manager = manager_with(100);
    manager.update_performance_config(PerformancePatch {
        adaptive_quality: Some(false),
        ..Default::default()
    });
    let mut engine = ParticleFieldEngine::headless(manager, 800, 600, 1);
    let start = Instant::now();
    for _ in 0..30 {
        engine.advance_at(0.1, start);
    }
    assert_eq!(engine.quality_level(), QualityLevel::High);
    assert!(engine.metrics().average_fps < 11.0);
}

#[test]
fn test_preset_switch_reinitializes_pool() {
    let mut engine = ParticleFieldEngine::headless(manager_with(100), 800, 600, 1);
    engine.apply_preset("minimal").unwrap();
    let target = engine.current_config().particle.particle_count as usize;
    assert_eq!(engine.particle_system().target_count(), target);
    engine.advance(DT);
    assert_eq!(engine.stats().particles.alive, target);
    assert!(engine.apply_preset("does-not-exist").is_err());
}
