//! Particle pool and CPU physics.
//!
//! [`ParticleSystem`] owns every particle. Each tick it ages particles,
//! recycles the dead, applies forces in a fixed order and integrates:
//!
//! 1. reset acceleration
//! 2. gravity along +Y
//! 3. noise-field force
//! 4. pointer attraction within the interaction radius
//! 5. ridged turbulence
//!
//! ```text
//! v += a · dt / mass
//! v *= 1 − damping · dt
//! |v| ≤ speed · SPEED_UNIT
//! p += v · dt
//! ```
//!
//! Positions wrap toroidally with a margin on each axis, so a particle
//! leaving one edge re-enters from the opposite side with its velocity
//! intact. The population is held at the configured count: every death in
//! a tick is replaced before the tick returns.

mod palette;
mod pool;

use std::f32::consts::TAU;

use bytemuck::{Pod, Zeroable};
use glam::Vec2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::{ParticleConfigPatch, ParticleSystemConfig};
use crate::interaction::InteractionState;
use crate::noise::NoiseField;

pub use palette::sample_color;
pub use pool::{Particle, ParticlePool};

/// Pool capacity relative to the configured particle count.
pub const CAPACITY_FACTOR: f32 = 1.5;

/// Distance past an edge before a particle wraps to the opposite side.
pub const WRAP_MARGIN: f32 = 10.0;

/// Pixels per second of maximum speed per unit of `visual.speed`.
pub const SPEED_UNIT: f32 = 100.0;

/// Per-axis spawn velocity range per unit of `visual.speed`.
pub const SPAWN_SPEED: f32 = 50.0;

/// Time multiplier for the noise field's third coordinate.
pub const NOISE_TIME_SCALE: f32 = 0.1;

const TURBULENCE_OCTAVES: u32 = 3;
const MIN_LIFETIME: f32 = 3.0;
const MAX_LIFETIME: f32 = 8.0;

/// Multipliers applied to the raw force terms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForceScales {
    /// Noise vector in `[-1, 1]²` to acceleration.
    pub noise: f32,
    /// `physics.turbulence` to acceleration.
    pub turbulence: f32,
    /// Pointer `(radius − distance) × mouse_influence` to acceleration.
    pub pointer: f32,
}

impl ForceScales {
    /// No forces beyond gravity. Useful for isolating integration in tests.
    pub const NONE: ForceScales = ForceScales {
        noise: 0.0,
        turbulence: 0.0,
        pointer: 0.0,
    };
}

impl Default for ForceScales {
    fn default() -> Self {
        Self {
            noise: 50.0,
            turbulence: 20.0,
            pointer: 0.1,
        }
    }
}

/// Particle layout uploaded to the GPU, one instance per particle.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GpuParticle {
    pub position: [f32; 2],
    pub velocity: [f32; 2],
    pub color: [f32; 3],
    pub life: f32,
    pub size: f32,
}

impl From<&Particle> for GpuParticle {
    fn from(p: &Particle) -> Self {
        Self {
            position: p.position.to_array(),
            velocity: p.velocity.to_array(),
            color: p.color,
            life: p.life,
            size: p.size,
        }
    }
}

/// Counters reported by [`ParticleSystem::stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParticleStats {
    pub alive: usize,
    pub capacity: usize,
    pub target: usize,
    /// Boundary wraps since the last reinitialization.
    pub wraps: u64,
    /// Deaths recycled since the last reinitialization.
    pub recycled: u64,
}

/// Owns the particle pool and integrates it.
#[derive(Debug)]
pub struct ParticleSystem {
    config: ParticleSystemConfig,
    pool: ParticlePool,
    bounds: Vec2,
    scales: ForceScales,
    rng: StdRng,
    wraps: u64,
    recycled: u64,
}

impl ParticleSystem {
    /// Build and populate a system inside a `width × height` viewport.
    /// `seed` drives spawn positions, velocities and colors.
    pub fn new(config: ParticleSystemConfig, width: f32, height: f32, seed: u64) -> Self {
        let mut config = config;
        config.validate();
        let mut system = Self {
            pool: ParticlePool::with_capacity(capacity_for(config.particle_count)),
            config,
            bounds: Vec2::new(width.max(1.0), height.max(1.0)),
            scales: ForceScales::default(),
            rng: StdRng::seed_from_u64(seed),
            wraps: 0,
            recycled: 0,
        };
        system.populate();
        system
    }

    pub fn config(&self) -> &ParticleSystemConfig {
        &self.config
    }

    /// Merge `patch` into the current configuration.
    ///
    /// A changed particle count rebuilds the pool and discards every
    /// in-flight particle. Returns `true` when that happened.
    pub fn update_config(&mut self, patch: &ParticleConfigPatch) -> bool {
        let mut next = self.config.clone();
        next.apply(patch);
        self.set_config(next)
    }

    /// Replace the configuration. Same reinitialization rule as
    /// [`update_config`](Self::update_config).
    pub fn set_config(&mut self, config: ParticleSystemConfig) -> bool {
        let mut config = config;
        config.validate();
        let reinit = config.particle_count != self.config.particle_count;
        self.config = config;
        if reinit {
            log::info!(
                "Particle count changed to {}, reinitializing pool",
                self.config.particle_count
            );
            self.pool = ParticlePool::with_capacity(capacity_for(self.config.particle_count));
            self.wraps = 0;
            self.recycled = 0;
            self.populate();
        }
        reinit
    }

    pub fn force_scales(&self) -> ForceScales {
        self.scales
    }

    pub fn set_force_scales(&mut self, scales: ForceScales) {
        self.scales = scales;
    }

    /// Change the wrap bounds. Particles outside the new bounds wrap on
    /// their next update.
    pub fn set_bounds(&mut self, width: f32, height: f32) {
        self.bounds = Vec2::new(width.max(1.0), height.max(1.0));
    }

    pub fn bounds(&self) -> Vec2 {
        self.bounds
    }

    /// Discard all particles and spawn a fresh population.
    pub fn reset(&mut self) {
        self.pool.clear();
        self.wraps = 0;
        self.recycled = 0;
        self.populate();
    }

    /// Advance the simulation by `dt` seconds at simulated time `time`.
    pub fn update(&mut self, dt: f32, time: f32, noise: &NoiseField, interaction: &InteractionState) {
        if !(dt > 0.0 && dt.is_finite()) {
            return;
        }

        let step = Step {
            dt,
            time,
            config: &self.config,
            scales: self.scales,
            bounds: self.bounds,
            noise,
            interaction,
        };

        let mut deaths = 0usize;
        let mut i = 0;
        while i < self.pool.alive() {
            let index = self.pool.active_index(i);
            let particle = self.pool.get_mut(index);
            particle.life -= dt / particle.max_life;
            if particle.life <= 0.0 {
                self.pool.release_active(i);
                deaths += 1;
                continue;
            }
            if step.integrate(particle) {
                self.wraps += 1;
            }
            i += 1;
        }

        self.recycled += deaths as u64;
        let target = self.target_count();
        while self.pool.alive() < target && self.spawn(1.0) {}
    }

    /// Write every alive particle into `out`, replacing its contents.
    pub fn pack_into(&self, out: &mut Vec<GpuParticle>) -> usize {
        out.clear();
        out.extend(self.pool.iter().map(GpuParticle::from));
        out.len()
    }

    pub fn particles(&self) -> impl Iterator<Item = &Particle> + '_ {
        self.pool.iter()
    }

    #[inline]
    pub fn alive_count(&self) -> usize {
        self.pool.alive()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.pool.capacity()
    }

    #[inline]
    pub fn target_count(&self) -> usize {
        self.config.particle_count as usize
    }

    pub fn stats(&self) -> ParticleStats {
        ParticleStats {
            alive: self.pool.alive(),
            capacity: self.pool.capacity(),
            target: self.target_count(),
            wraps: self.wraps,
            recycled: self.recycled,
        }
    }

    fn populate(&mut self) {
        let target = self.target_count();
        while self.pool.alive() < target {
            // Staggered so the initial population does not die in one wave.
            let life = self.rng.gen_range(0.2..=1.0);
            if !self.spawn(life) {
                break;
            }
        }
        log::debug!(
            "Spawned {} particles (capacity {})",
            self.pool.alive(),
            self.pool.capacity()
        );
    }

    fn spawn(&mut self, life: f32) -> bool {
        let visual = self.config.visual;
        let rng = &mut self.rng;
        let spawn_speed = visual.speed * SPAWN_SPEED;
        let particle = Particle {
            position: Vec2::new(
                rng.gen_range(0.0..=self.bounds.x),
                rng.gen_range(0.0..=self.bounds.y),
            ),
            velocity: Vec2::new(rng.gen_range(-1.0..=1.0), rng.gen_range(-1.0..=1.0)) * spawn_speed,
            acceleration: Vec2::ZERO,
            life,
            max_life: rng.gen_range(MIN_LIFETIME..=MAX_LIFETIME),
            size: rng.gen_range(visual.min_size..=visual.max_size),
            color: sample_color(self.config.color_scheme, rng),
            mass: rng.gen_range(0.5..=1.5),
            id: 0,
        };
        self.pool.spawn(particle).is_some()
    }
}

/// Pool capacity for `count` particles.
pub fn capacity_for(count: u32) -> usize {
    (count as f32 * CAPACITY_FACTOR).ceil() as usize
}

/// Wrap `position` around `bounds` with `margin`. Returns the new position
/// and whether either axis wrapped.
pub fn wrap_position(position: Vec2, bounds: Vec2, margin: f32) -> (Vec2, bool) {
    let mut p = position;
    let mut wrapped = false;
    if p.x > bounds.x + margin {
        p.x = -margin;
        wrapped = true;
    } else if p.x < -margin {
        p.x = bounds.x + margin;
        wrapped = true;
    }
    if p.y > bounds.y + margin {
        p.y = -margin;
        wrapped = true;
    } else if p.y < -margin {
        p.y = bounds.y + margin;
        wrapped = true;
    }
    (p, wrapped)
}

/// Per-tick inputs shared by every particle.
struct Step<'a> {
    dt: f32,
    time: f32,
    config: &'a ParticleSystemConfig,
    scales: ForceScales,
    bounds: Vec2,
    noise: &'a NoiseField,
    interaction: &'a InteractionState,
}

impl Step<'_> {
    /// Apply forces and integrate one particle. Returns `true` if it wrapped.
    fn integrate(&self, p: &mut Particle) -> bool {
        let physics = &self.config.physics;
        let ns = self.config.noise_scale;
        let sample = p.position * ns;

        p.acceleration = Vec2::ZERO;
        p.acceleration.y += physics.gravity;

        let (nx, ny) = self.noise.vector2d(sample.x, sample.y, self.time * NOISE_TIME_SCALE);
        p.acceleration += Vec2::new(nx, ny) * self.scales.noise;

        let radius = self.interaction.interaction_radius;
        for pointer in self.interaction.pointers() {
            let delta = pointer - p.position;
            let distance = delta.length();
            if distance < radius && distance > 1e-3 {
                let magnitude = (radius - distance) * physics.mouse_influence * self.scales.pointer;
                p.acceleration += delta / distance * magnitude;
            }
        }

        if physics.turbulence > 0.0 {
            let t = self.noise.turbulence2d(sample.x + self.time * 0.05, sample.y, TURBULENCE_OCTAVES);
            p.acceleration += Vec2::from_angle(t * TAU * 2.0) * physics.turbulence * self.scales.turbulence;
        }

        p.velocity += p.acceleration * self.dt / p.mass;
        p.velocity *= (1.0 - physics.damping * self.dt).max(0.0);
        let max_speed = self.config.visual.speed * SPEED_UNIT;
        p.velocity = p.velocity.clamp_length_max(max_speed);
        p.position += p.velocity * self.dt;

        let (position, wrapped) = wrap_position(p.position, self.bounds, WRAP_MARGIN);
        p.position = position;
        wrapped
    }
}
