//! Deterministic gradient noise for particle forces.
//!
//! [`NoiseField`] is classic Perlin noise over a seeded permutation table.
//! The table is built once at construction; every query is a pure function
//! of `(seed, coordinates)`, so two fields with the same seed produce
//! identical values. The particle system receives the field by reference
//! instead of reaching for a process-wide generator.
//!
//! ```ignore
//! let noise = NoiseField::new(42);
//! let n = noise.noise2d(1.5, 2.25);            // [-1, 1]
//! let f = noise.fractal_noise2d(x, y, 4, 0.5, 2.0);
//! let t = noise.turbulence2d(x, y, 4);          // [0, 1], ridged
//! ```

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Gradient directions: the 12 edge midpoints of a cube.
const GRADIENTS: [[f32; 3]; 12] = [
    [1.0, 1.0, 0.0],
    [-1.0, 1.0, 0.0],
    [1.0, -1.0, 0.0],
    [-1.0, -1.0, 0.0],
    [1.0, 0.0, 1.0],
    [-1.0, 0.0, 1.0],
    [1.0, 0.0, -1.0],
    [-1.0, 0.0, -1.0],
    [0.0, 1.0, 1.0],
    [0.0, -1.0, 1.0],
    [0.0, 1.0, -1.0],
    [0.0, -1.0, -1.0],
];

const TABLE_SIZE: usize = 256;

/// Seeded Perlin noise generator.
#[derive(Clone)]
pub struct NoiseField {
    seed: u64,
    /// Permutation duplicated to 512 entries so `perm[i + perm[j]]` never wraps.
    perm: [u8; TABLE_SIZE * 2],
}

impl NoiseField {
    /// Build the permutation table for `seed`.
    pub fn new(seed: u64) -> Self {
        let mut base: Vec<u8> = (0..TABLE_SIZE).map(|i| i as u8).collect();
        let mut rng = StdRng::seed_from_u64(seed);
        base.shuffle(&mut rng);

        let mut perm = [0u8; TABLE_SIZE * 2];
        for (i, slot) in perm.iter_mut().enumerate() {
            *slot = base[i & (TABLE_SIZE - 1)];
        }

        Self { seed, perm }
    }

    /// Seed the table was built from.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    #[inline]
    fn p(&self, i: usize) -> usize {
        self.perm[i] as usize
    }

    /// 2D Perlin noise in `[-1, 1]`.
    pub fn noise2d(&self, x: f32, y: f32) -> f32 {
        let xf = x.floor();
        let yf = y.floor();
        let xi = (xf as i32 & 255) as usize;
        let yi = (yf as i32 & 255) as usize;
        let x = x - xf;
        let y = y - yf;

        let u = fade(x);
        let v = fade(y);

        let aa = self.p(self.p(xi) + yi);
        let ab = self.p(self.p(xi) + yi + 1);
        let ba = self.p(self.p(xi + 1) + yi);
        let bb = self.p(self.p(xi + 1) + yi + 1);

        let n00 = dot2(aa, x, y);
        let n10 = dot2(ba, x - 1.0, y);
        let n01 = dot2(ab, x, y - 1.0);
        let n11 = dot2(bb, x - 1.0, y - 1.0);

        let value = lerp(lerp(n00, n10, u), lerp(n01, n11, u), v);
        value.clamp(-1.0, 1.0)
    }

    /// 3D Perlin noise in `[-1, 1]`.
    pub fn noise3d(&self, x: f32, y: f32, z: f32) -> f32 {
        let xf = x.floor();
        let yf = y.floor();
        let zf = z.floor();
        let xi = (xf as i32 & 255) as usize;
        let yi = (yf as i32 & 255) as usize;
        let zi = (zf as i32 & 255) as usize;
        let x = x - xf;
        let y = y - yf;
        let z = z - zf;

        let u = fade(x);
        let v = fade(y);
        let w = fade(z);

        let a = self.p(xi) + yi;
        let aa = self.p(a) + zi;
        let ab = self.p(a + 1) + zi;
        let b = self.p(xi + 1) + yi;
        let ba = self.p(b) + zi;
        let bb = self.p(b + 1) + zi;

        let n000 = dot3(self.p(aa), x, y, z);
        let n100 = dot3(self.p(ba), x - 1.0, y, z);
        let n010 = dot3(self.p(ab), x, y - 1.0, z);
        let n110 = dot3(self.p(bb), x - 1.0, y - 1.0, z);
        let n001 = dot3(self.p(aa + 1), x, y, z - 1.0);
        let n101 = dot3(self.p(ba + 1), x - 1.0, y, z - 1.0);
        let n011 = dot3(self.p(ab + 1), x, y - 1.0, z - 1.0);
        let n111 = dot3(self.p(bb + 1), x - 1.0, y - 1.0, z - 1.0);

        let x0 = lerp(n000, n100, u);
        let x1 = lerp(n010, n110, u);
        let x2 = lerp(n001, n101, u);
        let x3 = lerp(n011, n111, u);

        let value = lerp(lerp(x0, x1, v), lerp(x2, x3, v), w);
        value.clamp(-1.0, 1.0)
    }

    /// Fractal Brownian motion: octave sum normalized by total amplitude.
    ///
    /// Stays in `[-1, 1]`. `persistence` scales amplitude and `lacunarity`
    /// scales frequency from one octave to the next.
    pub fn fractal_noise2d(&self, x: f32, y: f32, octaves: u32, persistence: f32, lacunarity: f32) -> f32 {
        let mut total = 0.0;
        let mut amplitude = 1.0;
        let mut frequency = 1.0;
        let mut max_amplitude = 0.0;

        for _ in 0..octaves.max(1) {
            total += self.noise2d(x * frequency, y * frequency) * amplitude;
            max_amplitude += amplitude;
            amplitude *= persistence;
            frequency *= lacunarity;
        }

        if max_amplitude > 0.0 {
            total / max_amplitude
        } else {
            0.0
        }
    }

    /// Ridged turbulence: sum of `|noise|` per octave, in `[0, 1]`.
    pub fn turbulence2d(&self, x: f32, y: f32, octaves: u32) -> f32 {
        let mut total = 0.0;
        let mut amplitude = 1.0;
        let mut frequency = 1.0;
        let mut max_amplitude = 0.0;

        for _ in 0..octaves.max(1) {
            total += self.noise2d(x * frequency, y * frequency).abs() * amplitude;
            max_amplitude += amplitude;
            amplitude *= 0.5;
            frequency *= 2.0;
        }

        total / max_amplitude
    }

    /// Vector force at `(x, y)` and `time`, each component in `[-1, 1]`.
    ///
    /// The two components sample decorrelated slices of 3D noise.
    pub fn vector2d(&self, x: f32, y: f32, time: f32) -> (f32, f32) {
        (
            self.noise3d(x, y, time),
            self.noise3d(x + 31.416, y + 47.853, time),
        )
    }
}

impl std::fmt::Debug for NoiseField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NoiseField").field("seed", &self.seed).finish()
    }
}

impl Default for NoiseField {
    fn default() -> Self {
        Self::new(0)
    }
}

/// Quintic fade curve `t³(6t² − 15t + 10)`.
#[inline]
fn fade(t: f32) -> f32 {
    t * t * t * (t * (t * 6.0 - 15.0) + 10.0)
}

#[inline]
fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + t * (b - a)
}

#[inline]
fn dot2(hash: usize, x: f32, y: f32) -> f32 {
    let g = GRADIENTS[hash % 12];
    g[0] * x + g[1] * y
}

#[inline]
fn dot3(hash: usize, x: f32, y: f32, z: f32) -> f32 {
    let g = GRADIENTS[hash % 12];
    g[0] * x + g[1] * y + g[2] * z
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_values() {
        let a = NoiseField::new(42);
        let b = NoiseField::new(42);
        for i in 0..200 {
            let x = i as f32 * 0.173 - 11.0;
            let y = i as f32 * 0.311 + 3.0;
            assert_eq!(a.noise2d(x, y), b.noise2d(x, y));
            assert_eq!(a.noise3d(x, y, 0.5), b.noise3d(x, y, 0.5));
        }
    }

    #[test]
    fn test_repeated_queries_are_stable() {
        let noise = NoiseField::new(7);
        let first = noise.noise2d(12.34, -5.67);
        for _ in 0..10 {
            assert_eq!(noise.noise2d(12.34, -5.67), first);
        }
    }

    #[test]
    fn test_different_seeds_differ() {
        let a = NoiseField::new(1);
        let b = NoiseField::new(2);
        let differs = (0..64).any(|i| {
            let x = i as f32 * 0.37 + 0.1;
            (a.noise2d(x, x * 0.5) - b.noise2d(x, x * 0.5)).abs() > 1e-4
        });
        assert!(differs);
    }

    #[test]
    fn test_zero_at_lattice_points() {
        let noise = NoiseField::new(3);
        assert_eq!(noise.noise2d(4.0, 9.0), 0.0);
        assert_eq!(noise.noise3d(1.0, 2.0, 3.0), 0.0);
    }

    #[test]
    fn test_output_ranges() {
        let noise = NoiseField::new(99);
        for i in 0..1000 {
            let x = (i as f32 * 0.731).sin() * 100.0;
            let y = (i as f32 * 0.117).cos() * 100.0;
            let n = noise.noise2d(x, y);
            assert!((-1.0..=1.0).contains(&n));
            let n3 = noise.noise3d(x, y, i as f32 * 0.01);
            assert!((-1.0..=1.0).contains(&n3));
            let f = noise.fractal_noise2d(x, y, 5, 0.5, 2.0);
            assert!((-1.0..=1.0).contains(&f));
            let t = noise.turbulence2d(x, y, 4);
            assert!((0.0..=1.0).contains(&t));
        }
    }

    #[test]
    fn test_negative_coordinates_do_not_panic() {
        let noise = NoiseField::new(5);
        let n = noise.noise2d(-1234.5, -0.25);
        assert!(n.is_finite());
    }

    #[test]
    fn test_fade_endpoints() {
        assert_eq!(fade(0.0), 0.0);
        assert_eq!(fade(1.0), 1.0);
        assert!((fade(0.5) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_single_octave_fractal_matches_noise() {
        let noise = NoiseField::new(11);
        let a = noise.fractal_noise2d(0.3, 0.7, 1, 0.5, 2.0);
        let b = noise.noise2d(0.3, 0.7);
        assert!((a - b).abs() < 1e-6);
    }
}
