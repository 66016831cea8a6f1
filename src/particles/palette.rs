//! Spawn-time color sampling for the named color schemes.

use glam::Vec3;
use rand::Rng;

use crate::config::ColorScheme;

/// Chance that a cosmic particle spawns as a white star.
const COSMIC_STAR_CHANCE: f64 = 0.08;

impl ColorScheme {
    /// Gradient stops sampled by [`sample_color`]. Rainbow ignores these and
    /// picks a random hue instead.
    pub fn stops(&self) -> [Vec3; 4] {
        match self {
            ColorScheme::Rainbow => [
                Vec3::new(1.0, 0.0, 0.0),
                Vec3::new(1.0, 1.0, 0.0),
                Vec3::new(0.0, 1.0, 1.0),
                Vec3::new(0.5, 0.0, 1.0),
            ],
            ColorScheme::Ocean => [
                Vec3::new(0.0, 0.25, 0.5),
                Vec3::new(0.0, 0.45, 0.75),
                Vec3::new(0.15, 0.7, 0.85),
                Vec3::new(0.55, 0.9, 1.0),
            ],
            ColorScheme::Sunset => [
                Vec3::new(0.55, 0.1, 0.55),
                Vec3::new(1.0, 0.25, 0.45),
                Vec3::new(1.0, 0.5, 0.2),
                Vec3::new(1.0, 0.85, 0.4),
            ],
            ColorScheme::Forest => [
                Vec3::new(0.1, 0.35, 0.1),
                Vec3::new(0.2, 0.55, 0.2),
                Vec3::new(0.4, 0.75, 0.25),
                Vec3::new(0.75, 0.85, 0.3),
            ],
            ColorScheme::Cosmic => [
                Vec3::new(0.2, 0.05, 0.4),
                Vec3::new(0.4, 0.1, 0.7),
                Vec3::new(0.25, 0.25, 0.9),
                Vec3::new(0.6, 0.4, 1.0),
            ],
            ColorScheme::Neon => [
                Vec3::new(1.0, 0.0, 0.6),
                Vec3::new(0.0, 1.0, 1.0),
                Vec3::new(0.6, 0.0, 1.0),
                Vec3::new(0.2, 1.0, 0.4),
            ],
            ColorScheme::Fire => [
                Vec3::new(0.7, 0.05, 0.0),
                Vec3::new(1.0, 0.3, 0.0),
                Vec3::new(1.0, 0.6, 0.0),
                Vec3::new(1.0, 0.9, 0.3),
            ],
            ColorScheme::Monochrome => [
                Vec3::new(0.35, 0.35, 0.35),
                Vec3::new(0.55, 0.55, 0.55),
                Vec3::new(0.75, 0.75, 0.75),
                Vec3::new(1.0, 1.0, 1.0),
            ],
        }
    }
}

/// Pick a spawn color for `scheme`. Every channel is in `[0, 1]`.
pub fn sample_color<R: Rng + ?Sized>(scheme: ColorScheme, rng: &mut R) -> [f32; 3] {
    let color = match scheme {
        ColorScheme::Rainbow => hsv_to_rgb(rng.gen::<f32>(), 0.8, 1.0),
        // Discrete picks, no blending.
        ColorScheme::Neon => {
            let stops = scheme.stops();
            stops[rng.gen_range(0..stops.len())]
        }
        ColorScheme::Cosmic if rng.gen_bool(COSMIC_STAR_CHANCE) => Vec3::ONE,
        _ => {
            let base = gradient(&scheme.stops(), rng.gen::<f32>());
            let jitter = rng.gen_range(0.9..=1.1);
            base * jitter
        }
    };
    color.clamp(Vec3::ZERO, Vec3::ONE).to_array()
}

fn gradient(stops: &[Vec3; 4], t: f32) -> Vec3 {
    let scaled = t.clamp(0.0, 1.0) * (stops.len() - 1) as f32;
    let i = (scaled as usize).min(stops.len() - 2);
    stops[i].lerp(stops[i + 1], scaled - i as f32)
}

fn hsv_to_rgb(h: f32, s: f32, v: f32) -> Vec3 {
    let h = h.rem_euclid(1.0) * 6.0;
    let c = v * s;
    let x = c * (1.0 - (h % 2.0 - 1.0).abs());
    let m = v - c;

    let (r, g, b) = match h as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };

    Vec3::new(r + m, g + m, b + m)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_colors_in_range() {
        let mut rng = StdRng::seed_from_u64(3);
        for scheme in ColorScheme::ALL {
            for _ in 0..200 {
                let c = sample_color(scheme, &mut rng);
                assert!(c.iter().all(|v| (0.0..=1.0).contains(v)), "{:?} {:?}", scheme, c);
            }
        }
    }

    #[test]
    fn test_monochrome_is_gray() {
        let mut rng = StdRng::seed_from_u64(9);
        for _ in 0..50 {
            let [r, g, b] = sample_color(ColorScheme::Monochrome, &mut rng);
            assert_eq!(r, g);
            assert_eq!(g, b);
        }
    }

    #[test]
    fn test_hsv_primaries() {
        assert_eq!(hsv_to_rgb(0.0, 1.0, 1.0), Vec3::new(1.0, 0.0, 0.0));
        let green = hsv_to_rgb(1.0 / 3.0, 1.0, 1.0);
        assert!((green - Vec3::new(0.0, 1.0, 0.0)).length() < 1e-5);
    }

    #[test]
    fn test_gradient_endpoints() {
        let stops = ColorScheme::Fire.stops();
        assert_eq!(gradient(&stops, 0.0), stops[0]);
        assert!((gradient(&stops, 1.0) - stops[3]).length() < 1e-6);
    }
}
