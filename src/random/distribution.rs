//! Sampling functions used by the placement strategies.
//!
//! All functions take the RNG explicitly so a seeded generator reproduces the
//! same field every run.

use glam::Vec3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f32::consts::TAU;

/// Seeded generator when a seed is configured, entropy otherwise
pub fn rng_from_seed(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Point uniformly distributed inside a sphere of the given radius.
///
/// Radius is drawn as `R * cbrt(u)` so density is uniform in volume rather
/// than bunched at the center.
pub fn random_in_sphere<R: Rng + ?Sized>(rng: &mut R, radius: f32) -> Vec3 {
    let r = radius * rng.gen::<f32>().cbrt();
    let cos_theta: f32 = rng.gen_range(-1.0..=1.0);
    let sin_theta = (1.0 - cos_theta * cos_theta).max(0.0).sqrt();
    let phi = rng.gen_range(0.0..TAU);

    Vec3::new(
        r * sin_theta * phi.cos(),
        r * sin_theta * phi.sin(),
        r * cos_theta,
    )
}

/// Point uniformly distributed inside a disc on the XZ plane (y = 0)
pub fn random_in_circle<R: Rng + ?Sized>(rng: &mut R, radius: f32) -> Vec3 {
    let r = radius * rng.gen::<f32>().sqrt();
    let angle = rng.gen_range(0.0..TAU);
    Vec3::new(r * angle.cos(), 0.0, r * angle.sin())
}

/// Independent per-axis angles in degrees, each in [-360, 360)
pub fn random_euler_angles<R: Rng + ?Sized>(rng: &mut R) -> Vec3 {
    Vec3::new(
        rng.gen_range(-360.0..360.0),
        rng.gen_range(-360.0..360.0),
        rng.gen_range(-360.0..360.0),
    )
}

/// Per-axis scale inside [min, max] whose axes differ by at most `offset`.
///
/// x is sampled freely; y is sampled in the band around x; z in the band
/// around both. An offset of 0 locks the scale to uniform.
pub fn random_scale<R: Rng + ?Sized>(rng: &mut R, min: Vec3, max: Vec3, offset: f32) -> Vec3 {
    let x = sample_band(rng, min.x, max.x, min.x, max.x);
    let y = sample_band(rng, x - offset, x + offset, min.y, max.y);
    let z = sample_band(rng, x.max(y) - offset, x.min(y) + offset, min.z, max.z);
    Vec3::new(x, y, z)
}

/// Sample `[band_lo, band_hi] ∩ [min, max]`.
///
/// When the intersection is empty the axis ranges are disjoint from the band;
/// the band midpoint clamped into [min, max] keeps the per-axis range intact.
fn sample_band<R: Rng + ?Sized>(rng: &mut R, band_lo: f32, band_hi: f32, min: f32, max: f32) -> f32 {
    let lo = band_lo.max(min);
    let hi = band_hi.min(max);
    if lo <= hi {
        rng.gen_range(lo..=hi)
    } else {
        log::trace!(
            "[Random] Empty scale band [{:.3}, {:.3}] ∩ [{:.3}, {:.3}], clamping",
            band_lo,
            band_hi,
            min,
            max
        );
        ((band_lo + band_hi) * 0.5).clamp(min, max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLES: usize = 2000;

    #[test]
    fn test_sphere_points_within_radius() {
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..SAMPLES {
            let p = random_in_sphere(&mut rng, 25.0);
            assert!(p.length() <= 25.0 + 1e-3, "{:?} outside radius", p);
        }
    }

    #[test]
    fn test_sphere_is_not_bunched_at_center() {
        // Uniform in volume: half the points fall beyond R * cbrt(0.5) ≈ 0.794 R
        let mut rng = StdRng::seed_from_u64(2);
        let outer = (0..SAMPLES)
            .filter(|_| random_in_sphere(&mut rng, 1.0).length() > 0.794)
            .count();
        let fraction = outer as f32 / SAMPLES as f32;
        assert!((0.4..0.6).contains(&fraction), "outer fraction {}", fraction);
    }

    #[test]
    fn test_circle_points_flat_and_within_radius() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..SAMPLES {
            let p = random_in_circle(&mut rng, 10.0);
            assert_eq!(p.y, 0.0);
            assert!(p.length() <= 10.0 + 1e-3);
        }
    }

    #[test]
    fn test_euler_angles_range() {
        let mut rng = StdRng::seed_from_u64(4);
        for _ in 0..SAMPLES {
            let angles = random_euler_angles(&mut rng);
            for axis in angles.to_array() {
                assert!((-360.0..360.0).contains(&axis));
            }
        }
    }

    #[test]
    fn test_scale_within_range_and_offset() {
        let mut rng = StdRng::seed_from_u64(5);
        let min = Vec3::splat(0.5);
        let max = Vec3::splat(3.0);
        let offset = 0.25;

        for _ in 0..SAMPLES {
            let s = random_scale(&mut rng, min, max, offset);
            assert!(s.cmpge(min).all() && s.cmple(max).all(), "{:?}", s);
            assert!((s.x - s.y).abs() <= offset + 1e-5);
            assert!((s.x - s.z).abs() <= offset + 1e-5);
            assert!((s.y - s.z).abs() <= offset + 1e-5);
        }
    }

    #[test]
    fn test_zero_offset_gives_uniform_scale() {
        let mut rng = StdRng::seed_from_u64(6);
        for _ in 0..200 {
            let s = random_scale(&mut rng, Vec3::splat(1.0), Vec3::splat(2.0), 0.0);
            assert_eq!(s.x, s.y);
            assert_eq!(s.y, s.z);
        }
    }

    #[test]
    fn test_disjoint_axis_ranges_stay_in_range() {
        let mut rng = StdRng::seed_from_u64(7);
        let min = Vec3::new(1.0, 5.0, 1.0);
        let max = Vec3::new(2.0, 6.0, 2.0);
        for _ in 0..200 {
            let s = random_scale(&mut rng, min, max, 0.1);
            assert!(s.cmpge(min).all() && s.cmple(max).all(), "{:?}", s);
        }
    }

    #[test]
    fn test_seeded_rng_is_deterministic() {
        let a = random_in_sphere(&mut rng_from_seed(Some(42)), 5.0);
        let b = random_in_sphere(&mut rng_from_seed(Some(42)), 5.0);
        assert_eq!(a, b);
    }
}
