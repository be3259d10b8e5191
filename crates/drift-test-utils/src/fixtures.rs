//! Reusable particle fixtures.
//!
//! - [`along_equator`]: particles at given longitudes, all at time zero.
//! - [`clustered`]: `[lon, lat]` points scattered around fixed centers.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use drift_core::Particle;

/// One particle per longitude, on the equator at the surface.
pub fn along_equator(lons: &[f64]) -> Vec<Particle> {
    lons.iter()
        .map(|&lon| Particle::new(lon, 0.0, 0.0, 0.0))
        .collect()
}

/// `per_center` points uniformly within `spread` degrees of each center,
/// grouped by center in the order given.
pub fn clustered(centers: &[[f64; 2]], per_center: usize, spread: f64, seed: u64) -> Vec<[f64; 2]> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut points = Vec::with_capacity(centers.len() * per_center);
    for c in centers {
        for _ in 0..per_center {
            points.push([
                c[0] + rng.random_range(-spread..spread),
                c[1] + rng.random_range(-spread..spread),
            ]);
        }
    }
    points
}
