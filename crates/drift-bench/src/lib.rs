//! Benchmark profiles and utilities for the Drift particle collection.
//!
//! - [`reference_init`]: uniformly scattered particles with sequential ids
//! - [`populated`]: a collection already holding a reference profile

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use drift_collection::{CollectionConfig, ParticleCollection, ParticleInit};
use drift_core::SequentialIssuer;

/// `n` particles uniformly over the globe's surface, all at time zero.
pub fn reference_init(n: usize, seed: u64) -> ParticleInit {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let lon = (0..n).map(|_| rng.random_range(-180.0..180.0)).collect();
    let lat = (0..n).map(|_| rng.random_range(-90.0..90.0)).collect();
    ParticleInit::new(lon, lat, vec![0.0; n], vec![0.0; n])
}

/// Single-worker collection holding [`reference_init`]`(n, seed)`.
pub fn populated(n: usize, seed: u64) -> ParticleCollection {
    ParticleCollection::from_init(
        CollectionConfig::new(seed),
        Box::new(SequentialIssuer::new()),
        Box::new(drift_collection::SoloComm),
        reference_init(n, seed),
    )
    .unwrap_or_else(|e| panic!("reference profile rejected: {e}"))
}

/// `n` `[lon, lat]` points from [`reference_init`].
pub fn reference_points(n: usize, seed: u64) -> Vec<[f64; 2]> {
    reference_init(n, seed).points()
}
