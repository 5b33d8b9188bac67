//! Initial ensemble generation

use crate::constants::MASS_EXPONENT;
use crate::particle::Particle;
use glam::Vec3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Uniform in [-1, 1)
fn symmetric(rng: &mut impl Rng) -> f32 {
    rng.random::<f32>() * 2.0 - 1.0
}

/// Log-uniform mass in [1, e^MASS_EXPONENT): many light bodies, few heavy ones
pub fn sample_mass(u: f32) -> f32 {
    (MASS_EXPONENT * u).exp()
}

/// Scatter `count` bodies in the cube `[-radius, radius)^3` with velocity
/// components in `[-speed, speed)`.
///
/// Deterministic for a given seed.
pub fn procedural_ensemble(count: usize, radius: f32, speed: f32, seed: u64) -> Vec<Particle> {
    let mut rng = StdRng::seed_from_u64(seed);

    (0..count)
        .map(|_| {
            let position = Vec3::new(
                symmetric(&mut rng),
                symmetric(&mut rng),
                symmetric(&mut rng),
            ) * radius;
            let velocity = Vec3::new(
                symmetric(&mut rng),
                symmetric(&mut rng),
                symmetric(&mut rng),
            ) * speed;
            let mass = sample_mass(rng.random::<f32>());
            Particle::new(position, velocity, mass)
        })
        .collect()
}

/// One uniform scalar in [0, 1) per particle, fed to the on-device
/// initialization pass which expands it into a full particle.
pub fn random_scalars(count: usize, seed: u64) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count).map(|_| rng.random::<f32>()).collect()
}
