//! Gravitational acceleration and integration
//!
//! NOTE: These are reference implementations for documentation and testing.
//! The actual simulation runs the same arithmetic in `nbody.wgsl`.

use crate::particle::Particle;
use glam::Vec3;

/// Softened Newtonian acceleration on particle `i` from every other particle.
///
/// a_i = G * Σ_{j≠i} m_j * (x_j - x_i) / (|x_j - x_i|² + ε²)^(3/2)
pub fn acceleration(
    particles: &[Particle],
    i: usize,
    gravitational_constant: f32,
    softening: f32,
) -> Vec3 {
    let origin = particles[i].position();
    let eps2 = softening * softening;

    let mut accel = Vec3::ZERO;
    for (j, other) in particles.iter().enumerate() {
        if j == i {
            continue;
        }
        let delta = other.position() - origin;
        let dist2 = delta.length_squared() + eps2;
        let inv = dist2.sqrt().recip();
        accel += delta * (other.mass * inv * inv * inv);
    }
    accel * gravitational_constant
}

/// One explicit (semi-implicit Euler) step of the whole ensemble.
///
/// Reads only from `input`, returns a fresh ensemble; masses are copied.
pub fn integrate(
    input: &[Particle],
    gravitational_constant: f32,
    softening: f32,
    time_step: f32,
) -> Vec<Particle> {
    (0..input.len())
        .map(|i| {
            let p = &input[i];
            let a = acceleration(input, i, gravitational_constant, softening);
            let velocity = p.velocity() + a * time_step;
            let position = p.position() + velocity * time_step;
            Particle::new(position, velocity, p.mass)
        })
        .collect()
}
