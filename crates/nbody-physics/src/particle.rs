//! Particle and display records

use bytemuck::{Pod, Zeroable};
use glam::{Vec3, Vec4};

/// GPU-compatible point mass.
///
/// Matches the storage layout of the WGSL struct
/// `struct Particle { position: vec3<f32>, velocity: vec3<f32>, mass: f32 }`:
/// `vec3<f32>` aligns to 16 bytes, so `velocity` starts at offset 16 and
/// `mass` fills the last lane of the second row. 32 bytes total.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct Particle {
    /// World-space location
    pub position: [f32; 3],
    pub _padding: f32,

    /// Current velocity
    pub velocity: [f32; 3],
    /// Mass, always > 0
    pub mass: f32,
}

impl Particle {
    pub fn new(position: Vec3, velocity: Vec3, mass: f32) -> Self {
        Self {
            position: position.to_array(),
            _padding: 0.0,
            velocity: velocity.to_array(),
            mass,
        }
    }

    /// A body at rest
    pub fn at_rest(position: Vec3, mass: f32) -> Self {
        Self::new(position, Vec3::ZERO, mass)
    }

    pub fn position(&self) -> Vec3 {
        Vec3::from_array(self.position)
    }

    pub fn velocity(&self) -> Vec3 {
        Vec3::from_array(self.velocity)
    }

    /// The record the renderer sees for this particle
    pub fn to_display(&self) -> DisplayRecord {
        DisplayRecord::new(self.position(), self.mass)
    }
}

/// Per-particle vertex consumed by the renderer's instance stream.
///
/// xyz = position, w = mass (used for point size and brightness).
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct DisplayRecord {
    pub position: [f32; 4],
}

impl DisplayRecord {
    pub fn new(position: Vec3, aux: f32) -> Self {
        Self {
            position: position.extend(aux).to_array(),
        }
    }

    pub fn xyz(&self) -> Vec3 {
        Vec4::from_array(self.position).truncate()
    }

    pub fn aux(&self) -> f32 {
        self.position[3]
    }
}

/// Sum of all masses in an ensemble
pub fn total_mass(particles: &[Particle]) -> f64 {
    particles.iter().map(|p| p.mass as f64).sum()
}

/// Mass-weighted mean position
pub fn center_of_mass(particles: &[Particle]) -> Vec3 {
    let total = total_mass(particles) as f32;
    if total <= 0.0 {
        return Vec3::ZERO;
    }
    particles
        .iter()
        .fold(Vec3::ZERO, |acc, p| acc + p.position() * p.mass)
        / total
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_matches_wgsl() {
        assert_eq!(std::mem::size_of::<Particle>(), 32);
        assert_eq!(std::mem::offset_of!(Particle, velocity), 16);
        assert_eq!(std::mem::offset_of!(Particle, mass), 28);
        assert_eq!(std::mem::size_of::<DisplayRecord>(), 16);
    }

    #[test]
    fn display_record_carries_position_and_mass() {
        let p = Particle::new(Vec3::new(1.0, 2.0, 3.0), Vec3::X, 4.5);
        let d = p.to_display();
        assert_eq!(d.xyz(), Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(d.aux(), 4.5);
    }

    #[test]
    fn center_of_mass_is_mass_weighted() {
        let particles = [
            Particle::at_rest(Vec3::new(-1.0, 0.0, 0.0), 1.0),
            Particle::at_rest(Vec3::new(2.0, 0.0, 0.0), 2.0),
        ];
        assert_eq!(center_of_mass(&particles), Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(total_mass(&particles), 3.0);
    }
}
