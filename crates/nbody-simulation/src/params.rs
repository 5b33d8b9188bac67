//! Physics parameters for runtime tuning

use crate::config::SimulationConfig;
use bytemuck::{Pod, Zeroable};

/// Uniform block read by every kernel (matches `Params` in nbody.wgsl)
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct SimulationParams {
    pub gravitational_constant: f32,
    pub time_step: f32,
    pub softening: f32,
    /// Velocity half-extent for the on-device initialization pass
    pub initial_speed: f32,
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self::from(&SimulationConfig::default())
    }
}

impl From<&SimulationConfig> for SimulationParams {
    fn from(config: &SimulationConfig) -> Self {
        Self {
            gravitational_constant: config.gravitational_constant,
            time_step: config.time_step,
            softening: config.softening,
            initial_speed: config.initial_speed,
        }
    }
}
