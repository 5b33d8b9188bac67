//! Startup configuration
//!
//! Every field has a default, so a config file only lists what it changes:
//!
//! ```yaml
//! particle_count: 16384
//! initial_radius: 2.0
//! init_mode: device
//! interop: copy_fallback
//! ```

use crate::error::{Result, SimulationError};
use nbody_physics::{
    DEFAULT_INITIAL_RADIUS, DEFAULT_INITIAL_SPEED, DEFAULT_PARTICLE_COUNT, GRAVITATIONAL_CONSTANT,
    SOFTENING, TIME_STEP, WORKGROUP_SIZE,
};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// How the two ensembles are populated at startup
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum InitMode {
    /// Generate on the host and upload
    #[default]
    Host,
    /// Upload one random scalar per particle and expand it in a compute pass
    Device,
}

/// Floating-point type of the force accumulator on the device
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Precision {
    #[default]
    Single,
    /// Used only when the selected device supports it; otherwise single
    Double,
}

/// Which interop strategy to use
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum InteropPreference {
    /// Zero-copy when the selected device shares memory with the display
    #[default]
    Auto,
    /// Always round-trip through host memory
    CopyFallback,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationConfig {
    pub particle_count: u32,
    /// Half-extent of the initial cube
    pub initial_radius: f32,
    /// Half-extent of the initial velocity components
    pub initial_speed: f32,
    pub seed: u64,
    pub init_mode: InitMode,

    pub gravitational_constant: f32,
    pub time_step: f32,
    pub softening: f32,

    pub workgroup_size: u32,
    pub precision: Precision,
    pub interop: InteropPreference,

    /// Physics kernel body; the copy built into the crate when unset
    pub kernel_path: Option<PathBuf>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            particle_count: DEFAULT_PARTICLE_COUNT,
            initial_radius: DEFAULT_INITIAL_RADIUS,
            initial_speed: DEFAULT_INITIAL_SPEED,
            seed: 42,
            init_mode: InitMode::Host,
            gravitational_constant: GRAVITATIONAL_CONSTANT,
            time_step: TIME_STEP,
            softening: SOFTENING,
            workgroup_size: WORKGROUP_SIZE,
            precision: Precision::Single,
            interop: InteropPreference::Auto,
            kernel_path: None,
        }
    }
}

impl SimulationConfig {
    /// Read a YAML config file and validate it
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            SimulationError::InvalidConfig(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_yaml(&text)
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(text)
            .map_err(|e| SimulationError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let fail = |msg: &str| Err(SimulationError::InvalidConfig(msg.to_string()));

        if self.particle_count == 0 {
            return fail("particle_count must be positive");
        }
        if !(self.initial_radius.is_finite() && self.initial_radius > 0.0) {
            return fail("initial_radius must be a positive real");
        }
        if !(self.initial_speed.is_finite() && self.initial_speed >= 0.0) {
            return fail("initial_speed must be non-negative");
        }
        if !(self.time_step.is_finite() && self.time_step > 0.0) {
            return fail("time_step must be positive");
        }
        if !(self.softening.is_finite() && self.softening >= 0.0) {
            return fail("softening must be non-negative");
        }
        if !self.gravitational_constant.is_finite() {
            return fail("gravitational_constant must be finite");
        }
        // wgpu's default limit for invocations per workgroup
        if !(1..=256).contains(&self.workgroup_size) {
            return fail("workgroup_size must be within 1..=256");
        }
        Ok(())
    }

    /// Workgroups needed to cover every particle
    pub fn workgroup_count(&self) -> u32 {
        self.particle_count.div_ceil(self.workgroup_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = SimulationConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.particle_count, 8192);
        assert_eq!(config.workgroup_count(), 128);
    }

    #[test]
    fn yaml_overrides_only_listed_fields() {
        let config = SimulationConfig::from_yaml(
            "particle_count: 100\ninit_mode: device\ninterop: copy_fallback\nprecision: double\n",
        )
        .unwrap();
        assert_eq!(config.particle_count, 100);
        assert_eq!(config.init_mode, InitMode::Device);
        assert_eq!(config.interop, InteropPreference::CopyFallback);
        assert_eq!(config.precision, Precision::Double);
        assert_eq!(config.time_step, TIME_STEP);
        assert_eq!(config.workgroup_count(), 2);
    }

    #[test]
    fn rejects_zero_particles() {
        let err = SimulationConfig::from_yaml("particle_count: 0").unwrap_err();
        assert!(matches!(err, SimulationError::InvalidConfig(_)));
    }

    #[test]
    fn rejects_unknown_fields() {
        assert!(SimulationConfig::from_yaml("particles: 10").is_err());
    }

    #[test]
    fn rejects_non_positive_radius() {
        let config = SimulationConfig {
            initial_radius: 0.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
