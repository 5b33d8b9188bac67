//! Simulation constants
//!
//! Defaults are in normalized units: the initial cloud has radius 1 and the
//! total mass of a default ensemble is on the order of 10^4 to 10^5.

/// Default number of bodies (the classic 8192-body run)
pub const DEFAULT_PARTICLE_COUNT: u32 = 8192;

/// Default half-extent of the initial cube the bodies are scattered in
pub const DEFAULT_INITIAL_RADIUS: f32 = 1.0;

/// Default half-extent of the initial velocity components
pub const DEFAULT_INITIAL_SPEED: f32 = 0.05;

/// Gravitational constant, scaled so a default ensemble collapses over a few
/// thousand frames
pub const GRAVITATIONAL_CONSTANT: f32 = 1.0e-5;

/// Integration time step per frame
pub const TIME_STEP: f32 = 1.0e-3;

/// Plummer softening length to prevent singularities at r→0
pub const SOFTENING: f32 = 1.0e-2;

/// Masses are drawn as `exp(MASS_EXPONENT * u)` with `u` uniform in [0, 1),
/// which gives a log-uniform spectrum between 1 and e^3
pub const MASS_EXPONENT: f32 = 3.0;

/// Compute invocations per workgroup
pub const WORKGROUP_SIZE: u32 = 64;
