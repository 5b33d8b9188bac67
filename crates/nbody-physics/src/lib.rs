//! # N-body Physics
//!
//! Host-side data model for the gravitational N-body engine: the particle
//! record shared bit-for-bit with the compute shaders, the display record
//! consumed by the renderer, and CPU reference implementations of the
//! initial distribution and the integration step.

pub mod constants;
pub mod forces;
pub mod init;
pub mod particle;

pub use constants::*;
pub use forces::*;
pub use init::*;
pub use particle::*;
