//! # N-body Renderer
//!
//! Orbit camera and point-sprite renderer drawing the simulation's Display
//! Record buffer directly as an instanced vertex stream.

pub mod camera;
pub mod renderer;

pub use camera::*;
pub use renderer::*;
