//! # N-body Simulation Engine
//!
//! Gravitational N-body integration in compute shaders, with the settled state
//! handed to the display every frame either in place (zero-copy) or through
//! host memory.

pub mod config;
pub mod device;
pub mod engine;
pub mod error;
mod gpu;
pub mod interop;
pub mod kernel;
pub mod params;
pub mod state;

pub use config::*;
pub use device::*;
pub use engine::*;
pub use error::*;
pub use interop::*;
pub use kernel::*;
pub use params::*;
pub use state::*;
