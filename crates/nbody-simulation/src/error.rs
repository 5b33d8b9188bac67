//! Error taxonomy for the simulation engine

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimulationError {
    /// No adapter with compute support was found
    #[error("no compute device available")]
    NoDeviceAvailable,

    #[error("failed to create compute device: {0}")]
    DeviceRequest(#[from] wgpu::RequestDeviceError),

    /// The physics kernel body could not be read
    #[error("kernel source unavailable at {}: {source}", path.display())]
    SourceUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Compiler / validation diagnostics for the assembled program
    #[error("kernel build failed:\n{0}")]
    KernelBuildFailed(String),

    /// A frame's compute submission failed; simulation state is unchanged
    #[error("frame update failed: {0}")]
    UpdateFailed(String),

    /// The display buffer could not be acquired for compute access
    #[error("display buffer acquire failed: {0}")]
    InteropAcquireFailed(String),

    /// Filling the initial ensemble failed on the device
    #[error("initialization failed: {0}")]
    Initialization(String),

    #[error("buffer readback failed: {0}")]
    Readback(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl SimulationError {
    /// Whether the run must stop.
    ///
    /// Only `UpdateFailed` and `Readback` leave the engine usable; the caller
    /// may retry the frame or skip it.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::UpdateFailed(_) | Self::Readback(_))
    }
}

pub type Result<T, E = SimulationError> = std::result::Result<T, E>;
