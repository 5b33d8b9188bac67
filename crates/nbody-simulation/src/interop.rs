//! Handing the settled state to the display
//!
//! The display buffer is owned by whoever holds the lease: the display side
//! between frames, the compute side only inside an acquire/release bracket.

use crate::config::InteropPreference;
use crate::device::{DeviceCapabilities, GpuContext};
use crate::error::{Result, SimulationError};
use crate::gpu;
use crate::kernel::Kernels;
use crate::state::{ParticleStore, PingPong};
use nbody_physics::DisplayRecord;

/// How Display Records reach the display buffer, fixed for a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteropStrategy {
    /// Compute writes the display buffer directly on a shared device
    ZeroCopy,
    /// Records round-trip through host memory into a separate display device
    CopyFallback,
}

impl InteropStrategy {
    pub fn choose(capabilities: DeviceCapabilities, preference: InteropPreference) -> Self {
        match preference {
            InteropPreference::Auto if capabilities.shared_display_memory => Self::ZeroCopy,
            _ => Self::CopyFallback,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Owner {
    Display,
    Compute,
}

/// Ownership bookkeeping for the display buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lease {
    strategy: InteropStrategy,
    owner: Owner,
    registered: bool,
}

impl Lease {
    pub fn new(strategy: InteropStrategy) -> Self {
        Self {
            strategy,
            owner: Owner::Display,
            registered: false,
        }
    }

    pub fn register(&mut self) -> Result<()> {
        if self.strategy != InteropStrategy::ZeroCopy {
            return Err(SimulationError::InteropAcquireFailed(
                "only zero-copy display buffers are registered for compute".into(),
            ));
        }
        self.registered = true;
        Ok(())
    }

    pub fn unregister(&mut self) {
        self.registered = false;
    }

    pub fn acquire(&mut self) -> Result<()> {
        if self.owner != Owner::Display {
            return Err(SimulationError::InteropAcquireFailed(
                "display buffer is already held by compute".into(),
            ));
        }
        if self.strategy == InteropStrategy::ZeroCopy && !self.registered {
            return Err(SimulationError::InteropAcquireFailed(
                "display buffer is not registered for compute".into(),
            ));
        }
        self.owner = Owner::Compute;
        Ok(())
    }

    pub fn release(&mut self) {
        self.owner = Owner::Display;
    }

    pub fn owner(&self) -> Owner {
        self.owner
    }

    pub fn is_registered(&self) -> bool {
        self.registered
    }
}

/// The vertex buffer the renderer draws, one [`DisplayRecord`] per particle
pub struct DisplayBuffer {
    buffer: wgpu::Buffer,
    len: u32,
    lease: Lease,
}

impl DisplayBuffer {
    pub fn new(display: &GpuContext, len: u32, strategy: InteropStrategy) -> Self {
        let usage = match strategy {
            InteropStrategy::ZeroCopy => {
                wgpu::BufferUsages::VERTEX
                    | wgpu::BufferUsages::STORAGE
                    | wgpu::BufferUsages::COPY_SRC
            }
            InteropStrategy::CopyFallback => {
                wgpu::BufferUsages::VERTEX
                    | wgpu::BufferUsages::COPY_DST
                    | wgpu::BufferUsages::COPY_SRC
            }
        };
        let buffer = display.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Display Record Buffer"),
            size: len as u64 * std::mem::size_of::<DisplayRecord>() as u64,
            usage,
            mapped_at_creation: false,
        });

        Self {
            buffer,
            len,
            lease: Lease::new(strategy),
        }
    }

    pub fn register_for_compute(&mut self) -> Result<()> {
        self.lease.register()
    }

    pub fn unregister(&mut self) {
        self.lease.unregister();
    }

    /// Drain the display queue, then hand the buffer to compute
    pub fn acquire(&mut self, display: &GpuContext) -> Result<()> {
        self.lease.acquire()?;
        if let Err(e) = display.wait_idle() {
            self.lease.release();
            return Err(SimulationError::InteropAcquireFailed(e.to_string()));
        }
        Ok(())
    }

    /// Wait for the compute-side writes on `ctx`, then hand the buffer back.
    ///
    /// Ownership returns to the display even if the wait fails.
    pub fn release(&mut self, ctx: &GpuContext) -> Result<()> {
        let waited = ctx.wait_idle();
        self.lease.release();
        waited.map_err(|e| SimulationError::InteropAcquireFailed(e.to_string()))
    }

    pub fn buffer(&self) -> &wgpu::Buffer {
        &self.buffer
    }

    pub fn len(&self) -> u32 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn byte_size(&self) -> u64 {
        self.buffer.size()
    }
}

/// Per-strategy resources and the Expose step
pub enum InteropBridge {
    ZeroCopy {
        /// Indexed by the `current` slot
        pack_bind_groups: [wgpu::BindGroup; 2],
    },
    CopyFallback {
        /// Pack target on the compute device, never one of the particle buffers
        scratch: wgpu::Buffer,
        readback: wgpu::Buffer,
        host: Vec<DisplayRecord>,
        pack_bind_groups: [wgpu::BindGroup; 2],
    },
}

fn pack_bind_groups(
    compute: &GpuContext,
    kernels: &Kernels,
    store: &ParticleStore,
    target: &wgpu::Buffer,
) -> [wgpu::BindGroup; 2] {
    [0, 1].map(|slot| {
        compute.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Pack Bind Group"),
            layout: &kernels.pack_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: store.buffer(slot).as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: target.as_entire_binding(),
                },
            ],
        })
    })
}

fn readback_failed(error: SimulationError) -> SimulationError {
    match error {
        SimulationError::Readback(message) => SimulationError::InteropAcquireFailed(format!(
            "display records could not be read back: {message}"
        )),
        other => other,
    }
}

impl InteropBridge {
    pub fn new(
        compute: &GpuContext,
        kernels: &Kernels,
        store: &ParticleStore,
        display: &mut DisplayBuffer,
        strategy: InteropStrategy,
    ) -> Result<Self> {
        let bridge = match strategy {
            InteropStrategy::ZeroCopy => {
                display.register_for_compute()?;
                Self::ZeroCopy {
                    pack_bind_groups: pack_bind_groups(compute, kernels, store, display.buffer()),
                }
            }
            InteropStrategy::CopyFallback => {
                let size = display.byte_size();
                let scratch = compute.device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some("Display Scratch Buffer"),
                    size,
                    usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
                    mapped_at_creation: false,
                });
                let readback = compute.device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some("Display Readback Buffer"),
                    size,
                    usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                });
                Self::CopyFallback {
                    pack_bind_groups: pack_bind_groups(compute, kernels, store, &scratch),
                    scratch,
                    readback,
                    host: vec![DisplayRecord::default(); display.len() as usize],
                }
            }
        };

        log::info!("✓ Interop bridge ready ({:?})", bridge.strategy());
        Ok(bridge)
    }

    pub fn strategy(&self) -> InteropStrategy {
        match self {
            Self::ZeroCopy { .. } => InteropStrategy::ZeroCopy,
            Self::CopyFallback { .. } => InteropStrategy::CopyFallback,
        }
    }

    /// Pack the `current` slot of `roles` into the display buffer.
    ///
    /// Returns with the display buffer display-owned, whatever the outcome.
    /// A failed host readback on the fallback path ends the run like a failed
    /// acquire.
    #[allow(clippy::too_many_arguments)]
    pub fn expose(
        &mut self,
        compute: &GpuContext,
        display_ctx: &GpuContext,
        kernels: &Kernels,
        store: &ParticleStore,
        display: &mut DisplayBuffer,
        workgroups: u32,
        roles: PingPong,
    ) -> Result<()> {
        let slot = roles.current();

        match self {
            Self::ZeroCopy { pack_bind_groups } => {
                display.acquire(display_ctx)?;
                let packed = gpu::submit_checked(compute, "Pack Encoder", |encoder| {
                    gpu::dispatch(
                        encoder,
                        "Pack Compute Pass",
                        &kernels.pack_pipeline,
                        &pack_bind_groups[slot],
                        workgroups,
                    );
                });
                let released = display.release(compute);
                packed?;
                released
            }
            Self::CopyFallback {
                scratch,
                readback,
                host,
                pack_bind_groups,
            } => {
                let size = scratch.size();
                gpu::submit_checked(compute, "Pack Encoder", |encoder| {
                    gpu::dispatch(
                        encoder,
                        "Pack Compute Pass",
                        &kernels.pack_pipeline,
                        &pack_bind_groups[slot],
                        workgroups,
                    );
                    encoder.copy_buffer_to_buffer(scratch, 0, readback, 0, size);
                })?;
                gpu::map_into(compute, readback, host.as_mut_slice())
                    .map_err(readback_failed)?;

                display.acquire(display_ctx)?;
                display_ctx
                    .queue
                    .write_buffer(display.buffer(), 0, bytemuck::cast_slice(host.as_slice()));
                let uploaded =
                    gpu::submit_checked(display_ctx, "Display Upload Encoder", |_| {});
                let released = display.release(display_ctx);
                uploaded?;
                released
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps(shared: bool) -> DeviceCapabilities {
        DeviceCapabilities {
            shared_display_memory: shared,
            double_precision: false,
        }
    }

    #[test]
    fn auto_follows_capability() {
        assert_eq!(
            InteropStrategy::choose(caps(true), InteropPreference::Auto),
            InteropStrategy::ZeroCopy
        );
        assert_eq!(
            InteropStrategy::choose(caps(false), InteropPreference::Auto),
            InteropStrategy::CopyFallback
        );
    }

    #[test]
    fn fallback_preference_always_wins() {
        assert_eq!(
            InteropStrategy::choose(caps(true), InteropPreference::CopyFallback),
            InteropStrategy::CopyFallback
        );
    }

    #[test]
    fn zero_copy_acquire_needs_registration() {
        let mut lease = Lease::new(InteropStrategy::ZeroCopy);
        assert!(matches!(
            lease.acquire(),
            Err(SimulationError::InteropAcquireFailed(_))
        ));
        assert_eq!(lease.owner(), Owner::Display);

        lease.register().unwrap();
        lease.acquire().unwrap();
        assert_eq!(lease.owner(), Owner::Compute);
        lease.release();
        assert_eq!(lease.owner(), Owner::Display);
    }

    #[test]
    fn double_acquire_fails() {
        let mut lease = Lease::new(InteropStrategy::CopyFallback);
        lease.acquire().unwrap();
        assert!(matches!(
            lease.acquire(),
            Err(SimulationError::InteropAcquireFailed(_))
        ));
        lease.release();
        assert!(lease.acquire().is_ok());
    }

    #[test]
    fn unregistered_buffer_cannot_be_acquired() {
        let mut lease = Lease::new(InteropStrategy::ZeroCopy);
        lease.register().unwrap();
        lease.unregister();
        assert!(!lease.is_registered());
        assert!(lease.acquire().is_err());
    }

    #[test]
    fn fallback_readback_failure_is_fatal() {
        let error = readback_failed(SimulationError::Readback("map failed".into()));
        assert!(matches!(error, SimulationError::InteropAcquireFailed(_)));
        assert!(error.is_fatal());

        let error = readback_failed(SimulationError::UpdateFailed("oom".into()));
        assert!(matches!(error, SimulationError::UpdateFailed(_)));
    }

    #[test]
    fn fallback_buffers_are_never_registered() {
        let mut lease = Lease::new(InteropStrategy::CopyFallback);
        assert!(lease.register().is_err());
        assert!(!lease.is_registered());
    }
}
