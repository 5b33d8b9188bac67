//! Double-buffered particle state
//!
//! Two device buffers hold the ensemble; which one is `current` is a label
//! ([`PingPong`]) that flips every frame. Nothing is copied on swap.

use crate::config::{InitMode, SimulationConfig};
use crate::device::GpuContext;
use crate::error::{Result, SimulationError};
use crate::gpu;
use crate::kernel::Kernels;
use nbody_physics::{procedural_ensemble, random_scalars, Particle};
use wgpu::util::DeviceExt;

/// Role assignment of the two particle buffers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PingPong {
    current: usize,
}

impl PingPong {
    /// Slot holding the settled state
    pub fn current(&self) -> usize {
        self.current
    }

    /// Slot holding stale data, next to be overwritten
    pub fn previous(&self) -> usize {
        1 - self.current
    }

    pub fn swap(&mut self) {
        self.current = 1 - self.current;
    }
}

/// Role assignment plus the number of completed frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameCursor {
    roles: PingPong,
    frame: u64,
}

impl FrameCursor {
    pub fn roles(&self) -> PingPong {
        self.roles
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Run one frame against the current roles.
    ///
    /// The roles swap and the frame count advances only when `run` succeeds,
    /// so a failed frame can be retried as is.
    pub fn step(&mut self, run: impl FnOnce(PingPong) -> Result<()>) -> Result<()> {
        run(self.roles)?;
        self.roles.swap();
        self.frame += 1;
        Ok(())
    }
}

/// How the ensemble is populated at startup
#[derive(Debug, Clone, PartialEq)]
pub enum Initializer {
    /// Host-generated from a seeded RNG and uploaded
    Procedural { seed: u64, radius: f32, speed: f32 },
    /// Expanded on the device from one random scalar per particle
    OnDevice { seed: u64 },
    /// A fixed list supplied by the caller
    Explicit(Vec<Particle>),
}

impl Initializer {
    pub fn from_config(config: &SimulationConfig) -> Self {
        match config.init_mode {
            InitMode::Host => Self::Procedural {
                seed: config.seed,
                radius: config.initial_radius,
                speed: config.initial_speed,
            },
            InitMode::Device => Self::OnDevice { seed: config.seed },
        }
    }
}

pub struct ParticleStore {
    buffers: [wgpu::Buffer; 2],
    /// Indexed by the `current` slot: reads it, writes the other one
    update_bind_groups: [wgpu::BindGroup; 2],
    count: u32,
}

impl ParticleStore {
    /// Allocate both ensembles and fill them identically.
    ///
    /// Slot roles are not tracked here; every accessor takes the
    /// [`PingPong`] assignment of the frame.
    pub fn initialize(
        ctx: &GpuContext,
        kernels: &Kernels,
        params_buffer: &wgpu::Buffer,
        count: u32,
        workgroups: u32,
        initializer: Initializer,
    ) -> Result<Self> {
        if count == 0 {
            return Err(SimulationError::InvalidConfig(
                "particle count must be positive".into(),
            ));
        }

        let size = count as u64 * std::mem::size_of::<Particle>() as u64;
        let make_buffer = |label: &str| {
            ctx.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size,
                usage: wgpu::BufferUsages::STORAGE
                    | wgpu::BufferUsages::COPY_DST
                    | wgpu::BufferUsages::COPY_SRC,
                mapped_at_creation: false,
            })
        };
        let buffers = [make_buffer("Particle Buffer A"), make_buffer("Particle Buffer B")];

        let update_bind_group = |input: &wgpu::Buffer, output: &wgpu::Buffer, label: &str| {
            ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(label),
                layout: &kernels.update_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: params_buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: input.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: output.as_entire_binding(),
                    },
                ],
            })
        };
        let update_bind_groups = [
            update_bind_group(&buffers[0], &buffers[1], "Update Bind Group A->B"),
            update_bind_group(&buffers[1], &buffers[0], "Update Bind Group B->A"),
        ];

        let store = Self {
            buffers,
            update_bind_groups,
            count,
        };

        match initializer {
            Initializer::Procedural {
                seed,
                radius,
                speed,
            } => {
                let particles = procedural_ensemble(count as usize, radius, speed, seed);
                store.upload(ctx, &particles)?;
            }
            Initializer::Explicit(particles) => {
                if particles.len() != count as usize {
                    return Err(SimulationError::InvalidConfig(format!(
                        "{} particles supplied for an ensemble of {count}",
                        particles.len()
                    )));
                }
                if let Some(i) = particles.iter().position(|p| !(p.mass > 0.0)) {
                    return Err(SimulationError::InvalidConfig(format!(
                        "particle {i} has non-positive mass"
                    )));
                }
                store.upload(ctx, &particles)?;
            }
            Initializer::OnDevice { seed } => {
                store.seed_on_device(ctx, kernels, params_buffer, workgroups, seed)?;
            }
        }

        log::info!("✓ Initialized {} particles", count);
        Ok(store)
    }

    /// Write the same ensemble into both slots
    fn upload(&self, ctx: &GpuContext, particles: &[Particle]) -> Result<()> {
        for buffer in &self.buffers {
            ctx.queue
                .write_buffer(buffer, 0, bytemuck::cast_slice(particles));
        }
        gpu::submit_checked(ctx, "Upload Encoder", |_| {}).map_err(initialization)?;
        ctx.wait_idle().map_err(initialization)
    }

    /// Run `init_data` into the current slot, then copy it to the other one
    fn seed_on_device(
        &self,
        ctx: &GpuContext,
        kernels: &Kernels,
        params_buffer: &wgpu::Buffer,
        workgroups: u32,
        seed: u64,
    ) -> Result<()> {
        let scalars = random_scalars(self.count as usize, seed);
        let seed_buffer = ctx
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Random Scalar Buffer"),
                contents: bytemuck::cast_slice(&scalars),
                usage: wgpu::BufferUsages::STORAGE,
            });

        let roles = PingPong::default();
        let target = &self.buffers[roles.current()];
        let bind_group = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Init Bind Group"),
            layout: &kernels.init_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: params_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 5,
                    resource: seed_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 6,
                    resource: target.as_entire_binding(),
                },
            ],
        });

        gpu::submit_checked(ctx, "Init Encoder", |encoder| {
            gpu::dispatch(
                encoder,
                "Init Compute Pass",
                &kernels.init_pipeline,
                &bind_group,
                workgroups,
            );
            encoder.copy_buffer_to_buffer(
                target,
                0,
                &self.buffers[roles.previous()],
                0,
                self.byte_size(),
            );
        })
        .map_err(initialization)?;
        ctx.wait_idle().map_err(initialization)
    }

    /// Encode one physics step: read `current`, write `previous`.
    pub fn encode_advance(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        kernels: &Kernels,
        workgroups: u32,
        roles: PingPong,
    ) {
        gpu::dispatch(
            encoder,
            "Update Compute Pass",
            &kernels.update_pipeline,
            &self.update_bind_groups[roles.current()],
            workgroups,
        );
    }

    pub fn buffer(&self, slot: usize) -> &wgpu::Buffer {
        &self.buffers[slot]
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn byte_size(&self) -> u64 {
        self.count as u64 * std::mem::size_of::<Particle>() as u64
    }

    /// Blocking readback of one slot
    pub fn read_slot(&self, ctx: &GpuContext, slot: usize) -> Result<Vec<Particle>> {
        gpu::read_buffer(ctx, &self.buffers[slot], self.count as usize)
    }
}

fn initialization(error: impl std::fmt::Display) -> SimulationError {
    SimulationError::Initialization(error.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_start_distinct() {
        let roles = PingPong::default();
        assert_ne!(roles.current(), roles.previous());
    }

    #[test]
    fn swap_exchanges_roles() {
        let mut roles = PingPong::default();
        let (current, previous) = (roles.current(), roles.previous());
        roles.swap();
        assert_eq!(roles.current(), previous);
        assert_eq!(roles.previous(), current);
    }

    #[test]
    fn double_swap_is_identity() {
        let original = PingPong::default();
        let mut roles = original;
        roles.swap();
        roles.swap();
        assert_eq!(roles, original);
    }

    #[test]
    fn current_tracks_last_written_slot() {
        // each step writes `previous` and then swaps
        let mut roles = PingPong::default();
        for _ in 0..7 {
            let written = roles.previous();
            roles.swap();
            assert_eq!(roles.current(), written);
        }
    }

    #[test]
    fn failed_frame_leaves_cursor_untouched() {
        let mut cursor = FrameCursor::default();
        let result = cursor.step(|_| Err(SimulationError::UpdateFailed("lost".into())));
        assert!(matches!(result, Err(SimulationError::UpdateFailed(_))));
        assert_eq!(cursor, FrameCursor::default());

        cursor.step(|_| Ok(())).unwrap();
        assert_eq!(cursor.frame(), 1);
        assert_eq!(cursor.roles().current(), PingPong::default().previous());
    }

    #[test]
    fn step_sees_roles_before_the_swap() {
        let mut cursor = FrameCursor::default();
        for _ in 0..5 {
            let before = cursor.roles();
            let mut seen = None;
            cursor
                .step(|roles| {
                    seen = Some(roles);
                    Ok(())
                })
                .unwrap();
            assert_eq!(seen, Some(before));
            assert_eq!(cursor.roles().current(), before.previous());
        }
        assert_eq!(cursor.frame(), 5);
    }

    #[test]
    fn initializer_follows_init_mode() {
        let mut config = SimulationConfig::default();
        assert!(matches!(
            Initializer::from_config(&config),
            Initializer::Procedural { seed: 42, .. }
        ));
        config.init_mode = InitMode::Device;
        config.seed = 9;
        assert_eq!(
            Initializer::from_config(&config),
            Initializer::OnDevice { seed: 9 }
        );
    }
}
