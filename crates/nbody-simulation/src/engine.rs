//! Frame loop driver: expose, physics step, role swap

use crate::config::SimulationConfig;
use crate::device::{DeviceCapabilities, DeviceSetup, GpuContext};
use crate::error::{Result, SimulationError};
use crate::gpu;
use crate::interop::{DisplayBuffer, InteropBridge, InteropStrategy};
use crate::kernel::{assemble, KernelDefines, KernelSource, Kernels};
use crate::params::SimulationParams;
use crate::state::{FrameCursor, Initializer, ParticleStore, PingPong};
use nbody_physics::{DisplayRecord, Particle};
use wgpu::util::DeviceExt;

/// Read-only handle on the display buffer for the renderer
#[derive(Clone, Copy)]
pub struct DisplayView<'a> {
    pub buffer: &'a wgpu::Buffer,
    /// Number of Display Records
    pub len: u32,
}

pub struct Simulation {
    compute: GpuContext,
    display_ctx: GpuContext,
    capabilities: DeviceCapabilities,

    kernels: Kernels,
    params: SimulationParams,
    params_buffer: wgpu::Buffer,

    store: ParticleStore,
    display: DisplayBuffer,
    bridge: InteropBridge,

    workgroups: u32,
    cursor: FrameCursor,
}

impl Simulation {
    /// Build the kernels and populate the ensemble as `config` describes
    pub async fn initialize(setup: &DeviceSetup, config: &SimulationConfig) -> Result<Self> {
        Self::build(setup, config, Initializer::from_config(config)).await
    }

    /// Start from a fixed list of particles; `config.particle_count` is ignored
    pub async fn initialize_with(
        setup: &DeviceSetup,
        config: &SimulationConfig,
        particles: Vec<Particle>,
    ) -> Result<Self> {
        let count = u32::try_from(particles.len())
            .map_err(|_| SimulationError::InvalidConfig("too many particles".into()))?;
        let config = SimulationConfig {
            particle_count: count,
            ..config.clone()
        };
        Self::build(setup, &config, Initializer::Explicit(particles)).await
    }

    async fn build(
        setup: &DeviceSetup,
        config: &SimulationConfig,
        initializer: Initializer,
    ) -> Result<Self> {
        config.validate()?;

        let body = KernelSource::from_config(config).load()?;
        let defines = KernelDefines::new(config, setup.strategy, setup.double_precision);
        let kernels = Kernels::build(&setup.compute.device, &assemble(&defines, &body)).await?;

        let params = SimulationParams::from(config);
        let params_buffer =
            setup
                .compute
                .device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("Simulation Params Buffer"),
                    contents: bytemuck::cast_slice(&[params]),
                    usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                });

        let workgroups = config.workgroup_count();
        let store = ParticleStore::initialize(
            &setup.compute,
            &kernels,
            &params_buffer,
            config.particle_count,
            workgroups,
            initializer,
        )?;

        let mut display = DisplayBuffer::new(&setup.display, store.count(), setup.strategy);
        let bridge = InteropBridge::new(
            &setup.compute,
            &kernels,
            &store,
            &mut display,
            setup.strategy,
        )?;

        log::info!(
            "✓ Simulation ready: {} particles, {} workgroups of {}",
            store.count(),
            workgroups,
            config.workgroup_size
        );

        Ok(Self {
            compute: setup.compute.clone(),
            display_ctx: setup.display.clone(),
            capabilities: setup.capabilities,
            kernels,
            params,
            params_buffer,
            store,
            display,
            bridge,
            workgroups,
            cursor: FrameCursor::default(),
        })
    }

    /// Advance one frame.
    ///
    /// On `UpdateFailed` the roles are not swapped and the frame counter is
    /// unchanged, so the call can be retried.
    pub fn step_frame(&mut self) -> Result<()> {
        let Self {
            compute,
            display_ctx,
            kernels,
            store,
            display,
            bridge,
            workgroups,
            cursor,
            ..
        } = self;
        let workgroups = *workgroups;

        cursor.step(|roles| {
            bridge.expose(
                compute,
                display_ctx,
                kernels,
                store,
                display,
                workgroups,
                roles,
            )?;

            gpu::submit_checked(compute, "Physics Encoder", |encoder| {
                store.encode_advance(encoder, kernels, workgroups, roles);
            })?;
            Ok(())
        })
    }

    /// The records written by the last `step_frame`
    pub fn display(&self) -> DisplayView<'_> {
        DisplayView {
            buffer: self.display.buffer(),
            len: self.display.len(),
        }
    }

    /// Blocking readback of the settled state
    pub fn read_state(&self) -> Result<Vec<Particle>> {
        self.store
            .read_slot(&self.compute, self.cursor.roles().current())
    }

    /// Blocking readback of the stale slot
    pub fn read_previous(&self) -> Result<Vec<Particle>> {
        self.store
            .read_slot(&self.compute, self.cursor.roles().previous())
    }

    /// Blocking readback of the display buffer
    pub fn read_display(&self) -> Result<Vec<DisplayRecord>> {
        gpu::read_buffer(
            &self.display_ctx,
            self.display.buffer(),
            self.display.len() as usize,
        )
    }

    pub fn set_params(&mut self, params: SimulationParams) {
        self.params = params;
        self.compute
            .queue
            .write_buffer(&self.params_buffer, 0, bytemuck::cast_slice(&[params]));
    }

    pub fn params(&self) -> SimulationParams {
        self.params
    }

    /// Frames completed since initialization
    pub fn frame(&self) -> u64 {
        self.cursor.frame()
    }

    pub fn particle_count(&self) -> u32 {
        self.store.count()
    }

    pub fn strategy(&self) -> InteropStrategy {
        self.bridge.strategy()
    }

    pub fn capabilities(&self) -> DeviceCapabilities {
        self.capabilities
    }

    pub fn roles(&self) -> PingPong {
        self.cursor.roles()
    }

    /// Drain both queues and release the display registration
    pub fn shutdown(mut self) {
        if let Err(e) = self.compute.wait_idle() {
            log::warn!("Compute queue did not drain: {}", e);
        }
        if let Err(e) = self.display_ctx.wait_idle() {
            log::warn!("Display queue did not drain: {}", e);
        }
        self.display.unregister();
        log::info!("Simulation stopped after {} frames", self.cursor.frame());
    }
}
