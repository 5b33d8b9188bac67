//! Kernel source assembly and pipeline construction
//!
//! WGSL has no preprocessor, so feature toggles are emitted as module-scope
//! `const` declarations (and one type `alias`) ahead of the fixed physics body.

use crate::config::SimulationConfig;
use crate::error::{Result, SimulationError};
use crate::interop::InteropStrategy;
use std::borrow::Cow;
use std::fmt::Write;
use std::path::PathBuf;

/// Physics body shipped with the crate
pub const EMBEDDED_SOURCE: &str = include_str!("shaders/nbody.wgsl");

/// Where the fixed physics body comes from
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum KernelSource {
    #[default]
    Embedded,
    File(PathBuf),
}

impl KernelSource {
    pub fn from_config(config: &SimulationConfig) -> Self {
        match &config.kernel_path {
            Some(path) => Self::File(path.clone()),
            None => Self::Embedded,
        }
    }

    pub fn load(&self) -> Result<Cow<'static, str>> {
        match self {
            Self::Embedded => Ok(Cow::Borrowed(EMBEDDED_SOURCE)),
            Self::File(path) => std::fs::read_to_string(path)
                .map(Cow::Owned)
                .map_err(|source| SimulationError::SourceUnavailable {
                    path: path.clone(),
                    source,
                }),
        }
    }
}

/// Values baked into the program ahead of the physics body
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KernelDefines {
    pub particle_count: u32,
    pub initial_radius: f32,
    pub workgroup_size: u32,
    pub shared_display_memory: bool,
    pub double_precision: bool,
}

impl KernelDefines {
    pub fn new(
        config: &SimulationConfig,
        strategy: InteropStrategy,
        double_precision: bool,
    ) -> Self {
        Self {
            particle_count: config.particle_count,
            initial_radius: config.initial_radius,
            workgroup_size: config.workgroup_size,
            shared_display_memory: strategy == InteropStrategy::ZeroCopy,
            double_precision,
        }
    }
}

/// Definitions followed by `body`. Identical inputs give identical output.
pub fn assemble(defines: &KernelDefines, body: &str) -> String {
    let mut source = String::with_capacity(body.len() + 256);

    // `{:?}` keeps a decimal point or exponent so the literal stays a float
    let _ = writeln!(
        source,
        "const USE_SHARED_DISPLAY_MEMORY: u32 = {}u;",
        defines.shared_display_memory as u32
    );
    let _ = writeln!(
        source,
        "const ENABLE_DOUBLE_PRECISION: u32 = {}u;",
        defines.double_precision as u32
    );
    let _ = writeln!(
        source,
        "alias accum = {};",
        if defines.double_precision { "f64" } else { "f32" }
    );
    let _ = writeln!(source, "const PARTICLE_COUNT: u32 = {}u;", defines.particle_count);
    let _ = writeln!(source, "const INITIAL_RADIUS: f32 = {:?};", defines.initial_radius);
    let _ = writeln!(source, "const WORKGROUP_SIZE: u32 = {}u;", defines.workgroup_size);
    source.push('\n');
    source.push_str(body);
    source
}

fn uniform_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn storage_entry(binding: u32, read_only: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

/// Compiled compute pipelines and the layouts their bind groups follow
pub struct Kernels {
    pub init_layout: wgpu::BindGroupLayout,
    pub update_layout: wgpu::BindGroupLayout,
    pub pack_layout: wgpu::BindGroupLayout,

    pub init_pipeline: wgpu::ComputePipeline,
    pub update_pipeline: wgpu::ComputePipeline,
    pub pack_pipeline: wgpu::ComputePipeline,
}

impl Kernels {
    /// Compile `source` on `device`.
    ///
    /// Any validation error while creating the module or its pipelines is
    /// reported as `KernelBuildFailed` with the compiler messages attached.
    pub async fn build(device: &wgpu::Device, source: &str) -> Result<Self> {
        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("N-body Compute Shader"),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });

        // 0: params, 5: random scalars, 6: particles out
        let init_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Init Bind Group Layout"),
            entries: &[
                uniform_entry(0),
                storage_entry(5, true),
                storage_entry(6, false),
            ],
        });

        // 0: params, 1: settled state, 2: next state
        let update_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Update Bind Group Layout"),
            entries: &[
                uniform_entry(0),
                storage_entry(1, true),
                storage_entry(2, false),
            ],
        });

        // 3: settled state, 4: display records
        let pack_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Pack Bind Group Layout"),
            entries: &[storage_entry(3, true), storage_entry(4, false)],
        });

        let pipeline = |label: &str, layout: &wgpu::BindGroupLayout, entry_point: &str| {
            let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(label),
                bind_group_layouts: &[layout],
                push_constant_ranges: &[],
            });
            device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(label),
                layout: Some(&pipeline_layout),
                module: &module,
                entry_point: Some(entry_point),
                compilation_options: Default::default(),
                cache: None,
            })
        };

        let init_pipeline = pipeline("Init Pipeline", &init_layout, "init_data");
        let update_pipeline = pipeline("Update Pipeline", &update_layout, "update");
        let pack_pipeline = pipeline("Pack Pipeline", &pack_layout, "pack");

        let compilation = module.get_compilation_info().await;
        if let Some(error) = device.pop_error_scope().await {
            let mut diagnostics = String::new();
            for message in &compilation.messages {
                match &message.location {
                    Some(at) => {
                        let _ = writeln!(
                            diagnostics,
                            "{:?} at {}:{}: {}",
                            message.message_type,
                            at.line_number,
                            at.line_position,
                            message.message
                        );
                    }
                    None => {
                        let _ = writeln!(
                            diagnostics,
                            "{:?}: {}",
                            message.message_type, message.message
                        );
                    }
                }
            }
            diagnostics.push_str(&error.to_string());
            return Err(SimulationError::KernelBuildFailed(diagnostics));
        }

        log::info!("✓ Kernels built");

        Ok(Self {
            init_layout,
            update_layout,
            pack_layout,
            init_pipeline,
            update_pipeline,
            pack_pipeline,
        })
    }
}
