//! Compute device probing and selection
//!
//! Every adapter is reduced to an immutable [`DeviceProfile`] once at
//! startup. Capabilities are a pure function of that profile, and selection is
//! a pure function of the capabilities, so both are testable without a GPU.

use crate::config::{Precision, SimulationConfig};
use crate::error::{Result, SimulationError};
use crate::interop::InteropStrategy;

/// A device/queue pair and the adapter it came from
#[derive(Clone, Debug)]
pub struct GpuContext {
    pub adapter: wgpu::Adapter,
    pub info: wgpu::AdapterInfo,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
}

impl GpuContext {
    pub async fn request(
        adapter: &wgpu::Adapter,
        features: wgpu::Features,
        label: &str,
    ) -> Result<Self> {
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some(label),
                required_features: features,
                required_limits: wgpu::Limits::downlevel_defaults()
                    .using_resolution(adapter.limits()),
                memory_hints: wgpu::MemoryHints::default(),
                experimental_features: wgpu::ExperimentalFeatures::default(),
                trace: wgpu::Trace::Off,
            })
            .await?;

        Ok(Self {
            adapter: adapter.clone(),
            info: adapter.get_info(),
            device,
            queue,
        })
    }

    /// Block until every submission on this queue has finished
    pub fn wait_idle(&self) -> std::result::Result<(), wgpu::PollError> {
        self.device
            .poll(wgpu::PollType::Wait {
                submission_index: None,
                timeout: None,
            })
            .map(|_| ())
    }
}

/// What an adapter reports about itself
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceProfile {
    pub name: String,
    pub backend: wgpu::Backend,
    pub device_type: wgpu::DeviceType,
    pub features: wgpu::Features,
    pub downlevel: wgpu::DownlevelFlags,
    /// Whether this adapter can present to the display surface
    pub drives_display: bool,
}

impl DeviceProfile {
    /// Snapshot an adapter.
    ///
    /// Without a surface (headless runs) any adapter can host the offscreen
    /// display buffer.
    pub fn from_adapter(adapter: &wgpu::Adapter, surface: Option<&wgpu::Surface<'_>>) -> Self {
        let info = adapter.get_info();
        Self {
            name: info.name,
            backend: info.backend,
            device_type: info.device_type,
            features: adapter.features(),
            downlevel: adapter.get_downlevel_capabilities().flags,
            drives_display: surface.map_or(true, |s| adapter.is_surface_supported(s)),
        }
    }

    pub fn supports_compute(&self) -> bool {
        self.downlevel.contains(wgpu::DownlevelFlags::COMPUTE_SHADERS)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeviceCapabilities {
    /// Compute passes can write the buffer the display pipeline draws from
    pub shared_display_memory: bool,
    pub double_precision: bool,
}

impl DeviceCapabilities {
    pub fn probe(profile: &DeviceProfile) -> Self {
        Self {
            shared_display_memory: profile.drives_display && profile.supports_compute(),
            double_precision: profile.features.contains(wgpu::Features::SHADER_F64),
        }
    }

    /// Ordering key: shared display memory first, precision only breaks ties
    pub fn rank(&self) -> (bool, bool) {
        (self.shared_display_memory, self.double_precision)
    }
}

/// Candidate indices, most preferred first.
///
/// Stable: equal ranks keep enumeration order.
pub fn preference_order(candidates: &[DeviceCapabilities]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..candidates.len()).collect();
    order.sort_by_key(|&i| std::cmp::Reverse(candidates[i].rank()));
    order
}

/// Index of the device to run on
pub fn select_device(candidates: &[DeviceCapabilities]) -> Result<usize> {
    preference_order(candidates)
        .first()
        .copied()
        .ok_or(SimulationError::NoDeviceAvailable)
}

/// The devices a run uses, decided once at startup
#[derive(Debug)]
pub struct DeviceSetup {
    /// Device owning the display buffer and the render pipeline
    pub display: GpuContext,
    /// Device running the kernels; the same device as `display` for zero-copy
    pub compute: GpuContext,
    pub capabilities: DeviceCapabilities,
    pub strategy: InteropStrategy,
    /// `SHADER_F64` is enabled on the compute device and the kernels use it
    pub double_precision: bool,
}

impl DeviceSetup {
    /// Enumerate adapters, pick the compute device and open the device(s).
    pub async fn open(
        instance: &wgpu::Instance,
        surface: Option<&wgpu::Surface<'_>>,
        config: &SimulationConfig,
    ) -> Result<Self> {
        let mut candidates = Vec::new();
        for adapter in instance.enumerate_adapters(wgpu::Backends::all()) {
            let profile = DeviceProfile::from_adapter(&adapter, surface);
            if !profile.supports_compute() {
                log::debug!("Skipping {} ({:?}): no compute", profile.name, profile.backend);
                continue;
            }
            let capabilities = DeviceCapabilities::probe(&profile);
            log::debug!(
                "Candidate {} ({:?}, {:?}): {:?}",
                profile.name,
                profile.backend,
                profile.device_type,
                capabilities
            );
            candidates.push((adapter, profile, capabilities));
        }

        let scores: Vec<_> = candidates.iter().map(|(_, _, c)| *c).collect();
        let index = select_device(&scores)?;
        let (adapter, profile, capabilities) = candidates.swap_remove(index);

        let strategy = InteropStrategy::choose(capabilities, config.interop);
        let double_precision =
            config.precision == Precision::Double && capabilities.double_precision;
        if config.precision == Precision::Double && !double_precision {
            log::warn!("{} has no f64 support, accumulating in f32", profile.name);
        }
        let features = if double_precision {
            wgpu::Features::SHADER_F64
        } else {
            wgpu::Features::empty()
        };

        log::info!(
            "✓ Compute device: {} ({:?}), interop: {:?}",
            profile.name,
            profile.backend,
            strategy
        );

        let (display, compute) = match strategy {
            InteropStrategy::ZeroCopy => {
                let shared = GpuContext::request(&adapter, features, "Shared Device").await?;
                (shared.clone(), shared)
            }
            InteropStrategy::CopyFallback => {
                let compute = GpuContext::request(&adapter, features, "Compute Device").await?;
                let display_adapter = if profile.drives_display {
                    adapter
                } else {
                    instance
                        .request_adapter(&wgpu::RequestAdapterOptions {
                            power_preference: wgpu::PowerPreference::HighPerformance,
                            compatible_surface: surface,
                            force_fallback_adapter: false,
                        })
                        .await
                        .map_err(|_| SimulationError::NoDeviceAvailable)?
                };
                let display = GpuContext::request(
                    &display_adapter,
                    wgpu::Features::empty(),
                    "Display Device",
                )
                .await?;
                log::info!("✓ Display device: {}", display.info.name);
                (display, compute)
            }
        };

        Ok(Self {
            display,
            compute,
            capabilities,
            strategy,
            double_precision,
        })
    }
}
