//! Headless device setup shared by the GPU tests

#![allow(dead_code)]

use nbody_simulation::{DeviceSetup, Simulation, SimulationConfig, SimulationError};
use nbody_physics::Particle;

/// Open a headless device, or `None` (with a note) when the machine has none
pub fn setup(config: &SimulationConfig) -> Option<DeviceSetup> {
    let _ = env_logger::builder().is_test(true).try_init();

    let instance = wgpu::Instance::default();
    match pollster::block_on(DeviceSetup::open(&instance, None, config)) {
        Ok(setup) => Some(setup),
        Err(e @ (SimulationError::NoDeviceAvailable | SimulationError::DeviceRequest(_))) => {
            eprintln!("skipping GPU test: {e}");
            None
        }
        Err(e) => panic!("device setup failed: {e}"),
    }
}

pub fn small_config(count: u32) -> SimulationConfig {
    SimulationConfig {
        particle_count: count,
        ..Default::default()
    }
}

pub fn simulation(config: &SimulationConfig) -> Option<Simulation> {
    let setup = setup(config)?;
    Some(pollster::block_on(Simulation::initialize(&setup, config)).expect("initialize"))
}

pub fn simulation_with(config: &SimulationConfig, particles: Vec<Particle>) -> Option<Simulation> {
    let setup = setup(config)?;
    Some(
        pollster::block_on(Simulation::initialize_with(&setup, config, particles))
            .expect("initialize"),
    )
}
