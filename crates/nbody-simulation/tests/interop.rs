//! Both interop strategies on a real device

mod common;

use common::{setup, simulation, small_config};
use nbody_simulation::{InteropPreference, InteropStrategy, Simulation, SimulationConfig};

fn run(config: &SimulationConfig, frames: usize) -> Option<Vec<nbody_physics::DisplayRecord>> {
    let mut sim = simulation(config)?;
    for _ in 0..frames {
        sim.step_frame().unwrap();
    }
    let records = sim.read_display().unwrap();
    sim.shutdown();
    Some(records)
}

#[test]
fn forced_fallback_is_honoured() {
    let config = SimulationConfig {
        interop: InteropPreference::CopyFallback,
        ..small_config(64)
    };
    let Some(setup) = setup(&config) else {
        return;
    };
    assert_eq!(setup.strategy, InteropStrategy::CopyFallback);

    let sim = pollster::block_on(Simulation::initialize(&setup, &config)).unwrap();
    assert_eq!(sim.strategy(), InteropStrategy::CopyFallback);
}

#[test]
fn strategies_produce_identical_records() {
    let auto = small_config(512);
    let fallback = SimulationConfig {
        interop: InteropPreference::CopyFallback,
        ..auto.clone()
    };

    let Some(a) = run(&auto, 4) else {
        return;
    };
    let Some(b) = run(&fallback, 4) else {
        return;
    };
    assert_eq!(a, b);
}

#[test]
fn fallback_display_matches_settled_state() {
    let config = SimulationConfig {
        interop: InteropPreference::CopyFallback,
        ..small_config(200)
    };
    let Some(mut sim) = simulation(&config) else {
        return;
    };
    let settled = sim.read_state().unwrap();
    sim.step_frame().unwrap();
    let records = sim.read_display().unwrap();
    let expected: Vec<_> = settled.iter().map(|p| p.to_display()).collect();
    assert_eq!(records, expected);
}
