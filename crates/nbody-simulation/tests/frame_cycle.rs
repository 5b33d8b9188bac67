//! Frame ordering without a device
//!
//! Two host-side slots stand in for the particle buffers and the CPU
//! integrator stands in for the `update` kernel; the roles and frame counter
//! come from the same `FrameCursor` the engine drives.

use nbody_physics::{
    integrate, procedural_ensemble, total_mass, DisplayRecord, Particle, GRAVITATIONAL_CONSTANT,
    SOFTENING, TIME_STEP,
};
use nbody_simulation::{FrameCursor, SimulationError};

struct HostFrames {
    cursor: FrameCursor,
    slots: [Vec<Particle>; 2],
    display: Vec<DisplayRecord>,
}

impl HostFrames {
    fn new(particles: Vec<Particle>) -> Self {
        Self {
            cursor: FrameCursor::default(),
            display: vec![DisplayRecord::default(); particles.len()],
            slots: [particles.clone(), particles],
        }
    }

    fn current(&self) -> &[Particle] {
        &self.slots[self.cursor.roles().current()]
    }

    /// expose, physics, swap
    fn step(&mut self, fail_physics: bool) -> Result<(), SimulationError> {
        let Self {
            cursor,
            slots,
            display,
        } = self;
        cursor.step(|roles| {
            *display = slots[roles.current()]
                .iter()
                .map(Particle::to_display)
                .collect();

            if fail_physics {
                return Err(SimulationError::UpdateFailed("out of memory".into()));
            }
            slots[roles.previous()] = integrate(
                &slots[roles.current()],
                GRAVITATIONAL_CONSTANT,
                SOFTENING,
                TIME_STEP,
            );
            Ok(())
        })
    }
}

fn ensemble() -> Vec<Particle> {
    procedural_ensemble(48, 1.0, 0.05, 11)
}

#[test]
fn display_shows_state_current_at_frame_start() {
    let mut frames = HostFrames::new(ensemble());

    for _ in 0..6 {
        let before = frames.current().to_vec();
        frames.step(false).unwrap();

        let expected: Vec<DisplayRecord> = before.iter().map(Particle::to_display).collect();
        assert_eq!(frames.display, expected);
        assert_eq!(
            frames.current(),
            integrate(&before, GRAVITATIONAL_CONSTANT, SOFTENING, TIME_STEP).as_slice()
        );
    }
    assert_eq!(frames.cursor.frame(), 6);
}

#[test]
fn display_lags_the_state_by_one_frame() {
    let mut frames = HostFrames::new(ensemble());
    frames.step(false).unwrap();
    let after_first = frames.current().to_vec();
    frames.step(false).unwrap();

    let expected: Vec<DisplayRecord> = after_first.iter().map(Particle::to_display).collect();
    assert_eq!(frames.display, expected);
    assert_ne!(frames.current(), after_first.as_slice());
}

#[test]
fn masses_survive_every_frame() {
    let initial = ensemble();
    let mass = total_mass(&initial);
    let mut frames = HostFrames::new(initial.clone());

    for _ in 0..10 {
        frames.step(false).unwrap();
        for (p, q) in frames.current().iter().zip(&initial) {
            assert_eq!(p.mass, q.mass);
        }
        assert_eq!(total_mass(frames.current()), mass);
    }
}

#[test]
fn failed_physics_keeps_state_and_retries_cleanly() {
    let mut frames = HostFrames::new(ensemble());
    frames.step(false).unwrap();
    let settled = frames.current().to_vec();
    let cursor = frames.cursor;

    let result = frames.step(true);
    assert!(matches!(result, Err(SimulationError::UpdateFailed(_))));
    assert!(!result.unwrap_err().is_fatal());
    assert_eq!(frames.cursor, cursor);
    assert_eq!(frames.current(), settled.as_slice());

    frames.step(false).unwrap();
    assert_eq!(frames.cursor.frame(), 2);
    assert_eq!(frames.cursor.roles().current(), cursor.roles().previous());
    assert_eq!(
        frames.current(),
        integrate(&settled, GRAVITATIONAL_CONSTANT, SOFTENING, TIME_STEP).as_slice()
    );
}
