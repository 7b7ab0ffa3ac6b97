//! Pointer input sources.
//!
//! The pipeline asks its [`InputSource`] for one [`PointerSample`] per frame.
//! [`DeviceInput`] replays events pushed by the host through a
//! [`DeviceHandle`]; [`ScriptedInput`] generates a deterministic pointer path
//! for headless runs and tests.

use std::f32::consts::TAU;
use std::sync::{Arc, Mutex};

use glam::Vec2;
use stam_kernel::{FieldSize, PointerSample};

use crate::config::InputConfig;

/// Source of one pointer sample per frame.
pub trait InputSource {
    /// Pointer reading for `frame`, `dt` seconds after the previous one.
    fn sample(&mut self, frame: u32, dt: f32, resolution: FieldSize) -> PointerSample;
}

// ---------------------------------------------------------------------------
// Device input
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct DeviceState {
    position: Vec2,
    sampled: Option<Vec2>,
    pressed: bool,
}

/// Host-side handle for feeding pointer events.
#[derive(Debug, Clone)]
pub struct DeviceHandle {
    state: Arc<Mutex<DeviceState>>,
}

impl DeviceHandle {
    /// Pointer moved to `position`, in grid pixels.
    pub fn pointer_moved(&self, position: Vec2) {
        if let Ok(mut state) = self.state.lock() {
            state.position = position;
        }
    }

    /// Primary button pressed or released.
    pub fn button(&self, pressed: bool) {
        if let Ok(mut state) = self.state.lock() {
            state.pressed = pressed;
        }
    }
}

/// Pointer driven by host events.
#[derive(Debug)]
pub struct DeviceInput {
    state: Arc<Mutex<DeviceState>>,
}

impl DeviceInput {
    /// Input source plus the handle the host uses to feed it.
    pub fn channel() -> (Self, DeviceHandle) {
        let state = Arc::new(Mutex::new(DeviceState::default()));
        (
            Self {
                state: Arc::clone(&state),
            },
            DeviceHandle { state },
        )
    }
}

impl InputSource for DeviceInput {
    fn sample(&mut self, _frame: u32, _dt: f32, _resolution: FieldSize) -> PointerSample {
        let Ok(mut state) = self.state.lock() else {
            return PointerSample::default();
        };
        let position = state.position;
        let motion = state.sampled.map_or(Vec2::ZERO, |prev| position - prev);
        state.sampled = Some(position);
        PointerSample {
            position,
            motion,
            active: state.pressed,
        }
    }
}

// ---------------------------------------------------------------------------
// Scripted input
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum Script {
    Orbit {
        radius: f32,
        period: f32,
        active: bool,
        angle: f32,
        previous: Option<Vec2>,
    },
    Keyframes(Vec<PointerSample>),
}

/// Deterministic pointer path.
#[derive(Debug, Clone)]
pub struct ScriptedInput {
    script: Script,
}

impl ScriptedInput {
    /// Pointer circling the grid centre at `radius` (fraction of the grid
    /// height), one revolution per `period` seconds.
    pub fn orbit(radius: f32, period: f32, active: bool) -> Self {
        Self {
            script: Script::Orbit {
                radius,
                period,
                active,
                angle: 0.0,
                previous: None,
            },
        }
    }

    /// Replay `samples` verbatim: frame `n` gets `samples[n - 1]`. Frames past
    /// the end hold the last position with the pointer released.
    pub fn keyframes(samples: Vec<PointerSample>) -> Self {
        Self {
            script: Script::Keyframes(samples),
        }
    }

    /// Pointer that never presses.
    pub fn idle() -> Self {
        Self::keyframes(Vec::new())
    }
}

impl InputSource for ScriptedInput {
    fn sample(&mut self, frame: u32, dt: f32, resolution: FieldSize) -> PointerSample {
        match &mut self.script {
            Script::Orbit {
                radius,
                period,
                active,
                angle,
                previous,
            } => {
                *angle = (*angle + dt * TAU / *period) % TAU;
                let centre = resolution.as_vec2() * 0.5;
                let position = centre + Vec2::from_angle(*angle) * (*radius * resolution.height as f32);
                let motion = previous.map_or(Vec2::ZERO, |p| position - p);
                *previous = Some(position);
                PointerSample {
                    position,
                    motion,
                    active: *active,
                }
            }
            Script::Keyframes(samples) => {
                let index = frame.saturating_sub(1) as usize;
                match samples.get(index) {
                    Some(sample) => *sample,
                    None => PointerSample {
                        position: samples.last().map_or(Vec2::ZERO, |s| s.position),
                        motion: Vec2::ZERO,
                        active: false,
                    },
                }
            }
        }
    }
}

/// Build the input source described by `config`. Device input also returns
/// the handle for feeding events.
pub fn from_config(config: &InputConfig) -> (Box<dyn InputSource>, Option<DeviceHandle>) {
    match *config {
        InputConfig::Device => {
            let (input, handle) = DeviceInput::channel();
            (Box::new(input), Some(handle))
        }
        InputConfig::Scripted {
            orbit_radius,
            orbit_period,
            active,
        } => (
            Box::new(ScriptedInput::orbit(orbit_radius, orbit_period, active)),
            None,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> FieldSize {
        FieldSize::square(100).unwrap()
    }

    #[test]
    fn device_motion_is_delta_between_samples() {
        let (mut input, handle) = DeviceInput::channel();
        handle.pointer_moved(Vec2::new(10.0, 10.0));
        let first = input.sample(1, 0.016, grid());
        assert_eq!(first.motion, Vec2::ZERO);
        assert!(!first.active);

        handle.button(true);
        handle.pointer_moved(Vec2::new(13.0, 6.0));
        let second = input.sample(2, 0.016, grid());
        assert_eq!(second.position, Vec2::new(13.0, 6.0));
        assert_eq!(second.motion, Vec2::new(3.0, -4.0));
        assert!(second.active);

        let still = input.sample(3, 0.016, grid());
        assert_eq!(still.motion, Vec2::ZERO);
    }

    #[test]
    fn orbit_stays_on_circle() {
        let mut input = ScriptedInput::orbit(0.25, 2.0, true);
        for frame in 1..=120 {
            let s = input.sample(frame, 1.0 / 60.0, grid());
            let r = (s.position - Vec2::splat(50.0)).length();
            assert!((r - 25.0).abs() < 1e-3, "frame {frame}: r = {r}");
            assert!(s.active);
        }
    }

    #[test]
    fn orbit_motion_matches_position_change() {
        let mut input = ScriptedInput::orbit(0.25, 4.0, false);
        let a = input.sample(1, 0.1, grid());
        let b = input.sample(2, 0.1, grid());
        assert!((b.motion - (b.position - a.position)).length() < 1e-5);
        assert!(!b.active);
    }

    #[test]
    fn keyframes_then_release() {
        let press = PointerSample {
            position: Vec2::new(5.0, 5.0),
            motion: Vec2::new(1.0, 0.0),
            active: true,
        };
        let mut input = ScriptedInput::keyframes(vec![press]);
        assert_eq!(input.sample(1, 0.016, grid()), press);
        let after = input.sample(2, 0.016, grid());
        assert!(!after.active);
        assert_eq!(after.position, press.position);
        assert_eq!(after.motion, Vec2::ZERO);
    }
}
