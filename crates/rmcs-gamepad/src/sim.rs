//! A pad driven from code instead of hardware.
//!
//! [`SimulatedPad`] is the [`PadSource`] half; [`PadHandle`] is the cloneable
//! remote used to press buttons and move sticks from tests or from the
//! binary's `--sim-gamepads` mode.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use rmcs_types::RmcsError;

use crate::input::{Button, PadSource, PadState};

struct Shared {
    state: Mutex<PadState>,
    unplugged: AtomicBool,
}

pub struct SimulatedPad {
    name: String,
    shared: Arc<Shared>,
}

/// Remote control for a [`SimulatedPad`].
#[derive(Clone)]
pub struct PadHandle {
    shared: Arc<Shared>,
}

impl SimulatedPad {
    pub fn new(name: impl Into<String>) -> (Self, PadHandle) {
        let shared = Arc::new(Shared {
            state: Mutex::new(PadState::new()),
            unplugged: AtomicBool::new(false),
        });
        (
            Self {
                name: name.into(),
                shared: shared.clone(),
            },
            PadHandle { shared },
        )
    }
}

impl PadSource for SimulatedPad {
    fn name(&self) -> &str {
        &self.name
    }

    fn poll(&mut self) -> Result<PadState, RmcsError> {
        if self.shared.unplugged.load(Ordering::Acquire) {
            return Err(RmcsError::HardwareFault {
                component: self.name.clone(),
                details: "controller unplugged".to_string(),
            });
        }
        Ok(self
            .shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }
}

impl PadHandle {
    fn update(&self, f: impl FnOnce(&mut PadState)) {
        f(&mut self.shared.state.lock().unwrap_or_else(PoisonError::into_inner));
    }

    pub fn press(&self, button: Button) {
        self.update(|s| s.press(button));
    }

    pub fn release(&self, button: Button) {
        self.update(|s| s.release(button));
    }

    pub fn set_drive(&self, throttle: f32, brake: f32, steer: f32) {
        self.update(|s| {
            s.throttle = throttle;
            s.brake = brake;
            s.steer = steer;
        });
    }

    pub fn set_camera(&self, x: f32, y: f32) {
        self.update(|s| {
            s.camera_x = x;
            s.camera_y = y;
        });
    }

    /// Make every later poll fail.
    pub fn unplug(&self) {
        self.shared.unplugged.store(true, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle_changes_are_visible_on_next_poll() {
        let (mut pad, handle) = SimulatedPad::new("sim-0");
        assert!(!pad.poll().unwrap().is_pressed(Button::Mode));

        handle.press(Button::Mode);
        handle.set_drive(0.5, 0.0, -0.2);
        let state = pad.poll().unwrap();
        assert!(state.is_pressed(Button::Mode));
        assert_eq!(state.throttle, 0.5);
        assert_eq!(state.steer, -0.2);
    }

    #[test]
    fn unplugged_pad_reports_hardware_fault() {
        let (mut pad, handle) = SimulatedPad::new("sim-1");
        handle.unplug();
        assert!(matches!(pad.poll(), Err(RmcsError::HardwareFault { .. })));
        assert_eq!(pad.name(), "sim-1");
    }
}
