//! Pad input model.
//!
//! A [`PadSource`] is polled once per tick and yields a [`PadState`]:
//! which buttons are held and where the analog inputs sit. Mapping a
//! concrete controller's raw components onto this model happens inside the
//! source.

use std::collections::BTreeSet;

use rmcs_types::RmcsError;
use serde::{Deserialize, Serialize};

/// Logical buttons the control plane reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Button {
    Mode,
    Start,
    Select,
    LeftThumb,
    RightThumb,
    LeftUpperTrigger,
    RightUpperTrigger,
    LeftLowerTrigger,
    RightLowerTrigger,
    DpadUp,
    DpadDown,
    DpadLeft,
    DpadRight,
}

/// Snapshot of a pad at one poll tick.
///
/// Analog ranges: `steer`, `camera_x` and `camera_y` in `-1.0..=1.0`;
/// `throttle` and `brake` in `0.0..=1.0`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PadState {
    pressed: BTreeSet<Button>,
    pub steer: f32,
    pub throttle: f32,
    pub brake: f32,
    pub camera_x: f32,
    pub camera_y: f32,
}

impl PadState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`press`](Self::press).
    pub fn with(mut self, buttons: &[Button]) -> Self {
        for b in buttons {
            self.press(*b);
        }
        self
    }

    pub fn press(&mut self, button: Button) {
        self.pressed.insert(button);
    }

    pub fn release(&mut self, button: Button) {
        self.pressed.remove(&button);
    }

    pub fn is_pressed(&self, button: Button) -> bool {
        self.pressed.contains(&button)
    }

    pub fn all_pressed(&self, buttons: &[Button]) -> bool {
        buttons.iter().all(|b| self.is_pressed(*b))
    }

    /// `true` when `button` is down now but was not in `previous`.
    pub fn just_pressed(&self, previous: &PadState, button: Button) -> bool {
        self.is_pressed(button) && !previous.is_pressed(button)
    }
}

/// Seam in front of controller hardware.
pub trait PadSource: Send {
    fn name(&self) -> &str;

    /// Read the current state. An error means the controller is gone.
    fn poll(&mut self) -> Result<PadState, RmcsError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn press_edge_compares_against_previous_tick() {
        let before = PadState::new().with(&[Button::Start]);
        let after = PadState::new().with(&[Button::Select]);

        assert!(after.just_pressed(&before, Button::Select));
        assert!(!after.just_pressed(&before, Button::Mode));
        assert!(!before.just_pressed(&before, Button::Start));
    }

    #[test]
    fn all_pressed_requires_every_button() {
        let mut state = PadState::new().with(&[Button::LeftThumb, Button::RightThumb]);
        assert!(!state.all_pressed(&[Button::LeftThumb, Button::RightThumb, Button::Mode]));
        state.press(Button::Mode);
        assert!(state.all_pressed(&[Button::LeftThumb, Button::RightThumb, Button::Mode]));
        state.release(Button::LeftThumb);
        assert!(!state.is_pressed(Button::LeftThumb));
    }
}
