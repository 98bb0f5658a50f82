//! Button-hold gestures.
//!
//! Each gesture owns its own press state and is advanced exactly once per
//! poll tick. A gesture completes on release, and only if the hold lasted
//! strictly longer than its threshold.

use std::time::{Duration, Instant};

use crate::input::{Button, PadState};

/// Press state of a single hold gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HoldGesture {
    #[default]
    Idle,
    PressedSince(Instant),
}

impl HoldGesture {
    /// Feed the current pressed state. Returns `true` on the tick the button
    /// is released after being held longer than `threshold`.
    pub fn advance(&mut self, pressed: bool, now: Instant, threshold: Duration) -> bool {
        match (*self, pressed) {
            (HoldGesture::Idle, true) => {
                *self = HoldGesture::PressedSince(now);
                false
            }
            (HoldGesture::PressedSince(since), false) => {
                *self = HoldGesture::Idle;
                now.saturating_duration_since(since) > threshold
            }
            _ => false,
        }
    }

    /// Abort a hold in progress.
    pub fn reset(&mut self) {
        *self = HoldGesture::Idle;
    }

    pub fn is_pressed(&self) -> bool {
        matches!(self, HoldGesture::PressedSince(_))
    }
}

/// Several buttons held together; completes when any one of them is let go.
#[derive(Debug, Clone)]
pub struct ComboGesture {
    buttons: Vec<Button>,
    hold: HoldGesture,
}

impl ComboGesture {
    pub fn new(buttons: &[Button]) -> Self {
        Self {
            buttons: buttons.to_vec(),
            hold: HoldGesture::Idle,
        }
    }

    /// The four-button "take or give back full control" combo.
    pub fn full_control() -> Self {
        Self::new(&[
            Button::LeftThumb,
            Button::RightThumb,
            Button::LeftUpperTrigger,
            Button::RightUpperTrigger,
        ])
    }

    pub fn advance(&mut self, state: &PadState, now: Instant, threshold: Duration) -> bool {
        let all = state.all_pressed(&self.buttons);
        match self.hold {
            HoldGesture::Idle => {
                if all {
                    self.hold = HoldGesture::PressedSince(now);
                }
                false
            }
            HoldGesture::PressedSince(_) => self.hold.advance(all, now, threshold),
        }
    }

    pub fn reset(&mut self) {
        self.hold.reset();
    }

    pub fn is_pressed(&self) -> bool {
        self.hold.is_pressed()
    }
}
