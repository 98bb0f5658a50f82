//! Gamepad handoff state machine.
//!
//! | Gesture | Precondition | Requests |
//! |---|---|---|
//! | hold Mode | – | Drive, Light, Camera → operator |
//! | hold Start | owns Drive | Drive, Light → own id + 1 |
//! | hold Select | owns Camera | Camera → own id + 1 |
//! | hold LThumb+RThumb+LUpper+RUpper | does not own Drive | Drive, Light → self; Camera → own id + 1 |
//! | same combo | owns Drive | Drive, Light, Camera → operator |
//!
//! Targets past the last controller are wrapped by the arbiter.

use std::time::{Duration, Instant};

use rmcs_types::{Channel, ConnectionId, HandoffRequest, OwnershipTable};
use tracing::info;

use crate::gesture::{ComboGesture, HoldGesture};
use crate::input::{Button, PadState};

/// Default hold time for the single-button gestures.
pub const HOLD_THRESHOLD: Duration = Duration::from_millis(500);
/// Default hold time for the four-button combo.
pub const COMBO_THRESHOLD: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone)]
pub struct HandoffStateMachine {
    id: ConnectionId,
    mode: HoldGesture,
    start: HoldGesture,
    select: HoldGesture,
    combo: ComboGesture,
    hold_threshold: Duration,
    combo_threshold: Duration,
}

impl HandoffStateMachine {
    pub fn new(id: ConnectionId) -> Self {
        Self::with_thresholds(id, HOLD_THRESHOLD, COMBO_THRESHOLD)
    }

    pub fn with_thresholds(id: ConnectionId, hold: Duration, combo: Duration) -> Self {
        Self {
            id,
            mode: HoldGesture::Idle,
            start: HoldGesture::Idle,
            select: HoldGesture::Idle,
            combo: ComboGesture::full_control(),
            hold_threshold: hold,
            combo_threshold: combo,
        }
    }

    /// Advance every gesture by one tick and return the requests raised.
    /// `ownership` is this pad's cached table.
    pub fn tick(&mut self, pad: &PadState, now: Instant, ownership: &OwnershipTable) -> Vec<HandoffRequest> {
        let me = self.id;
        let next = me.successor();
        let operator = ConnectionId::OPERATOR;
        let owns_drive = ownership.owns(me, Channel::Drive);
        let mut requests = Vec::new();

        if self.combo.advance(pad, now, self.combo_threshold) {
            if owns_drive {
                info!(connection = %me, "combo: returning full control to operator");
                requests.extend(Channel::ALL.map(|c| HandoffRequest::new(operator, c)));
            } else {
                info!(connection = %me, "combo: taking drive and light");
                requests.push(HandoffRequest::new(me, Channel::Drive));
                requests.push(HandoffRequest::new(me, Channel::Light));
                requests.push(HandoffRequest::new(next, Channel::Camera));
            }
        }

        if self.mode.advance(pad.is_pressed(Button::Mode), now, self.hold_threshold) {
            info!(connection = %me, "mode held: returning control to operator");
            requests.extend(Channel::ALL.map(|c| HandoffRequest::new(operator, c)));
        }

        if owns_drive {
            if self.start.advance(pad.is_pressed(Button::Start), now, self.hold_threshold) {
                info!(connection = %me, "start held: passing drive to next pad");
                requests.push(HandoffRequest::new(next, Channel::Drive));
                requests.push(HandoffRequest::new(next, Channel::Light));
            }
        } else {
            self.start.reset();
        }

        if ownership.owns(me, Channel::Camera) {
            if self.select.advance(pad.is_pressed(Button::Select), now, self.hold_threshold) {
                info!(connection = %me, "select held: passing camera to next pad");
                requests.push(HandoffRequest::new(next, Channel::Camera));
            }
        } else {
            self.select.reset();
        }

        requests
    }
}
