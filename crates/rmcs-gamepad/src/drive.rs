//! Pad state to control samples.
//!
//! * gear `1..=5`, up/down on the lower triggers,
//! * acceleration `(throttle * 20 - brake * 40) * gear`, clamped to ±100,
//! * steering with a 0.04 dead zone, then `(x - 0.03) * 1.0309 * 100`,
//!   sent mirrored to the hardware,
//! * brake light on whenever acceleration `<= 0`,
//! * front/back/dynamic lights toggled on D-pad up/down/right,
//! * turn signals fired once per upper-trigger press,
//! * camera yaw/pitch from the right stick scaled to ±127.

use rmcs_types::{CameraSample, ControlSample, DriveSample, LightSample};

use crate::input::{Button, PadState};

pub const MIN_GEAR: u8 = 1;
pub const MAX_GEAR: u8 = 5;
const ACCELERATION_LIMIT: i32 = 100;
const STEER_DEAD_ZONE: f32 = 0.04;

fn acceleration(throttle: f32, brake: f32, gear: u8) -> i32 {
    let raw = (throttle.clamp(0.0, 1.0) * 20.0 - brake.clamp(0.0, 1.0) * 40.0) * f32::from(gear);
    (raw as i32).clamp(-ACCELERATION_LIMIT, ACCELERATION_LIMIT)
}

fn steering(x: f32) -> i32 {
    if x.abs() < STEER_DEAD_ZONE {
        return 0;
    }
    ((x - 0.03) * 1.0309 * 100.0) as i32
}

fn camera_axis(v: f32) -> i32 {
    (v.clamp(-1.0, 1.0) * 127.0) as i32
}

/// Per-pad driving state, updated once per tick.
#[derive(Debug, Clone)]
pub struct DriveModel {
    gear: u8,
    acceleration: i32,
    steering: i32,
    front: bool,
    back: bool,
    dynamic: bool,
    brake: bool,
    left_turn: bool,
    right_turn: bool,
    yaw: i32,
    pitch: i32,
    drive_dirty: bool,
    light_dirty: bool,
    camera_dirty: bool,
}

impl Default for DriveModel {
    fn default() -> Self {
        Self {
            gear: MIN_GEAR,
            acceleration: 0,
            steering: 0,
            front: false,
            back: false,
            dynamic: false,
            brake: true,
            left_turn: false,
            right_turn: false,
            yaw: 0,
            pitch: 0,
            drive_dirty: true,
            light_dirty: true,
            camera_dirty: true,
        }
    }
}

impl DriveModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gear(&self) -> u8 {
        self.gear
    }

    pub fn acceleration(&self) -> i32 {
        self.acceleration
    }

    pub fn steering(&self) -> i32 {
        self.steering
    }

    pub fn camera(&self) -> (i32, i32) {
        (self.yaw, self.pitch)
    }

    /// Apply one tick of input. `previous` is the state of the last tick,
    /// used for edge detection.
    pub fn update(&mut self, pad: &PadState, previous: &PadState) {
        if pad.just_pressed(previous, Button::RightLowerTrigger) && self.gear < MAX_GEAR {
            self.gear += 1;
        }
        if pad.just_pressed(previous, Button::LeftLowerTrigger) && self.gear > MIN_GEAR {
            self.gear -= 1;
        }

        let acceleration = acceleration(pad.throttle, pad.brake, self.gear);
        let steering = steering(pad.steer);
        if acceleration != self.acceleration || steering != self.steering {
            self.acceleration = acceleration;
            self.steering = steering;
            self.drive_dirty = true;
        }

        let brake = self.acceleration <= 0;
        if brake != self.brake {
            self.brake = brake;
            self.light_dirty = true;
        }
        if pad.just_pressed(previous, Button::DpadUp) {
            self.front = !self.front;
            self.light_dirty = true;
        }
        if pad.just_pressed(previous, Button::DpadDown) {
            self.back = !self.back;
            self.light_dirty = true;
        }
        if pad.just_pressed(previous, Button::DpadRight) {
            self.dynamic = !self.dynamic;
            self.light_dirty = true;
        }
        if pad.just_pressed(previous, Button::LeftUpperTrigger) {
            self.left_turn = true;
            self.light_dirty = true;
        }
        if pad.just_pressed(previous, Button::RightUpperTrigger) {
            self.right_turn = true;
            self.light_dirty = true;
        }

        let yaw = camera_axis(pad.camera_x);
        let pitch = camera_axis(pad.camera_y);
        if (yaw, pitch) != (self.yaw, self.pitch) {
            self.yaw = yaw;
            self.pitch = pitch;
            self.camera_dirty = true;
        }
    }

    /// Force every channel to be re-sent, e.g. after gaining ownership.
    pub fn mark_dirty(&mut self) {
        self.drive_dirty = true;
        self.light_dirty = true;
        self.camera_dirty = true;
    }

    /// Samples for every channel that changed since the last call. Turn
    /// signals are consumed by the light sample that carries them.
    pub fn take_changed(&mut self) -> Vec<ControlSample> {
        let mut out = Vec::new();
        if std::mem::take(&mut self.drive_dirty) {
            out.push(ControlSample::Drive(DriveSample::new(
                self.acceleration,
                -self.steering,
                false,
            )));
        }
        if std::mem::take(&mut self.light_dirty) {
            out.push(ControlSample::Light(LightSample {
                front: self.front,
                back: self.back || self.brake,
                dynamic: self.dynamic,
                left_turn: std::mem::take(&mut self.left_turn),
                right_turn: std::mem::take(&mut self.right_turn),
            }));
        }
        if std::mem::take(&mut self.camera_dirty) {
            out.push(ControlSample::Camera(CameraSample::new(self.yaw, self.pitch)));
        }
        out
    }
}
