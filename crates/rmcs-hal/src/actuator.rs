//! Generic `Actuator` trait for the hardware that finally applies control
//! samples: the motor controller, the light board, the camera gimbal.
//!
//! Drivers are handed to a [`ControlComponent`][crate::component::ControlComponent],
//! which owns the thread that calls them. The rest of the control plane only
//! ever talks to the component.

use rmcs_types::{ControlSample, RmcsError};

/// A driver for one or more actuation channels.
pub trait Actuator: Send {
    /// Stable identifier, e.g. `"motor-board"`.
    fn id(&self) -> &str;

    /// Apply one control sample.
    ///
    /// # Errors
    ///
    /// Returns [`RmcsError::HardwareFault`] if the hardware rejected the
    /// command. The caller logs it and keeps going with the next sample.
    fn apply(&mut self, sample: &ControlSample) -> Result<(), RmcsError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rmcs_types::{CameraSample, Channel};

    struct MockGimbal {
        yaw: i32,
        pitch: i32,
    }

    impl Actuator for MockGimbal {
        fn id(&self) -> &str {
            "gimbal"
        }

        fn apply(&mut self, sample: &ControlSample) -> Result<(), RmcsError> {
            match sample {
                ControlSample::Camera(c) => {
                    self.yaw = c.yaw();
                    self.pitch = c.pitch();
                    Ok(())
                }
                other => Err(RmcsError::HardwareFault {
                    component: self.id().to_string(),
                    details: format!("cannot apply {} sample", other.channel()),
                }),
            }
        }
    }

    #[test]
    fn mock_gimbal_applies_camera_and_rejects_the_rest() {
        let mut gimbal = MockGimbal { yaw: 0, pitch: 0 };
        gimbal.apply(&ControlSample::Camera(CameraSample::new(30, -200))).unwrap();
        assert_eq!((gimbal.yaw, gimbal.pitch), (30, -127));

        let err = gimbal
            .apply(&ControlSample::Light(Default::default()))
            .unwrap_err();
        assert!(matches!(err, RmcsError::HardwareFault { ref component, .. } if component == "gimbal"));
        assert_eq!(ControlSample::Camera(CameraSample::new(0, 0)).channel(), Channel::Camera);
    }
}
