//! `rmcs-hal` – the actuation side of the control plane.
//!
//! | Module | Provides |
//! |---|---|
//! | [`actuator`] | [`Actuator`][actuator::Actuator], the seam real drivers implement |
//! | [`component`] | [`ControlComponent`][component::ControlComponent], a dispatch sink with its own queue and driver thread |
//! | [`sim`] | [`SimActuator`][sim::SimActuator] and [`SensorBoard`][sim::SensorBoard] for running without hardware |

pub mod actuator;
pub mod component;
pub mod sim;

pub use actuator::Actuator;
pub use component::ControlComponent;
pub use sim::{AppliedLog, SensorBoard, SimActuator};
