//! `rmcs-gamepad` – local game controllers as connections.
//!
//! # Modules
//!
//! - [`input`] – [`PadState`][input::PadState], the per-tick snapshot of
//!   buttons and axes, and the [`PadSource`][input::PadSource] seam the
//!   hardware polling sits behind.
//! - [`gesture`] – [`HoldGesture`][gesture::HoldGesture] and
//!   [`ComboGesture`][gesture::ComboGesture], explicit per-gesture press
//!   state advanced once per tick.
//! - [`handoff`] – [`HandoffStateMachine`][handoff::HandoffStateMachine]:
//!   turns completed gestures into handoff requests.
//! - [`drive`] – [`DriveModel`][drive::DriveModel]: gear, throttle, steering,
//!   light toggles and camera angles derived from the pad.
//! - [`connection`] – [`GamepadConnection`][connection::GamepadConnection]:
//!   a kernel connection that repairs dual Drive/Camera ownership.
//! - [`manager`] – [`GamepadManager`][manager::GamepadManager]: wires pads to
//!   identities and runs one poll thread per pad.
//! - [`sim`] – [`SimulatedPad`][sim::SimulatedPad], a pad driven from code.

pub mod connection;
pub mod drive;
pub mod gesture;
pub mod handoff;
pub mod input;
pub mod manager;
pub mod sim;

pub use connection::GamepadConnection;
pub use drive::DriveModel;
pub use gesture::{ComboGesture, HoldGesture};
pub use handoff::HandoffStateMachine;
pub use input::{Button, PadSource, PadState};
pub use manager::{GamepadManager, GamepadSettings};
pub use sim::{PadHandle, SimulatedPad};
