//! `rmcs-middleware` – plumbing shared by every thread of the control plane.
//!
//! | Module | Purpose |
//! |---|---|
//! | [`mailbox`] | Coalescing per-kind queue with a blocking `take` |
//! | [`handoff`] | Single-consumer channel of ownership handoff requests |
//! | [`shutdown`] | Process-wide stop signal that wakes every blocked loop |
//! | [`bus`] | Topic-based broadcast of status events for the console |
//! | [`dispatch`] | Routing of inbound payloads to sinks and sensor listeners |

pub mod bus;
pub mod dispatch;
pub mod handoff;
pub mod mailbox;
pub mod shutdown;

pub use bus::{GamepadStatus, StatusBus, StatusEvent, StatusPayload, Topic, TopicReceiver};
pub use dispatch::{ControlSink, Dispatcher, ListenerRegistry, SensorInterest, SensorListener};
pub use handoff::{HandoffReceiver, HandoffSender, handoff_channel};
pub use mailbox::{Keyed, Mailbox};
pub use shutdown::{Interruptible, Shutdown};
