//! [`ControlComponent`] – a dispatch sink with its own coalescing queue.
//!
//! The dispatch thread only ever calls [`ControlSink::accept`], which puts
//! the sample into the component's [`Mailbox`] and returns. A dedicated
//! driver thread takes samples out and hands them to the [`Actuator`], so a
//! slow actuator delays only its own channels, and while it is busy newer
//! samples replace older ones of the same channel.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use rmcs_middleware::{ControlSink, Mailbox, Shutdown};
use rmcs_types::{Channel, ControlSample, RmcsError};
use tracing::{debug, info, trace, warn};

use crate::actuator::Actuator;

pub struct ControlComponent {
    name: String,
    channels: Vec<Channel>,
    queue: Arc<Mailbox<ControlSample>>,
}

impl ControlComponent {
    pub fn new(name: impl Into<String>, channels: &[Channel]) -> Self {
        let mut owned: Vec<Channel> = Vec::with_capacity(channels.len());
        for c in channels {
            if !owned.contains(c) {
                owned.push(*c);
            }
        }
        Self {
            name: name.into(),
            channels: owned,
            queue: Arc::new(Mailbox::new()),
        }
    }

    pub fn queue(&self) -> &Arc<Mailbox<ControlSample>> {
        &self.queue
    }

    /// Feed queued samples to `actuator` until the queue is interrupted.
    pub fn drive(&self, actuator: &mut dyn Actuator) {
        info!(component = %self.name, actuator = actuator.id(), "driver started");
        while let Ok(sample) = self.queue.take() {
            trace!(component = %self.name, channel = ?sample.channel(), "applying sample");
            if let Err(e) = actuator.apply(&sample) {
                warn!(component = %self.name, error = %e, "actuator rejected sample");
            }
        }
        debug!(component = %self.name, "driver stopped");
    }

    /// Run [`drive`][Self::drive] on a named thread. The queue is registered
    /// with `shutdown` so triggering it ends the thread.
    pub fn spawn(
        self: &Arc<Self>,
        mut actuator: Box<dyn Actuator>,
        shutdown: &Shutdown,
    ) -> std::io::Result<JoinHandle<()>> {
        shutdown.watch(self.queue.clone());
        let component = Arc::clone(self);
        thread::Builder::new()
            .name(format!("rmcs-driver-{}", self.name))
            .spawn(move || component.drive(actuator.as_mut()))
    }
}

impl ControlSink for ControlComponent {
    fn name(&self) -> &str {
        &self.name
    }

    fn channels(&self) -> Vec<Channel> {
        self.channels.clone()
    }

    fn accept(&self, sample: ControlSample) -> Result<(), RmcsError> {
        if !self.channels.contains(&sample.channel()) {
            return Err(RmcsError::NotRegistered(format!(
                "{} does not handle {}",
                self.name,
                sample.channel()
            )));
        }
        self.queue.put(sample)
    }
}
