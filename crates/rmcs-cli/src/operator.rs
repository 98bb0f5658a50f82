//! The remote-operator connection as seen from inside the car.
//!
//! The wire link itself lives outside this binary; what remains here is the
//! core-facing half: an identity-1 [`Connection`] that forwards what the
//! link decodes, gives control up on request, and mirrors sensor readings
//! and accepted control samples onto the status bus.

use rmcs_kernel::{Connection, Participant};
use rmcs_middleware::{SensorListener, StatusBus, StatusPayload, Topic};
use rmcs_types::{Channel, ConnectionId, ControlSample, HandoffTarget, RmcsError, SensorSample};
use tracing::{debug, info};

pub struct Operator {
    inner: Connection,
    status: StatusBus,
}

impl Operator {
    pub fn new(inner: Connection, status: StatusBus) -> Self {
        Self { inner, status }
    }

    pub fn connection(&self) -> &Connection {
        &self.inner
    }

    /// Publish a sample decoded from the link. Returns `Ok(false)` when the
    /// operator does not own the channel.
    pub fn publish(&self, sample: ControlSample) -> Result<bool, RmcsError> {
        let accepted = self.inner.publish(sample)?;
        if accepted {
            self.status
                .emit(Topic::Operator, self.inner.label(), StatusPayload::OperatorControl(sample));
        }
        Ok(accepted)
    }

    /// The link asked to give up control: every channel goes to the
    /// fallback owner.
    pub fn relinquish_all(&self) -> Result<(), RmcsError> {
        info!(connection = %self.inner.id(), "operator gives up control");
        for channel in Channel::ALL {
            self.inner.request_handoff(HandoffTarget::Fallback, channel)?;
        }
        Ok(())
    }
}

impl Participant for Operator {
    fn id(&self) -> ConnectionId {
        self.inner.id()
    }

    fn is_controller(&self) -> bool {
        false
    }

    fn apply_ownership(&self, channel: Channel, owner: ConnectionId) {
        let previous = self.inner.apply_ownership(channel, owner);
        if previous != owner {
            debug!(%channel, %previous, %owner, "operator sees new owner");
        }
    }
}

impl SensorListener for Operator {
    fn on_sensor(&self, sample: &SensorSample) -> Result<(), RmcsError> {
        self.status
            .emit(Topic::Sensors, self.inner.label(), StatusPayload::Sensor(*sample));
        Ok(())
    }
}
