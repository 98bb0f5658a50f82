//! [`Connection`] – identity, ownership cache and the two primitives every
//! input source uses.
//!
//! | Primitive | Effect |
//! |---|---|
//! | [`Connection::may_publish`] | `true` iff the cache names this connection as owner |
//! | [`Connection::publish`] | Post a sample to the outbound mailbox when allowed |
//! | [`Connection::request_handoff`] | Enqueue a handoff request for the arbiter |
//! | [`Connection::apply_ownership`] | Arbiter-only: overwrite one cached owner |

use std::sync::Arc;

use rmcs_middleware::{HandoffSender, Mailbox};
use rmcs_types::{
    Channel, ConnectionId, ControlSample, HandoffRequest, HandoffTarget, OwnershipTable,
    Payload, RmcsError,
};
use tracing::{debug, trace};

use crate::ownership::OwnershipCache;

/// What the arbiter broadcasts through. Implemented by [`Connection`] and by
/// wrappers that add behaviour on ownership changes.
pub trait Participant: Send + Sync {
    fn id(&self) -> ConnectionId;

    /// Controllers count towards the fallback population.
    fn is_controller(&self) -> bool;

    /// Overwrite the cached owner of `channel`. Called only by the arbiter.
    fn apply_ownership(&self, channel: Channel, owner: ConnectionId);
}

/// Whether a connection is the remote operator or a local controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Operator,
    Controller,
}

/// One input source.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use rmcs_kernel::connection::{Connection, Role};
/// use rmcs_middleware::{handoff_channel, Mailbox};
/// use rmcs_types::{Channel, ConnectionId};
///
/// let (tx, _rx) = handoff_channel();
/// let conn = Connection::new(ConnectionId::OPERATOR, Role::Operator, "operator", Arc::new(Mailbox::new()), tx);
/// assert!(conn.may_publish(Channel::Drive));
/// ```
pub struct Connection {
    id: ConnectionId,
    role: Role,
    label: String,
    cache: OwnershipCache,
    outbound: Arc<Mailbox<Payload>>,
    handoffs: HandoffSender,
}

impl Connection {
    pub fn new(
        id: ConnectionId,
        role: Role,
        label: impl Into<String>,
        outbound: Arc<Mailbox<Payload>>,
        handoffs: HandoffSender,
    ) -> Self {
        Self {
            id,
            role,
            label: label.into(),
            cache: OwnershipCache::new(),
            outbound,
            handoffs,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Cached owner of `channel`.
    pub fn owner(&self, channel: Channel) -> ConnectionId {
        self.cache.owner(channel)
    }

    /// Copy of the whole cache.
    pub fn ownership(&self) -> OwnershipTable {
        self.cache.snapshot()
    }

    pub fn may_publish(&self, channel: Channel) -> bool {
        self.cache.owner(channel) == self.id
    }

    /// Post `sample` to the outbound mailbox if this connection owns its
    /// channel. `Ok(false)` means "not the owner", which is normal operation.
    pub fn publish(&self, sample: ControlSample) -> Result<bool, RmcsError> {
        let channel = sample.channel();
        if !self.may_publish(channel) {
            trace!(connection = %self.id, ?channel, "sample dropped, not owner");
            return Ok(false);
        }
        self.outbound.put(Payload::Control(sample))?;
        Ok(true)
    }

    /// Ask the arbiter to move `channel` to `target`.
    pub fn request_handoff(&self, target: HandoffTarget, channel: Channel) -> Result<(), RmcsError> {
        debug!(connection = %self.id, ?target, ?channel, "handoff requested");
        self.handoffs.send(HandoffRequest { target, channel })
    }

    /// Integer form: `-1` requests the fallback owner, other values `< 1`
    /// are rejected without enqueuing anything.
    pub fn request_handoff_raw(&self, requested_owner: i64, channel: Channel) -> Result<(), RmcsError> {
        let target = HandoffTarget::from_raw(requested_owner)?;
        self.request_handoff(target, channel)
    }

    /// Overwrite the cached owner of `channel`. Returns the previous owner.
    pub fn apply_ownership(&self, channel: Channel, owner: ConnectionId) -> ConnectionId {
        let previous = self.cache.set(channel, owner);
        if previous != owner {
            debug!(connection = %self.id, ?channel, %owner, "ownership cache updated");
        }
        previous
    }

    /// Integer form of [`apply_ownership`](Self::apply_ownership); values
    /// `< 1` leave the cache untouched.
    pub fn apply_ownership_raw(&self, channel: Channel, owner: i64) -> Result<ConnectionId, RmcsError> {
        let owner = ConnectionId::new(owner).ok_or(RmcsError::InvalidOwner(owner))?;
        Ok(self.apply_ownership(channel, owner))
    }
}

impl Participant for Connection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn is_controller(&self) -> bool {
        self.role == Role::Controller
    }

    fn apply_ownership(&self, channel: Channel, owner: ConnectionId) {
        Connection::apply_ownership(self, channel, owner);
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("role", &self.role)
            .field("label", &self.label)
            .field("ownership", &self.cache.snapshot())
            .finish()
    }
}
