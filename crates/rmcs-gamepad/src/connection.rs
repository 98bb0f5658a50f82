//! [`GamepadConnection`] – a controller's kernel connection plus the
//! dual-ownership repair rule.
//!
//! A controller may not hold the Drive/Light pair and the Camera at the
//! same time unless it is the only controller. When a broadcast makes this
//! pad the owner of Drive or Light while it holds Camera, or the owner of
//! Camera while it holds Drive, it passes Camera on to `own id + 1`.
//! Camera always yields and Drive has a single owner, so every repair
//! chain ends after one hop (plus one wrap in the arbiter).

use std::sync::atomic::{AtomicBool, Ordering};

use rmcs_kernel::{Connection, Participant};
use rmcs_types::{Channel, ConnectionId};
use tracing::{info, warn};

pub struct GamepadConnection {
    inner: Connection,
    solo: AtomicBool,
    regained: AtomicBool,
}

impl GamepadConnection {
    pub fn new(inner: Connection, solo: bool) -> Self {
        Self {
            inner,
            solo: AtomicBool::new(solo),
            regained: AtomicBool::new(false),
        }
    }

    pub fn connection(&self) -> &Connection {
        &self.inner
    }

    pub fn is_solo(&self) -> bool {
        self.solo.load(Ordering::Acquire)
    }

    pub fn set_solo(&self, solo: bool) {
        self.solo.store(solo, Ordering::Release);
    }

    /// `true` once after this pad gained any channel; the poll loop uses it
    /// to re-send its current state.
    pub fn take_regained(&self) -> bool {
        self.regained.swap(false, Ordering::AcqRel)
    }

    fn conflicts(&self, channel: Channel) -> bool {
        let me = self.inner.id();
        match channel {
            Channel::Drive | Channel::Light => self.inner.owner(Channel::Camera) == me,
            Channel::Camera => self.inner.owner(Channel::Drive) == me,
        }
    }
}

impl Participant for GamepadConnection {
    fn id(&self) -> ConnectionId {
        self.inner.id()
    }

    fn is_controller(&self) -> bool {
        true
    }

    fn apply_ownership(&self, channel: Channel, owner: ConnectionId) {
        let previous = self.inner.apply_ownership(channel, owner);
        let me = self.inner.id();
        if owner != me {
            return;
        }
        if previous != me {
            self.regained.store(true, Ordering::Release);
        }
        if self.is_solo() || !self.conflicts(channel) {
            return;
        }

        let next = me.successor();
        info!(connection = %me, granted = ?channel, %next, "dual ownership, passing camera on");
        if let Err(e) = self.inner.request_handoff(next.into(), Channel::Camera) {
            warn!(connection = %me, error = %e, "repair request not delivered");
        }
    }
}
