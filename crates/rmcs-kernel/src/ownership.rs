//! Per-connection replica of the ownership table.
//!
//! Every connection reads its own cache on every outgoing sample, so reads
//! are lock-free atomics. Writes come only from the arbiter's broadcast.

use std::sync::atomic::{AtomicU32, Ordering};

use rmcs_types::{Channel, ConnectionId, OwnershipTable};

/// Cached belief of who owns each channel. Starts with the operator owning
/// everything.
#[derive(Debug)]
pub struct OwnershipCache {
    drive: AtomicU32,
    light: AtomicU32,
    camera: AtomicU32,
}

impl OwnershipCache {
    pub fn new() -> Self {
        Self::from_table(&OwnershipTable::default())
    }

    pub fn from_table(table: &OwnershipTable) -> Self {
        Self {
            drive: AtomicU32::new(table.owner(Channel::Drive).get()),
            light: AtomicU32::new(table.owner(Channel::Light).get()),
            camera: AtomicU32::new(table.owner(Channel::Camera).get()),
        }
    }

    fn slot(&self, channel: Channel) -> &AtomicU32 {
        match channel {
            Channel::Drive => &self.drive,
            Channel::Light => &self.light,
            Channel::Camera => &self.camera,
        }
    }

    pub fn owner(&self, channel: Channel) -> ConnectionId {
        let raw = self.slot(channel).load(Ordering::Acquire);
        // Only valid identities are ever stored.
        ConnectionId::new(i64::from(raw)).unwrap_or(ConnectionId::OPERATOR)
    }

    /// Overwrite the cached owner. Returns the previous owner.
    pub fn set(&self, channel: Channel, owner: ConnectionId) -> ConnectionId {
        let previous = self.slot(channel).swap(owner.get(), Ordering::AcqRel);
        ConnectionId::new(i64::from(previous)).unwrap_or(ConnectionId::OPERATOR)
    }

    pub fn snapshot(&self) -> OwnershipTable {
        let mut table = OwnershipTable::default();
        for channel in Channel::ALL {
            table.set(channel, self.owner(channel));
        }
        table
    }
}

impl Default for OwnershipCache {
    fn default() -> Self {
        Self::new()
    }
}
