//! [`Arbiter`] – the serialization point of the control plane.
//!
//! One thread takes handoff requests off the [`HandoffReceiver`] in
//! submission order. For each request it resolves the new owner, records it
//! in the authoritative table and applies it to every registered
//! [`Participant`] before taking the next request.
//!
//! # Resolution
//!
//! | Request target | Resolved owner |
//! |---|---|
//! | [`HandoffTarget::Fallback`] | lowest controller identity, else the operator |
//! | identity `> N` | same as fallback (wraps "next controller" requests) |
//! | identity `1 ..= N` | that identity |

use std::sync::{Arc, PoisonError, RwLock};
use std::thread::{self, JoinHandle};

use rmcs_middleware::{HandoffReceiver, Shutdown, StatusBus, StatusPayload, Topic};
use rmcs_types::{Channel, ConnectionId, HandoffRequest, HandoffTarget, OwnershipTable, RmcsError};
use tracing::{debug, info, warn};

use crate::connection::Participant;
use crate::identity::Population;

/// Read handle on the arbiter's authoritative ownership table.
#[derive(Clone, Debug, Default)]
pub struct OwnershipHandle {
    table: Arc<RwLock<OwnershipTable>>,
}

impl OwnershipHandle {
    pub fn snapshot(&self) -> OwnershipTable {
        *self.table.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn owner(&self, channel: Channel) -> ConnectionId {
        self.snapshot().owner(channel)
    }

    fn store(&self, channel: Channel, owner: ConnectionId) -> OwnershipTable {
        let mut table = self.table.write().unwrap_or_else(PoisonError::into_inner);
        table.set(channel, owner);
        *table
    }
}

/// Resolves handoff requests and broadcasts the outcome.
pub struct Arbiter {
    participants: Vec<Arc<dyn Participant>>,
    ownership: OwnershipHandle,
    status: Option<StatusBus>,
}

impl Arbiter {
    pub fn new() -> Self {
        Self {
            participants: Vec::new(),
            ownership: OwnershipHandle::default(),
            status: None,
        }
    }

    /// Publish every resolution on [`Topic::Ownership`].
    pub fn with_status_bus(mut self, bus: StatusBus) -> Self {
        self.status = Some(bus);
        self
    }

    /// Add a participant to the broadcast set. Its cache is brought in line
    /// with the authoritative table right away.
    pub fn register(&mut self, participant: Arc<dyn Participant>) {
        let table = self.ownership.snapshot();
        for channel in Channel::ALL {
            participant.apply_ownership(channel, table.owner(channel));
        }
        debug!(connection = %participant.id(), controller = participant.is_controller(), "participant registered");
        self.participants.push(participant);
    }

    pub fn participants(&self) -> usize {
        self.participants.len()
    }

    /// Population seen by the resolution rule.
    pub fn population(&self) -> Population {
        let controllers = self.participants.iter().filter(|p| p.is_controller()).count();
        Population::new(
            u32::try_from(self.participants.len()).unwrap_or(u32::MAX),
            u32::try_from(controllers).unwrap_or(u32::MAX),
        )
    }

    pub fn ownership(&self) -> OwnershipHandle {
        self.ownership.clone()
    }

    /// Owner a request for `target` resolves to under the current population.
    pub fn resolve(&self, target: HandoffTarget) -> ConnectionId {
        let population = self.population();
        match target {
            HandoffTarget::Connection(id) if population.contains(id) => id,
            HandoffTarget::Connection(_) | HandoffTarget::Fallback => population.fallback(),
        }
    }

    /// Resolve one request and apply it to every participant. Returns the
    /// resolved owner.
    pub fn process(&self, request: HandoffRequest) -> ConnectionId {
        let owner = self.resolve(request.target);
        let table = self.ownership.store(request.channel, owner);
        info!(channel = ?request.channel, requested = ?request.target, %owner, "handoff resolved");

        for participant in &self.participants {
            participant.apply_ownership(request.channel, owner);
        }

        if let Some(bus) = &self.status {
            bus.emit(Topic::Ownership, "arbiter", StatusPayload::Ownership(table));
        }
        owner
    }

    /// Blocking loop. Returns once `shutdown` fires or every sender is gone.
    pub fn run(&self, requests: &HandoffReceiver, shutdown: &Shutdown) {
        info!(participants = self.participants.len(), "arbiter started");
        loop {
            match requests.take(shutdown) {
                Ok(request) => {
                    self.process(request);
                }
                Err(RmcsError::Interrupted) => break,
                Err(e) => {
                    warn!(error = %e, "handoff queue closed");
                    break;
                }
            }
        }
        info!("arbiter stopped");
    }

    /// Move the arbiter onto its own named thread.
    pub fn spawn(self, requests: HandoffReceiver, shutdown: Shutdown) -> std::io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("rmcs-arbiter".to_string())
            .spawn(move || self.run(&requests, &shutdown))
    }
}

impl Default for Arbiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{Connection, Role};
    use rmcs_middleware::{HandoffSender, Mailbox, handoff_channel};
    use rmcs_types::Payload;

    fn id(raw: i64) -> ConnectionId {
        ConnectionId::new(raw).unwrap()
    }

    /// Operator plus `controllers` pads, all registered with a fresh arbiter.
    fn setup(controllers: u32) -> (Arbiter, Vec<Arc<Connection>>, HandoffSender, HandoffReceiver) {
        let (tx, rx) = handoff_channel();
        let outbound: Arc<Mailbox<Payload>> = Arc::new(Mailbox::new());
        let mut arbiter = Arbiter::new();
        let mut connections = Vec::new();
        for raw in 1..=(controllers + 1) {
            let role = if raw == 1 { Role::Operator } else { Role::Controller };
            let conn = Arc::new(Connection::new(id(i64::from(raw)), role, "c", outbound.clone(), tx.clone()));
            arbiter.register(conn.clone());
            connections.push(conn);
        }
        (arbiter, connections, tx, rx)
    }

    #[test]
    fn out_of_range_request_falls_back_to_lowest_controller() {
        let (arbiter, _conns, _tx, _rx) = setup(2);
        let owner = arbiter.process(HandoffRequest::new(id(4), Channel::Drive));
        assert_eq!(owner, id(2));
    }

    #[test]
    fn without_controllers_everything_falls_back_to_operator() {
        let (arbiter, _conns, _tx, _rx) = setup(0);
        assert_eq!(arbiter.resolve(HandoffTarget::Fallback), ConnectionId::OPERATOR);
        assert_eq!(arbiter.resolve(id(2).into()), ConnectionId::OPERATOR);
        assert_eq!(arbiter.resolve(id(99).into()), ConnectionId::OPERATOR);
    }

    #[test]
    fn in_range_request_is_taken_literally() {
        let (arbiter, _conns, _tx, _rx) = setup(2);
        assert_eq!(arbiter.resolve(id(3).into()), id(3));
        assert_eq!(arbiter.resolve(ConnectionId::OPERATOR.into()), ConnectionId::OPERATOR);
    }

    #[test]
    fn broadcast_converges_every_cache() {
        let (arbiter, conns, _tx, _rx) = setup(3);
        arbiter.process(HandoffRequest::new(id(3), Channel::Camera));

        for conn in &conns {
            assert_eq!(conn.owner(Channel::Camera), id(3));
        }
        assert_eq!(arbiter.ownership().owner(Channel::Camera), id(3));
        let publishers: Vec<_> = conns.iter().filter(|c| c.may_publish(Channel::Camera)).collect();
        assert_eq!(publishers.len(), 1);
    }

    #[test]
    fn late_registration_receives_current_table() {
        let (mut arbiter, _conns, tx, _rx) = setup(1);
        arbiter.process(HandoffRequest::new(id(2), Channel::Light));

        let late = Arc::new(Connection::new(id(3), Role::Controller, "late", Arc::new(Mailbox::new()), tx));
        arbiter.register(late.clone());
        assert_eq!(late.owner(Channel::Light), id(2));
    }

    #[test]
    fn every_channel_always_has_exactly_one_owner() {
        let (arbiter, conns, _tx, _rx) = setup(3);
        // Deterministic pseudo-random request stream.
        let mut seed: u64 = 0x2545_f491_4f6c_dd1d;
        for _ in 0..500 {
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;
            let channel = Channel::ALL[(seed % 3) as usize];
            let target = match (seed >> 8) % 7 {
                0 => HandoffTarget::Fallback,
                n => HandoffTarget::Connection(id(n as i64)),
            };
            arbiter.process(HandoffRequest::new(target, channel));

            let table = arbiter.ownership().snapshot();
            for channel in Channel::ALL {
                let owner = table.owner(channel);
                assert!(owner.get() >= 1 && owner.get() <= 4);
                let claiming = conns.iter().filter(|c| c.may_publish(channel)).count();
                assert_eq!(claiming, 1);
            }
        }
    }

    #[test]
    fn run_processes_in_submission_order_until_shutdown() {
        let (arbiter, conns, tx, rx) = setup(2);
        let ownership = arbiter.ownership();
        let bus = StatusBus::new(16);
        let mut events = bus.subscribe_to(Topic::Ownership);
        let arbiter = arbiter.with_status_bus(bus);
        let shutdown = Shutdown::new();
        let handle = arbiter.spawn(rx, shutdown.clone()).unwrap();

        tx.send(HandoffRequest::new(id(2), Channel::Drive)).unwrap();
        tx.send(HandoffRequest::new(id(3), Channel::Drive)).unwrap();
        tx.send(HandoffRequest::new(HandoffTarget::Fallback, Channel::Camera)).unwrap();

        let mut seen = 0;
        while seen < 3 {
            if events.recv_blocking().is_some() {
                seen += 1;
            }
        }
        shutdown.trigger();
        handle.join().unwrap();

        assert_eq!(ownership.owner(Channel::Drive), id(3));
        assert_eq!(ownership.owner(Channel::Camera), id(2));
        assert!(conns[2].may_publish(Channel::Drive));
    }
}
