//! [`GamepadManager`] – turns discovered pads into connections and runs one
//! poll thread per pad.
//!
//! Each poll tick:
//!
//! 1. reads the pad,
//! 2. advances the [`HandoffStateMachine`] and submits any requests,
//! 3. updates the [`DriveModel`],
//! 4. every `publish_interval`, publishes changed samples (dropped by the
//!    connection when it does not own the channel),
//! 5. every `status_interval`, posts a [`GamepadStatus`] on the status bus.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use rmcs_kernel::{Connection, IdAllocator, Role};
use rmcs_middleware::{GamepadStatus, HandoffSender, Mailbox, Shutdown, StatusBus, StatusPayload, Topic};
use rmcs_types::{Payload, RmcsError};
use tracing::{debug, info, warn};

use crate::connection::GamepadConnection;
use crate::drive::DriveModel;
use crate::handoff::{COMBO_THRESHOLD, HOLD_THRESHOLD, HandoffStateMachine};
use crate::input::{PadSource, PadState};

/// Timing of the pad loops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GamepadSettings {
    pub poll_interval: Duration,
    pub publish_interval: Duration,
    pub status_interval: Duration,
    pub hold_threshold: Duration,
    pub combo_threshold: Duration,
}

impl Default for GamepadSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(5),
            publish_interval: Duration::from_millis(40),
            status_interval: Duration::from_millis(100),
            hold_threshold: HOLD_THRESHOLD,
            combo_threshold: COMBO_THRESHOLD,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Worker
// ────────────────────────────────────────────────────────────────────────────

/// Everything one pad's poll thread owns.
pub struct GamepadWorker {
    connection: Arc<GamepadConnection>,
    source: Box<dyn PadSource>,
    machine: HandoffStateMachine,
    model: DriveModel,
    previous: PadState,
    settings: GamepadSettings,
    status: Option<StatusBus>,
    last_publish: Option<Instant>,
    last_status: Option<Instant>,
}

impl GamepadWorker {
    fn new(connection: Arc<GamepadConnection>, source: Box<dyn PadSource>, settings: GamepadSettings) -> Self {
        let machine = HandoffStateMachine::with_thresholds(
            connection.connection().id(),
            settings.hold_threshold,
            settings.combo_threshold,
        );
        Self {
            connection,
            source,
            machine,
            model: DriveModel::new(),
            previous: PadState::new(),
            settings,
            status: None,
            last_publish: None,
            last_status: None,
        }
    }

    fn due(last: Option<Instant>, now: Instant, every: Duration) -> bool {
        last.is_none_or(|t| now.saturating_duration_since(t) >= every)
    }

    /// One poll tick at `now`.
    pub fn step(&mut self, now: Instant) -> Result<(), RmcsError> {
        let pad = self.source.poll()?;
        let conn = self.connection.connection();

        for request in self.machine.tick(&pad, now, &conn.ownership()) {
            conn.request_handoff(request.target, request.channel)?;
        }
        self.model.update(&pad, &self.previous);
        self.previous = pad;

        if Self::due(self.last_publish, now, self.settings.publish_interval) {
            self.last_publish = Some(now);
            if self.connection.take_regained() {
                self.model.mark_dirty();
            }
            for sample in self.model.take_changed() {
                conn.publish(sample)?;
            }
        }

        if Self::due(self.last_status, now, self.settings.status_interval) {
            self.last_status = Some(now);
            if let Some(bus) = &self.status {
                let (camera_yaw, camera_pitch) = self.model.camera();
                let status = GamepadStatus {
                    id: conn.id(),
                    gear: self.model.gear(),
                    acceleration: self.model.acceleration(),
                    steering: self.model.steering(),
                    camera_yaw,
                    camera_pitch,
                    channels: conn.ownership().channels_of(conn.id()),
                };
                bus.emit(Topic::Gamepad, conn.label(), StatusPayload::Gamepad(status));
            }
        }
        Ok(())
    }

    /// Poll until `shutdown` fires or the pad fails.
    pub fn run(mut self, shutdown: &Shutdown) {
        let id = self.connection.connection().id();
        info!(connection = %id, pad = self.source.name(), "gamepad loop started");
        loop {
            if let Err(e) = self.step(Instant::now()) {
                match e {
                    RmcsError::Interrupted | RmcsError::ChannelClosed(_) => {
                        debug!(connection = %id, "gamepad loop interrupted");
                    }
                    other => warn!(connection = %id, error = %other, "gamepad loop stopped"),
                }
                break;
            }
            if shutdown.sleep(self.settings.poll_interval) {
                break;
            }
        }
        info!(connection = %id, "gamepad loop stopped");
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Manager
// ────────────────────────────────────────────────────────────────────────────

/// Owns the pads between discovery and spawn.
pub struct GamepadManager {
    workers: Vec<GamepadWorker>,
}

impl GamepadManager {
    /// Allocate one identity per pad, in the given order. Must run after the
    /// operator connection took identity 1.
    pub fn new(
        sources: Vec<Box<dyn PadSource>>,
        ids: &mut IdAllocator,
        outbound: &Arc<Mailbox<Payload>>,
        handoffs: &HandoffSender,
        settings: GamepadSettings,
    ) -> Self {
        let solo = sources.len() == 1;
        let workers = sources
            .into_iter()
            .map(|source| {
                let id = ids.allocate();
                let label = format!("gamepad {} ({})", id.get(), source.name());
                info!(connection = %id, pad = source.name(), solo, "gamepad connected");
                let conn = Connection::new(id, Role::Controller, label, outbound.clone(), handoffs.clone());
                GamepadWorker::new(Arc::new(GamepadConnection::new(conn, solo)), source, settings)
            })
            .collect();
        Self { workers }
    }

    /// Post a status snapshot per pad on [`Topic::Gamepad`].
    pub fn with_status_bus(mut self, bus: &StatusBus) -> Self {
        for worker in &mut self.workers {
            worker.status = Some(bus.clone());
        }
        self
    }

    pub fn connections(&self) -> Vec<Arc<GamepadConnection>> {
        self.workers.iter().map(|w| w.connection.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Start one named poll thread per pad.
    pub fn spawn(self, shutdown: &Shutdown) -> std::io::Result<Vec<JoinHandle<()>>> {
        self.workers
            .into_iter()
            .map(|worker| {
                let shutdown = shutdown.clone();
                let name = format!("rmcs-pad-{}", worker.connection.connection().id().get());
                thread::Builder::new().name(name).spawn(move || worker.run(&shutdown))
            })
            .collect()
    }

    /// Hand the workers out for driving them manually.
    pub fn into_workers(self) -> Vec<GamepadWorker> {
        self.workers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::Button;
    use crate::sim::{PadHandle, SimulatedPad};
    use rmcs_kernel::Arbiter;
    use rmcs_middleware::{HandoffReceiver, handoff_channel};
    use rmcs_types::{ConnectionId, ControlSample, OwnershipTable};

    struct Rig {
        arbiter: Arbiter,
        outbound: Arc<Mailbox<Payload>>,
        rx: HandoffReceiver,
        workers: Vec<GamepadWorker>,
        handles: Vec<PadHandle>,
    }

    fn rig(pads: usize) -> Rig {
        let (tx, rx) = handoff_channel();
        let outbound = Arc::new(Mailbox::new());
        let mut ids = IdAllocator::new();
        let operator = Arc::new(Connection::new(ids.allocate(), Role::Operator, "operator", outbound.clone(), tx.clone()));

        let mut sources: Vec<Box<dyn PadSource>> = Vec::new();
        let mut handles = Vec::new();
        for i in 0..pads {
            let (pad, handle) = SimulatedPad::new(format!("sim-{i}"));
            sources.push(Box::new(pad));
            handles.push(handle);
        }
        let manager = GamepadManager::new(sources, &mut ids, &outbound, &tx, GamepadSettings::default());

        let mut arbiter = Arbiter::new();
        arbiter.register(operator);
        for pad in manager.connections() {
            arbiter.register(pad);
        }
        Rig {
            arbiter,
            outbound,
            rx,
            workers: manager.into_workers(),
            handles,
        }
    }

    impl Rig {
        fn settle(&self) {
            while let Some(request) = self.rx.try_take() {
                self.arbiter.process(request);
            }
        }
    }

    #[test]
    fn pads_get_consecutive_identities_after_operator() {
        let r = rig(2);
        let ids: Vec<u32> = r.workers.iter().map(|w| w.connection.connection().id().get()).collect();
        assert_eq!(ids, vec![2, 3]);
        assert!(!r.workers[0].connection.is_solo());
        assert_eq!(r.arbiter.population().fallback(), ConnectionId::new(2).unwrap());
    }

    #[test]
    fn single_pad_is_solo() {
        let r = rig(1);
        assert!(r.workers[0].connection.is_solo());
    }

    #[test]
    fn non_owner_samples_never_reach_the_mailbox() {
        let mut r = rig(1);
        r.handles[0].set_drive(1.0, 0.0, 0.0);
        r.workers[0].step(Instant::now()).unwrap();
        assert!(r.outbound.is_empty());
    }

    #[test]
    fn combo_takes_control_and_samples_flow() {
        let mut r = rig(1);
        let t0 = Instant::now();
        let combo = [
            Button::LeftThumb,
            Button::RightThumb,
            Button::LeftUpperTrigger,
            Button::RightUpperTrigger,
        ];
        for b in combo {
            r.handles[0].press(b);
        }
        r.workers[0].step(t0).unwrap();
        r.handles[0].release(Button::LeftThumb);
        r.workers[0].step(t0 + Duration::from_millis(1100)).unwrap();
        r.settle();

        let table = r.arbiter.ownership().snapshot();
        let me = ConnectionId::new(2).unwrap();
        // Solo pad: the camera request to id 3 wraps back to the pad itself.
        assert_eq!(table, OwnershipTable::all(me));

        r.handles[0].set_drive(1.0, 0.0, 0.0);
        r.workers[0].step(t0 + Duration::from_millis(1200)).unwrap();
        let kinds: Vec<_> = std::iter::from_fn(|| r.outbound.try_take()).collect();
        assert!(kinds.iter().any(|p| matches!(p, Payload::Control(ControlSample::Drive(d)) if d.acceleration() == 20)));
    }

    #[test]
    fn status_is_posted_on_interval() {
        let bus = StatusBus::new(16);
        let mut rx = bus.subscribe_to(Topic::Gamepad);
        let r = rig(1);
        let mut workers = r.workers;
        workers[0].status = Some(bus.clone());
        let t0 = Instant::now();

        workers[0].step(t0).unwrap();
        workers[0].step(t0 + Duration::from_millis(50)).unwrap();
        workers[0].step(t0 + Duration::from_millis(120)).unwrap();

        let mut posted = 0;
        while let Some(event) = rx.try_recv() {
            assert!(matches!(event.payload, StatusPayload::Gamepad(ref s) if s.gear == 1));
            posted += 1;
        }
        assert_eq!(posted, 2);
    }

    #[test]
    fn unplugged_pad_ends_its_loop() {
        let r = rig(1);
        r.handles[0].unplug();
        let shutdown = Shutdown::new();
        let worker = r.workers.into_iter().next().unwrap();
        // Returns on its own without the shutdown signal.
        worker.run(&shutdown);
        assert!(!shutdown.is_triggered());
    }

    #[test]
    fn spawned_loops_stop_on_shutdown() {
        let (tx, _rx) = handoff_channel();
        let outbound = Arc::new(Mailbox::new());
        let mut ids = IdAllocator::new();
        ids.allocate();
        let (pad, _handle) = SimulatedPad::new("sim");
        let manager = GamepadManager::new(vec![Box::new(pad)], &mut ids, &outbound, &tx, GamepadSettings::default());
        let shutdown = Shutdown::new();
        let handles = manager.spawn(&shutdown).unwrap();

        thread::sleep(Duration::from_millis(20));
        shutdown.trigger();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(ids.issued(), 2);
    }
}
