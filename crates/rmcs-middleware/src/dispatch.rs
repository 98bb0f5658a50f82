//! Dispatch fan-out.
//!
//! A single [`Dispatcher`] thread drains the shared inbound
//! [`Mailbox<Payload>`] and routes each payload:
//!
//! * control samples go to every registered [`ControlSink`] whose declared
//!   channel set contains the sample's channel,
//! * sensor samples go to every [`SensorListener`] whose interest set
//!   contains the sample's kind or [`SensorInterest::Any`].
//!
//! Registering the same listener twice merges the interest sets. Listener
//! identity is the `Arc` allocation, not the value it points to.

use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock};

use rmcs_types::{Channel, ControlSample, Payload, RmcsError, SensorKind, SensorSample};
use tracing::{debug, info, trace, warn};

use crate::mailbox::Mailbox;
use crate::shutdown::Shutdown;

/// Actuation-side consumer of control samples.
pub trait ControlSink: Send + Sync {
    fn name(&self) -> &str;

    /// Channels this sink wants to receive. Read once at registration.
    fn channels(&self) -> Vec<Channel>;

    /// Hand over a sample. Must not block for long; sinks that drive slow
    /// hardware queue internally.
    fn accept(&self, sample: ControlSample) -> Result<(), RmcsError>;
}

/// Consumer of sensor readings.
pub trait SensorListener: Send + Sync {
    fn on_sensor(&self, sample: &SensorSample) -> Result<(), RmcsError>;
}

/// What a listener wants to hear about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorInterest {
    /// Every sensor kind.
    Any,
    Kind(SensorKind),
}

impl SensorInterest {
    fn matches(self, kind: SensorKind) -> bool {
        match self {
            SensorInterest::Any => true,
            SensorInterest::Kind(k) => k == kind,
        }
    }
}

fn same_allocation<T: ?Sized, U: ?Sized>(a: &Arc<T>, b: &Arc<U>) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

// ────────────────────────────────────────────────────────────────────────────
// Listener registry
// ────────────────────────────────────────────────────────────────────────────

struct ListenerEntry {
    listener: Arc<dyn SensorListener>,
    interests: HashSet<SensorInterest>,
}

/// Maps each sensor listener to the set of kinds it wants.
#[derive(Default)]
pub struct ListenerRegistry {
    entries: Vec<ListenerEntry>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `listener` for `interests`, merging with an existing
    /// registration of the same listener. Returns `true` if anything changed.
    pub fn add(&mut self, listener: Arc<dyn SensorListener>, interests: &[SensorInterest]) -> bool {
        if let Some(entry) = self
            .entries
            .iter_mut()
            .find(|e| same_allocation(&e.listener, &listener))
        {
            let before = entry.interests.len();
            entry.interests.extend(interests.iter().copied());
            return entry.interests.len() != before;
        }
        self.entries.push(ListenerEntry {
            listener,
            interests: interests.iter().copied().collect(),
        });
        true
    }

    /// Drop the whole registration. `false` when the listener was unknown.
    pub fn remove(&mut self, listener: &Arc<dyn SensorListener>) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| !same_allocation(&e.listener, listener));
        self.entries.len() != before
    }

    /// Withdraw some interests. `false` when the listener was unknown or
    /// none of `interests` was registered. The listener stays registered
    /// with an empty set so a later [`add`](Self::add) merges again.
    pub fn remove_kinds(&mut self, listener: &Arc<dyn SensorListener>, interests: &[SensorInterest]) -> bool {
        let Some(entry) = self
            .entries
            .iter_mut()
            .find(|e| same_allocation(&e.listener, listener))
        else {
            return false;
        };
        let before = entry.interests.len();
        entry.interests.retain(|i| !interests.contains(i));
        entry.interests.len() != before
    }

    /// Listeners interested in `kind`, in registration order.
    pub fn interested_in(&self, kind: SensorKind) -> Vec<Arc<dyn SensorListener>> {
        self.entries
            .iter()
            .filter(|e| e.interests.iter().any(|i| i.matches(kind)))
            .map(|e| e.listener.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Dispatcher
// ────────────────────────────────────────────────────────────────────────────

struct SinkEntry {
    sink: Arc<dyn ControlSink>,
    channels: Vec<Channel>,
}

/// Drains the inbound mailbox and fans payloads out.
pub struct Dispatcher {
    inbound: Arc<Mailbox<Payload>>,
    sinks: RwLock<Vec<SinkEntry>>,
    listeners: RwLock<ListenerRegistry>,
}

impl Dispatcher {
    pub fn new(inbound: Arc<Mailbox<Payload>>) -> Self {
        Self {
            inbound,
            sinks: RwLock::new(Vec::new()),
            listeners: RwLock::new(ListenerRegistry::new()),
        }
    }

    /// The mailbox producers post into.
    pub fn inbound(&self) -> &Arc<Mailbox<Payload>> {
        &self.inbound
    }

    pub fn register_sink(&self, sink: Arc<dyn ControlSink>) {
        let channels = sink.channels();
        info!(sink = sink.name(), ?channels, "control sink registered");
        self.sinks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(SinkEntry { sink, channels });
    }

    pub fn remove_sink(&self, sink: &Arc<dyn ControlSink>) -> bool {
        let mut sinks = self.sinks.write().unwrap_or_else(PoisonError::into_inner);
        let before = sinks.len();
        sinks.retain(|e| !same_allocation(&e.sink, sink));
        sinks.len() != before
    }

    pub fn add_listener(&self, listener: Arc<dyn SensorListener>, interests: &[SensorInterest]) -> bool {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .add(listener, interests)
    }

    pub fn remove_listener(&self, listener: &Arc<dyn SensorListener>) -> bool {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(listener)
    }

    pub fn remove_listener_kinds(
        &self,
        listener: &Arc<dyn SensorListener>,
        interests: &[SensorInterest],
    ) -> bool {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove_kinds(listener, interests)
    }

    /// Route one payload. Returns how many consumers received it.
    /// Consumer failures are logged and swallowed.
    pub fn dispatch(&self, payload: Payload) -> usize {
        match payload {
            Payload::Control(sample) => {
                let channel = sample.channel();
                let targets: Vec<Arc<dyn ControlSink>> = self
                    .sinks
                    .read()
                    .unwrap_or_else(PoisonError::into_inner)
                    .iter()
                    .filter(|e| e.channels.contains(&channel))
                    .map(|e| e.sink.clone())
                    .collect();
                trace!(?channel, sinks = targets.len(), "dispatching control sample");
                for sink in &targets {
                    if let Err(e) = sink.accept(sample) {
                        warn!(sink = sink.name(), error = %e, "control sink rejected sample");
                    }
                }
                targets.len()
            }
            Payload::Sensor(sample) => {
                let targets = self
                    .listeners
                    .read()
                    .unwrap_or_else(PoisonError::into_inner)
                    .interested_in(sample.kind);
                trace!(kind = ?sample.kind, listeners = targets.len(), "dispatching sensor sample");
                for listener in &targets {
                    if let Err(e) = listener.on_sensor(&sample) {
                        warn!(kind = ?sample.kind, error = %e, "sensor listener failed");
                    }
                }
                targets.len()
            }
        }
    }

    /// Blocking fan-out loop. Returns when the inbound mailbox is
    /// interrupted.
    pub fn run(&self, shutdown: &Shutdown) {
        debug!("dispatcher started");
        loop {
            match self.inbound.take() {
                Ok(payload) => {
                    self.dispatch(payload);
                }
                Err(RmcsError::Interrupted) => {
                    if !shutdown.is_triggered() {
                        warn!("inbound mailbox interrupted outside shutdown");
                    }
                    break;
                }
                Err(e) => {
                    warn!(error = %e, "inbound mailbox failed");
                    break;
                }
            }
        }
        debug!("dispatcher stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rmcs_types::{CameraSample, DriveSample, LightSample};
    use std::sync::Mutex;
    use std::thread;

    struct MockSink {
        name: String,
        channels: Vec<Channel>,
        received: Mutex<Vec<ControlSample>>,
        fail: bool,
    }

    impl MockSink {
        fn new(name: &str, channels: &[Channel]) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                channels: channels.to_vec(),
                received: Mutex::new(Vec::new()),
                fail: false,
            })
        }
    }

    impl ControlSink for MockSink {
        fn name(&self) -> &str {
            &self.name
        }
        fn channels(&self) -> Vec<Channel> {
            self.channels.clone()
        }
        fn accept(&self, sample: ControlSample) -> Result<(), RmcsError> {
            self.received.lock().unwrap().push(sample);
            if self.fail {
                return Err(RmcsError::HardwareFault {
                    component: self.name.clone(),
                    details: "bus error".to_string(),
                });
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct MockListener {
        seen: Mutex<Vec<SensorKind>>,
    }

    impl SensorListener for MockListener {
        fn on_sensor(&self, sample: &SensorSample) -> Result<(), RmcsError> {
            self.seen.lock().unwrap().push(sample.kind);
            Ok(())
        }
    }

    fn dispatcher() -> Dispatcher {
        Dispatcher::new(Arc::new(Mailbox::new()))
    }

    fn sensor(kind: SensorKind) -> Payload {
        SensorSample::new(kind, 1).into()
    }

    #[test]
    fn control_samples_reach_only_interested_sinks() {
        let d = dispatcher();
        let motors = MockSink::new("motors", &[Channel::Drive, Channel::Light]);
        let gimbal = MockSink::new("gimbal", &[Channel::Camera]);
        d.register_sink(motors.clone());
        d.register_sink(gimbal.clone());

        let drive = ControlSample::Drive(DriveSample::new(10, 0, false));
        let camera = ControlSample::Camera(CameraSample::new(3, 4));
        assert_eq!(d.dispatch(drive.into()), 1);
        assert_eq!(d.dispatch(camera.into()), 1);
        assert_eq!(d.dispatch(ControlSample::Light(LightSample::default()).into()), 1);

        assert_eq!(motors.received.lock().unwrap().len(), 2);
        assert_eq!(*gimbal.received.lock().unwrap(), vec![camera]);
    }

    #[test]
    fn failing_sink_does_not_starve_the_others() {
        let d = dispatcher();
        let broken = Arc::new(MockSink {
            name: "broken".to_string(),
            channels: vec![Channel::Drive],
            received: Mutex::new(Vec::new()),
            fail: true,
        });
        let healthy = MockSink::new("healthy", &[Channel::Drive]);
        d.register_sink(broken);
        d.register_sink(healthy.clone());

        assert_eq!(d.dispatch(ControlSample::Drive(DriveSample::new(1, 1, false)).into()), 2);
        assert_eq!(healthy.received.lock().unwrap().len(), 1);
    }

    #[test]
    fn removed_sink_stops_receiving() {
        let d = dispatcher();
        let sink = MockSink::new("s", &[Channel::Light]);
        let handle: Arc<dyn ControlSink> = sink.clone();
        d.register_sink(handle.clone());

        assert!(d.remove_sink(&handle));
        assert!(!d.remove_sink(&handle));
        assert_eq!(d.dispatch(ControlSample::Light(LightSample::default()).into()), 0);
    }

    #[test]
    fn any_interest_matches_every_kind() {
        let d = dispatcher();
        let all = Arc::new(MockListener::default());
        let front = Arc::new(MockListener::default());
        d.add_listener(all.clone(), &[SensorInterest::Any]);
        d.add_listener(front.clone(), &[SensorInterest::Kind(SensorKind::FrontDistance)]);

        d.dispatch(sensor(SensorKind::FrontDistance));
        d.dispatch(sensor(SensorKind::WheelSpeed));

        assert_eq!(all.seen.lock().unwrap().len(), 2);
        assert_eq!(*front.seen.lock().unwrap(), vec![SensorKind::FrontDistance]);
    }

    #[test]
    fn registering_twice_merges_interests() {
        let mut registry = ListenerRegistry::new();
        let listener: Arc<dyn SensorListener> = Arc::new(MockListener::default());

        assert!(registry.add(listener.clone(), &[SensorInterest::Kind(SensorKind::LeftDistance)]));
        assert!(registry.add(listener.clone(), &[SensorInterest::Kind(SensorKind::RightDistance)]));
        assert!(!registry.add(listener.clone(), &[SensorInterest::Kind(SensorKind::LeftDistance)]));

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.interested_in(SensorKind::RightDistance).len(), 1);
        assert_eq!(registry.interested_in(SensorKind::LeftDistance).len(), 1);
        assert!(registry.interested_in(SensorKind::WheelSpeed).is_empty());
    }

    #[test]
    fn equal_but_distinct_listeners_are_separate() {
        let mut registry = ListenerRegistry::new();
        let a: Arc<dyn SensorListener> = Arc::new(MockListener::default());
        let b: Arc<dyn SensorListener> = Arc::new(MockListener::default());
        registry.add(a, &[SensorInterest::Any]);
        registry.add(b, &[SensorInterest::Any]);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn removing_unknown_listener_or_kind_reports_false() {
        let mut registry = ListenerRegistry::new();
        let known: Arc<dyn SensorListener> = Arc::new(MockListener::default());
        let stranger: Arc<dyn SensorListener> = Arc::new(MockListener::default());
        registry.add(known.clone(), &[SensorInterest::Kind(SensorKind::WheelSpeed)]);

        assert!(!registry.remove(&stranger));
        assert!(!registry.remove_kinds(&stranger, &[SensorInterest::Any]));
        assert!(!registry.remove_kinds(&known, &[SensorInterest::Any]));
        assert!(registry.remove_kinds(&known, &[SensorInterest::Kind(SensorKind::WheelSpeed)]));
        assert!(registry.interested_in(SensorKind::WheelSpeed).is_empty());
        assert!(registry.remove(&known));
        assert!(registry.is_empty());
    }

    #[test]
    fn run_drains_mailbox_until_shutdown() {
        let d = Arc::new(dispatcher());
        let sink = MockSink::new("motors", &[Channel::Drive]);
        d.register_sink(sink.clone());
        let shutdown = Shutdown::new();
        shutdown.watch(d.inbound().clone());

        let worker = {
            let d = d.clone();
            let shutdown = shutdown.clone();
            thread::spawn(move || d.run(&shutdown))
        };

        d.inbound()
            .put(ControlSample::Drive(DriveSample::new(5, 0, false)).into())
            .unwrap();
        for _ in 0..200 {
            if !sink.received.lock().unwrap().is_empty() {
                break;
            }
            thread::sleep(std::time::Duration::from_millis(5));
        }
        shutdown.trigger();
        worker.join().unwrap();

        assert_eq!(sink.received.lock().unwrap().len(), 1);
    }
}
