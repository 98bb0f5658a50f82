//! In-process stand-ins for the rover hardware.
//!
//! [`SimActuator`] records what it was told to apply; [`SensorBoard`] makes up
//! plausible sensor readings and posts them into the inbound mailbox. Together
//! they let the whole control plane run headless.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use rmcs_hal::sim::SensorBoard;
//! use rmcs_middleware::Mailbox;
//! use rmcs_types::SensorKind;
//!
//! let inbound = Arc::new(Mailbox::new());
//! let mut board = SensorBoard::new(inbound.clone(), Duration::from_millis(100))
//!     .with_sensor(SensorKind::FrontDistance)
//!     .with_sensor(SensorKind::WheelSpeed);
//!
//! board.publish_once().unwrap();
//! assert_eq!(inbound.len(), 2);
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use rmcs_middleware::{Mailbox, Shutdown};
use rmcs_types::{Channel, ControlSample, Payload, RmcsError, SensorKind, SensorSample};
use tracing::{debug, info};

use crate::actuator::Actuator;

/// Shortest accepted sensor update interval.
pub const MIN_SENSOR_INTERVAL: Duration = Duration::from_millis(10);

const LOG_CAPACITY: usize = 1024;

// ────────────────────────────────────────────────────────────────────────────
// Simulated actuator
// ────────────────────────────────────────────────────────────────────────────

/// Read side of a [`SimActuator`]'s record of applied samples. Keeps the
/// most recent entries only.
#[derive(Clone, Default)]
pub struct AppliedLog {
    entries: Arc<Mutex<VecDeque<ControlSample>>>,
}

impl AppliedLog {
    fn push(&self, sample: ControlSample) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if entries.len() == LOG_CAPACITY {
            entries.pop_front();
        }
        entries.push_back(sample);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Latest sample applied on `channel`.
    pub fn last(&self, channel: Channel) -> Option<ControlSample> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .rev()
            .find(|s| s.channel() == channel)
            .copied()
    }
}

/// A simulated actuator that records every sample it applied.
pub struct SimActuator {
    id: String,
    log: AppliedLog,
    faulty: bool,
}

impl SimActuator {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            log: AppliedLog::default(),
            faulty: false,
        }
    }

    /// An actuator that rejects every sample with a hardware fault.
    pub fn faulty(id: impl Into<String>) -> Self {
        Self {
            faulty: true,
            ..Self::new(id)
        }
    }

    pub fn log(&self) -> AppliedLog {
        self.log.clone()
    }
}

impl Actuator for SimActuator {
    fn id(&self) -> &str {
        &self.id
    }

    fn apply(&mut self, sample: &ControlSample) -> Result<(), RmcsError> {
        if self.faulty {
            return Err(RmcsError::HardwareFault {
                component: self.id.clone(),
                details: format!("{} output stage not responding", sample.channel()),
            });
        }
        debug!(actuator = %self.id, ?sample, "applied");
        self.log.push(*sample);
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Simulated sensor board
// ────────────────────────────────────────────────────────────────────────────

/// Produces one reading per configured sensor kind every interval.
pub struct SensorBoard {
    inbound: Arc<Mailbox<Payload>>,
    interval: Duration,
    sensors: Vec<SensorKind>,
    tick: u32,
}

impl SensorBoard {
    /// `interval` is raised to [`MIN_SENSOR_INTERVAL`] when shorter.
    pub fn new(inbound: Arc<Mailbox<Payload>>, interval: Duration) -> Self {
        Self {
            inbound,
            interval: interval.max(MIN_SENSOR_INTERVAL),
            sensors: Vec::new(),
            tick: 0,
        }
    }

    /// Add a sensor. Adding the same kind twice has no effect.
    pub fn with_sensor(mut self, kind: SensorKind) -> Self {
        if !self.sensors.contains(&kind) {
            self.sensors.push(kind);
        }
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn sensors(&self) -> &[SensorKind] {
        &self.sensors
    }

    /// Distances sweep between 20 and 200 cm, phase-shifted per side; the
    /// wheel speed follows a slower sweep between 0 and 50.
    fn reading(kind: SensorKind, tick: u32) -> i32 {
        let tri = |period: u32, offset: u32| {
            let p = tick.wrapping_add(offset) % (2 * period);
            if p < period { p } else { 2 * period - p }
        };
        let value = match kind {
            SensorKind::FrontDistance => 20 + tri(30, 0) * 6,
            SensorKind::LeftDistance => 20 + tri(30, 10) * 6,
            SensorKind::RightDistance => 20 + tri(30, 20) * 6,
            SensorKind::WheelSpeed => tri(50, 0),
        };
        value as i32
    }

    /// Post one round of readings.
    pub fn publish_once(&mut self) -> Result<(), RmcsError> {
        let tick = self.tick;
        self.tick = self.tick.wrapping_add(1);
        let batch = self
            .sensors
            .iter()
            .map(|&kind| Payload::Sensor(SensorSample::new(kind, Self::reading(kind, tick))))
            .collect();
        self.inbound.put_all(batch)
    }

    /// Publish until `shutdown` fires or the inbound mailbox is interrupted.
    pub fn run(mut self, shutdown: &Shutdown) {
        info!(sensors = ?self.sensors, interval_ms = self.interval.as_millis() as u64, "sensor board started");
        loop {
            if let Err(e) = self.publish_once() {
                debug!(error = %e, "sensor board stopping");
                break;
            }
            if shutdown.sleep(self.interval) {
                break;
            }
        }
        info!("sensor board stopped");
    }

    pub fn spawn(self, shutdown: &Shutdown) -> std::io::Result<JoinHandle<()>> {
        let shutdown = shutdown.clone();
        thread::Builder::new()
            .name("rmcs-sensors".to_string())
            .spawn(move || self.run(&shutdown))
    }
}
