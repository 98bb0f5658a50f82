//! Typed, topic-based status bus.
//!
//! Uses [`tokio::sync::broadcast`] channels so that every subscriber receives
//! every status event without any single subscriber blocking the publishers.
//! Publishing never blocks; a slow subscriber lags and loses old events.
//!
//! # Topics
//!
//! | Topic | Typical traffic |
//! |---|---|
//! | [`Topic::Ownership`] | Authoritative ownership table after every handoff |
//! | [`Topic::Connection`] | Connection lifecycle and log-style notices |
//! | [`Topic::Operator`] | Control samples forwarded by the operator link |
//! | [`Topic::Gamepad`] | Per-controller status snapshots |
//! | [`Topic::Sensors`] | Latest sensor readings |

use chrono::{DateTime, Utc};
use rmcs_types::{
    Channel, ConnectionId, ControlSample, OwnershipTable, SensorSample,
};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::warn;
use uuid::Uuid;

/// Default channel capacity per topic.
const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Topic {
    Ownership,
    Connection,
    Operator,
    Gamepad,
    Sensors,
}

impl Topic {
    pub const ALL: [Topic; 5] = [
        Topic::Ownership,
        Topic::Connection,
        Topic::Operator,
        Topic::Gamepad,
        Topic::Sensors,
    ];
}

/// Snapshot of one controller, published periodically.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GamepadStatus {
    pub id: ConnectionId,
    pub gear: u8,
    pub acceleration: i32,
    pub steering: i32,
    pub camera_yaw: i32,
    pub camera_pitch: i32,
    pub channels: Vec<Channel>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum StatusPayload {
    /// Table held by the arbitration loop after a handoff was applied.
    Ownership(OwnershipTable),
    /// A connection joined the population.
    ConnectionOpened { id: ConnectionId, label: String },
    /// Free-form notice shown in the scrolling log.
    Notice(String),
    /// A control sample received from the operator.
    OperatorControl(ControlSample),
    Gamepad(GamepadStatus),
    Sensor(SensorSample),
}

/// A single status message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusEvent {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub source: String,
    pub payload: StatusPayload,
}

impl StatusEvent {
    pub fn new(source: impl Into<String>, payload: StatusPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source: source.into(),
            payload,
        }
    }
}

/// Shared status bus. Clone it cheaply – all clones share the same
/// underlying broadcast channels.
#[derive(Clone, Debug)]
pub struct StatusBus {
    ownership: broadcast::Sender<StatusEvent>,
    connection: broadcast::Sender<StatusEvent>,
    operator: broadcast::Sender<StatusEvent>,
    gamepad: broadcast::Sender<StatusEvent>,
    sensors: broadcast::Sender<StatusEvent>,
}

impl StatusBus {
    /// Create a new bus; `capacity` applies to every topic independently.
    pub fn new(capacity: usize) -> Self {
        let (ownership, _) = broadcast::channel(capacity);
        let (connection, _) = broadcast::channel(capacity);
        let (operator, _) = broadcast::channel(capacity);
        let (gamepad, _) = broadcast::channel(capacity);
        let (sensors, _) = broadcast::channel(capacity);
        Self {
            ownership,
            connection,
            operator,
            gamepad,
            sensors,
        }
    }

    /// Publish `event` on `topic`.
    ///
    /// Returns the number of receivers handed the event. `0` means nobody
    /// is listening, which is normal when the console is disabled.
    pub fn publish_to(&self, topic: Topic, event: StatusEvent) -> usize {
        self.topic_sender(topic).send(event).unwrap_or(0)
    }

    /// Convenience wrapper building the [`StatusEvent`] in place.
    pub fn emit(&self, topic: Topic, source: &str, payload: StatusPayload) -> usize {
        self.publish_to(topic, StatusEvent::new(source, payload))
    }

    pub fn subscribe_to(&self, topic: Topic) -> TopicReceiver {
        TopicReceiver {
            topic,
            receiver: self.topic_sender(topic).subscribe(),
        }
    }

    fn topic_sender(&self, topic: Topic) -> &broadcast::Sender<StatusEvent> {
        match topic {
            Topic::Ownership => &self.ownership,
            Topic::Connection => &self.connection,
            Topic::Operator => &self.operator,
            Topic::Gamepad => &self.gamepad,
            Topic::Sensors => &self.sensors,
        }
    }
}

impl Default for StatusBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Receiver
// ────────────────────────────────────────────────────────────────────────────

/// Receiver bound to a single [`Topic`].
pub struct TopicReceiver {
    topic: Topic,
    receiver: broadcast::Receiver<StatusEvent>,
}

impl TopicReceiver {
    /// Blocking wait for use on plain threads. Lagged events are skipped
    /// with a warning; `None` means the bus has shut down.
    pub fn recv_blocking(&mut self) -> Option<StatusEvent> {
        loop {
            match self.receiver.blocking_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(topic = ?self.topic, lagged_by = n, "status receiver lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking poll. Skips over lag.
    pub fn try_recv(&mut self) -> Option<StatusEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    warn!(topic = ?self.topic, lagged_by = n, "status receiver lagged");
                }
                Err(_) => return None,
            }
        }
    }

    pub fn topic(&self) -> Topic {
        self.topic
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notice(text: &str) -> StatusEvent {
        StatusEvent::new("test", StatusPayload::Notice(text.to_string()))
    }

    #[test]
    fn publish_without_subscribers_is_not_an_error() {
        let bus = StatusBus::default();
        assert_eq!(bus.publish_to(Topic::Connection, notice("hello")), 0);
    }

    #[test]
    fn topics_are_isolated() {
        let bus = StatusBus::new(8);
        let mut gamepad = bus.subscribe_to(Topic::Gamepad);
        let mut connection = bus.subscribe_to(Topic::Connection);

        assert_eq!(bus.publish_to(Topic::Connection, notice("joined")), 1);

        assert!(gamepad.try_recv().is_none());
        let event = connection.try_recv().unwrap();
        assert_eq!(event.payload, StatusPayload::Notice("joined".to_string()));
        assert_eq!(connection.topic(), Topic::Connection);
    }

    #[test]
    fn every_subscriber_gets_every_event() {
        let bus = StatusBus::new(8);
        let mut a = bus.subscribe_to(Topic::Ownership);
        let mut b = bus.subscribe_to(Topic::Ownership);
        let table = OwnershipTable::default();

        assert_eq!(bus.emit(Topic::Ownership, "arbiter", StatusPayload::Ownership(table)), 2);
        assert_eq!(a.try_recv().unwrap().payload, StatusPayload::Ownership(table));
        assert_eq!(b.try_recv().unwrap().payload, StatusPayload::Ownership(table));
    }

    #[test]
    fn lagged_receiver_skips_to_retained_events() {
        let bus = StatusBus::new(2);
        let mut rx = bus.subscribe_to(Topic::Connection);
        for i in 0..5 {
            bus.emit(Topic::Connection, "test", StatusPayload::Notice(i.to_string()));
        }
        let first = rx.try_recv().unwrap();
        assert_eq!(first.payload, StatusPayload::Notice("3".to_string()));
    }

    #[test]
    fn recv_blocking_returns_none_after_bus_dropped() {
        let bus = StatusBus::new(4);
        let mut rx = bus.subscribe_to(Topic::Sensors);
        drop(bus);
        assert!(rx.recv_blocking().is_none());
    }

    #[test]
    fn event_serializes_with_tagged_payload() {
        let json = serde_json::to_value(notice("hi")).unwrap();
        assert_eq!(json["payload"]["type"], "Notice");
        assert_eq!(json["payload"]["data"], "hi");
        assert_eq!(json["source"], "test");
    }
}
