//! `rmcs-types` – shared vocabulary of the rover control plane.
//!
//! Every crate in the workspace speaks in terms of the types defined here:
//! the three independently owned actuation [`Channel`]s, the
//! [`ConnectionId`] of every input source, the ephemeral
//! [`HandoffRequest`], the control and sensor samples that flow through the
//! mailboxes, and the workspace-wide [`RmcsError`].

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lower/upper bound applied to every numeric control field.
pub const CONTROL_LIMIT: i32 = 127;

/// Raw identity value the operator link uses to ask for the fallback owner.
pub const FALLBACK_SENTINEL: i64 = -1;

// ────────────────────────────────────────────────────────────────────────────
// Channels and identities
// ────────────────────────────────────────────────────────────────────────────

/// One of the three independently owned actuation domains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Channel {
    /// Propulsion and steering.
    Drive,
    /// Head, back and dynamic lights plus turn signals.
    Light,
    /// Camera gimbal (yaw and pitch).
    Camera,
}

impl Channel {
    /// All channels, in the order initial ownership is requested.
    pub const ALL: [Channel; 3] = [Channel::Drive, Channel::Light, Channel::Camera];

    fn index(self) -> usize {
        match self {
            Channel::Drive => 0,
            Channel::Light => 1,
            Channel::Camera => 2,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Drive => write!(f, "drive"),
            Channel::Light => write!(f, "light"),
            Channel::Camera => write!(f, "camera"),
        }
    }
}

/// Identity of a connection. Always `>= 1`; identity `1` is the remote
/// operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConnectionId(u32);

impl ConnectionId {
    /// The remote-operator connection, always created first.
    pub const OPERATOR: ConnectionId = ConnectionId(1);

    /// Build an identity from a raw value. Returns `None` for values `< 1`
    /// or values that do not fit the identity space.
    pub fn new(raw: i64) -> Option<Self> {
        if raw < 1 {
            return None;
        }
        u32::try_from(raw).ok().map(ConnectionId)
    }

    /// Raw numeric value.
    pub fn get(self) -> u32 {
        self.0
    }

    /// The identity directly after this one (`ownId + 1`). It may lie outside
    /// the current population; the arbitration loop wraps it.
    pub fn successor(self) -> ConnectionId {
        ConnectionId(self.0.saturating_add(1))
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Handoff requests
// ────────────────────────────────────────────────────────────────────────────

/// Who a handoff request wants to hand a channel to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HandoffTarget {
    /// A specific identity. May exceed the population, in which case the
    /// arbitration loop resolves it like [`HandoffTarget::Fallback`].
    Connection(ConnectionId),
    /// Lowest-identity controller, or the operator when no controller exists.
    Fallback,
}

impl HandoffTarget {
    /// Decode the integer form used on the operator link: `-1` is the
    /// fallback sentinel, any other value `< 1` is rejected.
    pub fn from_raw(raw: i64) -> Result<Self, RmcsError> {
        if raw == FALLBACK_SENTINEL {
            return Ok(HandoffTarget::Fallback);
        }
        ConnectionId::new(raw)
            .map(HandoffTarget::Connection)
            .ok_or(RmcsError::InvalidOwner(raw))
    }
}

impl From<ConnectionId> for HandoffTarget {
    fn from(id: ConnectionId) -> Self {
        HandoffTarget::Connection(id)
    }
}

/// A request to move ownership of `channel` to `target`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HandoffRequest {
    pub target: HandoffTarget,
    pub channel: Channel,
}

impl HandoffRequest {
    pub fn new(target: impl Into<HandoffTarget>, channel: Channel) -> Self {
        Self {
            target: target.into(),
            channel,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Ownership
// ────────────────────────────────────────────────────────────────────────────

/// Owner identity for each of the three channels. Every channel always has
/// exactly one owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnershipTable {
    owners: [ConnectionId; 3],
}

impl OwnershipTable {
    /// A table in which `owner` holds every channel.
    pub fn all(owner: ConnectionId) -> Self {
        Self { owners: [owner; 3] }
    }

    pub fn owner(&self, channel: Channel) -> ConnectionId {
        self.owners[channel.index()]
    }

    pub fn set(&mut self, channel: Channel, owner: ConnectionId) {
        self.owners[channel.index()] = owner;
    }

    pub fn owns(&self, id: ConnectionId, channel: Channel) -> bool {
        self.owner(channel) == id
    }

    /// Channels currently held by `id`, in [`Channel::ALL`] order.
    pub fn channels_of(&self, id: ConnectionId) -> Vec<Channel> {
        Channel::ALL
            .into_iter()
            .filter(|c| self.owns(id, *c))
            .collect()
    }
}

impl Default for OwnershipTable {
    fn default() -> Self {
        Self::all(ConnectionId::OPERATOR)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Control samples
// ────────────────────────────────────────────────────────────────────────────

fn clamp(value: i32) -> i32 {
    value.clamp(-CONTROL_LIMIT, CONTROL_LIMIT)
}

/// Propulsion sample. Numeric fields are clamped to ±[`CONTROL_LIMIT`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DriveSample {
    acceleration: i32,
    steering: i32,
    stop: bool,
}

impl DriveSample {
    pub fn new(acceleration: i32, steering: i32, stop: bool) -> Self {
        Self {
            acceleration: clamp(acceleration),
            steering: clamp(steering),
            stop,
        }
    }

    pub fn acceleration(&self) -> i32 {
        self.acceleration
    }

    pub fn steering(&self) -> i32 {
        self.steering
    }

    /// Emergency-stop flag.
    pub fn stop(&self) -> bool {
        self.stop
    }
}

/// Lighting sample.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LightSample {
    pub front: bool,
    pub back: bool,
    pub dynamic: bool,
    pub left_turn: bool,
    pub right_turn: bool,
}

/// Camera gimbal sample. Both angles are clamped to ±[`CONTROL_LIMIT`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CameraSample {
    yaw: i32,
    pitch: i32,
}

impl CameraSample {
    pub fn new(yaw: i32, pitch: i32) -> Self {
        Self {
            yaw: clamp(yaw),
            pitch: clamp(pitch),
        }
    }

    pub fn yaw(&self) -> i32 {
        self.yaw
    }

    pub fn pitch(&self) -> i32 {
        self.pitch
    }
}

/// A value for exactly one channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ControlSample {
    Drive(DriveSample),
    Light(LightSample),
    Camera(CameraSample),
}

impl ControlSample {
    pub fn channel(&self) -> Channel {
        match self {
            ControlSample::Drive(_) => Channel::Drive,
            ControlSample::Light(_) => Channel::Light,
            ControlSample::Camera(_) => Channel::Camera,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Sensor samples
// ────────────────────────────────────────────────────────────────────────────

/// Physical sensor kinds reported by the actuation hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SensorKind {
    FrontDistance,
    LeftDistance,
    RightDistance,
    WheelSpeed,
}

impl SensorKind {
    pub const ALL: [SensorKind; 4] = [
        SensorKind::FrontDistance,
        SensorKind::LeftDistance,
        SensorKind::RightDistance,
        SensorKind::WheelSpeed,
    ];

    /// Property keyword announced for this sensor.
    pub fn keyword(self) -> &'static str {
        match self {
            SensorKind::FrontDistance => "uSSen",
            SensorKind::LeftDistance => "lISen",
            SensorKind::RightDistance => "rISen",
            SensorKind::WheelSpeed => "hSen",
        }
    }

    pub fn from_keyword(keyword: &str) -> Option<Self> {
        SensorKind::ALL.into_iter().find(|k| k.keyword() == keyword)
    }
}

/// A timestamped reading from one sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SensorSample {
    pub kind: SensorKind,
    pub value: i32,
    pub timestamp: DateTime<Utc>,
}

impl SensorSample {
    /// A reading taken now.
    pub fn new(kind: SensorKind, value: i32) -> Self {
        Self::at(kind, value, Utc::now())
    }

    pub fn at(kind: SensorKind, value: i32, timestamp: DateTime<Utc>) -> Self {
        Self {
            kind,
            value,
            timestamp,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Payloads moving through the coalescing mailboxes
// ────────────────────────────────────────────────────────────────────────────

/// Closed set of payload kinds. At most one payload per kind is pending in a
/// coalescing mailbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataKind {
    Control(Channel),
    Sensor(SensorKind),
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataKind::Control(c) => write!(f, "{c} sample"),
            DataKind::Sensor(s) => write!(f, "{s:?} sample"),
        }
    }
}

impl From<Channel> for DataKind {
    fn from(channel: Channel) -> Self {
        DataKind::Control(channel)
    }
}

/// Everything that flows from producers to the dispatch thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Payload {
    Control(ControlSample),
    Sensor(SensorSample),
}

impl Payload {
    pub fn kind(&self) -> DataKind {
        match self {
            Payload::Control(c) => DataKind::Control(c.channel()),
            Payload::Sensor(s) => DataKind::Sensor(s.kind),
        }
    }
}

impl From<ControlSample> for Payload {
    fn from(sample: ControlSample) -> Self {
        Payload::Control(sample)
    }
}

impl From<SensorSample> for Payload {
    fn from(sample: SensorSample) -> Self {
        Payload::Sensor(sample)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Errors
// ────────────────────────────────────────────────────────────────────────────

/// Workspace-wide error type. Every variant is local and recoverable.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RmcsError {
    #[error("Invalid owner identity: {0}")]
    InvalidOwner(i64),

    #[error("Batch contains more than one {0}")]
    DuplicateKind(DataKind),

    #[error("Blocking wait interrupted by shutdown")]
    Interrupted,

    #[error("Channel closed: {0}")]
    ChannelClosed(String),

    #[error("Not registered: {0}")]
    NotRegistered(String),

    #[error("Hardware Fault on {component}: {details}")]
    HardwareFault { component: String, details: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_id_rejects_non_positive() {
        assert!(ConnectionId::new(0).is_none());
        assert!(ConnectionId::new(-5).is_none());
        assert_eq!(ConnectionId::new(3).map(ConnectionId::get), Some(3));
    }

    #[test]
    fn successor_is_own_id_plus_one() {
        let id = ConnectionId::new(2).unwrap();
        assert_eq!(id.successor().get(), 3);
    }

    #[test]
    fn sentinel_decodes_to_fallback() {
        assert_eq!(HandoffTarget::from_raw(-1), Ok(HandoffTarget::Fallback));
    }

    #[test]
    fn other_non_positive_targets_are_rejected() {
        assert_eq!(HandoffTarget::from_raw(0), Err(RmcsError::InvalidOwner(0)));
        assert_eq!(HandoffTarget::from_raw(-2), Err(RmcsError::InvalidOwner(-2)));
    }

    #[test]
    fn out_of_range_target_is_kept_for_the_arbiter() {
        let target = HandoffTarget::from_raw(42).unwrap();
        assert_eq!(target, HandoffTarget::Connection(ConnectionId::new(42).unwrap()));
    }

    #[test]
    fn drive_sample_clamps_fields() {
        let s = DriveSample::new(500, -300, false);
        assert_eq!(s.acceleration(), 127);
        assert_eq!(s.steering(), -127);
    }

    #[test]
    fn camera_sample_clamps_pitch_independently_of_yaw() {
        let s = CameraSample::new(10, 200);
        assert_eq!(s.yaw(), 10);
        assert_eq!(s.pitch(), 127);
    }

    #[test]
    fn ownership_table_tracks_each_channel() {
        let op = ConnectionId::OPERATOR;
        let pad = ConnectionId::new(2).unwrap();
        let mut table = OwnershipTable::all(op);
        table.set(Channel::Camera, pad);

        assert!(table.owns(op, Channel::Drive));
        assert!(table.owns(pad, Channel::Camera));
        assert_eq!(table.channels_of(op), vec![Channel::Drive, Channel::Light]);
        assert_eq!(table.channels_of(pad), vec![Channel::Camera]);
    }

    #[test]
    fn payload_kind_follows_variant() {
        let drive: Payload = ControlSample::Drive(DriveSample::new(1, 2, false)).into();
        assert_eq!(drive.kind(), DataKind::Control(Channel::Drive));

        let sensor: Payload = SensorSample::new(SensorKind::WheelSpeed, 12).into();
        assert_eq!(sensor.kind(), DataKind::Sensor(SensorKind::WheelSpeed));
    }

    #[test]
    fn sensor_keywords_roundtrip() {
        for kind in SensorKind::ALL {
            assert_eq!(SensorKind::from_keyword(kind.keyword()), Some(kind));
        }
        assert_eq!(SensorKind::from_keyword("camera"), None);
    }

    #[test]
    fn channel_serializes_as_variant_name() {
        let json = serde_json::to_string(&Channel::Camera).unwrap();
        assert_eq!(json, "\"Camera\"");
    }

    #[test]
    fn error_display() {
        let err = RmcsError::HardwareFault {
            component: "stm32".to_string(),
            details: "spi timeout".to_string(),
        };
        assert!(err.to_string().contains("stm32"));
        assert!(RmcsError::InvalidOwner(-3).to_string().contains("-3"));
    }
}
