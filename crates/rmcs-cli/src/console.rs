//! Terminal presenter.
//!
//! Subscribes to every status topic and keeps one text block per topic:
//!
//! | Block | Source | Shape |
//! |---|---|---|
//! | ownership | [`Topic::Ownership`] | one line, latest table |
//! | connection log | [`Topic::Connection`] | scrolling, last [`LOG_LINES`] lines |
//! | operator control | [`Topic::Operator`] | latest sample per channel |
//! | gamepads | [`Topic::Gamepad`] | one line per pad |
//! | sensors | [`Topic::Sensors`] | latest reading per kind |
//!
//! The screen is redrawn at most once per refresh period and only when
//! something changed. Receivers never block the publishers; a lagging
//! presenter simply skips events.

use std::collections::{BTreeMap, VecDeque};
use std::io::Write;
use std::time::Duration;

use colored::Colorize;
use rmcs_middleware::{GamepadStatus, Shutdown, StatusBus, StatusEvent, StatusPayload, Topic, TopicReceiver};
use rmcs_types::{Channel, ControlSample, OwnershipTable, SensorKind, SensorSample};

pub const LOG_LINES: usize = 500;
/// Log lines shown on screen; the rest is kept for scroll-back.
const VISIBLE_LOG_LINES: usize = 12;

#[derive(Default)]
pub struct Console {
    log: VecDeque<String>,
    ownership: Option<OwnershipTable>,
    operator: BTreeMap<Channel, ControlSample>,
    gamepads: BTreeMap<u32, GamepadStatus>,
    sensors: Vec<SensorSample>,
    dirty: bool,
}

impl Console {
    pub fn new() -> Self {
        Self::default()
    }

    fn push_log(&mut self, line: String) {
        if self.log.len() == LOG_LINES {
            self.log.pop_front();
        }
        self.log.push_back(line);
    }

    /// Fold one event into the blocks.
    pub fn apply(&mut self, event: StatusEvent) {
        let stamp = event.timestamp.format("%H:%M:%S%.3f");
        match event.payload {
            StatusPayload::Ownership(table) => {
                self.push_log(format!("{stamp} ownership {}", describe_table(&table)));
                self.ownership = Some(table);
            }
            StatusPayload::ConnectionOpened { id, label } => {
                self.push_log(format!("{stamp} connection {id} opened: {label}"));
            }
            StatusPayload::Notice(text) => {
                self.push_log(format!("{stamp} [{}] {text}", event.source));
            }
            StatusPayload::OperatorControl(sample) => {
                self.operator.insert(sample.channel(), sample);
            }
            StatusPayload::Gamepad(status) => {
                self.gamepads.insert(status.id.get(), status);
            }
            StatusPayload::Sensor(sample) => match self.sensors.iter_mut().find(|s| s.kind == sample.kind) {
                Some(slot) => *slot = sample,
                None => self.sensors.push(sample),
            },
        }
        self.dirty = true;
    }

    /// Take and clear the changed flag.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("{}\n", "── Ownership ─────────────────────────".bold().cyan()));
        match &self.ownership {
            Some(table) => out.push_str(&format!("  {}\n", describe_table(table))),
            None => out.push_str(&format!("  {}\n", "pending".dimmed())),
        }

        out.push_str(&format!("{}\n", "── Operator control ──────────────────".bold().cyan()));
        if self.operator.is_empty() {
            out.push_str(&format!("  {}\n", "no samples".dimmed()));
        }
        for sample in self.operator.values() {
            out.push_str(&format!("  {}\n", describe_sample(sample)));
        }

        out.push_str(&format!("{}\n", "── Gamepads ──────────────────────────".bold().cyan()));
        if self.gamepads.is_empty() {
            out.push_str(&format!("  {}\n", "none".dimmed()));
        }
        for pad in self.gamepads.values() {
            let channels: Vec<String> = pad.channels.iter().map(Channel::to_string).collect();
            let owned = if channels.is_empty() {
                "-".dimmed().to_string()
            } else {
                channels.join(",").green().to_string()
            };
            out.push_str(&format!(
                "  {} gear {} acc {:>4} steer {:>4} cam {:>4}/{:<4} owns {}\n",
                pad.id.to_string().bold(),
                pad.gear,
                pad.acceleration,
                pad.steering,
                pad.camera_yaw,
                pad.camera_pitch,
                owned
            ));
        }

        out.push_str(&format!("{}\n", "── Sensors ───────────────────────────".bold().cyan()));
        if self.sensors.is_empty() {
            out.push_str(&format!("  {}\n", "none".dimmed()));
        }
        for kind in SensorKind::ALL {
            if let Some(s) = self.sensors.iter().find(|s| s.kind == kind) {
                out.push_str(&format!("  {:<6} {:>5}\n", kind.keyword(), s.value));
            }
        }

        out.push_str(&format!("{}\n", "── Log ───────────────────────────────".bold().cyan()));
        let skip = self.log.len().saturating_sub(VISIBLE_LOG_LINES);
        for line in self.log.iter().skip(skip) {
            out.push_str(&format!("  {line}\n"));
        }
        out
    }

    /// Drain `receivers` and redraw until `shutdown` fires.
    pub fn run(mut self, mut receivers: Vec<TopicReceiver>, refresh: Duration, shutdown: &Shutdown) {
        loop {
            for rx in &mut receivers {
                while let Some(event) = rx.try_recv() {
                    self.apply(event);
                }
            }
            if self.take_dirty() {
                let mut stdout = std::io::stdout().lock();
                // Clear screen, cursor home.
                let _ = write!(stdout, "\x1B[2J\x1B[H{}", self.render());
                let _ = stdout.flush();
            }
            if shutdown.sleep(refresh) {
                break;
            }
        }
    }
}

/// One receiver per topic, in display order.
pub fn subscribe_all(bus: &StatusBus) -> Vec<TopicReceiver> {
    Topic::ALL.iter().map(|t| bus.subscribe_to(*t)).collect()
}

fn describe_table(table: &OwnershipTable) -> String {
    Channel::ALL
        .iter()
        .map(|c| format!("{c}={}", table.owner(*c)))
        .collect::<Vec<_>>()
        .join(" ")
}

fn describe_sample(sample: &ControlSample) -> String {
    match sample {
        ControlSample::Drive(d) => format!(
            "drive  acc {:>4} steer {:>4}{}",
            d.acceleration(),
            d.steering(),
            if d.stop() { " STOP" } else { "" }
        ),
        ControlSample::Light(l) => format!(
            "light  front {} back {} dynamic {} left {} right {}",
            l.front as u8, l.back as u8, l.dynamic as u8, l.left_turn as u8, l.right_turn as u8
        ),
        ControlSample::Camera(c) => format!("camera yaw {:>4} pitch {:>4}", c.yaw(), c.pitch()),
    }
}
