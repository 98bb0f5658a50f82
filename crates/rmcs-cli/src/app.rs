//! Startup wiring.
//!
//! [`App::build`] creates every piece in dependency order:
//!
//! 1. status bus, handoff channel and the inbound mailbox,
//! 2. the operator connection (identity 1), then one connection per pad,
//! 3. the arbiter with every participant registered,
//! 4. the dispatcher with the actuation component and the operator as an
//!    "any sensor" listener,
//! 5. the initial ownership requests (Drive, Light, Camera).
//!
//! [`App::start`] then spawns the threads and returns a [`Running`] handle.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use rmcs_gamepad::{GamepadManager, GamepadSettings, PadSource};
use rmcs_hal::{Actuator, AppliedLog, ControlComponent, SensorBoard, SimActuator};
use rmcs_kernel::{Arbiter, Connection, IdAllocator, OwnershipHandle, Role};
use rmcs_middleware::{
    Dispatcher, HandoffReceiver, HandoffSender, Mailbox, SensorInterest, Shutdown, StatusBus, StatusPayload,
    Topic, handoff_channel,
};
use rmcs_types::{Channel, ConnectionId, HandoffRequest, Payload, RmcsError};
use tracing::{error, info};

use crate::config::Config;
use crate::operator::Operator;
use crate::properties::PropertySet;

/// Everything the wiring needs, resolved from config and flags.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub car_id: u32,
    pub gamepad: GamepadSettings,
    pub sensor_interval: Duration,
    pub prioritize_gamepad: bool,
    pub properties: PropertySet,
}

impl RunSettings {
    pub fn from_config(cfg: &Config, properties: PropertySet) -> Self {
        Self {
            car_id: cfg.car_id,
            gamepad: cfg.gamepad_settings(),
            sensor_interval: cfg.sensor_interval(),
            prioritize_gamepad: cfg.prioritize_gamepad,
            properties,
        }
    }
}

/// The wired but not yet running control plane.
pub struct App {
    shutdown: Shutdown,
    arbiter: Arbiter,
    requests: HandoffReceiver,
    dispatcher: Arc<Dispatcher>,
    operator: Arc<Operator>,
    gamepads: GamepadManager,
    component: Arc<ControlComponent>,
    actuator: Box<dyn Actuator>,
    applied: AppliedLog,
    sensors: Option<SensorBoard>,
}

impl App {
    pub fn build(settings: &RunSettings, pads: Vec<Box<dyn PadSource>>, status: StatusBus) -> Result<Self, RmcsError> {
        let shutdown = Shutdown::new();
        let (handoffs, requests) = handoff_channel();
        let inbound: Arc<Mailbox<Payload>> = Arc::new(Mailbox::new());
        shutdown.watch(inbound.clone());

        let mut ids = IdAllocator::new();
        let operator = Arc::new(Operator::new(
            Connection::new(ids.allocate(), Role::Operator, "operator", inbound.clone(), handoffs.clone()),
            status.clone(),
        ));
        let gamepads =
            GamepadManager::new(pads, &mut ids, &inbound, &handoffs, settings.gamepad).with_status_bus(&status);

        let mut arbiter = Arbiter::new().with_status_bus(status.clone());
        arbiter.register(operator.clone());
        for pad in gamepads.connections() {
            arbiter.register(pad);
        }

        let dispatcher = Arc::new(Dispatcher::new(inbound.clone()));
        let component = Arc::new(ControlComponent::new("actuation", &Channel::ALL));
        dispatcher.register_sink(component.clone());
        dispatcher.add_listener(operator.clone(), &[SensorInterest::Any]);

        let actuator = SimActuator::new("sim-actuator");
        let applied = actuator.log();

        let sensors = settings.properties.has_sensors().then(|| {
            settings
                .properties
                .sensors()
                .into_iter()
                .fold(SensorBoard::new(inbound.clone(), settings.sensor_interval), SensorBoard::with_sensor)
        });

        status.emit(
            Topic::Connection,
            "rmcs",
            StatusPayload::Notice(format!("car {} properties: [{}]", settings.car_id, settings.properties)),
        );
        status.emit(
            Topic::Connection,
            "rmcs",
            StatusPayload::ConnectionOpened {
                id: operator.connection().id(),
                label: operator.connection().label().to_string(),
            },
        );
        for pad in gamepads.connections() {
            status.emit(
                Topic::Connection,
                "rmcs",
                StatusPayload::ConnectionOpened {
                    id: pad.connection().id(),
                    label: pad.connection().label().to_string(),
                },
            );
        }

        let population = arbiter.population();
        let initial = population.initial_owner(settings.prioritize_gamepad);
        info!(
            total = population.total(),
            controllers = population.controllers(),
            %initial,
            "requesting initial ownership"
        );
        request_all(&handoffs, initial)?;

        Ok(Self {
            shutdown,
            arbiter,
            requests,
            dispatcher,
            operator,
            gamepads,
            component,
            actuator: Box::new(actuator),
            applied,
            sensors,
        })
    }

    pub fn shutdown(&self) -> &Shutdown {
        &self.shutdown
    }

    /// Spawn the driver, dispatch, arbiter, pad and sensor threads.
    pub fn start(self) -> std::io::Result<Running> {
        let ownership = self.arbiter.ownership();
        let mut threads = Vec::new();

        threads.push(self.component.spawn(self.actuator, &self.shutdown)?);

        let dispatcher = self.dispatcher.clone();
        let shutdown = self.shutdown.clone();
        threads.push(
            thread::Builder::new()
                .name("rmcs-dispatch".to_string())
                .spawn(move || dispatcher.run(&shutdown))?,
        );

        threads.push(self.arbiter.spawn(self.requests, self.shutdown.clone())?);
        threads.extend(self.gamepads.spawn(&self.shutdown)?);
        if let Some(board) = self.sensors {
            threads.push(board.spawn(&self.shutdown)?);
        }
        info!(threads = threads.len(), "control plane running");

        Ok(Running {
            shutdown: self.shutdown,
            operator: self.operator,
            ownership,
            applied: self.applied,
            threads,
        })
    }
}

fn request_all(handoffs: &HandoffSender, owner: ConnectionId) -> Result<(), RmcsError> {
    for channel in Channel::ALL {
        handoffs.send(HandoffRequest::new(owner, channel))?;
    }
    Ok(())
}

/// Handle on the running control plane.
pub struct Running {
    shutdown: Shutdown,
    operator: Arc<Operator>,
    ownership: OwnershipHandle,
    applied: AppliedLog,
    threads: Vec<JoinHandle<()>>,
}

impl Running {
    /// Trigger shutdown and wait for every thread.
    pub fn stop(self) {
        info!(
            operator = %self.operator.connection().id(),
            ownership = ?self.ownership.snapshot(),
            applied = self.applied.len(),
            "stopping control plane"
        );
        self.shutdown.trigger();
        for handle in self.threads {
            let name = handle.thread().name().unwrap_or("unnamed").to_string();
            if handle.join().is_err() {
                error!(thread = %name, "thread panicked");
            }
        }
        info!("control plane stopped");
    }
}
