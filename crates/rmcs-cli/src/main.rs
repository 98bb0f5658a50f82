//! `rmcs` – rover control plane.
//!
//! Loads `~/.rmcs/config.toml` (or `--config FILE`), merges command-line
//! flags over it, wires the control plane and runs the console presenter on
//! the main thread until Ctrl-C.

mod app;
mod config;
mod console;
mod operator;
mod properties;
mod telemetry;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use colored::Colorize;
use rmcs_gamepad::{PadSource, SimulatedPad};
use rmcs_middleware::StatusBus;
use rmcs_types::SensorKind;
use tracing::{info, warn};

use app::{App, RunSettings};
use config::Config;
use console::Console;
use properties::{Property, PropertySet};

const PKG_DESCRIPTION: &str = concat!(env!("CARGO_PKG_NAME"), " - rover control plane");

#[derive(Debug, Default, Parser)]
#[command(version = env!("CARGO_PKG_VERSION"), about = PKG_DESCRIPTION)]
struct Cli {
    /// Path to configuration file
    #[arg(long = "config", short = 'C', value_name = "FILE")]
    config: Option<PathBuf>,
    /// Print the effective configuration and exit
    #[arg(long = "print-config")]
    print_config: bool,
    /// Write the effective configuration to the config file and exit
    #[arg(long = "save-config")]
    save_config: bool,
    /// Car identifier announced to the operator station
    #[arg(long = "id")]
    id: Option<u32>,
    /// Camera gimbal fitted
    #[arg(long)]
    camera: bool,
    /// Lights fitted
    #[arg(long)]
    lights: bool,
    /// Turn signals fitted
    #[arg(long)]
    winkers: bool,
    /// All four sensors fitted
    #[arg(long)]
    sensors: bool,
    #[arg(long = "front-distance-sensor")]
    front_distance_sensor: bool,
    #[arg(long = "left-distance-sensor")]
    left_distance_sensor: bool,
    #[arg(long = "right-distance-sensor")]
    right_distance_sensor: bool,
    #[arg(long = "velocity-sensor")]
    velocity_sensor: bool,
    /// Enable local gamepad control
    #[arg(long)]
    gamepad: bool,
    /// Number of simulated gamepads (implies --gamepad)
    #[arg(long = "sim-gamepads", value_name = "N")]
    sim_gamepads: Option<usize>,
    /// Give the channels to the first gamepad at startup
    #[arg(long = "prioritize-gamepad")]
    prioritize_gamepad: bool,
}

impl Cli {
    /// Flag-selected properties, in announcement order.
    fn properties(&self) -> Vec<Property> {
        let mut out = Vec::new();
        if self.camera {
            out.push(Property::Camera);
        }
        if self.lights {
            out.push(Property::Lights);
        }
        if self.winkers {
            out.push(Property::Winkers);
        }
        let sensors = [
            (self.front_distance_sensor, SensorKind::FrontDistance),
            (self.left_distance_sensor, SensorKind::LeftDistance),
            (self.right_distance_sensor, SensorKind::RightDistance),
            (self.velocity_sensor, SensorKind::WheelSpeed),
        ];
        for (set, kind) in sensors {
            if set || self.sensors {
                out.push(Property::Sensor(kind));
            }
        }
        out
    }

    fn gamepad_count(&self) -> usize {
        match self.sim_gamepads {
            Some(n) => n,
            None if self.gamepad => 1,
            None => 0,
        }
    }

    /// Merge flags over `cfg`.
    fn apply_to(&self, cfg: &mut Config) {
        if let Some(id) = self.id {
            cfg.car_id = id;
        }
        if self.prioritize_gamepad {
            cfg.prioritize_gamepad = true;
        }
        for property in self.properties() {
            let keyword = property.keyword();
            if !cfg.properties.iter().any(|k| k == keyword) {
                cfg.properties.push(keyword.to_string());
            }
        }
    }
}

fn load_config(cli: &Cli) -> Result<Config, String> {
    let loaded = match &cli.config {
        Some(path) => match config::load_from(path)? {
            Some(cfg) => Some(cfg),
            None => return Err(format!("Config file {} not found", path.display())),
        },
        None => config::load()?,
    };
    Ok(loaded.unwrap_or_else(|| {
        let mut cfg = Config::default();
        config::apply_env_overrides(&mut cfg);
        cfg
    }))
}

fn gamepad_sources(count: usize) -> Vec<Box<dyn PadSource>> {
    (0..count)
        .map(|i| {
            // No one holds the handle: the pad stays idle until hardware
            // input replaces it.
            let (pad, _handle) = SimulatedPad::new(format!("sim-pad-{i}"));
            Box::new(pad) as Box<dyn PadSource>
        })
        .collect()
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let _guard = telemetry::init_tracing("rmcs");

    let mut cfg = match load_config(&cli) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("{}: {}", "Config error".red(), e);
            return ExitCode::FAILURE;
        }
    };
    cli.apply_to(&mut cfg);

    if cli.print_config {
        return match config::to_toml(&cfg) {
            Ok(raw) => {
                print!("{raw}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("{}: {}", "Config error".red(), e);
                ExitCode::FAILURE
            }
        };
    }

    if cli.save_config {
        let path = cli.config.clone().unwrap_or_else(config::config_path);
        return match config::save_to(&cfg, &path) {
            Ok(()) => {
                println!("  {} Config saved to {}", "✓".green().bold(), path.display().to_string().bold());
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("{}: {}", "Error saving config".red(), e);
                ExitCode::FAILURE
            }
        };
    }

    match run(&cli, &cfg) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}: {}", "Error".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli, cfg: &Config) -> Result<(), String> {
    let properties = PropertySet::parse(&cfg.properties).map_err(|e| e.to_string())?;
    let settings = RunSettings::from_config(cfg, properties);
    print_banner(&settings);

    let pads = gamepad_sources(cli.gamepad_count());
    let status = StatusBus::default();
    // Subscribe before wiring so startup announcements are not missed.
    let receivers = console::subscribe_all(&status);

    let app = App::build(&settings, pads, status).map_err(|e| e.to_string())?;
    let shutdown = app.shutdown().clone();
    let running = app
        .start()
        .map_err(|e| format!("Failed to start threads: {e}"))?;

    let on_signal = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        eprintln!();
        eprintln!("{}", "⚠  Ctrl-C received – shutting down …".yellow().bold());
        on_signal.trigger();
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; stop the process with a signal instead");
    }

    Console::new().run(receivers, cfg.console_refresh(), &shutdown);
    running.stop();
    info!("bye");
    Ok(())
}

fn print_banner(settings: &RunSettings) {
    println!();
    println!("{}", "  ┌──────────────────────────────┐".bold().cyan());
    println!("{}", "  │   RMCS rover control plane   │".bold().cyan());
    println!("{}", "  └──────────────────────────────┘".bold().cyan());
    println!("  car {}", settings.car_id.to_string().bold());
    if settings.properties.is_empty() {
        println!("  properties: {}", "none".dimmed());
    } else {
        println!("  properties: {}", settings.properties.to_string().green());
    }
    println!();
}
