//! Vehicle configuration – reads/writes `~/.rmcs/config.toml`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rmcs_gamepad::GamepadSettings;

/// Persisted configuration stored in `~/.rmcs/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Identifier this car announces to the operator station.
    #[serde(default = "default_car_id")]
    pub car_id: u32,

    #[serde(default = "default_poll_interval_ms")]
    pub gamepad_poll_interval_ms: u64,

    /// Minimum spacing of control samples from one pad.
    #[serde(default = "default_publish_interval_ms")]
    pub control_publish_interval_ms: u64,

    /// Spacing of the per-pad status snapshots.
    #[serde(default = "default_status_interval_ms")]
    pub status_interval_ms: u64,

    #[serde(default = "default_hold_threshold_ms")]
    pub hold_threshold_ms: u64,

    #[serde(default = "default_combo_threshold_ms")]
    pub combo_threshold_ms: u64,

    /// Sensor board period. Values below 10 are raised to 10.
    #[serde(default = "default_sensor_interval_ms")]
    pub sensor_update_interval_ms: u64,

    #[serde(default = "default_console_refresh_ms")]
    pub console_refresh_ms: u64,

    /// Hand the channels to the first gamepad instead of the operator at
    /// startup.
    #[serde(default)]
    pub prioritize_gamepad: bool,

    /// Car property keywords, see [`crate::properties`].
    #[serde(default)]
    pub properties: Vec<String>,
}

fn default_car_id() -> u32 {
    1001
}
fn default_poll_interval_ms() -> u64 {
    5
}
fn default_publish_interval_ms() -> u64 {
    40
}
fn default_status_interval_ms() -> u64 {
    100
}
fn default_hold_threshold_ms() -> u64 {
    500
}
fn default_combo_threshold_ms() -> u64 {
    1000
}
fn default_sensor_interval_ms() -> u64 {
    500
}
fn default_console_refresh_ms() -> u64 {
    500
}

const MIN_SENSOR_INTERVAL_MS: u64 = 10;

impl Default for Config {
    fn default() -> Self {
        Self {
            car_id: default_car_id(),
            gamepad_poll_interval_ms: default_poll_interval_ms(),
            control_publish_interval_ms: default_publish_interval_ms(),
            status_interval_ms: default_status_interval_ms(),
            hold_threshold_ms: default_hold_threshold_ms(),
            combo_threshold_ms: default_combo_threshold_ms(),
            sensor_update_interval_ms: default_sensor_interval_ms(),
            console_refresh_ms: default_console_refresh_ms(),
            prioritize_gamepad: false,
            properties: Vec::new(),
        }
    }
}

impl Config {
    pub fn gamepad_settings(&self) -> GamepadSettings {
        GamepadSettings {
            poll_interval: Duration::from_millis(self.gamepad_poll_interval_ms.max(1)),
            publish_interval: Duration::from_millis(self.control_publish_interval_ms),
            status_interval: Duration::from_millis(self.status_interval_ms),
            hold_threshold: Duration::from_millis(self.hold_threshold_ms),
            combo_threshold: Duration::from_millis(self.combo_threshold_ms),
        }
    }

    pub fn sensor_interval(&self) -> Duration {
        Duration::from_millis(self.sensor_update_interval_ms.max(MIN_SENSOR_INTERVAL_MS))
    }

    pub fn console_refresh(&self) -> Duration {
        Duration::from_millis(self.console_refresh_ms.max(1))
    }
}

/// Return the path to `~/.rmcs/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".rmcs").join("config.toml")
}

/// Load the config from the default location. `None` if the file does not
/// exist.
pub fn load() -> Result<Option<Config>, String> {
    load_from(&config_path())
}

/// Load the config from a specific path and apply environment overrides.
pub fn load_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let mut cfg: Config = toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    apply_env_overrides(&mut cfg);
    Ok(Some(cfg))
}

/// Apply `RMCS_*` environment variable overrides to `cfg`. Values that do
/// not parse are ignored.
///
/// | Variable | Config field |
/// |---|---|
/// | `RMCS_CAR_ID` | `car_id` |
/// | `RMCS_PRIORITIZE_GAMEPAD` | `prioritize_gamepad` |
/// | `RMCS_SENSOR_INTERVAL_MS` | `sensor_update_interval_ms` |
/// | `RMCS_POLL_INTERVAL_MS` | `gamepad_poll_interval_ms` |
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("RMCS_CAR_ID")
        && let Ok(id) = v.parse::<u32>()
    {
        cfg.car_id = id;
    }
    if let Ok(v) = std::env::var("RMCS_PRIORITIZE_GAMEPAD")
        && let Some(flag) = parse_flag(&v)
    {
        cfg.prioritize_gamepad = flag;
    }
    if let Ok(v) = std::env::var("RMCS_SENSOR_INTERVAL_MS")
        && let Ok(ms) = v.parse::<u64>()
    {
        cfg.sensor_update_interval_ms = ms;
    }
    if let Ok(v) = std::env::var("RMCS_POLL_INTERVAL_MS")
        && let Ok(ms) = v.parse::<u64>()
    {
        cfg.gamepad_poll_interval_ms = ms;
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Render `cfg` the way it is stored on disk.
pub fn to_toml(cfg: &Config) -> Result<String, String> {
    toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))
}

/// Save the config to `path`, creating the parent directory if necessary.
pub fn save_to(cfg: &Config, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| format!("Failed to create config directory: {}", e))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700))
                .map_err(|e| format!("Failed to set config directory permissions: {}", e))?;
        }
    }
    let raw = to_toml(cfg)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| {
                use std::io::Write;
                f.write_all(raw.as_bytes())
            })
            .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw).map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    Ok(())
}
