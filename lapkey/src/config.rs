//! Static configuration, loaded once at startup from a JSON file.
//!
//! The file path comes from the `LAPKEY_CONFIG` environment variable (`.env` is honored),
//! falling back to `lapkey.json`. Every section has defaults, so a partial file is fine.

use std::env::var_os;
use std::ffi::OsString;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::time::Duration;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use crate::net::GridCellActivation;

const CONFIG_ENV: &str = "LAPKEY_CONFIG";
const DEFAULT_CONFIG_FILE: &str = "lapkey.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub network: NetworkConfig,
    pub presentation: PresentationConfig,
    pub retry: RetryPolicy,
    pub pins: PinConfig,
    pub sensors: [SensorConfig; 2],
    pub timing: TimingConfig,
    pub power: PowerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            network: NetworkConfig::default(),
            presentation: PresentationConfig::default(),
            retry: RetryPolicy::default(),
            pins: PinConfig::default(),
            sensors: [
                SensorConfig {
                    name: "pin21".to_string(),
                    // Header pin 21
                    pin: 9,
                    cell: [11, 2],
                    ..SensorConfig::default()
                },
                SensorConfig {
                    name: "pin23".to_string(),
                    // Header pin 23
                    pin: 11,
                    cell: [11, 1],
                    ..SensorConfig::default()
                },
            ],
            timing: TimingConfig::default(),
            power: PowerConfig::default(),
        }
    }
}

impl Config {
    /// Gets the config file path.
    pub fn path() -> PathBuf {
        let path: OsString = var_os(CONFIG_ENV).unwrap_or_else(|| DEFAULT_CONFIG_FILE.into());
        PathBuf::from(path)
    }

    /// Loads the config from the given file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        Ok(serde_json::from_reader(reader)?)
    }

    /// Loads the config from [Config::path], see [Config::load_or_init_at].
    pub fn load_or_init() -> Self {
        Self::load_or_init_at(&Self::path())
    }

    /// Loads the config from `path`.
    ///
    /// A missing file is created with the defaults. A file that can not be read is left alone
    /// and the defaults are used for this run.
    pub fn load_or_init_at(path: &Path) -> Self {
        if !path.exists() {
            info!("Config not found at {}. Using default.", path.display());
            let config = Config::default();
            match config.save_to(path) {
                Ok(()) => info!("Default config saved."),
                Err(e) => warn!("Failed to save default config: {}", e),
            }
            return config;
        }

        match Self::load_from(path) {
            Ok(config) => {
                info!("Config loaded from {}.", path.display());
                config
            }
            Err(e) => {
                warn!("Failed to load config from {}: {}. Using default.", path.display(), e);
                Config::default()
            }
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let file = File::create(path)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct NetworkConfig {
    /// Host receiving both the grid-cell notifications and the lap-count telegrams.
    pub server_host: String,
    /// TCP port for lap-count telegrams.
    pub lap_count_port: u16,
    /// Address probed at startup to decide whether the network is up.
    pub probe_addr: String,
    pub probe_interval_ms: u64,
    /// Connect timeout for TCP connections. No timeout when unset.
    pub connect_timeout_ms: Option<u64>,
    /// Total timeout for HTTP requests. No timeout when unset, which can hold up shutdown.
    pub http_timeout_ms: Option<u64>,
}

impl NetworkConfig {
    pub fn probe_interval(&self) -> Duration {
        Duration::from_millis(self.probe_interval_ms)
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_ms.map(Duration::from_millis)
    }

    pub fn http_timeout(&self) -> Option<Duration> {
        self.http_timeout_ms.map(Duration::from_millis)
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        NetworkConfig {
            server_host: "192.168.1.44".to_string(),
            lap_count_port: 3636,
            probe_addr: "192.168.1.1:53".to_string(),
            probe_interval_ms: 1000,
            connect_timeout_ms: Some(5000),
            http_timeout_ms: Some(10_000),
        }
    }
}

/// Endpoints of the presentation layer (the display reacting to laps).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct PresentationConfig {
    pub clear_url: String,
    pub trigger_url: String,
    /// Skips TLS certificate verification. The presentation host uses a self-signed certificate.
    pub accept_invalid_certs: bool,
}

impl Default for PresentationConfig {
    fn default() -> Self {
        PresentationConfig {
            clear_url: "https://192.168.1.44/api/presentation/clear".to_string(),
            trigger_url: "https://192.168.1.44/api/presentation/trigger".to_string(),
            accept_invalid_certs: true,
        }
    }
}

/// How often and how patiently a lap-count telegram is retried.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub attempts: u32,
    pub delay_ms: u64,
}

impl RetryPolicy {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            attempts: 3,
            delay_ms: 2000,
        }
    }
}

/// GPIO line offsets. The defaults are BCM numbers for the physical header pins in comments.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct PinConfig {
    pub chip: String,
    /// Keypad rows, top to bottom.
    pub rows: [usize; 4],
    /// Keypad columns, left to right.
    pub cols: [usize; 3],
    pub indicator: usize,
}

impl Default for PinConfig {
    fn default() -> Self {
        PinConfig {
            chip: "/dev/gpiochip0".to_string(),
            // Header pins 16, 18, 22, 24
            rows: [23, 24, 25, 8],
            // Header pins 32, 36, 38
            cols: [12, 16, 20],
            // Header pin 11
            indicator: 17,
        }
    }
}

/// A sensor input and the grid cell it activates.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SensorConfig {
    pub name: String,
    pub pin: usize,
    /// HTTP port on [NetworkConfig::server_host] receiving the activation.
    pub port: u16,
    pub grid: String,
    pub cell: [u16; 2],
}

impl SensorConfig {
    pub fn activation(&self) -> GridCellActivation {
        GridCellActivation::new(&self.grid, self.cell)
    }
}

impl Default for SensorConfig {
    fn default() -> Self {
        SensorConfig {
            name: "sensor".to_string(),
            pin: 0,
            port: 5201,
            grid: "grid".to_string(),
            cell: [0, 0],
        }
    }
}

/// Loop cadence and indicator timing.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct TimingConfig {
    /// Pause between two keypad scans.
    pub poll_interval_ms: u64,
    /// Pause between two reads while waiting for a key to be released.
    pub release_poll_ms: u64,
    /// How long the indicator stays lit for one pulse.
    pub pulse_ms: u64,
    /// Pause after each pulse of a pulse pattern.
    pub pulse_gap_ms: u64,
    /// Sensor edges closer than this to the previous one are ignored.
    pub bounce_ms: u64,
    /// How long to wait for an orderly stop after an interrupt before exiting anyway.
    pub shutdown_grace_ms: u64,
}

impl TimingConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn release_poll(&self) -> Duration {
        Duration::from_millis(self.release_poll_ms)
    }

    pub fn pulse(&self) -> Duration {
        Duration::from_millis(self.pulse_ms)
    }

    pub fn pulse_gap(&self) -> Duration {
        Duration::from_millis(self.pulse_gap_ms)
    }

    pub fn bounce(&self) -> Duration {
        Duration::from_millis(self.bounce_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        TimingConfig {
            poll_interval_ms: 100,
            release_poll_ms: 50,
            pulse_ms: 150,
            pulse_gap_ms: 100,
            bounce_ms: 500,
            shutdown_grace_ms: 30_000,
        }
    }
}

/// Commands run for the power-off and reboot key sequences, as argv lists.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct PowerConfig {
    pub shutdown: Vec<String>,
    pub reboot: Vec<String>,
}

impl Default for PowerConfig {
    fn default() -> Self {
        PowerConfig {
            shutdown: ["sudo", "shutdown", "-h", "now"].map(String::from).to_vec(),
            reboot: ["sudo", "reboot"].map(String::from).to_vec(),
        }
    }
}
