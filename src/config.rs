//! Configuration management for the Solivia driver
//!
//! This module handles loading, validation, and management of the application
//! configuration from YAML files. Validation runs before the driver core is
//! constructed; the core assumes a validated configuration.

use crate::error::{Result, SoliviaError};
use crate::measurement::Measurement;
use serde::{Deserialize, Serialize};
use std::path::Path;

fn default_throttle_ms() -> u64 {
    10_000
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Serial bus connection configuration
    pub serial: SerialConfig,

    /// Inverters sharing the bus, in poll order
    pub inverters: Vec<InverterConfig>,

    /// Whether an external gateway polls this controller.
    ///
    /// With a gateway present the scheduler tick is pinned to 500 ms
    /// regardless of `update_interval_ms`.
    #[serde(default)]
    pub has_gateway: bool,

    /// Scheduler tick interval in milliseconds (standalone mode).
    /// Values below one second tend to produce bus timeouts.
    pub update_interval_ms: u64,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Serial bus connection parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerialConfig {
    /// Serial device path (e.g. /dev/ttyUSB0)
    pub port: String,

    /// Baud rate (Solivia buses run at 19200 8N1)
    pub baud_rate: u32,

    /// Toggle RTS for half-duplex line direction switching.
    /// Needed on RS-485 adapters without automatic driver-enable control.
    #[serde(default)]
    pub rts_flow_control: bool,

    /// Upper bound for a single response, in milliseconds
    pub response_timeout_ms: u64,
}

/// Per-inverter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InverterConfig {
    /// Bus address, unique among configured inverters, >= 1
    pub address: u8,

    /// Minimum spacing between reported value updates for this inverter
    #[serde(default = "default_throttle_ms")]
    pub throttle_ms: u64,

    /// Measurement fields to decode and report. Omitted = all fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<Measurement>>,
}

impl InverterConfig {
    /// The measurement kinds enabled for this inverter.
    pub fn enabled_fields(&self) -> Vec<Measurement> {
        match &self.fields {
            Some(fields) => fields.clone(),
            None => Measurement::ALL.to_vec(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    pub level: String,

    /// Path to log file (or directory for rotated files)
    pub file: String,

    /// Number of rotated files to keep
    pub backup_count: u32,

    /// Whether to log to console
    pub console_output: bool,

    /// Whether to use JSON format
    pub json_format: bool,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".to_string(),
            baud_rate: 19_200,
            rts_flow_control: false,
            response_timeout_ms: 300,
        }
    }
}

impl Default for InverterConfig {
    fn default() -> Self {
        Self {
            address: 1,
            throttle_ms: default_throttle_ms(),
            fields: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "INFO".to_string(),
            file: "/tmp/solivia.log".to_string(),
            backup_count: 5,
            console_output: true,
            json_format: false,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            serial: SerialConfig::default(),
            inverters: vec![InverterConfig::default()],
            has_gateway: false,
            update_interval_ms: 1000,
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from the default locations
    pub fn load() -> Result<Self> {
        let default_paths = [
            "solivia_config.yaml",
            "/data/solivia_config.yaml",
            "/etc/solivia/config.yaml",
        ];

        for path in &default_paths {
            if Path::new(path).exists() {
                return Self::from_file(path);
            }
        }

        Ok(Config::default())
    }

    /// Save configuration to a YAML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Validate the configuration.
    ///
    /// Address uniqueness and the at-least-one-inverter rule are enforced
    /// here, not at runtime; a rejected configuration means nothing runs.
    pub fn validate(&self) -> Result<()> {
        if self.serial.port.is_empty() {
            return Err(SoliviaError::validation(
                "serial.port",
                "serial port cannot be empty",
            ));
        }

        if self.serial.baud_rate == 0 {
            return Err(SoliviaError::validation(
                "serial.baud_rate",
                "baud rate must be greater than 0",
            ));
        }

        if self.serial.response_timeout_ms == 0 {
            return Err(SoliviaError::validation(
                "serial.response_timeout_ms",
                "response timeout must be greater than 0",
            ));
        }

        if self.update_interval_ms == 0 {
            return Err(SoliviaError::validation(
                "update_interval_ms",
                "update interval must be greater than 0",
            ));
        }

        if self.inverters.is_empty() {
            return Err(SoliviaError::NoInverters);
        }

        let mut seen = std::collections::HashSet::new();
        for inverter in &self.inverters {
            if inverter.address == 0 {
                return Err(SoliviaError::validation(
                    "inverters.address",
                    "inverter addresses start at 1",
                ));
            }
            if !seen.insert(inverter.address) {
                return Err(SoliviaError::DuplicateAddress {
                    address: inverter.address,
                });
            }
        }

        Ok(())
    }
}
