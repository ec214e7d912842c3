//! # Configuration Module
//!
//! Handles loading and validating session configuration from TOML files.
//!
//! Every section and every key is optional; missing values take the defaults
//! below, so an empty file is a valid configuration.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::error::{Result, SimBridgeError};

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub serial: SerialConfig,
    #[serde(default)]
    pub controller: ControllerConfig,
    #[serde(default)]
    pub sensors: SensorConfig,
    #[serde(default)]
    pub runner: RunnerConfig,
    #[serde(default)]
    pub dynamics: DynamicsConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Serial bridge endpoint
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct SerialConfig {
    #[serde(default = "default_serial_host")]
    pub host: String,

    #[serde(default = "default_serial_port")]
    pub port: u16,

    #[serde(default = "default_buffer_len")]
    pub buffer_len: usize,
}

/// Input device configuration
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ControllerConfig {
    /// Empty string auto-detects.
    #[serde(default)]
    pub device_path: String,

    #[serde(default = "default_deadzone_stick")]
    pub deadzone_stick: f32,

    #[serde(default = "default_expo")]
    pub expo_roll: f32,

    #[serde(default = "default_expo")]
    pub expo_pitch: f32,

    #[serde(default = "default_expo")]
    pub expo_yaw: f32,
}

/// Sensor noise configuration
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct SensorConfig {
    #[serde(default = "default_quaternion_noise")]
    pub quaternion_noise: f32,

    #[serde(default = "default_gyro_noise")]
    pub gyro_noise: f32,

    /// Fixed seed for reproducible noise; entropy when unset.
    #[serde(default)]
    pub seed: Option<u64>,
}

/// Status reporter timing
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct RunnerConfig {
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,

    #[serde(default = "default_yield_us")]
    pub yield_us: u64,

    #[serde(default = "default_grace_ms")]
    pub grace_ms: u64,

    #[serde(default = "default_report_interval_ms")]
    pub report_interval_ms: u64,
}

/// Vehicle dynamics and frame rate
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct DynamicsConfig {
    #[serde(default = "default_thrust_factor")]
    pub thrust_factor: f32,

    #[serde(default = "default_tick_rate_hz")]
    pub tick_rate_hz: u32,

    #[serde(default = "default_mass_kg")]
    pub mass_kg: f32,

    #[serde(default = "default_gravity")]
    pub gravity: f32,
}

/// Flight recorder configuration
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct TelemetryConfig {
    #[serde(default = "default_telemetry_enabled")]
    pub enabled: bool,

    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    #[serde(default = "default_max_records_per_file")]
    pub max_records_per_file: usize,

    #[serde(default = "default_max_files_to_keep")]
    pub max_files_to_keep: usize,

    #[serde(default = "default_log_interval_ms")]
    pub log_interval_ms: u64,

    #[serde(default = "default_log_format")]
    pub format: String,
}

/// Diagnostic log output
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct LoggingConfig {
    /// Directory for daily-rolling log files; stdout only when unset.
    #[serde(default)]
    pub dir: Option<String>,

    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default value functions
fn default_serial_host() -> String { "127.0.0.1".to_string() }
fn default_serial_port() -> u16 { crate::serial::DEFAULT_PORT }
fn default_buffer_len() -> usize { crate::serial::buffer::DEFAULT_BUFFER_LEN }

fn default_deadzone_stick() -> f32 { 0.0 }
fn default_expo() -> f32 { 0.0 }

fn default_quaternion_noise() -> f32 { 0.0 }
fn default_gyro_noise() -> f32 { 0.0 }

fn default_settle_ms() -> u64 { 500 }
fn default_yield_us() -> u64 { 100 }
fn default_grace_ms() -> u64 { 30 }
fn default_report_interval_ms() -> u64 { 1000 }

fn default_thrust_factor() -> f32 { crate::driver::DEFAULT_THRUST_FACTOR }
fn default_tick_rate_hz() -> u32 { 100 }
fn default_mass_kg() -> f32 { crate::host::DEFAULT_MASS_KG }
fn default_gravity() -> f32 { crate::host::STANDARD_GRAVITY }

fn default_telemetry_enabled() -> bool { false }
fn default_log_dir() -> String { "./logs".to_string() }
fn default_max_records_per_file() -> usize { 10000 }
fn default_max_files_to_keep() -> usize { 10 }
fn default_log_interval_ms() -> u64 { 100 }
fn default_log_format() -> String { "jsonl".to_string() }

fn default_log_level() -> String { "info".to_string() }

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            host: default_serial_host(),
            port: default_serial_port(),
            buffer_len: default_buffer_len(),
        }
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            device_path: String::new(),
            deadzone_stick: default_deadzone_stick(),
            expo_roll: default_expo(),
            expo_pitch: default_expo(),
            expo_yaw: default_expo(),
        }
    }
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            quaternion_noise: default_quaternion_noise(),
            gyro_noise: default_gyro_noise(),
            seed: None,
        }
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            settle_ms: default_settle_ms(),
            yield_us: default_yield_us(),
            grace_ms: default_grace_ms(),
            report_interval_ms: default_report_interval_ms(),
        }
    }
}

impl Default for DynamicsConfig {
    fn default() -> Self {
        Self {
            thrust_factor: default_thrust_factor(),
            tick_rate_hz: default_tick_rate_hz(),
            mass_kg: default_mass_kg(),
            gravity: default_gravity(),
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: default_telemetry_enabled(),
            log_dir: default_log_dir(),
            max_records_per_file: default_max_records_per_file(),
            max_files_to_keep: default_max_files_to_keep(),
            log_interval_ms: default_log_interval_ms(),
            format: default_log_format(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: None,
            level: default_log_level(),
        }
    }
}

fn invalid(msg: impl std::fmt::Display) -> SimBridgeError {
    SimBridgeError::Config(toml::de::Error::custom(msg))
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use fpv_sim_bridge::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from a TOML string
    ///
    /// # Errors
    ///
    /// Returns `Config` on parse or validation failure.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Frame period derived from `tick_rate_hz`.
    #[must_use]
    pub fn tick_period(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(1.0 / f64::from(self.dynamics.tick_rate_hz.max(1)))
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        // Serial endpoint
        if self.serial.host.is_empty() {
            return Err(invalid("serial host cannot be empty"));
        }

        if self.serial.buffer_len == 0 || self.serial.buffer_len > 65536 {
            return Err(invalid("buffer_len must be between 1 and 65536"));
        }

        // Stick shaping
        if !(0.0..=0.25).contains(&self.controller.deadzone_stick) {
            return Err(invalid("deadzone_stick must be between 0.0 and 0.25"));
        }

        for (name, value) in [
            ("expo_roll", self.controller.expo_roll),
            ("expo_pitch", self.controller.expo_pitch),
            ("expo_yaw", self.controller.expo_yaw),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(invalid(format!("{} must be between 0.0 and 1.0", name)));
            }
        }

        // Sensor noise
        for (name, value) in [
            ("quaternion_noise", self.sensors.quaternion_noise),
            ("gyro_noise", self.sensors.gyro_noise),
        ] {
            if !(value >= 0.0 && value.is_finite()) {
                return Err(invalid(format!("{} must be a finite value >= 0.0", name)));
            }
        }

        // Runner timing
        if self.runner.grace_ms == 0 || self.runner.grace_ms > 10000 {
            return Err(invalid("grace_ms must be between 1 and 10000"));
        }

        if self.runner.report_interval_ms == 0 || self.runner.report_interval_ms > 60000 {
            return Err(invalid("report_interval_ms must be between 1 and 60000"));
        }

        // Dynamics
        if !(self.dynamics.thrust_factor > 0.0 && self.dynamics.thrust_factor.is_finite()) {
            return Err(invalid("thrust_factor must be greater than 0.0"));
        }

        if self.dynamics.tick_rate_hz == 0 || self.dynamics.tick_rate_hz > 1000 {
            return Err(invalid("tick_rate_hz must be between 1 and 1000"));
        }

        if !(self.dynamics.mass_kg > 0.0) {
            return Err(invalid("mass_kg must be greater than 0.0"));
        }

        if !(self.dynamics.gravity >= 0.0) {
            return Err(invalid("gravity must be >= 0.0"));
        }

        // Flight recorder
        if self.telemetry.enabled && self.telemetry.log_dir.is_empty() {
            return Err(invalid("telemetry log_dir cannot be empty when enabled"));
        }

        if self.telemetry.log_interval_ms == 0 || self.telemetry.log_interval_ms > 60000 {
            return Err(invalid("log_interval_ms must be between 1 and 60000"));
        }

        if self.telemetry.max_records_per_file == 0 {
            return Err(invalid("max_records_per_file must be greater than 0"));
        }

        if self.telemetry.max_files_to_keep == 0 {
            return Err(invalid("max_files_to_keep must be greater than 0"));
        }

        if self.telemetry.format != "jsonl" {
            return Err(invalid("log format must be 'jsonl' (only supported format)"));
        }

        // Diagnostic logging
        if !["trace", "debug", "info", "warn", "error"].contains(&self.logging.level.as_str()) {
            return Err(invalid("logging level must be one of: trace, debug, info, warn, error"));
        }

        Ok(())
    }
}
