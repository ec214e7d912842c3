//! # Error Types
//!
//! Custom error types for FPV Sim Bridge using `thiserror`.
//!
//! Nothing here is meant to be fatal to a running session: the control loop
//! degrades to neutral input or no telemetry instead of propagating.

use thiserror::Error;

/// Main error type for FPV Sim Bridge
#[derive(Debug, Error)]
pub enum SimBridgeError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serial bridge could not bind its listening socket
    #[error("Failed to bind serial bridge to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Operation requires a started serial bridge
    #[error("Serial bridge not started")]
    NotStarted,

    /// Input device errors
    #[error("Controller error: {0}")]
    Controller(String),

    /// No usable input device on this host
    #[error("No input device found")]
    ControllerNotFound,

    /// Firmware update step failed
    #[error("Firmware error: {0}")]
    Firmware(String),

    /// Periodic task terminated abnormally
    #[error("Periodic task failed: {0}")]
    TaskFailed(String),

    /// Flight recorder errors
    #[error("Telemetry error: {0}")]
    Telemetry(String),
}

/// Result type alias for FPV Sim Bridge
pub type Result<T> = std::result::Result<T, SimBridgeError>;
