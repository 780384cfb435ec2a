//! # Error Types
//!
//! Custom error types for Joycon Bridge using `thiserror`.

use thiserror::Error;

use crate::protocol::state::Side;

/// Main error type for Joycon Bridge
#[derive(Debug, Error)]
pub enum JoyconError {
    /// Transport open/read/write failure, or the polling loop died
    #[error("Connection error: {0}")]
    Connection(String),

    /// IMU sample index outside 0..=2
    #[error("IMU sample index {index} out of range (expected 0, 1 or 2)")]
    OutOfRange { index: i64 },

    /// Calibration reducer received no samples
    #[error("Calibration data error: no samples collected")]
    CalibrationData,

    /// Malformed input report
    #[error("Report protocol error: {0}")]
    Protocol(String),

    /// Operation not allowed in the current connection state
    #[error("Cannot {operation} while {state}")]
    InvalidState {
        operation: &'static str,
        state: String,
    },

    /// No controller of the requested side was found
    #[error("No {side} controller found")]
    DeviceNotFound { side: Side },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Joycon Bridge
pub type Result<T> = std::result::Result<T, JoyconError>;
