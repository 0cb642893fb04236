//! Error types for device operations

use thiserror::Error;

/// Failures surfaced by the simulated device
///
/// Validation failures never mutate device state. A jammed dispense is not
/// an error: it is a regular outcome reported through the event log.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceError {
    /// Dispense count was missing, non-numeric, fractional or out of range
    #[error("invalid dispense count: {0}")]
    InvalidCount(String),

    /// Calibration mode was not one of `servo` / `stepper`
    #[error("invalid calibration mode: '{0}'")]
    InvalidMode(String),

    /// The device actor has stopped and no longer accepts commands
    #[error("device actor is not running")]
    Unavailable,
}

impl DeviceError {
    /// Stable code reported to API clients
    pub fn code(&self) -> &'static str {
        match self {
            DeviceError::InvalidCount(_) => "invalid_count",
            DeviceError::InvalidMode(_) => "invalid_mode",
            DeviceError::Unavailable => "device_unavailable",
        }
    }
}

pub type Result<T> = std::result::Result<T, DeviceError>;
