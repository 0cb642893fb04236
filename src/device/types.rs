//! Device state type definitions
//!
//! Wire shapes follow the JSON the device has always spoken: camelCase
//! field names and lowercase enum tags.

use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use std::str::FromStr;

use crate::error::DeviceError;

/// Current wall-clock time in milliseconds since the Unix epoch
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Wi-Fi link as reported by the device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WifiInfo {
    pub connected: bool,
    pub ssid: Option<String>,
    /// Signal strength in dBm
    pub rssi: i32,
    pub ip: String,
}

/// Battery gauge reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatteryInfo {
    /// Charge level, always within [0, 100]
    pub percent: f64,
    pub voltage: f64,
}

/// Outcome of a completed dispense
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispenseOutcome {
    Ok,
    Jam,
}

impl std::fmt::Display for DispenseOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DispenseOutcome::Ok => write!(f, "ok"),
            DispenseOutcome::Jam => write!(f, "jam"),
        }
    }
}

/// Result of the most recently completed dispense job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispenseResult {
    /// Completion time (ms since epoch)
    pub at: i64,
    pub count: u32,
    pub result: DispenseOutcome,
    pub duration_ms: u64,
}

/// Severity tag of an event log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogKind {
    Info,
    Error,
    Ok,
}

impl std::fmt::Display for LogKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogKind::Info => write!(f, "info"),
            LogKind::Error => write!(f, "error"),
            LogKind::Ok => write!(f, "ok"),
        }
    }
}

/// One event log record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub ts: i64,
    #[serde(rename = "type")]
    pub kind: LogKind,
    pub msg: String,
}

/// Actuator driving the feeder gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CalibrationMode {
    Servo,
    Stepper,
}

impl CalibrationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CalibrationMode::Servo => "servo",
            CalibrationMode::Stepper => "stepper",
        }
    }
}

impl FromStr for CalibrationMode {
    type Err = DeviceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "servo" => Ok(CalibrationMode::Servo),
            "stepper" => Ok(CalibrationMode::Stepper),
            other => Err(DeviceError::InvalidMode(other.to_string())),
        }
    }
}

impl std::fmt::Display for CalibrationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Actuator calibration
///
/// Only the fields of the active `mode` are authoritative; the others are
/// kept as they were last set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Calibration {
    pub mode: CalibrationMode,
    #[serde(serialize_with = "serialize_whole")]
    pub open_angle: f64,
    #[serde(serialize_with = "serialize_whole")]
    pub close_angle: f64,
    #[serde(serialize_with = "serialize_whole")]
    pub steps_per_dispense: f64,
}

/// Whole numbers go out as integers (`70`, not `70.0`)
fn serialize_whole<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    // 2^53: largest range where every integer is exact in f64
    const MAX_EXACT: f64 = 9_007_199_254_740_992.0;
    if value.fract() == 0.0 && value.abs() <= MAX_EXACT {
        serializer.serialize_i64(*value as i64)
    } else {
        serializer.serialize_f64(*value)
    }
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            mode: CalibrationMode::Servo,
            open_angle: 70.0,
            close_angle: 10.0,
            steps_per_dispense: 180.0,
        }
    }
}

/// Partial calibration update as received from a client
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalibrationPatch {
    /// Kept raw: any JSON value may arrive here, see [`Self::requested_mode`]
    #[serde(default)]
    pub mode: Option<Value>,
    #[serde(default)]
    pub open_angle: Option<f64>,
    #[serde(default)]
    pub close_angle: Option<f64>,
    #[serde(default)]
    pub steps_per_dispense: Option<f64>,
}

impl CalibrationPatch {
    /// Mode the patch asks for, if any
    ///
    /// Falsy values (`null`, `false`, `0`, `""`) mean no mode. Other
    /// strings must name a mode; any other value is an invalid mode.
    pub fn requested_mode(&self) -> Result<Option<CalibrationMode>, DeviceError> {
        match &self.mode {
            None | Some(Value::Null) | Some(Value::Bool(false)) => Ok(None),
            Some(Value::Number(n)) if n.as_f64() == Some(0.0) => Ok(None),
            Some(Value::String(s)) if s.is_empty() => Ok(None),
            Some(Value::String(s)) => s.parse().map(Some),
            Some(other) => Err(DeviceError::InvalidMode(other.to_string())),
        }
    }
}

/// Identity and telemetry held by the device
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceState {
    pub device_name: String,
    pub wifi: WifiInfo,
    pub battery: BatteryInfo,
    pub firmware: String,
    pub last_dispense: Option<DispenseResult>,
}

/// Point-in-time telemetry read, drift already applied
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub device_name: String,
    pub wifi: WifiInfo,
    pub battery: BatteryInfo,
    pub firmware: String,
    pub last_dispense: Option<DispenseResult>,
    /// Read time (ms since epoch)
    pub time: i64,
}

/// Acknowledgement of an accepted dispense request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispenseAck {
    /// Milliseconds until the outcome is written back
    pub eta_ms: u64,
}
