//! Configuration management for the feeder simulator
//!
//! Handles loading and validating the YAML configuration file. Every
//! section is optional; a missing file section falls back to the values
//! the simulated device ships with.

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

use crate::device::{
    BatteryInfo, Calibration, CalibrationMode, CalibrationStore, DeviceParts, DeviceState,
    EventLog, TelemetryStore, WifiInfo,
};
use crate::dispense::{DispenseEngine, RandomPlanner};
use crate::preview::MotorPreview;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SimConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub calibration: CalibrationConfig,
    #[serde(default)]
    pub dispense: DispenseConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub event_log: EventLogConfig,
    #[serde(default)]
    pub preview: PreviewConfig,
    /// Fixed RNG seed for reproducible runs; OS entropy when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

/// HTTP listener configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Directory served at `/` for the web front-end
    #[serde(skip_serializing_if = "Option::is_none")]
    pub static_dir: Option<PathBuf>,
    #[serde(default = "default_true")]
    pub cors: bool,
}

/// Identity and initial telemetry of the simulated device
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeviceConfig {
    #[serde(default = "default_device_name")]
    pub name: String,
    #[serde(default = "default_firmware")]
    pub firmware: String,
    #[serde(default = "default_wifi")]
    pub wifi: WifiInfo,
    #[serde(default = "default_battery")]
    pub battery: BatteryInfo,
}

/// Initial actuator calibration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CalibrationConfig {
    #[serde(default = "default_calibration_mode")]
    pub mode: CalibrationMode,
    #[serde(default = "default_open_angle")]
    pub open_angle: f64,
    #[serde(default = "default_close_angle")]
    pub close_angle: f64,
    #[serde(default = "default_steps_per_dispense")]
    pub steps_per_dispense: f64,
}

/// Dispense job simulation parameters
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DispenseConfig {
    #[serde(default = "default_min_duration_ms")]
    pub min_duration_ms: u64,
    /// Exclusive upper bound
    #[serde(default = "default_max_duration_ms")]
    pub max_duration_ms: u64,
    #[serde(default = "default_jam_probability")]
    pub jam_probability: f64,
    #[serde(default = "default_max_count")]
    pub max_count: u32,
}

/// Telemetry drift configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TelemetryConfig {
    /// `[min, max]` dBm clamp for RSSI drift; unbounded when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rssi_range: Option<[i32; 2]>,
}

/// Event log configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EventLogConfig {
    #[serde(default = "default_log_capacity")]
    pub capacity: usize,
}

/// Motor preview configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PreviewConfig {
    #[serde(default = "default_preview_duration_ms")]
    pub duration_ms: u64,
    #[serde(default = "default_preview_max_speed")]
    pub max_speed: u32,
}

impl SimConfig {
    /// Load configuration from file with validation
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_yaml(&contents)
            .with_context(|| format!("Invalid config file: {}", path.display()))
    }

    /// Parse and validate a YAML document
    pub fn from_yaml(contents: &str) -> Result<Self> {
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: SimConfig =
            serde_yaml::from_str(contents).context("Failed to parse YAML config")?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration for correctness and consistency
    pub fn validate(&self) -> Result<()> {
        if self.device.name.trim().is_empty() {
            anyhow::bail!("device.name cannot be empty");
        }

        let percent = self.device.battery.percent;
        if !(0.0..=100.0).contains(&percent) {
            anyhow::bail!("device.battery.percent {} is invalid (must be 0-100)", percent);
        }

        let dispense = &self.dispense;
        if dispense.min_duration_ms >= dispense.max_duration_ms {
            anyhow::bail!(
                "dispense.min_duration_ms ({}) must be below max_duration_ms ({})",
                dispense.min_duration_ms,
                dispense.max_duration_ms
            );
        }
        if !(0.0..=1.0).contains(&dispense.jam_probability) {
            anyhow::bail!(
                "dispense.jam_probability {} is invalid (must be 0-1)",
                dispense.jam_probability
            );
        }
        if dispense.max_count == 0 {
            anyhow::bail!("dispense.max_count must be at least 1");
        }

        if let Some([min, max]) = self.telemetry.rssi_range {
            if min > max {
                anyhow::bail!("telemetry.rssi_range [{}, {}] is inverted", min, max);
            }
        }

        if self.event_log.capacity == 0 {
            anyhow::bail!("event_log.capacity must be at least 1");
        }

        if self.preview.max_speed == 0 {
            anyhow::bail!("preview.max_speed must be at least 1");
        }

        Ok(())
    }

    /// Build the stores and engine owned by the device actor
    pub fn device_parts(&self) -> DeviceParts {
        let state = DeviceState {
            device_name: self.device.name.clone(),
            wifi: self.device.wifi.clone(),
            battery: self.device.battery.clone(),
            firmware: self.device.firmware.clone(),
            last_dispense: None,
        };

        let telemetry = TelemetryStore::new(state, self.rng(0))
            .with_rssi_range(self.telemetry.rssi_range.map(|[min, max]| (min, max)));

        let planner = RandomPlanner::new(self.rng(1))
            .with_duration_range(self.dispense.min_duration_ms, self.dispense.max_duration_ms)
            .with_jam_probability(self.dispense.jam_probability);

        DeviceParts {
            telemetry,
            calibration: CalibrationStore::new(self.calibration.initial()),
            log: EventLog::new(self.event_log.capacity),
            engine: DispenseEngine::new(Box::new(planner))
                .with_max_count(self.dispense.max_count),
        }
    }

    /// First event log entry after boot
    pub fn startup_message(&self) -> String {
        format!("{} online (firmware {}).", self.device.name, self.device.firmware)
    }

    pub fn motor_preview(&self) -> MotorPreview {
        MotorPreview::new(
            Duration::from_millis(self.preview.duration_ms),
            self.preview.max_speed,
        )
    }

    /// Seeded RNG stream, or fresh entropy when no seed is configured
    fn rng(&self, stream: u64) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(stream)),
            None => StdRng::from_entropy(),
        }
    }
}

impl CalibrationConfig {
    pub fn initial(&self) -> Calibration {
        Calibration {
            mode: self.mode,
            open_angle: self.open_angle,
            close_angle: self.close_angle,
            steps_per_dispense: self.steps_per_dispense,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            static_dir: None,
            cors: true,
        }
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            name: default_device_name(),
            firmware: default_firmware(),
            wifi: default_wifi(),
            battery: default_battery(),
        }
    }
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            mode: default_calibration_mode(),
            open_angle: default_open_angle(),
            close_angle: default_close_angle(),
            steps_per_dispense: default_steps_per_dispense(),
        }
    }
}

impl Default for DispenseConfig {
    fn default() -> Self {
        Self {
            min_duration_ms: default_min_duration_ms(),
            max_duration_ms: default_max_duration_ms(),
            jam_probability: default_jam_probability(),
            max_count: default_max_count(),
        }
    }
}

impl Default for EventLogConfig {
    fn default() -> Self {
        Self {
            capacity: default_log_capacity(),
        }
    }
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            duration_ms: default_preview_duration_ms(),
            max_speed: default_preview_max_speed(),
        }
    }
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { crate::api::DEFAULT_API_PORT }
fn default_true() -> bool { true }
fn default_device_name() -> String { "GoodBoy-Sim".to_string() }
fn default_firmware() -> String { "0.1.0-sim".to_string() }
fn default_wifi() -> WifiInfo {
    WifiInfo {
        connected: true,
        ssid: Some("TestNet".to_string()),
        rssi: -48,
        ip: "192.168.1.123".to_string(),
    }
}
fn default_battery() -> BatteryInfo { BatteryInfo { percent: 86.0, voltage: 3.98 } }
fn default_calibration_mode() -> CalibrationMode { CalibrationMode::Servo }
fn default_open_angle() -> f64 { 70.0 }
fn default_close_angle() -> f64 { 10.0 }
fn default_steps_per_dispense() -> f64 { 180.0 }
fn default_min_duration_ms() -> u64 { crate::dispense::DEFAULT_MIN_DURATION_MS }
fn default_max_duration_ms() -> u64 { crate::dispense::DEFAULT_MAX_DURATION_MS }
fn default_jam_probability() -> f64 { crate::dispense::DEFAULT_JAM_PROBABILITY }
fn default_max_count() -> u32 { crate::dispense::MAX_DISPENSE_COUNT }
fn default_log_capacity() -> usize { crate::device::DEFAULT_LOG_CAPACITY }
fn default_preview_duration_ms() -> u64 { crate::preview::DEFAULT_PREVIEW_DURATION_MS }
fn default_preview_max_speed() -> u32 { crate::preview::MAX_PREVIEW_SPEED }

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = SimConfig::from_yaml("{}").unwrap();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.device.name, "GoodBoy-Sim");
        assert_eq!(config.device.wifi.rssi, -48);
        assert_eq!(config.calibration.initial(), Calibration::default());
        assert_eq!(config.dispense.max_duration_ms, 1300);
        assert_eq!(config.event_log.capacity, 200);
        assert!(config.telemetry.rssi_range.is_none());
        assert!(config.seed.is_none());
    }

    #[test]
    fn test_partial_sections_keep_field_defaults() {
        let yaml = r#"
device:
  name: Kitchen-Feeder
  battery: { percent: 40.0, voltage: 3.7 }
dispense:
  jam_probability: 0.5
calibration:
  mode: stepper
telemetry:
  rssi_range: [-90, -30]
seed: 7
"#;
        let config = SimConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.device.name, "Kitchen-Feeder");
        assert_eq!(config.device.firmware, "0.1.0-sim");
        assert_eq!(config.device.battery.percent, 40.0);
        assert_eq!(config.dispense.jam_probability, 0.5);
        assert_eq!(config.dispense.min_duration_ms, 500);
        assert_eq!(config.calibration.mode, CalibrationMode::Stepper);
        assert_eq!(config.calibration.steps_per_dispense, 180.0);
        assert_eq!(config.telemetry.rssi_range, Some([-90, -30]));
        assert_eq!(config.seed, Some(7));
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let cases = [
            "device: { name: '' }",
            "device: { battery: { percent: 120.0, voltage: 4.0 } }",
            "dispense: { min_duration_ms: 900, max_duration_ms: 900 }",
            "dispense: { jam_probability: 1.5 }",
            "dispense: { max_count: 0 }",
            "telemetry: { rssi_range: [-30, -90] }",
            "event_log: { capacity: 0 }",
            "preview: { max_speed: 0 }",
            "calibration: { mode: hydraulic }",
        ];
        for yaml in cases {
            assert!(SimConfig::from_yaml(yaml).is_err(), "accepted: {}", yaml);
        }
    }

    #[test]
    fn test_seeded_parts_are_reproducible() {
        let config = SimConfig::from_yaml("seed: 42").unwrap();
        let mut a = config.device_parts();
        let mut b = config.device_parts();

        let job_a = a.engine.request(3.0).unwrap();
        let job_b = b.engine.request(3.0).unwrap();
        assert_eq!(job_a.plan, job_b.plan);
        assert_eq!(a.telemetry.read().wifi.rssi, b.telemetry.read().wifi.rssi);
    }

    #[test]
    fn test_device_parts_honour_limits() {
        let config = SimConfig::from_yaml("dispense: { max_count: 2 }\nevent_log: { capacity: 3 }").unwrap();
        let mut parts = config.device_parts();
        assert!(parts.engine.request(2.0).is_ok());
        assert!(parts.engine.request(3.0).is_err());
        assert_eq!(parts.log.capacity(), 3);
    }

    #[test]
    fn test_startup_message_names_device() {
        let config = SimConfig::from_yaml("device: { name: Kitchen-Feeder, firmware: '1.2.0' }").unwrap();
        assert_eq!(config.startup_message(), "Kitchen-Feeder online (firmware 1.2.0).");
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "server:\n  port: 8080\n  static_dir: web/public").unwrap();

        let config = SimConfig::load(file.path()).await.unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.static_dir, Some(PathBuf::from("web/public")));
        assert!(config.server.cors);
    }

    #[tokio::test]
    async fn test_load_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = SimConfig::load(dir.path().join("nope.yaml")).await.unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
