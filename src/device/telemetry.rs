//! Telemetry store
//!
//! Holds the device identity, Wi-Fi and battery readings and the single
//! last-dispense slot. Every read nudges RSSI and battery a little so that
//! a polling client sees a live-looking device.

use rand::rngs::StdRng;
use rand::Rng;
use tracing::trace;

use super::types::{now_ms, DeviceState, DispenseResult, Snapshot};

/// Maximum RSSI change per read (dBm)
pub const RSSI_DRIFT_STEP: i32 = 1;

/// Maximum battery change per read (percentage points)
pub const BATTERY_DRIFT_STEP: f64 = 0.5;

pub struct TelemetryStore {
    state: DeviceState,
    rng: StdRng,
    /// Optional RSSI clamp; `None` lets the signal walk freely
    rssi_range: Option<(i32, i32)>,
}

impl TelemetryStore {
    pub fn new(state: DeviceState, rng: StdRng) -> Self {
        Self {
            state,
            rng,
            rssi_range: None,
        }
    }

    /// Clamp RSSI drift to `[min, max]`
    pub fn with_rssi_range(mut self, range: Option<(i32, i32)>) -> Self {
        self.rssi_range = range;
        self
    }

    /// Apply one step of drift and return the full current state
    pub fn read(&mut self) -> Snapshot {
        let rssi_step = self.rng.gen_range(-RSSI_DRIFT_STEP..=RSSI_DRIFT_STEP);
        let mut rssi = self.state.wifi.rssi.saturating_add(rssi_step);
        if let Some((min, max)) = self.rssi_range {
            rssi = rssi.clamp(min, max);
        }
        self.state.wifi.rssi = rssi;

        let battery_step = self.rng.gen_range(-BATTERY_DRIFT_STEP..=BATTERY_DRIFT_STEP);
        self.state.battery.percent = clamp_percent(self.state.battery.percent + battery_step);

        trace!(
            rssi = self.state.wifi.rssi,
            battery = self.state.battery.percent,
            "Telemetry read"
        );

        Snapshot {
            device_name: self.state.device_name.clone(),
            wifi: self.state.wifi.clone(),
            battery: self.state.battery.clone(),
            firmware: self.state.firmware.clone(),
            last_dispense: self.state.last_dispense.clone(),
            time: now_ms(),
        }
    }

    /// Overwrite the last-dispense slot. Logging is the caller's job.
    pub fn record_dispense_outcome(&mut self, result: DispenseResult) {
        self.state.last_dispense = Some(result);
    }

    pub fn last_dispense(&self) -> Option<&DispenseResult> {
        self.state.last_dispense.as_ref()
    }
}

/// Clamp a battery level into [0, 100]
pub fn clamp_percent(percent: f64) -> f64 {
    percent.clamp(0.0, 100.0)
}
