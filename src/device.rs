//! Device module - simulated feeder state
//!
//! Telemetry, calibration and the event log are owned by a single actor
//! task together with the dispense engine. Handlers reach them through a
//! cloneable [`DeviceHandle`].

mod actor;
mod actor_handle;
pub mod calibration;
mod commands;
pub mod event_log;
pub mod telemetry;
pub mod types;

pub use actor::{DeviceActor, DeviceParts};
pub use actor_handle::DeviceHandle;
pub use calibration::CalibrationStore;
pub use commands::DeviceCommand;
pub use event_log::{EventLog, DEFAULT_LOG_CAPACITY};
pub use telemetry::TelemetryStore;
pub use types::{
    BatteryInfo, Calibration, CalibrationMode, CalibrationPatch, DeviceState, DispenseAck,
    DispenseOutcome, DispenseResult, LogEntry, LogKind, Snapshot, WifiInfo,
};

/// Device parts with default identity and a scripted dispense planner
#[cfg(test)]
pub(crate) fn test_parts(plans: impl IntoIterator<Item = (u64, bool)>) -> DeviceParts {
    use crate::dispense::scripted::ScriptedPlanner;
    use crate::dispense::DispenseEngine;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    let state = DeviceState {
        device_name: "GoodBoy-Sim".to_string(),
        wifi: WifiInfo {
            connected: true,
            ssid: Some("TestNet".to_string()),
            rssi: -48,
            ip: "192.168.1.123".to_string(),
        },
        battery: BatteryInfo {
            percent: 86.0,
            voltage: 3.98,
        },
        firmware: "0.1.0-sim".to_string(),
        last_dispense: None,
    };

    DeviceParts {
        telemetry: TelemetryStore::new(state, StdRng::seed_from_u64(0)),
        calibration: CalibrationStore::default(),
        log: EventLog::default(),
        engine: DispenseEngine::new(Box::new(ScriptedPlanner::new(plans))),
    }
}
