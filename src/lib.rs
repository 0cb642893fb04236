//! Good Boy feeder simulator
//!
//! Emulates the HTTP surface of the Good Boy pet-feeder firmware so a web
//! front-end can be developed without hardware: drifting telemetry,
//! asynchronous dispense jobs with random jams, actuator calibration, a
//! bounded event log and a timed stepper preview.

pub mod api;
pub mod config;
pub mod device;
pub mod dispense;
pub mod error;
pub mod preview;
