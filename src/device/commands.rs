//! Commands accepted by the device actor
//!
//! Queries and mutations answer through a oneshot channel. Log appends and
//! dispense completions are fire-and-forget.

use tokio::sync::oneshot;

use super::types::{Calibration, CalibrationPatch, DispenseAck, LogEntry, LogKind, Snapshot};
use crate::dispense::DispenseJob;
use crate::error::Result;

#[derive(Debug)]
pub enum DeviceCommand {
    // -------------------------------------------------------------------------
    // Telemetry
    // -------------------------------------------------------------------------
    /// Read telemetry, applying one step of drift
    ReadStatus {
        response: oneshot::Sender<Snapshot>,
    },

    // -------------------------------------------------------------------------
    // Dispense
    // -------------------------------------------------------------------------
    /// Validate and accept a dispense request
    ///
    /// Answers with the ETA as soon as the job is scheduled; the outcome is
    /// applied later through `CompleteDispense`.
    Dispense {
        /// Raw requested count, validated by the engine
        count: f64,
        response: oneshot::Sender<Result<DispenseAck>>,
    },

    /// Timer fired for an accepted job
    CompleteDispense { job: DispenseJob },

    // -------------------------------------------------------------------------
    // Calibration
    // -------------------------------------------------------------------------
    GetCalibration {
        response: oneshot::Sender<Calibration>,
    },

    Calibrate {
        patch: CalibrationPatch,
        response: oneshot::Sender<Result<Calibration>>,
    },

    // -------------------------------------------------------------------------
    // Event log
    // -------------------------------------------------------------------------
    AppendLog { kind: LogKind, msg: String },

    ListLogs {
        response: oneshot::Sender<Vec<LogEntry>>,
    },

    ClearLogs {
        response: oneshot::Sender<()>,
    },

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------
    /// Stop the actor; pending completions are dropped
    Shutdown,
}
