//! DeviceHandle - Public API for the DeviceActor
//!
//! Cloneable handle threaded into every HTTP handler. Queries and mutations
//! round-trip through a oneshot channel; log appends are fire-and-forget.

use tokio::sync::{mpsc, oneshot};

use super::actor::{DeviceActor, DeviceParts};
use super::commands::DeviceCommand;
use super::types::{Calibration, CalibrationPatch, DispenseAck, LogEntry, LogKind, Snapshot};
use crate::error::{DeviceError, Result};

/// Handle for interacting with the DeviceActor
///
/// All methods fail with [`DeviceError::Unavailable`] once the actor has
/// stopped.
#[derive(Clone)]
pub struct DeviceHandle {
    /// Command channel to the DeviceActor
    cmd_tx: mpsc::UnboundedSender<DeviceCommand>,
}

impl DeviceHandle {
    pub fn new(cmd_tx: mpsc::UnboundedSender<DeviceCommand>) -> Self {
        Self { cmd_tx }
    }

    /// Spawn a new DeviceActor and return a handle
    pub fn spawn(parts: DeviceParts) -> Self {
        DeviceActor::spawn(parts)
    }

    /// Send a command carrying a response channel and wait for the answer
    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> DeviceCommand,
    ) -> Result<T> {
        let (response_tx, response_rx) = oneshot::channel();

        if self.cmd_tx.send(make(response_tx)).is_err() {
            return Err(DeviceError::Unavailable);
        }

        response_rx.await.map_err(|_| DeviceError::Unavailable)
    }

    // =========================================================================
    // Telemetry
    // =========================================================================

    /// Read a telemetry snapshot (drift is applied on every read)
    pub async fn status(&self) -> Result<Snapshot> {
        self.request(|response| DeviceCommand::ReadStatus { response })
            .await
    }

    // =========================================================================
    // Dispense
    // =========================================================================

    /// Request a dispense; resolves with the ETA, not the outcome
    pub async fn dispense(&self, count: f64) -> Result<DispenseAck> {
        self.request(|response| DeviceCommand::Dispense { count, response })
            .await?
    }

    // =========================================================================
    // Calibration
    // =========================================================================

    pub async fn calibration(&self) -> Result<Calibration> {
        self.request(|response| DeviceCommand::GetCalibration { response })
            .await
    }

    pub async fn calibrate(&self, patch: CalibrationPatch) -> Result<Calibration> {
        self.request(|response| DeviceCommand::Calibrate { patch, response })
            .await?
    }

    // =========================================================================
    // Event log
    // =========================================================================

    /// Append a log entry
    ///
    /// Fire-and-forget: Does not wait for confirmation.
    pub fn log(&self, kind: LogKind, msg: impl Into<String>) {
        let _ = self.cmd_tx.send(DeviceCommand::AppendLog {
            kind,
            msg: msg.into(),
        });
    }

    /// Entries newest first
    pub async fn logs(&self) -> Result<Vec<LogEntry>> {
        self.request(|response| DeviceCommand::ListLogs { response })
            .await
    }

    pub async fn clear_logs(&self) -> Result<()> {
        self.request(|response| DeviceCommand::ClearLogs { response })
            .await
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Check if the actor is still alive
    ///
    /// Returns false if the command channel is closed.
    pub fn is_alive(&self) -> bool {
        !self.cmd_tx.is_closed()
    }

    /// Signal the actor to shut down
    ///
    /// Fire-and-forget: Does not wait for confirmation.
    pub fn shutdown(&self) {
        let _ = self.cmd_tx.send(DeviceCommand::Shutdown);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_is_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<DeviceHandle>();
    }

    #[tokio::test]
    async fn test_is_alive_when_channel_open() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let handle = DeviceHandle::new(tx);
        assert!(handle.is_alive());
    }

    #[tokio::test]
    async fn test_closed_channel_is_unavailable() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let handle = DeviceHandle::new(tx);
        assert!(!handle.is_alive());
        assert_eq!(handle.logs().await.unwrap_err(), DeviceError::Unavailable);
        assert_eq!(handle.dispense(1.0).await.unwrap_err(), DeviceError::Unavailable);
    }
}
