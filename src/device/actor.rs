//! DeviceActor - single logical thread owning all device state
//!
//! The telemetry store, calibration store, event log and dispense engine
//! live inside one actor task and are only touched while it processes a
//! command. Dispense completions are tokio timers that post a command back
//! into the same channel, so they are applied in the same serialized order
//! as client requests and no locks are needed.

use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use super::actor_handle::DeviceHandle;
use super::calibration::{update_message, CalibrationStore};
use super::commands::DeviceCommand;
use super::event_log::EventLog;
use super::telemetry::TelemetryStore;
use super::types::{now_ms, Calibration, CalibrationPatch, DispenseAck, LogKind};
use crate::dispense::{DispenseEngine, DispenseJob};
use crate::error::Result;

/// Everything the actor owns, assembled before spawning
pub struct DeviceParts {
    pub telemetry: TelemetryStore,
    pub calibration: CalibrationStore,
    pub log: EventLog,
    pub engine: DispenseEngine,
}

pub struct DeviceActor {
    telemetry: TelemetryStore,
    calibration: CalibrationStore,
    log: EventLog,
    engine: DispenseEngine,

    /// Receiver for incoming commands
    command_rx: mpsc::UnboundedReceiver<DeviceCommand>,

    /// Weak sender to our own channel, upgraded by completion timers.
    /// Weak so that dropping every handle still stops the actor.
    self_tx: mpsc::WeakUnboundedSender<DeviceCommand>,

    /// Commands processed so far
    command_count: u64,
}

impl DeviceActor {
    /// Spawn the actor's run loop and return a handle to it
    pub fn spawn(parts: DeviceParts) -> DeviceHandle {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();

        let actor = DeviceActor {
            telemetry: parts.telemetry,
            calibration: parts.calibration,
            log: parts.log,
            engine: parts.engine,
            command_rx: cmd_rx,
            self_tx: cmd_tx.downgrade(),
            command_count: 0,
        };

        tokio::spawn(actor.run());

        info!("DeviceActor spawned");

        DeviceHandle::new(cmd_tx)
    }

    /// Process commands until the channel closes or `Shutdown` arrives
    async fn run(mut self) {
        debug!("DeviceActor run loop started");

        while let Some(cmd) = self.command_rx.recv().await {
            trace!(?cmd, "Processing command");
            self.command_count += 1;

            match cmd {
                DeviceCommand::ReadStatus { response } => {
                    let _ = response.send(self.telemetry.read());
                }
                DeviceCommand::Dispense { count, response } => {
                    let result = self.handle_dispense(count);
                    let _ = response.send(result);
                }
                DeviceCommand::CompleteDispense { job } => {
                    self.handle_complete_dispense(job);
                }
                DeviceCommand::GetCalibration { response } => {
                    let _ = response.send(self.calibration.get());
                }
                DeviceCommand::Calibrate { patch, response } => {
                    let result = self.handle_calibrate(&patch);
                    let _ = response.send(result);
                }
                DeviceCommand::AppendLog { kind, msg } => {
                    self.log.append(kind, msg);
                }
                DeviceCommand::ListLogs { response } => {
                    let _ = response.send(self.log.list());
                }
                DeviceCommand::ClearLogs { response } => {
                    self.log.clear();
                    debug!("Event log cleared");
                    let _ = response.send(());
                }
                DeviceCommand::Shutdown => {
                    info!("DeviceActor received shutdown command");
                    break;
                }
            }
        }

        info!(
            command_count = self.command_count,
            in_flight = self.engine.in_flight(),
            "DeviceActor run loop terminated"
        );
    }

    /// Accept a job and arm its completion timer
    fn handle_dispense(&mut self, count: f64) -> Result<DispenseAck> {
        let job = self.engine.request(count).inspect_err(|e| {
            debug!(count, error = %e, "Dispense rejected");
        })?;
        self.schedule_completion(job);
        Ok(DispenseAck {
            eta_ms: job.plan.duration_ms,
        })
    }

    fn schedule_completion(&self, job: DispenseJob) {
        let Some(tx) = self.self_tx.upgrade() else {
            warn!(count = job.count.get(), "Device is shutting down, completion not scheduled");
            return;
        };

        tokio::spawn(async move {
            tokio::time::sleep(job.duration()).await;
            if tx.send(DeviceCommand::CompleteDispense { job }).is_err() {
                debug!(count = job.count.get(), "Device stopped before dispense completed");
            }
        });
    }

    fn handle_complete_dispense(&mut self, job: DispenseJob) {
        let result = self
            .engine
            .complete(job, now_ms(), &mut self.telemetry, &mut self.log);
        info!(
            count = result.count,
            result = %result.result,
            duration_ms = result.duration_ms,
            "Dispense completed"
        );
    }

    fn handle_calibrate(&mut self, patch: &CalibrationPatch) -> Result<Calibration> {
        let calibration = self.calibration.update(patch).inspect_err(|e| {
            debug!(error = %e, "Calibration rejected");
        })?;
        self.log.append(LogKind::Info, update_message(&calibration));
        Ok(calibration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::test_parts;
    use crate::device::types::{CalibrationMode, DispenseOutcome};
    use crate::error::DeviceError;
    use std::time::Duration;
    use tokio::time::sleep;

    #[tokio::test(start_paused = true)]
    async fn test_dispense_acknowledges_before_completion() {
        let device = DeviceActor::spawn(test_parts([(700, false)]));

        let ack = device.dispense(2.0).await.unwrap();
        assert_eq!(ack.eta_ms, 700);

        // acknowledged but not resolved yet
        assert!(device.status().await.unwrap().last_dispense.is_none());
        assert!(device.logs().await.unwrap().is_empty());

        sleep(Duration::from_millis(701)).await;

        let last = device.status().await.unwrap().last_dispense.unwrap();
        assert_eq!(last.count, 2);
        assert_eq!(last.result, DispenseOutcome::Ok);
        assert_eq!(last.duration_ms, 700);

        let logs = device.logs().await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].kind, LogKind::Info);
        assert_eq!(logs[0].msg, "Dispensed 2.");
    }

    #[tokio::test(start_paused = true)]
    async fn test_later_completion_wins_slot() {
        let device = DeviceActor::spawn(test_parts([(600, false), (900, false)]));

        device.dispense(3.0).await.unwrap();
        device.dispense(5.0).await.unwrap();

        sleep(Duration::from_millis(1000)).await;

        let status = device.status().await.unwrap();
        assert_eq!(status.last_dispense.map(|r| r.count), Some(5));

        let logs = device.logs().await.unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].msg, "Dispensed 5.");
        assert_eq!(logs[1].msg, "Dispensed 3.");
    }

    #[tokio::test(start_paused = true)]
    async fn test_completion_order_follows_duration_not_submission() {
        let device = DeviceActor::spawn(test_parts([(900, false), (600, false)]));

        device.dispense(3.0).await.unwrap();
        device.dispense(5.0).await.unwrap();

        sleep(Duration::from_millis(700)).await;
        assert_eq!(device.status().await.unwrap().last_dispense.map(|r| r.count), Some(5));

        sleep(Duration::from_millis(300)).await;
        assert_eq!(device.status().await.unwrap().last_dispense.map(|r| r.count), Some(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_jam_logs_error() {
        let device = DeviceActor::spawn(test_parts([(500, true)]));

        device.dispense(4.0).await.unwrap();
        sleep(Duration::from_millis(600)).await;

        let last = device.status().await.unwrap().last_dispense.unwrap();
        assert_eq!(last.result, DispenseOutcome::Jam);

        let logs = device.logs().await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].kind, LogKind::Error);
        assert_eq!(logs[0].msg, "Jam detected during dispense (4).");
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_count_touches_nothing() {
        let device = DeviceActor::spawn(test_parts([]));

        for raw in [0.0, 11.0, -2.0, 1.5, f64::NAN] {
            let err = device.dispense(raw).await.unwrap_err();
            assert!(matches!(err, DeviceError::InvalidCount(_)));
        }

        sleep(Duration::from_millis(2000)).await;
        assert!(device.status().await.unwrap().last_dispense.is_none());
        assert!(device.logs().await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_job_survives_dropped_requester() {
        let device = DeviceActor::spawn(test_parts([(800, false)]));
        let observer = device.clone();

        device.dispense(1.0).await.unwrap();
        drop(device);

        sleep(Duration::from_millis(900)).await;
        assert_eq!(observer.logs().await.unwrap()[0].msg, "Dispensed 1.");
    }

    #[tokio::test]
    async fn test_calibrate_logs_resulting_state() {
        let device = DeviceActor::spawn(test_parts([]));

        let patch = CalibrationPatch {
            mode: Some("stepper".into()),
            steps_per_dispense: Some(240.0),
            ..Default::default()
        };
        let calibration = device.calibrate(patch).await.unwrap();
        assert_eq!(calibration.mode, CalibrationMode::Stepper);
        assert_eq!(device.calibration().await.unwrap(), calibration);

        let logs = device.logs().await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].kind, LogKind::Info);
        assert!(logs[0].msg.starts_with("Calibration updated: "));
        assert!(logs[0].msg.contains("\"stepsPerDispense\":240}"));
    }

    #[tokio::test]
    async fn test_rejected_calibration_does_not_log() {
        let device = DeviceActor::spawn(test_parts([]));
        let before = device.calibration().await.unwrap();

        let patch = CalibrationPatch {
            mode: Some("bogus".into()),
            ..Default::default()
        };
        let err = device.calibrate(patch).await.unwrap_err();
        assert_eq!(err, DeviceError::InvalidMode("bogus".to_string()));
        assert_eq!(device.calibration().await.unwrap(), before);
        assert!(device.logs().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_append_and_clear_logs() {
        let device = DeviceHandle::spawn(test_parts([]));

        device.log(LogKind::Ok, "Feeder online.");
        let logs = device.logs().await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].kind, LogKind::Ok);

        device.clear_logs().await.unwrap();
        device.clear_logs().await.unwrap();
        assert!(device.logs().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_makes_device_unavailable() {
        let device = DeviceActor::spawn(test_parts([]));
        device.shutdown();

        let err = device.status().await.unwrap_err();
        assert_eq!(err, DeviceError::Unavailable);
        assert!(!device.is_alive());
    }
}
