//! Calibration store
//!
//! Two actuator modes, freely switchable. The patch's `mode` decides which
//! fields are read: servo angles or stepper step count. A patch without a
//! mode changes nothing.

use tracing::debug;

use super::types::{Calibration, CalibrationMode, CalibrationPatch};
use crate::error::Result;

#[derive(Debug, Clone, Default)]
pub struct CalibrationStore {
    current: Calibration,
}

impl CalibrationStore {
    pub fn new(initial: Calibration) -> Self {
        Self { current: initial }
    }

    pub fn get(&self) -> Calibration {
        self.current.clone()
    }

    /// Apply a patch; an unknown mode fails without touching anything
    pub fn update(&mut self, patch: &CalibrationPatch) -> Result<Calibration> {
        let mode = patch.requested_mode()?;

        match mode {
            Some(CalibrationMode::Servo) => {
                if let Some(open) = patch.open_angle {
                    self.current.open_angle = open;
                }
                if let Some(close) = patch.close_angle {
                    self.current.close_angle = close;
                }
            }
            Some(CalibrationMode::Stepper) => {
                if let Some(steps) = patch.steps_per_dispense {
                    self.current.steps_per_dispense = steps;
                }
            }
            None => {}
        }

        if let Some(mode) = mode {
            self.current.mode = mode;
        }

        debug!(calibration = ?self.current, "Calibration updated");
        Ok(self.current.clone())
    }
}

/// Event log message describing a calibration
pub fn update_message(calibration: &Calibration) -> String {
    let body = serde_json::to_string(calibration).unwrap_or_else(|_| format!("{:?}", calibration));
    format!("Calibration updated: {}", body)
}
