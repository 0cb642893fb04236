//! Dispense job engine
//!
//! A dispense is two-phase: the request is validated and acknowledged at
//! once with an ETA, and the outcome (ok or jam) is written back into the
//! telemetry store and event log when the simulated motion finishes.
//!
//! The engine itself is synchronous and owned by the device actor. The
//! actor is responsible for scheduling [`DispenseEngine::complete`] once
//! the job's duration has elapsed.

use std::time::Duration;

use rand::rngs::StdRng;
use rand::Rng;
use tracing::{debug, info, warn};

use crate::device::event_log::EventLog;
use crate::device::telemetry::TelemetryStore;
use crate::device::types::{DispenseOutcome, DispenseResult, LogKind};
use crate::error::{DeviceError, Result};

/// Largest number of portions a single request may ask for
pub const MAX_DISPENSE_COUNT: u32 = 10;

/// Simulated dispense duration range, `[min, max)` in milliseconds
pub const DEFAULT_MIN_DURATION_MS: u64 = 500;
pub const DEFAULT_MAX_DURATION_MS: u64 = 1300;

/// Independent per-request probability of a jam
pub const DEFAULT_JAM_PROBABILITY: f64 = 0.08;

/// A validated portion count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispenseCount(u32);

impl DispenseCount {
    /// Accept finite, integer-valued counts in `(0, max]`
    pub fn new(raw: f64, max: u32) -> Result<Self> {
        if !raw.is_finite() || raw.fract() != 0.0 || raw <= 0.0 || raw > f64::from(max) {
            return Err(DeviceError::InvalidCount(raw.to_string()));
        }
        Ok(Self(raw as u32))
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for DispenseCount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Duration and outcome drawn for a job at acceptance time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispensePlan {
    pub duration_ms: u64,
    pub jammed: bool,
}

/// Source of dispense durations and jam outcomes
pub trait DispensePlanner: Send {
    fn plan(&mut self, count: DispenseCount) -> DispensePlan;
}

/// Uniform duration in `[min, max)`, jam with fixed probability
pub struct RandomPlanner {
    rng: StdRng,
    min_duration_ms: u64,
    max_duration_ms: u64,
    jam_probability: f64,
}

impl RandomPlanner {
    pub fn new(rng: StdRng) -> Self {
        Self {
            rng,
            min_duration_ms: DEFAULT_MIN_DURATION_MS,
            max_duration_ms: DEFAULT_MAX_DURATION_MS,
            jam_probability: DEFAULT_JAM_PROBABILITY,
        }
    }

    /// `min` must be strictly below `max`
    pub fn with_duration_range(mut self, min_ms: u64, max_ms: u64) -> Self {
        self.min_duration_ms = min_ms;
        self.max_duration_ms = max_ms;
        self
    }

    /// `probability` must lie in `[0, 1]`
    pub fn with_jam_probability(mut self, probability: f64) -> Self {
        self.jam_probability = probability;
        self
    }
}

impl DispensePlanner for RandomPlanner {
    fn plan(&mut self, _count: DispenseCount) -> DispensePlan {
        DispensePlan {
            duration_ms: self.rng.gen_range(self.min_duration_ms..self.max_duration_ms),
            jammed: self.rng.gen_bool(self.jam_probability),
        }
    }
}

/// An accepted job waiting for its scheduled completion
///
/// Jobs carry no identity; whichever completes last owns the device's
/// single last-dispense slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispenseJob {
    pub count: DispenseCount,
    pub plan: DispensePlan,
}

impl DispenseJob {
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.plan.duration_ms)
    }

    pub fn outcome(&self) -> DispenseOutcome {
        if self.plan.jammed {
            DispenseOutcome::Jam
        } else {
            DispenseOutcome::Ok
        }
    }

    /// Event log entry recorded on completion
    pub fn log_entry(&self) -> (LogKind, String) {
        match self.outcome() {
            DispenseOutcome::Jam => (
                LogKind::Error,
                format!("Jam detected during dispense ({}).", self.count),
            ),
            DispenseOutcome::Ok => (LogKind::Info, format!("Dispensed {}.", self.count)),
        }
    }
}

pub struct DispenseEngine {
    planner: Box<dyn DispensePlanner>,
    max_count: u32,
    in_flight: usize,
}

impl DispenseEngine {
    pub fn new(planner: Box<dyn DispensePlanner>) -> Self {
        Self {
            planner,
            max_count: MAX_DISPENSE_COUNT,
            in_flight: 0,
        }
    }

    pub fn with_max_count(mut self, max_count: u32) -> Self {
        self.max_count = max_count;
        self
    }

    /// Validate and plan a job. Nothing is mutated on rejection.
    pub fn request(&mut self, raw_count: f64) -> Result<DispenseJob> {
        let count = DispenseCount::new(raw_count, self.max_count)?;
        let plan = self.planner.plan(count);
        self.in_flight += 1;

        info!(
            count = count.get(),
            eta_ms = plan.duration_ms,
            in_flight = self.in_flight,
            "Dispense accepted"
        );

        Ok(DispenseJob { count, plan })
    }

    /// Write a finished job's outcome into telemetry and the event log
    pub fn complete(
        &mut self,
        job: DispenseJob,
        at: i64,
        telemetry: &mut TelemetryStore,
        log: &mut EventLog,
    ) -> DispenseResult {
        self.in_flight = self.in_flight.saturating_sub(1);

        let result = DispenseResult {
            at,
            count: job.count.get(),
            result: job.outcome(),
            duration_ms: job.plan.duration_ms,
        };
        telemetry.record_dispense_outcome(result.clone());

        let (kind, msg) = job.log_entry();
        match result.result {
            DispenseOutcome::Jam => warn!(count = result.count, "{}", msg),
            DispenseOutcome::Ok => debug!(count = result.count, "{}", msg),
        }
        log.append(kind, msg);

        result
    }

    /// Jobs accepted but not yet completed
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }
}
