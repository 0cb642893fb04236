//! Motor preview runner
//!
//! Simulates one stepper revolution so a user can check direction and
//! speed. Stateless: it never touches the device actor.

use std::time::Duration;

use tracing::debug;

/// Default and maximum preview speed (RPM)
pub const MAX_PREVIEW_SPEED: u32 = 15;

/// How long a simulated revolution holds the caller
pub const DEFAULT_PREVIEW_DURATION_MS: u64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Reverse,
}

impl Direction {
    /// Only an exact `reverse` reverses; anything else runs forward
    pub fn from_query(raw: Option<&str>) -> Self {
        match raw {
            Some("reverse") => Direction::Reverse,
            _ => Direction::Forward,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Forward => write!(f, "forward"),
            Direction::Reverse => write!(f, "reverse"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MotorPreview {
    duration: Duration,
    max_speed: u32,
}

impl MotorPreview {
    pub fn new(duration: Duration, max_speed: u32) -> Self {
        Self {
            duration,
            max_speed,
        }
    }

    /// Replace missing, non-positive or too-fast speeds with the maximum
    pub fn clamp_speed(&self, speed: Option<i64>) -> u32 {
        match speed {
            Some(s) if s > 0 && s <= i64::from(self.max_speed) => s as u32,
            _ => self.max_speed,
        }
    }

    /// Hold the caller for the preview duration, then describe the run
    pub async fn run(&self, direction: Direction, speed: Option<i64>) -> String {
        let speed = self.clamp_speed(speed);
        debug!(%direction, speed, "Motor preview started");
        tokio::time::sleep(self.duration).await;
        format!("Stepper done (1 rev, {}, {} RPM)", direction, speed)
    }
}

impl Default for MotorPreview {
    fn default() -> Self {
        Self::new(
            Duration::from_millis(DEFAULT_PREVIEW_DURATION_MS),
            MAX_PREVIEW_SPEED,
        )
    }
}

/// Parse the leading integer of a query value (`"12rpm"` -> 12, `"3.7"` -> 3)
pub fn parse_speed(raw: &str) -> Option<i64> {
    let trimmed = raw.trim_start();
    let (sign, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (-1, &trimmed[1..]),
        Some(b'+') => (1, &trimmed[1..]),
        _ => (1, trimmed),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    digits[..end].parse::<i64>().ok().map(|n| sign * n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[test]
    fn test_direction_from_query() {
        assert_eq!(Direction::from_query(Some("reverse")), Direction::Reverse);
        assert_eq!(Direction::from_query(Some("forward")), Direction::Forward);
        assert_eq!(Direction::from_query(Some("REVERSE")), Direction::Forward);
        assert_eq!(Direction::from_query(None), Direction::Forward);
    }

    #[test]
    fn test_parse_speed() {
        assert_eq!(parse_speed("12"), Some(12));
        assert_eq!(parse_speed("  7rpm"), Some(7));
        assert_eq!(parse_speed("3.7"), Some(3));
        assert_eq!(parse_speed("-4"), Some(-4));
        assert_eq!(parse_speed("fast"), None);
        assert_eq!(parse_speed(""), None);
    }

    #[test]
    fn test_clamp_speed() {
        let preview = MotorPreview::default();
        assert_eq!(preview.clamp_speed(Some(1)), 1);
        assert_eq!(preview.clamp_speed(Some(15)), 15);
        assert_eq!(preview.clamp_speed(Some(20)), 15);
        assert_eq!(preview.clamp_speed(Some(0)), 15);
        assert_eq!(preview.clamp_speed(Some(-3)), 15);
        assert_eq!(preview.clamp_speed(None), 15);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_reverse_clamps_speed_after_one_second() {
        let preview = MotorPreview::default();
        let started = Instant::now();

        let text = preview.run(Direction::Reverse, Some(20)).await;

        assert_eq!(text, "Stepper done (1 rev, reverse, 15 RPM)");
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(1000));
        assert!(elapsed < Duration::from_millis(1100));
    }
}
