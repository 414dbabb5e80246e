//! Time management for ingestion and detection
//!
//! Provides a clock abstraction so arrival times can come from:
//! - System clock (live ingestion)
//! - Fixed/steppable clock (tests, replay)

use chrono::{DateTime, Duration, SecondsFormat, Utc};

/// Wall-clock instant attached to readings, parse errors and anomalies
pub type Timestamp = DateTime<Utc>;

/// Source of time for the ingestion loop
pub trait TimeSource {
    /// Get the current instant
    fn now(&self) -> Timestamp;
}

/// System time source
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTime;

impl TimeSource for SystemTime {
    fn now(&self) -> Timestamp {
        Utc::now()
    }
}

/// Fixed time source for testing
///
/// Every call to `now()` returns the current value and then advances it by
/// `step`, so consecutive lines get distinct, evenly spaced arrival times.
#[derive(Debug, Clone)]
pub struct FixedTime {
    timestamp: std::cell::Cell<Timestamp>,
    step: Duration,
}

impl FixedTime {
    pub fn new(timestamp: Timestamp) -> Self {
        Self {
            timestamp: std::cell::Cell::new(timestamp),
            step: Duration::zero(),
        }
    }

    /// Advance by `step` after every reading of the clock
    pub fn with_step(mut self, step: Duration) -> Self {
        self.step = step;
        self
    }

    pub fn advance(&self, delta: Duration) {
        self.timestamp.set(self.timestamp.get() + delta);
    }
}

impl TimeSource for FixedTime {
    fn now(&self) -> Timestamp {
        let current = self.timestamp.get();
        self.timestamp.set(current + self.step);
        current
    }
}

/// Render an instant the way every Telewatch artifact stores it
pub fn format_timestamp(ts: &Timestamp) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse an RFC 3339 instant, normalizing to UTC
pub fn parse_timestamp(raw: &str) -> Option<Timestamp> {
    DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}

/// Convert fractional seconds from configuration into a duration
///
/// Microsecond resolution; negative and non-finite input collapses to zero.
pub fn duration_from_secs(secs: f64) -> Duration {
    if !secs.is_finite() || secs <= 0.0 {
        return Duration::zero();
    }
    Duration::microseconds((secs * 1_000_000.0).round() as i64)
}

/// Duration as fractional seconds, for descriptions
pub fn secs_f64(delta: Duration) -> f64 {
    match delta.num_microseconds() {
        Some(us) => us as f64 / 1_000_000.0,
        None => delta.num_milliseconds() as f64 / 1_000.0,
    }
}
