//! Anomaly records produced by the detection engine
//!
//! An [`Anomaly`] is created once by a rule evaluation and never mutated.
//! It serializes to exactly the four report fields:
//!
//! ```json
//! {
//!     "timestamp": "2024-05-01T12:00:02.000000Z",
//!     "type": "THRESHOLD_BREACH_TEMP",
//!     "severity": "CRITICAL",
//!     "description": "Temperature 95.50°C exceeded maximum of 80.00°C."
//! }
//! ```

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::time::Timestamp;

/// Incident type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnomalyKind {
    /// Temperature outside `[temp_min, temp_max]`
    ThresholdBreachTemp,
    /// Voltage outside `[voltage_min, voltage_max]`
    ThresholdBreachVoltage,
    /// Reading-to-reading temperature delta above the rate threshold
    RapidChangeTemp,
    /// Reading-to-reading voltage delta above the rate threshold
    RapidChangeVoltage,
    /// Silence longer than the heartbeat timeout
    HeartbeatLoss,
    /// Device reported a CRITICAL status
    StatusCritical,
    /// Device reported an OFFLINE status
    StatusOffline,
}

impl AnomalyKind {
    pub const ALL: [AnomalyKind; 7] = [
        AnomalyKind::ThresholdBreachTemp,
        AnomalyKind::ThresholdBreachVoltage,
        AnomalyKind::RapidChangeTemp,
        AnomalyKind::RapidChangeVoltage,
        AnomalyKind::HeartbeatLoss,
        AnomalyKind::StatusCritical,
        AnomalyKind::StatusOffline,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            AnomalyKind::ThresholdBreachTemp => "THRESHOLD_BREACH_TEMP",
            AnomalyKind::ThresholdBreachVoltage => "THRESHOLD_BREACH_VOLTAGE",
            AnomalyKind::RapidChangeTemp => "RAPID_CHANGE_TEMP",
            AnomalyKind::RapidChangeVoltage => "RAPID_CHANGE_VOLTAGE",
            AnomalyKind::HeartbeatLoss => "HEARTBEAT_LOSS",
            AnomalyKind::StatusCritical => "STATUS_CRITICAL",
            AnomalyKind::StatusOffline => "STATUS_OFFLINE",
        }
    }

    /// Severity every rule assigns to this kind
    pub const fn severity(&self) -> Severity {
        match self {
            AnomalyKind::RapidChangeTemp | AnomalyKind::RapidChangeVoltage => Severity::Warning,
            _ => Severity::Critical,
        }
    }

    /// Bit used by the episode tracker
    pub(crate) const fn bit(&self) -> u8 {
        1 << (*self as u8)
    }
}

impl fmt::Display for AnomalyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Incident severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Warning,
    Critical,
}

impl Severity {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Severity::Warning => "WARNING",
            Severity::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One detected incident
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    /// Trigger instant: the causal reading's timestamp, or the moment a
    /// heartbeat loss became detectable
    #[serde(with = "crate::report::timestamp_format")]
    pub timestamp: Timestamp,
    #[serde(rename = "type")]
    pub kind: AnomalyKind,
    pub severity: Severity,
    pub description: String,
}

impl Anomaly {
    /// Anomaly with the kind's standard severity
    pub fn new(timestamp: Timestamp, kind: AnomalyKind, description: impl Into<String>) -> Self {
        Self {
            timestamp,
            kind,
            severity: kind.severity(),
            description: description.into(),
        }
    }
}
