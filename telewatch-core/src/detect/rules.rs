//! Individual detection rules
//!
//! Each rule looks at one reading (plus the previous sample where it needs
//! one) and reports what it found. Rules hold no state; ordering and
//! episode bookkeeping belong to [`super::DetectorState`].
//!
//! | Rule | Kind | Severity |
//! |------|------|----------|
//! | Heartbeat | `HEARTBEAT_LOSS` | CRITICAL |
//! | Threshold | `THRESHOLD_BREACH_TEMP` / `_VOLTAGE` | CRITICAL |
//! | Rate of change | `RAPID_CHANGE_TEMP` / `_VOLTAGE` | WARNING |
//! | Status escalation | `STATUS_CRITICAL` / `STATUS_OFFLINE` | CRITICAL |

use crate::anomaly::{Anomaly, AnomalyKind};
use crate::config::DetectionConfig;
use crate::reading::{Reading, StatusLevel};
use crate::time::{self, Timestamp};

/// What the detector remembers about the previous reading
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LastSample {
    pub timestamp: Timestamp,
    pub temperature: f64,
    pub voltage: f64,
}

impl From<&Reading> for LastSample {
    fn from(reading: &Reading) -> Self {
        Self {
            timestamp: reading.timestamp,
            temperature: reading.temperature,
            voltage: reading.voltage,
        }
    }
}

/// Silence between `last` and `at` longer than the heartbeat timeout
///
/// The anomaly is stamped at `last + timeout`, the instant the loss became
/// detectable, not at `at`.
pub fn heartbeat(config: &DetectionConfig, last: &LastSample, at: Timestamp) -> Option<Anomaly> {
    let timeout = config.heartbeat_timeout();
    let gap = at - last.timestamp;
    if gap <= timeout {
        return None;
    }

    Some(Anomaly::new(
        last.timestamp + timeout,
        AnomalyKind::HeartbeatLoss,
        format!(
            "No data received for {:.1} seconds (timeout {:.1}s). Device may be offline.",
            time::secs_f64(gap),
            config.heartbeat_timeout_secs
        ),
    ))
}

/// Absolute bounds on temperature and voltage
pub fn thresholds(config: &DetectionConfig, reading: &Reading, out: &mut Vec<Anomaly>) {
    let t = reading.temperature;
    if t > config.temp_max {
        out.push(Anomaly::new(
            reading.timestamp,
            AnomalyKind::ThresholdBreachTemp,
            format!("Temperature {:.2}°C exceeded maximum of {:.2}°C.", t, config.temp_max),
        ));
    } else if t < config.temp_min {
        out.push(Anomaly::new(
            reading.timestamp,
            AnomalyKind::ThresholdBreachTemp,
            format!("Temperature {:.2}°C fell below minimum of {:.2}°C.", t, config.temp_min),
        ));
    }

    let v = reading.voltage;
    let (word, bound) = if v > config.voltage_max {
        ("above maximum", config.voltage_max)
    } else if v < config.voltage_min {
        ("below minimum", config.voltage_min)
    } else {
        return;
    };
    out.push(Anomaly::new(
        reading.timestamp,
        AnomalyKind::ThresholdBreachVoltage,
        format!(
            "Voltage {:.2}V {} of {:.2}V (allowed range {:.2}V-{:.2}V).",
            v, word, bound, config.voltage_min, config.voltage_max
        ),
    ));
}

/// Reading-to-reading deltas
///
/// Independent of [`thresholds`]: a reading may breach a bound and change
/// too fast at the same time.
pub fn rates(
    config: &DetectionConfig,
    last: &LastSample,
    reading: &Reading,
    out: &mut Vec<Anomaly>,
) {
    let interval = time::secs_f64(reading.timestamp - last.timestamp);

    let dt = reading.temperature - last.temperature;
    if dt.abs() > config.temp_rate_threshold {
        out.push(Anomaly::new(
            reading.timestamp,
            AnomalyKind::RapidChangeTemp,
            format!(
                "Temperature changed by {:+.2}°C in {:.1}s, exceeding the rate-of-change threshold of {:.2}°C.",
                dt, interval, config.temp_rate_threshold
            ),
        ));
    }

    if let Some(limit) = config.voltage_rate_threshold {
        let dv = reading.voltage - last.voltage;
        if dv.abs() > limit {
            out.push(Anomaly::new(
                reading.timestamp,
                AnomalyKind::RapidChangeVoltage,
                format!(
                    "Voltage changed by {:+.2}V in {:.1}s, exceeding the rate-of-change threshold of {:.2}V.",
                    dv, interval, limit
                ),
            ));
        }
    }
}

/// Fault states the device reports about itself
pub fn status(reading: &Reading) -> Option<Anomaly> {
    let kind = match reading.status.level() {
        StatusLevel::Critical => AnomalyKind::StatusCritical,
        StatusLevel::Offline => AnomalyKind::StatusOffline,
        StatusLevel::Normal | StatusLevel::Warning => return None,
    };
    Some(Anomaly::new(
        reading.timestamp,
        kind,
        format!(
            "Device reported {} status {}.",
            reading.status.level().as_str().to_lowercase(),
            reading.status
        ),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_line;
    use chrono::{Duration, TimeZone, Utc};

    fn at(secs: i64) -> Timestamp {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap() + Duration::seconds(secs)
    }

    fn reading(line: &str, secs: i64) -> Reading {
        parse_line(line, at(secs)).unwrap()
    }

    #[test]
    fn boundaries_are_inclusive() {
        let config = DetectionConfig::default();
        let mut out = Vec::new();
        thresholds(&config, &reading("T:80.00,V:5.50,S:NORMAL", 0), &mut out);
        thresholds(&config, &reading("T:-40.00,V:4.50,S:NORMAL", 1), &mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn low_temperature_description() {
        let config = DetectionConfig::default();
        let mut out = Vec::new();
        thresholds(&config, &reading("T:-45.00,V:5.00,S:NORMAL", 0), &mut out);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].description, "Temperature -45.00°C fell below minimum of -40.00°C.");
    }

    #[test]
    fn low_voltage_description() {
        let config = DetectionConfig::default();
        let mut out = Vec::new();
        thresholds(&config, &reading("T:20.00,V:4.20,S:NORMAL", 0), &mut out);
        assert_eq!(
            out[0].description,
            "Voltage 4.20V below minimum of 4.50V (allowed range 4.50V-5.50V)."
        );
    }

    #[test]
    fn voltage_rate_only_when_configured() {
        let last = LastSample::from(&reading("T:20.00,V:5.00,S:NORMAL", 0));
        let next = reading("T:20.00,V:5.40,S:NORMAL", 1);

        let mut out = Vec::new();
        rates(&DetectionConfig::default(), &last, &next, &mut out);
        assert!(out.is_empty());

        rates(&DetectionConfig::default().with_voltage_rate(0.25), &last, &next, &mut out);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].kind, AnomalyKind::RapidChangeVoltage);
        assert!(out[0].description.contains("+0.40V in 1.0s"));
    }

    #[test]
    fn heartbeat_at_exact_timeout_is_quiet() {
        let config = DetectionConfig::default();
        let last = LastSample::from(&reading("T:20.00,V:5.00,S:NORMAL", 0));
        assert!(heartbeat(&config, &last, at(4)).is_none());
        assert!(heartbeat(&config, &last, at(5)).is_some());
    }

    #[test]
    fn status_levels() {
        assert!(status(&reading("T:20,V:5,S:WARNING_TEMP_HIGH", 0)).is_none());

        let critical = status(&reading("T:20,V:5,S:CRITICAL_OVERHEAT", 0)).unwrap();
        assert_eq!(critical.kind, AnomalyKind::StatusCritical);
        assert_eq!(critical.description, "Device reported critical status CRITICAL_OVERHEAT.");

        let offline = status(&reading("T:20,V:5,S:OFFLINE", 0)).unwrap();
        assert_eq!(offline.kind, AnomalyKind::StatusOffline);
    }
}
