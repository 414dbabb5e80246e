//! Reading domain entity
//!
//! A `Reading` is one validated telemetry sample. It only exists when
//! temperature, voltage and status all parsed from the same line.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::ParseErrorKind;
use crate::time::Timestamp;

/// Operational level reported by the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusLevel {
    Normal,
    Warning,
    Critical,
    Offline,
}

impl StatusLevel {
    /// Wire token for this level
    pub const fn as_str(&self) -> &'static str {
        match self {
            StatusLevel::Normal => "NORMAL",
            StatusLevel::Warning => "WARNING",
            StatusLevel::Critical => "CRITICAL",
            StatusLevel::Offline => "OFFLINE",
        }
    }

    /// Fault states the device itself reports
    pub const fn is_fault(&self) -> bool {
        matches!(self, StatusLevel::Critical | StatusLevel::Offline)
    }

    fn from_token(token: &str) -> Option<Self> {
        match token {
            "NORMAL" => Some(StatusLevel::Normal),
            "WARNING" => Some(StatusLevel::Warning),
            "CRITICAL" => Some(StatusLevel::Critical),
            "OFFLINE" => Some(StatusLevel::Offline),
            _ => None,
        }
    }
}

/// Device status: a level plus an optional sub-code
///
/// `WARNING_TEMP_HIGH` parses to level `Warning` with sub-code `TEMP_HIGH`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Status {
    level: StatusLevel,
    sub_code: Option<String>,
}

impl Status {
    pub fn new(level: StatusLevel) -> Self {
        Self { level, sub_code: None }
    }

    /// Status with a sub-code; the caller guarantees the code is valid
    pub fn with_sub_code(level: StatusLevel, sub_code: impl Into<String>) -> Self {
        Self {
            level,
            sub_code: Some(sub_code.into()),
        }
    }

    pub fn level(&self) -> StatusLevel {
        self.level
    }

    pub fn sub_code(&self) -> Option<&str> {
        self.sub_code.as_deref()
    }
}

impl FromStr for Status {
    type Err = ParseErrorKind;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        let unknown = || ParseErrorKind::UnknownStatus { token: token.to_string() };

        let (level, sub_code) = match token.split_once('_') {
            Some((level, code)) => (level, Some(code)),
            None => (token, None),
        };

        let level = StatusLevel::from_token(level).ok_or_else(unknown)?;

        match sub_code {
            None => Ok(Status::new(level)),
            Some(code) if is_valid_sub_code(code) => Ok(Status::with_sub_code(level, code)),
            Some(_) => Err(unknown()),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.sub_code {
            Some(code) => write!(f, "{}_{}", self.level.as_str(), code),
            None => f.write_str(self.level.as_str()),
        }
    }
}

impl Serialize for Status {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Status {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let token = String::deserialize(deserializer)?;
        token.parse().map_err(serde::de::Error::custom)
    }
}

fn is_valid_sub_code(code: &str) -> bool {
    !code.is_empty()
        && !code.starts_with('_')
        && !code.ends_with('_')
        && code.bytes().all(|b| b.is_ascii_uppercase() || b.is_ascii_digit() || b == b'_')
}

/// One validated telemetry sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Source-supplied instant, or arrival time when the line carried none
    pub timestamp: Timestamp,
    /// Degrees Celsius
    pub temperature: f64,
    /// Volts
    pub voltage: f64,
    pub status: Status,
}

impl Reading {
    pub fn new(timestamp: Timestamp, temperature: f64, voltage: f64, status: Status) -> Self {
        Self {
            timestamp,
            temperature,
            voltage,
            status,
        }
    }
}

/// Renders the wire form `T:<t>,V:<v>,S:<status>` at two decimals,
/// the precision devices transmit
impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T:{:.2},V:{:.2},S:{}", self.temperature, self.voltage, self.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_levels() {
        assert_eq!("NORMAL".parse::<Status>().unwrap(), Status::new(StatusLevel::Normal));
        assert_eq!("OFFLINE".parse::<Status>().unwrap().level(), StatusLevel::Offline);
    }

    #[test]
    fn suffixed_levels() {
        let status: Status = "WARNING_TEMP_HIGH".parse().unwrap();
        assert_eq!(status.level(), StatusLevel::Warning);
        assert_eq!(status.sub_code(), Some("TEMP_HIGH"));
        assert_eq!(status.to_string(), "WARNING_TEMP_HIGH");
    }

    #[test]
    fn rejects_unknown_tokens() {
        let tokens = [
            "",
            "OK",
            "normal",
            "WARNING_",
            "CRITICAL__X",
            "FORCED_TEMP_HIGH",
            "NORMAL_lower",
        ];
        for token in tokens {
            assert!(
                matches!(token.parse::<Status>(), Err(ParseErrorKind::UnknownStatus { .. })),
                "accepted {token:?}"
            );
        }
    }

    #[test]
    fn faults() {
        assert!(StatusLevel::Critical.is_fault());
        assert!(StatusLevel::Offline.is_fault());
        assert!(!StatusLevel::Warning.is_fault());
    }

    #[test]
    fn wire_rendering() {
        let ts = chrono::Utc::now();
        let reading = Reading::new(ts, 95.5, 5.0, "CRITICAL_TEMP".parse().unwrap());
        assert_eq!(reading.to_string(), "T:95.50,V:5.00,S:CRITICAL_TEMP");
    }
}
