//! Line parser/validator
//!
//! Turns one raw line of `key:value` tokens into a [`Reading`]:
//!
//! ```text
//! T:48.13,V:5.04,S:NORMAL
//! T:95.50,V:5.00,S:CRITICAL_TEMP,TS:2024-03-09T14:05:07Z,FW:1.2
//! ```
//!
//! `T`, `V` and `S` are required, `TS` is optional and unknown keys are
//! ignored. Any rejection comes back as a [`ParseError`] value; the parser
//! never panics and has no side effects.

use core::fmt;

use crate::errors::ParseErrorKind;
use crate::reading::{Reading, Status};
use crate::time::{self, Timestamp};

const KEY_TEMPERATURE: &str = "T";
const KEY_VOLTAGE: &str = "V";
const KEY_STATUS: &str = "S";
const KEY_TIMESTAMP: &str = "TS";

/// A rejected line, kept whole for the error channel
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    /// The line exactly as received
    pub raw_line: String,
    pub reason: ParseErrorKind,
    pub arrival: Timestamp,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (line: {:?})", self.reason, self.raw_line)
    }
}

impl std::error::Error for ParseError {}

/// Parse one line received at `arrival`
pub fn parse_line(line: &str, arrival: Timestamp) -> Result<Reading, ParseError> {
    parse_fields(line, arrival).map_err(|reason| ParseError {
        raw_line: line.to_string(),
        reason,
        arrival,
    })
}

#[derive(Default)]
struct Fields<'a> {
    temperature: Option<&'a str>,
    voltage: Option<&'a str>,
    status: Option<&'a str>,
    timestamp: Option<&'a str>,
}

fn parse_fields(line: &str, arrival: Timestamp) -> Result<Reading, ParseErrorKind> {
    if line.trim().is_empty() {
        return Err(ParseErrorKind::Empty);
    }

    let mut fields = Fields::default();

    for token in line.split(',') {
        let token = token.trim();
        let (key, value) = token
            .split_once(':')
            .map(|(k, v)| (k.trim(), v.trim()))
            .filter(|(k, _)| !k.is_empty())
            .ok_or_else(|| ParseErrorKind::MalformedToken { token: token.to_string() })?;

        let (slot, field) = match key {
            KEY_TEMPERATURE => (&mut fields.temperature, KEY_TEMPERATURE),
            KEY_VOLTAGE => (&mut fields.voltage, KEY_VOLTAGE),
            KEY_STATUS => (&mut fields.status, KEY_STATUS),
            KEY_TIMESTAMP => (&mut fields.timestamp, KEY_TIMESTAMP),
            // Extra keys from newer firmware
            _ => continue,
        };

        if slot.replace(value).is_some() {
            return Err(ParseErrorKind::DuplicateField { field });
        }
    }

    let temperature =
        parse_number(required(fields.temperature, KEY_TEMPERATURE)?, KEY_TEMPERATURE)?;
    let voltage = parse_number(required(fields.voltage, KEY_VOLTAGE)?, KEY_VOLTAGE)?;
    let status: Status = required(fields.status, KEY_STATUS)?.parse()?;

    let timestamp = match fields.timestamp {
        Some(raw) => time::parse_timestamp(raw)
            .ok_or_else(|| ParseErrorKind::InvalidTimestamp { value: raw.to_string() })?,
        None => arrival,
    };

    Ok(Reading::new(timestamp, temperature, voltage, status))
}

fn required<'a>(value: Option<&'a str>, field: &'static str) -> Result<&'a str, ParseErrorKind> {
    value.ok_or(ParseErrorKind::MissingField { field })
}

/// Plain decimal: optional sign, digits, optional fraction
///
/// `f64::from_str` alone would also accept `inf`, `NaN` and exponents.
fn parse_number(raw: &str, field: &'static str) -> Result<f64, ParseErrorKind> {
    let invalid = || ParseErrorKind::InvalidNumber {
        field,
        value: raw.to_string(),
    };

    let digits = raw.strip_prefix(&['+', '-'][..]).unwrap_or(raw);
    let (whole, fraction) = match digits.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (digits, None),
    };

    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    let well_formed = match fraction {
        Some(fraction) => !fraction.is_empty() && all_digits(whole) && all_digits(fraction),
        None => !whole.is_empty() && all_digits(whole),
    };

    if !well_formed {
        return Err(invalid());
    }

    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(invalid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reading::StatusLevel;
    use chrono::{TimeZone, Utc};

    fn arrival() -> Timestamp {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn reason(line: &str) -> ParseErrorKind {
        parse_line(line, arrival()).unwrap_err().reason
    }

    #[test]
    fn parses_device_line() {
        let reading = parse_line("T:48.13,V:5.04,S:NORMAL", arrival()).unwrap();
        assert_eq!(reading.temperature, 48.13);
        assert_eq!(reading.voltage, 5.04);
        assert_eq!(reading.status.level(), StatusLevel::Normal);
        assert_eq!(reading.timestamp, arrival());
    }

    #[test]
    fn tolerates_whitespace_order_and_extra_keys() {
        let reading = parse_line(" S:WARNING_TEMP , FW:1.2 ,V: 4.90, T:-3.5 ", arrival()).unwrap();
        assert_eq!(reading.temperature, -3.5);
        assert_eq!(reading.voltage, 4.9);
        assert_eq!(reading.status.sub_code(), Some("TEMP"));
    }

    #[test]
    fn signs_and_precision() {
        let reading = parse_line("T:+12.50,V:.5,S:NORMAL", arrival()).unwrap();
        assert_eq!(reading.temperature, 12.5);
        assert_eq!(reading.voltage, 0.5);

        let reading = parse_line("T:7,V:5.,S:NORMAL", arrival());
        assert!(reading.is_err(), "trailing dot without digits is not a number");
    }

    #[test]
    fn source_timestamp_overrides_arrival() {
        let line = "T:20.00,V:5.00,S:NORMAL,TS:2024-05-01T11:59:58Z";
        let reading = parse_line(line, arrival()).unwrap();
        assert_eq!(reading.timestamp, Utc.with_ymd_and_hms(2024, 5, 1, 11, 59, 58).unwrap());
    }

    #[test]
    fn rejects_empty_lines() {
        assert_eq!(reason(""), ParseErrorKind::Empty);
        assert_eq!(reason("   \t "), ParseErrorKind::Empty);
    }

    #[test]
    fn rejects_missing_fields() {
        assert_eq!(reason("T:20.0,V:5.0"), ParseErrorKind::MissingField { field: "S" });
        assert_eq!(reason("V:5.0,S:NORMAL"), ParseErrorKind::MissingField { field: "T" });
        assert_eq!(reason("T:20.0,S:NORMAL"), ParseErrorKind::MissingField { field: "V" });
    }

    #[test]
    fn rejects_bad_numbers() {
        for bad in ["abc", "", "1e3", "inf", "NaN", "--1", "1.2.3", "+", "."] {
            let line = format!("T:{bad},V:5.0,S:NORMAL");
            assert!(
                matches!(reason(&line), ParseErrorKind::InvalidNumber { field: "T", .. }),
                "accepted temperature {bad:?}"
            );
        }
        assert!(matches!(
            reason("T:1.0,V:five,S:NORMAL"),
            ParseErrorKind::InvalidNumber { field: "V", .. }
        ));
    }

    #[test]
    fn rejects_unknown_status() {
        assert_eq!(
            reason("T:1.0,V:5.0,S:FORCED_TEMP_HIGH"),
            ParseErrorKind::UnknownStatus { token: "FORCED_TEMP_HIGH".into() }
        );
    }

    #[test]
    fn rejects_malformed_tokens_and_duplicates() {
        assert!(matches!(
            reason("T:1.0,V:5.0,S:NORMAL,garbage"),
            ParseErrorKind::MalformedToken { .. }
        ));
        assert!(matches!(reason("T:1.0,,V:5.0,S:NORMAL"), ParseErrorKind::MalformedToken { .. }));
        assert!(matches!(reason(":1.0,V:5.0,S:NORMAL"), ParseErrorKind::MalformedToken { .. }));
        assert_eq!(
            reason("T:1.0,T:2.0,V:5.0,S:NORMAL"),
            ParseErrorKind::DuplicateField { field: "T" }
        );
    }

    #[test]
    fn rejects_bad_source_timestamp() {
        assert!(matches!(
            reason("T:1.0,V:5.0,S:NORMAL,TS:yesterday"),
            ParseErrorKind::InvalidTimestamp { .. }
        ));
    }

    #[test]
    fn error_keeps_raw_line_and_arrival() {
        let err = parse_line("T:hot,V:5.0,S:NORMAL", arrival()).unwrap_err();
        assert_eq!(err.raw_line, "T:hot,V:5.0,S:NORMAL");
        assert_eq!(err.arrival, arrival());
    }

    #[test]
    fn render_reproduces_source_values() {
        let line = "T:95.50,V:6.10,S:CRITICAL_VOLTAGE_SPIKE";
        let reading = parse_line(line, arrival()).unwrap();
        assert_eq!(reading.to_string(), line);
    }
}
