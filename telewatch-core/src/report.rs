//! Incident report emission
//!
//! The report is a JSON array of [`Anomaly`] objects in detection order,
//! pretty-printed with four-space indentation. An empty anomaly list
//! produces no artifact at all, so the presence of a report file alone
//! signals that something happened.

use std::fs;
use std::path::Path;

use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};

use crate::anomaly::Anomaly;
use crate::errors::ReportError;

/// Console text for a clean run
pub const NO_ANOMALIES: &str = "No anomalies detected. System is operating normally.";

const INDENT: &[u8] = b"    ";

/// Serde adapter storing instants in the artifact timestamp format
pub mod timestamp_format {
    use serde::{de, Deserialize, Deserializer, Serializer};

    use crate::time::{format_timestamp, parse_timestamp, Timestamp};

    pub fn serialize<S: Serializer>(ts: &Timestamp, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_timestamp(ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Timestamp, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_timestamp(&raw)
            .ok_or_else(|| de::Error::custom(format!("invalid timestamp '{raw}'")))
    }
}

/// Render the JSON report, or `None` when there is nothing to report
pub fn emit(anomalies: &[Anomaly]) -> Result<Option<String>, ReportError> {
    if anomalies.is_empty() {
        return Ok(None);
    }

    let mut buf = Vec::with_capacity(anomalies.len() * 192);
    let mut serializer = Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(INDENT));
    anomalies.serialize(&mut serializer)?;
    buf.push(b'\n');

    // serde_json only ever writes valid UTF-8
    Ok(Some(String::from_utf8_lossy(&buf).into_owned()))
}

/// Write the report to `path`
///
/// Returns `false` and leaves the filesystem untouched when there is
/// nothing to report. An existing report at `path` is replaced.
pub fn write_to(path: impl AsRef<Path>, anomalies: &[Anomaly]) -> Result<bool, ReportError> {
    match emit(anomalies)? {
        Some(json) => {
            fs::write(path.as_ref(), json)?;
            log::info!(
                "wrote {} anomalies to {}",
                anomalies.len(),
                path.as_ref().display()
            );
            Ok(true)
        }
        None => Ok(false),
    }
}

/// Human-readable report, one line per anomaly
pub fn render_console(anomalies: &[Anomaly]) -> String {
    if anomalies.is_empty() {
        return format!("{NO_ANOMALIES}\n");
    }

    let mut out = String::new();
    for anomaly in anomalies {
        out.push_str(&format!(
            "[{}]-[{}]-[{}] : {}\n",
            crate::time::format_timestamp(&anomaly.timestamp),
            anomaly.severity,
            anomaly.kind,
            anomaly.description
        ));
    }
    out
}

/// Read a previously written report back
pub fn load(path: impl AsRef<Path>) -> Result<Vec<Anomaly>, ReportError> {
    let text = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}
