//! Common test utilities for integration tests
//!
//! This module provides:
//! - Fixed instants and line builders
//! - A temp directory holding the three flat-file sinks
//! - The scripted failure sequence used by the end-to-end tests

#![allow(dead_code)]

use std::path::PathBuf;

use chrono::{Duration, TimeZone, Utc};
use tempfile::TempDir;

use telewatch_core::store::{CsvReadingStore, CsvReplay, ErrorLogFile, RawLogFile};
use telewatch_core::time::{format_timestamp, Timestamp};
use telewatch_core::FixedTime;

/// Start of every test timeline
pub fn t0() -> Timestamp {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
}

pub fn at(secs: i64) -> Timestamp {
    t0() + Duration::seconds(secs)
}

/// Clock handing out one arrival per second starting at `t0`
pub fn stepping_clock() -> FixedTime {
    FixedTime::new(t0()).with_step(Duration::seconds(1))
}

/// Wire line with a source timestamp
pub fn line_at(secs: i64, temperature: f64, voltage: f64, status: &str) -> String {
    format!(
        "T:{:.2},V:{:.2},S:{},TS:{}",
        temperature,
        voltage,
        status,
        format_timestamp(&at(secs))
    )
}

/// Normal, normal, temperature breach, voltage spike, rapid drop, five
/// seconds of silence, recovery
pub fn failure_sequence() -> Vec<String> {
    vec![
        line_at(0, 50.0, 5.0, "NORMAL"),
        line_at(1, 52.0, 5.1, "NORMAL"),
        line_at(2, 95.5, 5.0, "CRITICAL_TEMP_HIGH"),
        line_at(3, 60.0, 6.1, "CRITICAL_VOLTAGE_SPIKE"),
        line_at(4, 25.0, 5.0, "WARNING_TEMP_DROP"),
        line_at(9, 55.0, 5.0, "NORMAL"),
    ]
}

/// Temp directory with the raw archive, store, error log and report paths
pub struct Workspace {
    pub dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    pub fn raw_path(&self) -> PathBuf {
        self.dir.path().join("raw.log")
    }

    pub fn store_path(&self) -> PathBuf {
        self.dir.path().join("structured_metrics.csv")
    }

    pub fn errors_path(&self) -> PathBuf {
        self.dir.path().join("parser_errors.log")
    }

    pub fn report_path(&self) -> PathBuf {
        self.dir.path().join("anomaly_report.json")
    }

    pub fn open_sinks(&self) -> (RawLogFile, CsvReadingStore, ErrorLogFile) {
        (
            RawLogFile::open(self.raw_path()).unwrap(),
            CsvReadingStore::open(self.store_path()).unwrap(),
            ErrorLogFile::open(self.errors_path()).unwrap(),
        )
    }

    pub fn replay(&self) -> CsvReplay {
        CsvReplay::new(self.store_path())
    }

    /// Complete lines in the error log
    pub fn error_lines(&self) -> Vec<String> {
        std::fs::read_to_string(self.errors_path())
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }
}
