//! In-memory sinks for testing and replay
//!
//! Each sink counts flushes and can be told to fail after a number of
//! appends, which is how tests exercise the ingestion loop's fatal path.

use crate::errors::SinkError;
use crate::parser::ParseError;
use crate::reading::Reading;
use crate::time::Timestamp;
use crate::traits::{ErrorChannel, RawArchive, ReadingSink, ReadingSource};

/// Shared failure injection for the memory sinks
#[derive(Debug, Default, Clone)]
struct FailAfter {
    limit: Option<usize>,
}

impl FailAfter {
    fn check(&self, appended: usize) -> Result<(), SinkError> {
        match self.limit {
            Some(limit) if appended >= limit => {
                Err(SinkError::Unavailable(format!("injected failure after {limit} records")))
            }
            _ => Ok(()),
        }
    }
}

/// Raw archive entry
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub arrival: Timestamp,
    pub line: String,
}

/// Raw archive held in a `Vec`
#[derive(Debug, Default, Clone)]
pub struct MemoryArchive {
    pub records: Vec<RawRecord>,
    pub flushes: usize,
    fail: FailAfter,
}

impl MemoryArchive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every append once `limit` records are stored
    pub fn failing_after(limit: usize) -> Self {
        Self {
            fail: FailAfter { limit: Some(limit) },
            ..Self::default()
        }
    }
}

impl RawArchive for MemoryArchive {
    fn append(&mut self, raw_line: &str, arrival: Timestamp) -> Result<(), SinkError> {
        self.fail.check(self.records.len())?;
        self.records.push(RawRecord {
            arrival,
            line: raw_line.to_string(),
        });
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        self.flushes += 1;
        Ok(())
    }
}

/// Structured store held in a `Vec`
#[derive(Debug, Default, Clone)]
pub struct MemoryReadingStore {
    pub readings: Vec<Reading>,
    pub flushes: usize,
    fail: FailAfter,
}

impl MemoryReadingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_after(limit: usize) -> Self {
        Self {
            fail: FailAfter { limit: Some(limit) },
            ..Self::default()
        }
    }
}

impl From<Vec<Reading>> for MemoryReadingStore {
    fn from(readings: Vec<Reading>) -> Self {
        Self {
            readings,
            ..Self::default()
        }
    }
}

impl ReadingSink for MemoryReadingStore {
    fn append(&mut self, reading: &Reading) -> Result<(), SinkError> {
        self.fail.check(self.readings.len())?;
        self.readings.push(reading.clone());
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        self.flushes += 1;
        Ok(())
    }
}

impl ReadingSource for MemoryReadingStore {
    fn read_all(&self) -> Result<Vec<Reading>, SinkError> {
        Ok(self.readings.clone())
    }
}

/// Error channel held in a `Vec`
#[derive(Debug, Default, Clone)]
pub struct MemoryErrorLog {
    pub errors: Vec<ParseError>,
    pub flushes: usize,
    fail: FailAfter,
}

impl MemoryErrorLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_after(limit: usize) -> Self {
        Self {
            fail: FailAfter { limit: Some(limit) },
            ..Self::default()
        }
    }
}

impl ErrorChannel for MemoryErrorLog {
    fn append(&mut self, error: &ParseError) -> Result<(), SinkError> {
        self.fail.check(self.errors.len())?;
        self.errors.push(error.clone());
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        self.flushes += 1;
        Ok(())
    }
}
