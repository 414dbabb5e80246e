//! Durable sink and source ports
//!
//! The ingestion loop and the detection engine only see these traits. Any
//! backing store works as long as appends keep their order and replay
//! returns committed records in that order.

use crate::errors::SinkError;
use crate::parser::ParseError;
use crate::reading::Reading;
use crate::time::Timestamp;

/// Immutable audit record of every line received
///
/// Appends are never reordered or skipped. A failed append is fatal to the
/// ingestion loop.
pub trait RawArchive {
    /// Append one line exactly as received
    fn append(&mut self, raw_line: &str, arrival: Timestamp) -> Result<(), SinkError>;

    /// Push buffered records to durable storage
    fn flush(&mut self) -> Result<(), SinkError>;
}

/// Writer side of the structured store
pub trait ReadingSink {
    /// Append one reading after every previously appended one
    fn append(&mut self, reading: &Reading) -> Result<(), SinkError>;

    fn flush(&mut self) -> Result<(), SinkError>;
}

/// Reader side of the structured store
pub trait ReadingSource {
    /// Every committed reading, in append order
    ///
    /// Records still being written are not visible.
    fn read_all(&self) -> Result<Vec<Reading>, SinkError>;
}

/// Destination for rejected lines; write-only from the core's view
pub trait ErrorChannel {
    fn append(&mut self, error: &ParseError) -> Result<(), SinkError>;

    fn flush(&mut self) -> Result<(), SinkError>;
}

impl<T: RawArchive + ?Sized> RawArchive for &mut T {
    fn append(&mut self, raw_line: &str, arrival: Timestamp) -> Result<(), SinkError> {
        (**self).append(raw_line, arrival)
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        (**self).flush()
    }
}

impl<T: ReadingSink + ?Sized> ReadingSink for &mut T {
    fn append(&mut self, reading: &Reading) -> Result<(), SinkError> {
        (**self).append(reading)
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        (**self).flush()
    }
}

impl<T: ErrorChannel + ?Sized> ErrorChannel for &mut T {
    fn append(&mut self, error: &ParseError) -> Result<(), SinkError> {
        (**self).append(error)
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        (**self).flush()
    }
}
