//! Sink implementations
//!
//! - `memory` - `Vec`-backed sinks for tests and in-process replay
//! - `file` - append-only flat files used by the CLI

pub mod file;
pub mod memory;

pub use file::{CsvReadingStore, CsvReplay, ErrorLogFile, RawLogFile, CSV_HEADER};
pub use memory::{MemoryArchive, MemoryErrorLog, MemoryReadingStore, RawRecord};
