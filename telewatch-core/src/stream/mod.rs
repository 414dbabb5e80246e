//! Line sources
//!
//! Streaming abstractions that feed the ingestion loop:
//! - Core error type (this file)
//! - `memory` - scripted in-memory sources for tests and replay
//! - `reader` - any `BufRead` (stdin, sockets, serial ports)
//! - `file` - files, optionally followed like `tail -f`
//! - `threaded` - a blocking reader moved onto its own thread (stdin)

use thiserror::Error;

pub mod file;
pub mod memory;
pub mod reader;
pub mod threaded;

pub use file::FileLineSource;
pub use memory::{MemoryLineSource, SourceStep};
pub use reader::{ReaderLineSource, ReaderStats};
pub use threaded::ThreadedLineSource;

/// Errors that can occur while pulling lines
#[derive(Error, Debug)]
pub enum StreamError<E> {
    /// Transport-level error (e.g., I/O error)
    #[error("transport error: {0}")]
    Transport(E),
    /// A single line exceeded the source's limit
    #[error("line exceeds {limit} bytes")]
    Overflow {
        /// Configured maximum line length
        limit: usize,
        /// The first `limit` bytes of the line
        prefix: String,
    },
    /// Source closed; no more lines will arrive
    #[error("end of stream")]
    EndOfStream,
}

impl<E> StreamError<E> {
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, StreamError::EndOfStream)
    }
}

// Re-export traits for convenience
pub use crate::traits::Stream;
