//! Error Types for Ingestion, Storage and Reporting
//!
//! ## Error Categories
//!
//! Errors fall into four classes with different propagation rules:
//!
//! ### Recoverable per record
//! - [`ParseErrorKind`]: why a raw line did not become a `Reading`. Carried
//!   inside [`crate::parser::ParseError`] together with the raw line and its
//!   arrival time. Never leaves the ingestion loop.
//!
//! ### Fatal to the ingestion loop
//! - [`SinkError`]: the raw archive or the structured store could not accept a
//!   record. Data integrity requires stopping.
//! - [`IngestError`]: what the loop returns to its caller.
//!
//! ### Configuration
//! - [`ConfigError`]: thresholds that cannot describe a valid rule set.
//!
//! ### Reporting
//! - [`ReportError`]: the incident report could not be serialized or written.
//!
//! ## Error Handling Strategy
//!
//! ```rust,no_run
//! use telewatch_core::errors::IngestError;
//!
//! fn exit_code(result: Result<(), IngestError>) -> i32 {
//!     match result {
//!         Ok(()) => 0,
//!         Err(IngestError::RawArchive(_)) => 2,
//!         Err(IngestError::ReadingStore(_)) => 3,
//!         Err(_) => 1,
//!     }
//! }
//! ```

use std::io;

use thiserror::Error;

/// Why a line was rejected by the parser
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseErrorKind {
    /// Nothing but whitespace on the line
    #[error("empty line")]
    Empty,

    /// Token without a `key:value` shape
    #[error("malformed token '{token}': expected key:value")]
    MalformedToken {
        /// The offending token, trimmed
        token: String,
    },

    /// A required key is absent
    #[error("missing required field '{field}'")]
    MissingField {
        /// Wire key of the missing field
        field: &'static str,
    },

    /// A key appears more than once on one line
    #[error("duplicate field '{field}'")]
    DuplicateField {
        /// Wire key that was repeated
        field: &'static str,
    },

    /// Temperature or voltage is not a plain decimal number
    #[error("field '{field}' is not a valid number: '{value}'")]
    InvalidNumber {
        /// Wire key of the numeric field
        field: &'static str,
        /// Raw value as received
        value: String,
    },

    /// Status level or sub-code not recognized
    #[error("unrecognized status token '{token}'")]
    UnknownStatus {
        /// Raw status token as received
        token: String,
    },

    /// The source cut the line at its length limit
    #[error("line longer than {limit} bytes, truncated")]
    LineTooLong {
        /// Limit the line was cut at
        limit: usize,
    },

    /// Source-supplied timestamp is not RFC 3339
    #[error("invalid timestamp '{value}'")]
    InvalidTimestamp {
        /// Raw value as received
        value: String,
    },
}

/// Failure of a durable sink or source
#[derive(Error, Debug)]
pub enum SinkError {
    /// Underlying I/O failed
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Sink was closed and no longer accepts records
    #[error("sink is closed")]
    Closed,

    /// Sink rejected the record for a reason of its own
    #[error("sink unavailable: {0}")]
    Unavailable(String),
}

/// Fatal outcome of an ingestion run
#[derive(Error, Debug)]
pub enum IngestError {
    /// Raw audit archive could not be written
    #[error("raw archive write failed: {0}")]
    RawArchive(#[source] SinkError),

    /// Structured reading store could not be written
    #[error("structured store write failed: {0}")]
    ReadingStore(#[source] SinkError),

    /// Line source failed at the transport level
    #[error("line source failed: {0}")]
    Source(String),
}

/// Invalid detection configuration
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Lower bound is not below the upper bound
    #[error("{field}: minimum {min} must be below maximum {max}")]
    InvalidRange {
        /// Which range is broken
        field: &'static str,
        /// Configured minimum
        min: f64,
        /// Configured maximum
        max: f64,
    },

    /// Threshold that must be strictly positive is not
    #[error("{field} must be a positive finite number, got {value}")]
    NotPositive {
        /// Which threshold is broken
        field: &'static str,
        /// Configured value
        value: f64,
    },
}

/// Incident report could not be produced
#[derive(Error, Debug)]
pub enum ReportError {
    /// JSON encoding failed
    #[error("report serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Writing the report artifact failed
    #[error("report write failed: {0}")]
    Io(#[from] io::Error),
}
