//! Core ingestion and detection engine for Telewatch
//!
//! Turns a device's line-oriented telemetry into durable records and
//! reliability incidents.
//!
//! Two independent passes:
//! - Ingestion: line source -> raw archive -> parser -> reading store /
//!   error channel
//! - Detection: reading store -> rule engine -> incident report
//!
//! ```no_run
//! use telewatch_core::store::{CsvReplay, CsvReadingStore, ErrorLogFile, RawLogFile};
//! use telewatch_core::stream::FileLineSource;
//! use telewatch_core::{report, DetectionConfig, DetectionEngine, IngestionLoop, SystemTime};
//!
//! // Ingest a capture
//! let mut ingest = IngestionLoop::new(
//!     FileLineSource::open("capture.txt")?,
//!     RawLogFile::open("raw.log")?,
//!     CsvReadingStore::open("structured_metrics.csv")?,
//!     ErrorLogFile::open("parser_errors.log")?,
//!     SystemTime,
//! );
//! let summary = ingest.run()?;
//! println!("{} readings stored", summary.stats.readings_stored);
//!
//! // Detect and report
//! let engine = DetectionEngine::new(DetectionConfig::default())?;
//! let anomalies = engine.run_source(&CsvReplay::new("structured_metrics.csv"), None)?;
//! report::write_to("anomaly_report.json", &anomalies)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![deny(unsafe_code)]

pub mod anomaly;
pub mod config;
pub mod constants;
pub mod detect;
pub mod errors;
pub mod ingest;
pub mod parser;
pub mod reading;
pub mod report;
pub mod store;
pub mod stream;
pub mod time;
pub mod traits;

// Public API
pub use anomaly::{Anomaly, AnomalyKind, Severity};
pub use config::DetectionConfig;
pub use detect::{DetectionEngine, DetectorState};
pub use errors::{ConfigError, IngestError, ParseErrorKind, ReportError, SinkError};
pub use ingest::{IngestOutcome, IngestStats, IngestSummary, IngestionLoop, StopHandle};
pub use parser::{parse_line, ParseError};
pub use reading::{Reading, Status, StatusLevel};
pub use stream::StreamError;
pub use time::{FixedTime, SystemTime, TimeSource, Timestamp};
pub use traits::{ErrorChannel, RawArchive, ReadingSink, ReadingSource, Stream};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
