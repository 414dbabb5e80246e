//! Core Traits and Abstractions for Telewatch
//!
//! ## Module Organization
//!
//! - [`stream`] - pull-based line sources
//! - [`sink`] - raw archive, structured store and error channel ports
//! - [`time`](crate::time) - clock abstraction (re-exported here)
//!
//! The ingestion loop is generic over these traits, so the same code runs
//! against serial ports, sockets, files and in-memory fixtures.

pub mod sink;
pub mod stream;

pub use sink::{ErrorChannel, RawArchive, ReadingSink, ReadingSource};
pub use stream::Stream;

pub use crate::time::TimeSource;
