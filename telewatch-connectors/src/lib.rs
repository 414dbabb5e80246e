//! Transport Connectors for Device Telemetry
//!
//! ## Overview
//!
//! Adapters that turn a physical or virtual link into a
//! [`telewatch_core::Stream`] of lines, plus an emulator that plays the
//! device side for testing.
//!
//! ### TCP
//!
//! **When to use:**
//! - Device bridged to the network (`ser2net`, an ESP32 with WiFi)
//! - Running the emulator on another host
//!
//! ### Serial (feature `serial`)
//!
//! **When to use:**
//! - Device attached over USB-UART or a virtual port pair
//!
//! Both sources read with a timeout, so a quiet device shows up as
//! `WouldBlock` and the ingestion loop can still notice a stop request.
//!
//! ### Emulator
//!
//! Generates `T:..,V:..,S:..` lines, either a scripted failure sequence
//! that trips every detection rule or an open-ended randomized stream.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use telewatch_connectors::tcp::TcpLineSource;
//! use telewatch_core::Stream;
//!
//! let mut source = TcpLineSource::connect("127.0.0.1:7878", Duration::from_millis(250))?;
//! if let Ok(line) = source.poll_next() {
//!     println!("{line}");
//! }
//! # Ok::<(), telewatch_connectors::ConnectorError>(())
//! ```

use std::io;

use thiserror::Error;

pub mod emulator;
pub mod tcp;

#[cfg(feature = "serial")]
pub mod serial;

// Re-export common types
pub use emulator::{Emulator, EmulatorStats, Sample, ScriptStep};
pub use tcp::TcpLineSource;

#[cfg(feature = "serial")]
pub use serial::SerialLineSource;

/// Common connector errors
#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[cfg(feature = "serial")]
    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("invalid address: {0}")]
    InvalidAddress(String),
}
