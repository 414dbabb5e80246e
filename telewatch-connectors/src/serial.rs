//! Serial port line source
//!
//! Reads from a UART, USB CDC device or one end of a virtual port pair.
//! The port timeout makes a quiet device surface as `WouldBlock`.

use std::io::{self, BufReader};
use std::time::Duration;

use serialport::SerialPort;
use telewatch_core::stream::{ReaderLineSource, StreamError};
use telewatch_core::Stream;

use crate::ConnectorError;

/// Baud rate of the reference device firmware
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Line source over a serial port
pub struct SerialLineSource {
    inner: ReaderLineSource<BufReader<Box<dyn SerialPort>>>,
}

impl SerialLineSource {
    /// Open `port_name` at `baud_rate`, reading with `timeout`
    pub fn open(
        port_name: &str,
        baud_rate: u32,
        timeout: Duration,
    ) -> Result<Self, ConnectorError> {
        let port = serialport::new(port_name, baud_rate).timeout(timeout).open()?;
        log::info!("opened serial port {port_name} at {baud_rate} baud");

        Ok(Self {
            inner: ReaderLineSource::new(BufReader::new(port)),
        })
    }
}

impl Stream for SerialLineSource {
    type Item = String;
    type Error = StreamError<io::Error>;

    fn poll_next(&mut self) -> nb::Result<Self::Item, Self::Error> {
        self.inner.poll_next()
    }
}

/// Open a serial port for writing, as the emulator's device side
pub fn open_writer(
    port_name: &str,
    baud_rate: u32,
) -> Result<Box<dyn SerialPort>, ConnectorError> {
    let port = serialport::new(port_name, baud_rate)
        .timeout(Duration::from_millis(1000))
        .open()?;
    Ok(port)
}
