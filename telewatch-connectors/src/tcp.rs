//! TCP line source
//!
//! Connects to a device (or bridge) that writes newline-terminated
//! telemetry to the socket. The read timeout bounds how long a poll can
//! block on a silent peer; the peer closing the connection ends the
//! stream.

use std::io::{self, BufReader};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use telewatch_core::stream::{ReaderLineSource, ReaderStats, StreamError};
use telewatch_core::Stream;

use crate::ConnectorError;

/// Line source over a TCP connection
pub struct TcpLineSource {
    inner: ReaderLineSource<BufReader<TcpStream>>,
}

impl TcpLineSource {
    /// Connect to `addr`, reading with `read_timeout`
    pub fn connect(
        addr: impl ToSocketAddrs,
        read_timeout: Duration,
    ) -> Result<Self, ConnectorError> {
        let mut addrs = addr.to_socket_addrs()?;
        let target = addrs
            .next()
            .ok_or_else(|| ConnectorError::InvalidAddress("no address resolved".into()))?;

        let stream = TcpStream::connect(target)?;
        log::info!("connected to {target}");
        Self::from_stream(stream, read_timeout)
    }

    /// Wrap an already connected socket
    pub fn from_stream(stream: TcpStream, read_timeout: Duration) -> Result<Self, ConnectorError> {
        // A zero timeout means "block forever" to the OS
        let timeout = (!read_timeout.is_zero()).then_some(read_timeout);
        stream.set_read_timeout(timeout)?;
        Ok(Self {
            inner: ReaderLineSource::new(BufReader::new(stream)),
        })
    }

    pub fn stats(&self) -> &ReaderStats {
        self.inner.stats()
    }
}

impl Stream for TcpLineSource {
    type Item = String;
    type Error = StreamError<io::Error>;

    fn poll_next(&mut self) -> nb::Result<Self::Item, Self::Error> {
        self.inner.poll_next()
    }
}
