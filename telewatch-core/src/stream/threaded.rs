//! Line source fed by a reader thread
//!
//! A reader with no read timeout (stdin) blocks until the device speaks.
//! This source moves it onto a named thread and hands lines over an
//! `mpsc` channel, so polling never blocks: an empty channel is silence and
//! a closed one is end of stream. The ingestion loop then sees its stop flag
//! within one idle back-off.
//!
//! The reader thread is detached. It ends on end of input, on a transport
//! error, or at its next line once the source has been dropped.

use std::io::{self, BufRead};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

use super::reader::ReaderLineSource;
use super::{Stream, StreamError};

type Delivery = Result<String, StreamError<io::Error>>;

/// Non-blocking front for a blocking reader
pub struct ThreadedLineSource {
    lines: Receiver<Delivery>,
}

impl ThreadedLineSource {
    pub fn spawn<R>(name: &str, reader: R) -> io::Result<Self>
    where
        R: BufRead + Send + 'static,
    {
        Self::from_source(name, ReaderLineSource::new(reader))
    }

    /// Run an already configured reader source on its own thread
    pub fn from_source<R>(name: &str, mut source: ReaderLineSource<R>) -> io::Result<Self>
    where
        R: BufRead + Send + 'static,
    {
        let (tx, rx) = mpsc::channel::<Delivery>();

        thread::Builder::new().name(name.to_string()).spawn(move || {
            loop {
                let delivery = match source.poll_next() {
                    Ok(line) => Ok(line),
                    // Read timeout on the inner reader; it paces this loop
                    Err(nb::Error::WouldBlock) => continue,
                    Err(nb::Error::Other(StreamError::EndOfStream)) => break,
                    Err(nb::Error::Other(e)) => Err(e),
                };
                let fatal = matches!(delivery, Err(StreamError::Transport(_)));
                if tx.send(delivery).is_err() || fatal {
                    break;
                }
            }
            log::debug!("reader thread finished");
        })?;

        Ok(Self { lines: rx })
    }
}

impl Stream for ThreadedLineSource {
    type Item = String;
    type Error = StreamError<io::Error>;

    fn poll_next(&mut self) -> nb::Result<Self::Item, Self::Error> {
        match self.lines.try_recv() {
            Ok(Ok(line)) => Ok(line),
            Ok(Err(e)) => Err(nb::Error::Other(e)),
            Err(TryRecvError::Empty) => Err(nb::Error::WouldBlock),
            Err(TryRecvError::Disconnected) => Err(nb::Error::Other(StreamError::EndOfStream)),
        }
    }
}
