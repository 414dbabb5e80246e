//! Stream Processing Traits
//!
//! Line sources follow a pull-based model using the `nb` crate, so a silent
//! device and a closed channel are different outcomes:
//!
//! - `Ok(line)` - a line arrived
//! - `Err(nb::Error::WouldBlock)` - nothing yet; the device may just be quiet
//! - `Err(nb::Error::Other(StreamError::EndOfStream))` - the source is closed
//! - `Err(nb::Error::Other(StreamError::Transport(e)))` - the transport failed
//!
//! ## Common Patterns
//!
//! ```rust
//! use telewatch_core::traits::Stream;
//! use telewatch_core::stream::{MemoryLineSource, StreamError};
//!
//! let mut source = MemoryLineSource::new(["T:20.0,V:5.0,S:NORMAL"]);
//! loop {
//!     match source.poll_next() {
//!         Ok(line) => println!("{line}"),
//!         Err(nb::Error::WouldBlock) => continue,
//!         Err(nb::Error::Other(StreamError::EndOfStream)) => break,
//!         Err(nb::Error::Other(e)) => panic!("{e}"),
//!     }
//! }
//! ```

/// Core stream trait for line sources
///
/// ## Implementation Notes
///
/// - `poll_next` should not block indefinitely; return `WouldBlock` after a
///   read timeout so the consumer can honour stop requests
/// - Line terminators (`\n`, `\r\n`) are stripped, nothing else is
/// - `EndOfStream` should be sticky
pub trait Stream {
    /// Type of items produced by the stream
    type Item;

    /// Type of errors that can occur
    type Error;

    /// Attempt to pull the next item from the stream
    fn poll_next(&mut self) -> nb::Result<Self::Item, Self::Error>;

    /// Returns bounds on remaining items
    ///
    /// Default implementation returns `(0, None)` indicating unknown size.
    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, None)
    }
}

impl<S: Stream + ?Sized> Stream for Box<S> {
    type Item = S::Item;
    type Error = S::Error;

    fn poll_next(&mut self) -> nb::Result<Self::Item, Self::Error> {
        (**self).poll_next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (**self).size_hint()
    }
}
