//! File-based line source
//!
//! Replays a capture file, or follows a file another process is still
//! appending to (the device bridged to a file by `socat`, a logger tail).
//!
//! ## Example
//!
//! ```rust,no_run
//! use telewatch_core::stream::{FileLineSource, Stream};
//!
//! let mut source = FileLineSource::open("capture.txt")?.with_follow(true);
//! while let Ok(line) = source.poll_next() {
//!     // Process line
//! }
//! # Ok::<(), std::io::Error>(())
//! ```

use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;

use super::reader::ReaderLineSource;
use super::{Stream, StreamError};

/// Line source reading from a file
pub struct FileLineSource {
    inner: ReaderLineSource<BufReader<File>>,
}

impl FileLineSource {
    /// Open `path` for reading from its beginning
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::open(path)?;
        Ok(Self {
            inner: ReaderLineSource::new(BufReader::new(file)),
        })
    }

    /// At end of file, report silence instead of closing
    pub fn with_follow(mut self, follow: bool) -> Self {
        self.inner = self.inner.with_follow(follow);
        self
    }
}

impl Stream for FileLineSource {
    type Item = String;
    type Error = StreamError<io::Error>;

    fn poll_next(&mut self) -> nb::Result<Self::Item, Self::Error> {
        self.inner.poll_next()
    }
}
