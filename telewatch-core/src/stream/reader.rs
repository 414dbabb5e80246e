//! Line source over any buffered reader
//!
//! Works for stdin, TCP sockets and serial ports alike. Read timeouts
//! (`WouldBlock` / `TimedOut`) surface as `nb::Error::WouldBlock`, with any
//! partially received line kept until its terminator arrives.
//!
//! A line longer than the limit is cut at the limit and handed out as
//! [`StreamError::Overflow`]; the rest of it is skipped up to the next
//! terminator. The source never buffers more than the limit plus one read.

use std::io::{self, BufRead};

use super::{Stream, StreamError};

/// Longest line accepted before the source reports overflow
pub const DEFAULT_MAX_LINE_BYTES: usize = 4096;

/// Statistics for a reader-backed source
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ReaderStats {
    /// Lines handed out, truncated ones included
    pub lines_read: usize,
    /// Lines cut at the length limit
    pub lines_truncated: usize,
    /// Bytes consumed from the reader
    pub bytes_read: usize,
    /// Polls that hit a read timeout
    pub timeouts: usize,
}

/// Line source over a `BufRead`
pub struct ReaderLineSource<R> {
    reader: R,
    /// Bytes of the line currently being assembled
    pending: Vec<u8>,
    max_line_bytes: usize,
    /// Skipping the tail of an overlong line
    discarding: bool,
    /// Treat end of input as silence (`tail -f`)
    follow: bool,
    eof: bool,
    stats: ReaderStats,
}

enum Fill {
    End,
    Chunk { used: usize, terminated: bool },
}

impl<R: BufRead> ReaderLineSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            pending: Vec::new(),
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
            discarding: false,
            follow: false,
            eof: false,
            stats: ReaderStats::default(),
        }
    }

    pub fn with_max_line_bytes(mut self, limit: usize) -> Self {
        self.max_line_bytes = limit;
        self
    }

    /// Keep polling past end of input, for files that are still growing
    pub fn with_follow(mut self, follow: bool) -> Self {
        self.follow = follow;
        self
    }

    pub fn stats(&self) -> &ReaderStats {
        &self.stats
    }

    /// Length of the pending line without its terminator
    fn content_len(&self) -> usize {
        let line = self.pending.strip_suffix(b"\n").unwrap_or(&self.pending[..]);
        line.strip_suffix(b"\r").map_or(line.len(), <[u8]>::len)
    }

    /// Take the assembled line, stripping its terminator
    ///
    /// Invalid UTF-8 is replaced rather than rejected so the raw archive
    /// still sees the line.
    fn take_line(&mut self) -> String {
        if let Some(line) = self.pending.strip_suffix(b"\n") {
            let len = line.strip_suffix(b"\r").unwrap_or(line).len();
            self.pending.truncate(len);
        }
        let line = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        self.stats.lines_read += 1;
        line
    }

    /// Cut the pending line at the limit
    fn take_truncated(&mut self) -> StreamError<io::Error> {
        self.pending.truncate(self.max_line_bytes);
        let prefix = self.take_line();
        self.stats.lines_truncated += 1;
        StreamError::Overflow {
            limit: self.max_line_bytes,
            prefix,
        }
    }
}

impl<R: BufRead> Stream for ReaderLineSource<R> {
    type Item = String;
    type Error = StreamError<io::Error>;

    fn poll_next(&mut self) -> nb::Result<Self::Item, Self::Error> {
        if self.eof {
            return Err(nb::Error::Other(StreamError::EndOfStream));
        }

        loop {
            let fill = match self.reader.fill_buf() {
                Ok([]) => Fill::End,
                Ok(buf) => {
                    let (used, terminated) = match buf.iter().position(|&b| b == b'\n') {
                        Some(end) => (end + 1, true),
                        None => (buf.len(), false),
                    };
                    if !self.discarding {
                        self.pending.extend_from_slice(&buf[..used]);
                    }
                    Fill::Chunk { used, terminated }
                }
                Err(e)
                    if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) =>
                {
                    self.stats.timeouts += 1;
                    return Err(nb::Error::WouldBlock);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(nb::Error::Other(StreamError::Transport(e))),
            };

            match fill {
                Fill::End if self.follow => {
                    // Writer may still be mid-line; hold what we have
                    return Err(nb::Error::WouldBlock);
                }
                Fill::End => {
                    // Flush a final unterminated line before closing
                    self.eof = true;
                    self.discarding = false;
                    if self.pending.is_empty() {
                        return Err(nb::Error::Other(StreamError::EndOfStream));
                    }
                    return Ok(self.take_line());
                }
                Fill::Chunk { used, terminated } => {
                    self.reader.consume(used);
                    self.stats.bytes_read += used;

                    if self.discarding {
                        self.discarding = !terminated;
                        continue;
                    }
                    if self.content_len() > self.max_line_bytes {
                        self.discarding = !terminated;
                        return Err(nb::Error::Other(self.take_truncated()));
                    }
                    if terminated {
                        return Ok(self.take_line());
                    }
                    // Partial line without EOF: keep reading
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufReader, Cursor, Read};

    fn drain<R: BufRead>(source: &mut ReaderLineSource<R>) -> Vec<String> {
        let mut lines = Vec::new();
        loop {
            match source.poll_next() {
                Ok(line) => lines.push(line),
                Err(nb::Error::Other(StreamError::EndOfStream)) => return lines,
                Err(e) => panic!("unexpected {e:?}"),
            }
        }
    }

    #[test]
    fn strips_terminators_only() {
        let data = "T:1.0,V:5.0,S:NORMAL\r\n  padded  \n\nlast";
        let mut source = ReaderLineSource::new(Cursor::new(data));
        let lines = drain(&mut source);
        assert_eq!(lines, vec!["T:1.0,V:5.0,S:NORMAL", "  padded  ", "", "last"]);
        assert_eq!(source.stats().lines_read, 4);
    }

    #[test]
    fn lossy_utf8() {
        let data: &[u8] = b"T:\xff,V:5.0,S:NORMAL\n";
        let mut source = ReaderLineSource::new(Cursor::new(data));
        let line = source.poll_next().unwrap();
        assert!(line.starts_with("T:"));
        assert!(line.contains('\u{FFFD}'));
    }

    #[test]
    fn overlong_line_is_cut_and_the_next_line_survives() {
        let data = format!("{}\nT:1.0,V:5.0,S:NORMAL\n", "x".repeat(64));
        let mut source = ReaderLineSource::new(BufReader::with_capacity(8, Cursor::new(data)))
            .with_max_line_bytes(16);

        match source.poll_next() {
            Err(nb::Error::Other(StreamError::Overflow { limit, prefix })) => {
                assert_eq!(limit, 16);
                assert_eq!(prefix, "x".repeat(16));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(source.poll_next().unwrap(), "T:1.0,V:5.0,S:NORMAL");
        assert_eq!(source.stats().lines_read, 2);
        assert_eq!(source.stats().lines_truncated, 1);
    }

    #[test]
    fn unterminated_flood_is_cut_without_reading_it_all() {
        let data = "y".repeat(100_000);
        let mut source = ReaderLineSource::new(BufReader::with_capacity(64, Cursor::new(data)))
            .with_max_line_bytes(128);

        assert!(matches!(
            source.poll_next(),
            Err(nb::Error::Other(StreamError::Overflow { limit: 128, .. }))
        ));
        assert!(source.stats().bytes_read <= 128 + 64);
        assert!(source.pending.is_empty());

        // The rest of the flood is skipped, not handed out
        assert!(matches!(source.poll_next(), Err(nb::Error::Other(StreamError::EndOfStream))));
        assert_eq!(source.stats().bytes_read, 100_000);
    }

    #[test]
    fn line_at_the_limit_is_accepted() {
        let data = format!("{}\r\n", "z".repeat(16));
        let mut source = ReaderLineSource::new(Cursor::new(data)).with_max_line_bytes(16);
        assert_eq!(source.poll_next().unwrap(), "z".repeat(16));
    }

    #[test]
    fn follow_mode_waits_for_terminator() {
        let mut source = ReaderLineSource::new(Cursor::new("T:1.0,V:5.0,S:NOR")).with_follow(true);
        assert!(matches!(source.poll_next(), Err(nb::Error::WouldBlock)));
        assert!(matches!(source.poll_next(), Err(nb::Error::WouldBlock)));
    }

    /// Reader that times out once in the middle of a line
    struct Flaky {
        chunks: Vec<io::Result<&'static [u8]>>,
    }

    impl Read for Flaky {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.chunks.is_empty() {
                return Ok(0);
            }
            match self.chunks.remove(0) {
                Ok(bytes) => {
                    buf[..bytes.len()].copy_from_slice(bytes);
                    Ok(bytes.len())
                }
                Err(e) => Err(e),
            }
        }
    }

    #[test]
    fn timeout_keeps_partial_line() {
        let reader = Flaky {
            chunks: vec![
                Ok(&b"T:20.0,V:"[..]),
                Err(io::Error::new(io::ErrorKind::TimedOut, "quiet")),
                Ok(&b"5.0,S:NORMAL\n"[..]),
            ],
        };
        let mut source = ReaderLineSource::new(BufReader::new(reader));

        assert!(matches!(source.poll_next(), Err(nb::Error::WouldBlock)));
        assert_eq!(source.poll_next().unwrap(), "T:20.0,V:5.0,S:NORMAL");
        assert_eq!(source.stats().timeouts, 1);
    }
}
