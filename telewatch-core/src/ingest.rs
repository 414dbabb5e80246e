//! Ingestion loop
//!
//! Drains a line source into the three sinks:
//!
//! ```text
//! source ─> clock.now() ─> raw archive ─> parse_line ─┬─ Ok ──> reading store
//!                                                     └─ Err ─> error channel
//! ```
//!
//! Every line is archived before it is parsed, so the archive holds exactly
//! one record per received line whatever the parse outcome. A rejected line
//! never stops the loop.
//!
//! ## Failure Classes
//!
//! - Parse failure: sent to the error channel, logged, loop continues
//! - Error channel failure: logged, loop continues
//! - Raw archive or reading store failure: fatal, loop returns `IngestError`
//! - Source transport failure: fatal
//!
//! All sinks are flushed on every exit path.
//!
//! ## Stopping
//!
//! The loop ends when the source reports end of stream or when a
//! [`StopHandle`] is triggered. The stop flag is checked before every poll
//! and after every idle back-off, so a silent source never blocks shutdown
//! for longer than one back-off period (plus the source's own read timeout).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use core::fmt;

use crate::constants::DEFAULT_IDLE_BACKOFF_MS;
use crate::errors::{IngestError, ParseErrorKind, SinkError};
use crate::parser::{parse_line, ParseError};
use crate::stream::StreamError;
use crate::time::Timestamp;
use crate::traits::{ErrorChannel, RawArchive, ReadingSink, Stream, TimeSource};

/// Shared stop flag for a running loop
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    flag: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the loop to finish after the current line
    pub fn request_stop(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

impl From<Arc<AtomicBool>> for StopHandle {
    fn from(flag: Arc<AtomicBool>) -> Self {
        Self { flag }
    }
}

/// Why the loop ended without error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// The source reported end of stream
    SourceExhausted,
    /// The stop flag was raised
    StopRequested,
}

/// Counters for one ingestion run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IngestStats {
    /// Lines handed out by the source, equal to raw archive records written
    pub lines_received: usize,
    /// Lines that became readings
    pub readings_stored: usize,
    /// Lines rejected by the parser
    pub parse_errors: usize,
    /// Polls that found the source silent
    pub idle_polls: usize,
    /// Lines the source cut at its length limit, counted in `parse_errors` too
    pub lines_truncated: usize,
}

/// Result of a completed run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestSummary {
    pub outcome: IngestOutcome,
    pub stats: IngestStats,
}

/// Single-consumer loop from one source into the sinks
pub struct IngestionLoop<S, A, W, E, C> {
    source: S,
    archive: A,
    store: W,
    errors: E,
    clock: C,
    stop: StopHandle,
    idle_backoff: Duration,
}

impl<S, A, W, E, C, TE> IngestionLoop<S, A, W, E, C>
where
    S: Stream<Item = String, Error = StreamError<TE>>,
    TE: fmt::Display,
    A: RawArchive,
    W: ReadingSink,
    E: ErrorChannel,
    C: TimeSource,
{
    pub fn new(source: S, archive: A, store: W, errors: E, clock: C) -> Self {
        Self {
            source,
            archive,
            store,
            errors,
            clock,
            stop: StopHandle::new(),
            idle_backoff: Duration::from_millis(DEFAULT_IDLE_BACKOFF_MS),
        }
    }

    /// Share an externally created stop flag
    pub fn with_stop_handle(mut self, stop: StopHandle) -> Self {
        self.stop = stop;
        self
    }

    /// Sleep between polls of a silent source
    pub fn with_idle_backoff(mut self, backoff: Duration) -> Self {
        self.idle_backoff = backoff;
        self
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Run until end of stream, stop request, or a fatal error
    pub fn run(&mut self) -> Result<IngestSummary, IngestError> {
        let mut stats = IngestStats::default();
        let result = self.drive(&mut stats);
        let flushed = self.flush_all();

        log::info!(
            "ingestion finished: {} lines, {} stored, {} rejected",
            stats.lines_received,
            stats.readings_stored,
            stats.parse_errors
        );

        // The loop's own error takes precedence over a flush failure
        let outcome = result?;
        flushed?;
        Ok(IngestSummary { outcome, stats })
    }

    /// Give back the source and sinks
    pub fn into_parts(self) -> (S, A, W, E) {
        (self.source, self.archive, self.store, self.errors)
    }

    fn drive(&mut self, stats: &mut IngestStats) -> Result<IngestOutcome, IngestError> {
        loop {
            if self.stop.is_stop_requested() {
                log::info!("stop requested");
                return Ok(IngestOutcome::StopRequested);
            }

            match self.source.poll_next() {
                Ok(line) => self.handle_line(&line, stats)?,
                Err(nb::Error::WouldBlock) => {
                    stats.idle_polls += 1;
                    log::debug!("source idle");
                    if !self.idle_backoff.is_zero() {
                        thread::sleep(self.idle_backoff);
                    }
                }
                Err(nb::Error::Other(StreamError::EndOfStream)) => {
                    log::info!("source closed");
                    return Ok(IngestOutcome::SourceExhausted);
                }
                Err(nb::Error::Other(StreamError::Overflow { limit, prefix })) => {
                    stats.lines_truncated += 1;
                    self.handle_truncated(&prefix, limit, stats)?;
                }
                Err(nb::Error::Other(StreamError::Transport(e))) => {
                    log::error!("source failed: {e}");
                    return Err(IngestError::Source(e.to_string()));
                }
            }
        }
    }

    /// Clock and archive step shared by every received line
    fn receive(&mut self, line: &str, stats: &mut IngestStats) -> Result<Timestamp, IngestError> {
        let arrival = self.clock.now();
        stats.lines_received += 1;
        self.archive
            .append(line, arrival)
            .map_err(IngestError::RawArchive)?;
        Ok(arrival)
    }

    fn handle_line(&mut self, line: &str, stats: &mut IngestStats) -> Result<(), IngestError> {
        let arrival = self.receive(line, stats)?;

        match parse_line(line, arrival) {
            Ok(reading) => {
                self.store
                    .append(&reading)
                    .map_err(IngestError::ReadingStore)?;
                stats.readings_stored += 1;
                log::debug!("stored {reading}");
            }
            Err(err) => self.reject(&err, stats),
        }
        Ok(())
    }

    /// Archive the kept prefix, then reject it without parsing
    fn handle_truncated(
        &mut self,
        prefix: &str,
        limit: usize,
        stats: &mut IngestStats,
    ) -> Result<(), IngestError> {
        let arrival = self.receive(prefix, stats)?;
        let err = ParseError {
            raw_line: prefix.to_string(),
            reason: ParseErrorKind::LineTooLong { limit },
            arrival,
        };
        self.reject(&err, stats);
        Ok(())
    }

    fn reject(&mut self, err: &ParseError, stats: &mut IngestStats) {
        stats.parse_errors += 1;
        log::warn!("{err}");
        if let Err(e) = self.errors.append(err) {
            log::error!("error channel write failed: {e}");
        }
    }

    fn flush_all(&mut self) -> Result<(), IngestError> {
        let archive = self.archive.flush();
        let store = self.store.flush();
        if let Err(e) = self.errors.flush() {
            log::error!("error channel flush failed: {e}");
        }
        log_flush_failure("raw archive", &archive);
        log_flush_failure("reading store", &store);
        archive.map_err(IngestError::RawArchive)?;
        store.map_err(IngestError::ReadingStore)
    }
}

fn log_flush_failure(name: &str, result: &Result<(), SinkError>) {
    if let Err(e) = result {
        log::error!("{name} flush failed: {e}");
    }
}
