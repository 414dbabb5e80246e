//! Memory-based line sources for testing and replay
//!
//! A [`MemoryLineSource`] plays back a script of lines and silences:
//! a [`SourceStep::Silence`] step makes one poll return `WouldBlock`, which
//! is how a quiet device looks to the ingestion loop.

use std::collections::VecDeque;
use std::convert::Infallible;

use super::{Stream, StreamError};

/// One step of a scripted source
#[derive(Debug, Clone, PartialEq)]
pub enum SourceStep {
    /// A line arrives
    Line(String),
    /// One poll finds nothing
    Silence,
}

/// Memory-based line source
///
/// ## Example
///
/// ```rust
/// use telewatch_core::stream::{MemoryLineSource, SourceStep, Stream};
///
/// let mut source = MemoryLineSource::from_steps(vec![
///     SourceStep::Line("T:20.00,V:5.00,S:NORMAL".into()),
///     SourceStep::Silence,
/// ]);
///
/// assert!(source.poll_next().is_ok());
/// assert!(matches!(source.poll_next(), Err(nb::Error::WouldBlock)));
/// ```
#[derive(Debug, Default, Clone)]
pub struct MemoryLineSource {
    steps: VecDeque<SourceStep>,
    /// Lines handed out so far
    delivered: usize,
}

impl MemoryLineSource {
    /// Source that yields `lines` back to back, then closes
    pub fn new<I, L>(lines: I) -> Self
    where
        I: IntoIterator<Item = L>,
        L: Into<String>,
    {
        Self::from_steps(lines.into_iter().map(|l| SourceStep::Line(l.into())).collect())
    }

    pub fn from_steps(steps: Vec<SourceStep>) -> Self {
        Self {
            steps: steps.into(),
            delivered: 0,
        }
    }

    /// Append a line to the end of the script
    pub fn push_line(&mut self, line: impl Into<String>) {
        self.steps.push_back(SourceStep::Line(line.into()));
    }

    pub fn push_silence(&mut self) {
        self.steps.push_back(SourceStep::Silence);
    }

    pub fn delivered(&self) -> usize {
        self.delivered
    }

    pub fn is_exhausted(&self) -> bool {
        self.steps.is_empty()
    }
}

impl Stream for MemoryLineSource {
    type Item = String;
    type Error = StreamError<Infallible>;

    fn poll_next(&mut self) -> nb::Result<Self::Item, Self::Error> {
        match self.steps.pop_front() {
            Some(SourceStep::Line(line)) => {
                self.delivered += 1;
                Ok(line)
            }
            Some(SourceStep::Silence) => Err(nb::Error::WouldBlock),
            None => Err(nb::Error::Other(StreamError::EndOfStream)),
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self
            .steps
            .iter()
            .filter(|s| matches!(s, SourceStep::Line(_)))
            .count();
        (remaining, Some(remaining))
    }
}
