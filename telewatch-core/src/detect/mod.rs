//! Batch anomaly detection
//!
//! The engine folds a [`DetectorState`] over the stored readings in order.
//! Per reading the rules run in a fixed order:
//!
//! 1. Heartbeat (its trigger instant precedes the current reading)
//! 2. Threshold
//! 3. Rate of change
//! 4. Status escalation
//!
//! and the state then remembers the reading as the previous sample.
//!
//! ## Emission Modes
//!
//! By default every violating reading produces its own anomaly. With
//! `coalesce_episodes` set, consecutive violating readings of one kind form
//! an episode and only its first reading is reported; the first reading
//! without that violation closes the episode, and a heartbeat loss closes
//! every open episode. Heartbeat losses are always reported individually.
//!
//! ## Example
//!
//! ```rust
//! use telewatch_core::{parse_line, DetectionConfig, DetectionEngine};
//! use chrono::{Duration, Utc};
//!
//! let t0 = Utc::now();
//! let readings = vec![
//!     parse_line("T:70.0,V:5.0,S:NORMAL", t0).unwrap(),
//!     parse_line("T:95.5,V:5.0,S:NORMAL", t0 + Duration::seconds(1)).unwrap(),
//! ];
//!
//! let engine = DetectionEngine::new(DetectionConfig::default())?;
//! let anomalies = engine.run(&readings);
//! assert_eq!(anomalies.len(), 2); // breach + rapid change
//! # Ok::<(), telewatch_core::ConfigError>(())
//! ```

pub mod rules;

use crate::anomaly::Anomaly;
use crate::config::DetectionConfig;
use crate::errors::{ConfigError, SinkError};
use crate::reading::Reading;
use crate::time::Timestamp;
use crate::traits::ReadingSource;

pub use rules::LastSample;

/// Accumulator threaded through the detection fold
#[derive(Debug, Clone, Default)]
pub struct DetectorState {
    last: Option<LastSample>,
    /// Bit per `AnomalyKind` with an episode currently open
    open_episodes: u8,
    readings_seen: usize,
    anomalies: Vec<Anomaly>,
}

impl DetectorState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluate one reading and fold it into the state
    pub fn step(mut self, config: &DetectionConfig, reading: &Reading) -> Self {
        if let Some(last) = &self.last {
            if let Some(loss) = rules::heartbeat(config, last, reading.timestamp) {
                self.anomalies.push(loss);
                // Silence ends every episode
                self.open_episodes = 0;
            }
        }

        let mut found = Vec::new();
        rules::thresholds(config, reading, &mut found);
        if let Some(last) = &self.last {
            rules::rates(config, last, reading, &mut found);
        }
        found.extend(rules::status(reading));

        let mut violating = 0u8;
        for anomaly in found {
            let bit = anomaly.kind.bit();
            let continues = self.open_episodes & bit != 0;
            violating |= bit;
            if config.coalesce_episodes && continues {
                log::trace!("{} continues open episode", anomaly.kind);
                continue;
            }
            self.anomalies.push(anomaly);
        }
        self.open_episodes = violating;

        self.last = Some(LastSample::from(reading));
        self.readings_seen += 1;
        self
    }

    /// Close the pass, checking trailing silence against `now` if given
    ///
    /// Output is ordered by timestamp; ties keep detection order.
    pub fn finish(mut self, config: &DetectionConfig, now: Option<Timestamp>) -> Vec<Anomaly> {
        if let (Some(last), Some(now)) = (&self.last, now) {
            if let Some(loss) = rules::heartbeat(config, last, now) {
                self.anomalies.push(loss);
            }
        }
        self.anomalies.sort_by_key(|a| a.timestamp);
        self.anomalies
    }

    pub fn readings_seen(&self) -> usize {
        self.readings_seen
    }
}

/// Rule engine configured with one threshold set
#[derive(Debug, Clone)]
pub struct DetectionEngine {
    config: DetectionConfig,
}

impl DetectionEngine {
    /// Engine with validated thresholds
    pub fn new(config: DetectionConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    /// Evaluate readings in the given order
    pub fn run<'a, I>(&self, readings: I) -> Vec<Anomaly>
    where
        I: IntoIterator<Item = &'a Reading>,
    {
        self.run_with_now(readings, None)
    }

    /// Evaluate readings, also reporting silence between the last reading
    /// and `now`
    pub fn run_with_now<'a, I>(&self, readings: I, now: Option<Timestamp>) -> Vec<Anomaly>
    where
        I: IntoIterator<Item = &'a Reading>,
    {
        let state = readings
            .into_iter()
            .fold(DetectorState::new(), |state, reading| state.step(&self.config, reading));
        let seen = state.readings_seen();
        let anomalies = state.finish(&self.config, now);
        log::info!("detected {} anomalies in {} readings", anomalies.len(), seen);
        anomalies
    }

    /// Replay a reading store and evaluate it
    pub fn run_source<S>(
        &self,
        source: &S,
        now: Option<Timestamp>,
    ) -> Result<Vec<Anomaly>, SinkError>
    where
        S: ReadingSource + ?Sized,
    {
        let readings = source.read_all()?;
        Ok(self.run_with_now(&readings, now))
    }
}
