//! Device emulator
//!
//! Plays the device side of the link so the whole pipeline can be run
//! without hardware. Two scripts are available:
//!
//! - [`forced_failure_script`]: a fixed sequence that trips every
//!   detection rule once
//! - [`RandomScript`]: an endless stream that is mostly healthy
//!
//! | Roll | Share | Temperature | Voltage | Status |
//! |------|-------|-------------|---------|--------|
//! | normal | 90 % | 40-55 °C | 4.9-5.1 V | `NORMAL` |
//! | hot | 7 % | 75-85 °C | 4.8-5.2 V | `WARNING_TEMP_HIGH` |
//! | spike | 2 % | 50-60 °C | 5.8-6.2 V | `CRITICAL_VOLTAGE_SPIKE` |
//! | offline | 1 % | - | - | 5 s of silence |

use std::io::{self, Write};
use std::thread;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use telewatch_core::StopHandle;

/// Spacing between lines of the reference firmware
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);

/// Silence long enough to trip the default heartbeat timeout
pub const OFFLINE_PAUSE: Duration = Duration::from_secs(5);

/// One line the emulated device sends
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub temperature: f64,
    pub voltage: f64,
    pub status: &'static str,
}

impl Sample {
    pub const fn new(temperature: f64, voltage: f64, status: &'static str) -> Self {
        Self {
            temperature,
            voltage,
            status,
        }
    }

    /// Wire form, without the terminator
    pub fn to_line(&self) -> String {
        format!("T:{:.2},V:{:.2},S:{}", self.temperature, self.voltage, self.status)
    }
}

/// What the emulator does next
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptStep {
    /// Send a line, then wait one interval
    Send(Sample),
    /// Send nothing for a while
    Pause(Duration),
}

/// Normal, normal, temperature breach, voltage spike, rapid drop, offline,
/// recovery
pub fn forced_failure_script() -> Vec<ScriptStep> {
    vec![
        ScriptStep::Send(Sample::new(50.0, 5.0, "NORMAL")),
        ScriptStep::Send(Sample::new(52.0, 5.1, "NORMAL")),
        ScriptStep::Send(Sample::new(95.5, 5.0, "CRITICAL_TEMP_HIGH")),
        ScriptStep::Send(Sample::new(60.0, 6.1, "CRITICAL_VOLTAGE_SPIKE")),
        ScriptStep::Send(Sample::new(25.0, 5.0, "WARNING_ROC_DROP")),
        ScriptStep::Pause(OFFLINE_PAUSE),
        ScriptStep::Send(Sample::new(55.0, 5.0, "NORMAL_RECONNECTED")),
    ]
}

/// Endless randomized device behaviour
pub struct RandomScript<R> {
    rng: R,
}

impl RandomScript<StdRng> {
    /// Reproducible stream
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }
}

impl<R: Rng> RandomScript<R> {
    pub fn with_rng(rng: R) -> Self {
        Self { rng }
    }
}

impl<R: Rng> Iterator for RandomScript<R> {
    type Item = ScriptStep;

    fn next(&mut self) -> Option<ScriptStep> {
        let roll: f64 = self.rng.gen();
        let rng = &mut self.rng;
        let step = if roll < 0.90 {
            ScriptStep::Send(Sample::new(
                rng.gen_range(40.0..55.0),
                rng.gen_range(4.9..5.1),
                "NORMAL",
            ))
        } else if roll < 0.97 {
            ScriptStep::Send(Sample::new(
                rng.gen_range(75.0..85.0),
                rng.gen_range(4.8..5.2),
                "WARNING_TEMP_HIGH",
            ))
        } else if roll < 0.99 {
            ScriptStep::Send(Sample::new(
                rng.gen_range(50.0..60.0),
                rng.gen_range(5.8..6.2),
                "CRITICAL_VOLTAGE_SPIKE",
            ))
        } else {
            ScriptStep::Pause(OFFLINE_PAUSE)
        };
        Some(step)
    }
}

/// Counters for one emulator run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EmulatorStats {
    pub lines_sent: usize,
    pub pauses: usize,
}

/// Writes a script to any byte sink
pub struct Emulator {
    interval: Duration,
    /// Sleep for real; off in tests
    realtime: bool,
    limit: Option<usize>,
    stop: StopHandle,
}

impl Default for Emulator {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            realtime: true,
            limit: None,
            stop: StopHandle::new(),
        }
    }
}

impl Emulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Skip all sleeping; lines are written back to back
    pub fn with_realtime(mut self, realtime: bool) -> Self {
        self.realtime = realtime;
        self
    }

    /// Stop after this many lines
    pub fn with_limit(mut self, lines: usize) -> Self {
        self.limit = Some(lines);
        self
    }

    pub fn with_stop_handle(mut self, stop: StopHandle) -> Self {
        self.stop = stop;
        self
    }

    /// Play `script` into `out` until it ends, the limit is reached or a
    /// stop is requested
    pub fn run<W, I>(&self, out: &mut W, script: I) -> io::Result<EmulatorStats>
    where
        W: Write + ?Sized,
        I: IntoIterator<Item = ScriptStep>,
    {
        let mut stats = EmulatorStats::default();

        for step in script {
            if self.stop.is_stop_requested() || self.limit.is_some_and(|l| stats.lines_sent >= l) {
                break;
            }
            match step {
                ScriptStep::Send(sample) => {
                    let line = sample.to_line();
                    out.write_all(line.as_bytes())?;
                    out.write_all(b"\n")?;
                    out.flush()?;
                    stats.lines_sent += 1;
                    log::info!("sent {line}");
                    self.sleep(self.interval);
                }
                ScriptStep::Pause(duration) => {
                    stats.pauses += 1;
                    log::info!("simulating device offline for {:.1}s", duration.as_secs_f64());
                    self.sleep(duration);
                }
            }
        }
        Ok(stats)
    }

    fn sleep(&self, duration: Duration) {
        if self.realtime && !duration.is_zero() {
            thread::sleep(duration);
        }
    }
}
