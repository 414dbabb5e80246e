//! `telewatch` command-line tool
//!
//! - `telewatch ingest` reads a device link into the raw archive, the
//!   structured store and the error log until the link closes or the
//!   process receives Ctrl+C / SIGTERM
//! - `telewatch detect` replays the store, prints the console report and
//!   writes the JSON incident report
//! - `telewatch emulate` plays the device side for testing

mod settings;

use std::io::{self, BufReader, Write};
use std::net::TcpListener;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use telewatch_connectors::emulator::{self, Emulator, RandomScript, ScriptStep};
use telewatch_connectors::TcpLineSource;
use telewatch_core::store::{CsvReadingStore, CsvReplay, ErrorLogFile, RawLogFile};
use telewatch_core::stream::{FileLineSource, StreamError, ThreadedLineSource};
use telewatch_core::time::parse_timestamp;
use telewatch_core::{
    report, DetectionEngine, IngestOutcome, IngestionLoop, Reading, ReadingSink, SinkError,
    StopHandle, Stream, SystemTime,
};

use settings::Settings;

type LineSource = Box<dyn Stream<Item = String, Error = StreamError<io::Error>> + Send>;

#[derive(Parser)]
#[command(
    name = "telewatch",
    about = "Device telemetry ingestion and reliability anomaly detection"
)]
#[command(version)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, global = true, env = "TELEWATCH_CONFIG")]
    config: Option<PathBuf>,

    #[command(flatten)]
    storage: StorageArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Overrides for the `[storage]` section
#[derive(Args)]
struct StorageArgs {
    /// Raw audit archive
    #[arg(long, global = true)]
    raw_log: Option<PathBuf>,

    /// Structured reading store (CSV)
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// Parse error log
    #[arg(long, global = true)]
    error_log: Option<PathBuf>,

    /// JSON incident report
    #[arg(long, global = true)]
    report: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest telemetry lines until the source closes or a stop signal arrives
    Ingest(SourceArgs),

    /// Run the detection rules over the stored readings
    Detect {
        /// Also report silence between the last reading and the current time
        #[arg(long, conflicts_with = "at")]
        now: bool,

        /// Also report silence between the last reading and this RFC 3339 instant
        #[arg(long)]
        at: Option<String>,

        /// Report one anomaly per fault episode instead of per reading
        #[arg(long)]
        coalesce: bool,

        /// Skip the console report
        #[arg(short, long)]
        quiet: bool,
    },

    /// Emulate a device sending telemetry
    Emulate {
        /// Random stream instead of the forced failure sequence
        #[arg(long)]
        random: bool,

        /// Seed for the random stream
        #[arg(long, requires = "random")]
        seed: Option<u64>,

        /// Stop after this many lines
        #[arg(long)]
        count: Option<usize>,

        /// Milliseconds between lines
        #[arg(long, default_value_t = 1000)]
        interval_ms: u64,

        /// Listen on this address and serve the first client instead of writing to stdout
        #[arg(long, conflicts_with = "serial")]
        listen: Option<String>,

        /// Write to this serial port instead of stdout
        #[arg(long)]
        serial: Option<String>,
    },
}

/// Where `ingest` reads from; stdin when none is given
#[derive(Args)]
struct SourceArgs {
    /// Replay or follow a file
    #[arg(long, conflicts_with_all = ["tcp", "serial"])]
    file: Option<PathBuf>,

    /// Connect to a TCP endpoint (host:port)
    #[arg(long, conflicts_with = "serial")]
    tcp: Option<String>,

    /// Read from a serial port
    #[arg(long)]
    serial: Option<String>,

    /// With --file, keep waiting for appended lines
    #[arg(long)]
    follow: bool,

    /// Serial baud rate (overrides [source].baud_rate)
    #[arg(long)]
    baud: Option<u32>,
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut settings = Settings::load(cli.config.as_deref())?;
    apply_storage_overrides(&mut settings, cli.storage);

    match cli.command {
        Commands::Ingest(source) => ingest(settings, source).await,
        Commands::Detect {
            now,
            at,
            coalesce,
            quiet,
        } => detect(settings, now, at, coalesce, quiet),
        Commands::Emulate {
            random,
            seed,
            count,
            interval_ms,
            listen,
            serial,
        } => {
            let emulator = Emulator::new().with_interval(Duration::from_millis(interval_ms));
            let emulator = match count {
                Some(count) => emulator.with_limit(count),
                None => emulator,
            };
            let script: Box<dyn Iterator<Item = ScriptStep> + Send> = match (random, seed) {
                (true, Some(seed)) => Box::new(RandomScript::seeded(seed)),
                (true, None) => Box::new(RandomScript::from_entropy()),
                (false, _) => Box::new(emulator::forced_failure_script().into_iter()),
            };
            emulate(settings, emulator, script, listen, serial).await
        }
    }
}

fn apply_storage_overrides(settings: &mut Settings, args: StorageArgs) {
    let storage = &mut settings.storage;
    if let Some(path) = args.raw_log {
        storage.raw_log = path;
    }
    if let Some(path) = args.store {
        storage.store = path;
    }
    if let Some(path) = args.error_log {
        storage.error_log = path;
    }
    if let Some(path) = args.report {
        storage.report = path;
    }
}

fn open_source(settings: &Settings, args: &SourceArgs) -> anyhow::Result<LineSource> {
    let timeout = settings.source.read_timeout();

    if args.follow && args.file.is_none() {
        bail!("--follow only applies to --file");
    }

    if let Some(path) = &args.file {
        let source = FileLineSource::open(path)
            .with_context(|| format!("opening {}", path.display()))?
            .with_follow(args.follow);
        log::info!("reading {}", path.display());
        return Ok(Box::new(source));
    }

    if let Some(addr) = &args.tcp {
        let source = TcpLineSource::connect(addr.as_str(), timeout)
            .with_context(|| format!("connecting to {addr}"))?;
        return Ok(Box::new(source));
    }

    if let Some(port) = &args.serial {
        return open_serial(port, args.baud.unwrap_or(settings.source.baud_rate), timeout);
    }

    log::info!("reading stdin");
    let source = ThreadedLineSource::spawn("stdin-reader", BufReader::new(io::stdin()))
        .context("starting stdin reader")?;
    Ok(Box::new(source))
}

#[cfg(feature = "serial")]
fn open_serial(port: &str, baud: u32, timeout: Duration) -> anyhow::Result<LineSource> {
    let source = telewatch_connectors::SerialLineSource::open(port, baud, timeout)
        .with_context(|| format!("opening serial port {port}"))?;
    Ok(Box::new(source))
}

#[cfg(not(feature = "serial"))]
fn open_serial(port: &str, _baud: u32, _timeout: Duration) -> anyhow::Result<LineSource> {
    bail!("cannot open {port}: built without the `serial` feature")
}

async fn ingest(settings: Settings, args: SourceArgs) -> anyhow::Result<()> {
    let source = open_source(&settings, &args)?;
    let storage = &settings.storage;

    let raw = RawLogFile::open(&storage.raw_log)
        .with_context(|| format!("opening raw archive {}", storage.raw_log.display()))?
        .with_sync(storage.sync);
    let store = CsvReadingStore::open(&storage.store)
        .with_context(|| format!("opening store {}", storage.store.display()))?
        .with_sync(storage.sync);
    let store = EchoStore::new(store, io::stdout());
    let errors = ErrorLogFile::open(&storage.error_log)
        .with_context(|| format!("opening error log {}", storage.error_log.display()))?;

    let stop = StopHandle::new();
    let mut ingest = IngestionLoop::new(source, raw, store, errors, SystemTime)
        .with_stop_handle(stop.clone())
        .with_idle_backoff(settings.source.idle_backoff());

    tokio::spawn(stop_on_signal(stop));

    let summary = tokio::task::spawn_blocking(move || ingest.run())
        .await
        .context("ingestion task panicked")??;

    let stats = &summary.stats;
    match summary.outcome {
        IngestOutcome::SourceExhausted => log::info!("source closed"),
        IngestOutcome::StopRequested => log::info!("stopped by signal"),
    }
    println!(
        "lines received: {}, readings stored: {}, parse errors: {}",
        stats.lines_received, stats.readings_stored, stats.parse_errors
    );
    Ok(())
}

/// Reading store that echoes each committed reading as a progress line
struct EchoStore<W, O> {
    inner: W,
    out: O,
}

impl<W: ReadingSink, O: Write> EchoStore<W, O> {
    fn new(inner: W, out: O) -> Self {
        Self { inner, out }
    }
}

impl<W: ReadingSink, O: Write> ReadingSink for EchoStore<W, O> {
    fn append(&mut self, reading: &Reading) -> Result<(), SinkError> {
        self.inner.append(reading)?;
        // Progress output is best effort; the record is already committed
        if let Err(e) = writeln!(self.out, "Logged: {reading}").and_then(|()| self.out.flush()) {
            log::warn!("cannot write progress: {e}");
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        self.inner.flush()
    }
}

/// Raise `stop` on Ctrl+C / SIGTERM
///
/// Every source polls without blocking, so the loop sees the flag within
/// one idle back-off (or one read timeout) and returns through its flush.
async fn stop_on_signal(stop: StopHandle) {
    match shutdown_signal().await {
        Ok(()) => {
            log::info!("shutdown requested, finishing current line");
            stop.request_stop();
        }
        Err(e) => log::error!("cannot install signal handler: {e}"),
    }
}

#[cfg(unix)]
async fn shutdown_signal() -> io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result,
        _ = terminate.recv() => Ok(()),
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() -> io::Result<()> {
    tokio::signal::ctrl_c().await
}

fn detect(
    mut settings: Settings,
    now: bool,
    at: Option<String>,
    coalesce: bool,
    quiet: bool,
) -> anyhow::Result<()> {
    if coalesce {
        settings.detection.coalesce_episodes = true;
    }
    let reference = match (now, at) {
        (true, _) => Some(chrono::Utc::now()),
        (false, Some(raw)) => {
            Some(parse_timestamp(&raw).with_context(|| format!("invalid --at instant '{raw}'"))?)
        }
        (false, None) => None,
    };

    let engine = DetectionEngine::new(settings.detection)?;
    let store = CsvReplay::new(&settings.storage.store);
    let anomalies = engine
        .run_source(&store, reference)
        .with_context(|| format!("reading store {}", settings.storage.store.display()))?;

    if !quiet {
        print!("{}", report::render_console(&anomalies));
    }

    let report_path = &settings.storage.report;
    if report::write_to(report_path, &anomalies)
        .with_context(|| format!("writing report {}", report_path.display()))?
    {
        println!("report written to {}", report_path.display());
    }
    Ok(())
}

async fn emulate(
    settings: Settings,
    emulator: Emulator,
    script: Box<dyn Iterator<Item = ScriptStep> + Send>,
    listen: Option<String>,
    serial: Option<String>,
) -> anyhow::Result<()> {
    let stop = StopHandle::new();
    let emulator = emulator.with_stop_handle(stop.clone());
    tokio::spawn(stop_on_signal(stop));

    let stats = tokio::task::spawn_blocking(move || -> anyhow::Result<_> {
        if let Some(addr) = listen {
            let listener = TcpListener::bind(&addr).with_context(|| format!("binding {addr}"))?;
            log::info!("waiting for a client on {addr}");
            let (mut socket, peer) = listener.accept()?;
            log::info!("client {peer} connected");
            Ok(emulator.run(&mut socket, script)?)
        } else if let Some(port) = serial {
            emulate_serial(&emulator, &port, settings.source.baud_rate, script)
        } else {
            let stdout = io::stdout();
            let mut out = stdout.lock();
            Ok(emulator.run(&mut out, script)?)
        }
    })
    .await
    .context("emulator task panicked")??;

    log::info!("emulator sent {} lines", stats.lines_sent);
    Ok(())
}

#[cfg(feature = "serial")]
fn emulate_serial(
    emulator: &Emulator,
    port: &str,
    baud: u32,
    script: Box<dyn Iterator<Item = ScriptStep> + Send>,
) -> anyhow::Result<emulator::EmulatorStats> {
    let mut out = telewatch_connectors::serial::open_writer(port, baud)
        .with_context(|| format!("opening serial port {port}"))?;
    Ok(emulator.run(&mut out, script)?)
}

#[cfg(not(feature = "serial"))]
fn emulate_serial(
    _emulator: &Emulator,
    port: &str,
    _baud: u32,
    _script: Box<dyn Iterator<Item = ScriptStep> + Send>,
) -> anyhow::Result<emulator::EmulatorStats> {
    bail!("cannot open {port}: built without the `serial` feature")
}
