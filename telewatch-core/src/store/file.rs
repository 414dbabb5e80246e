//! Flat-file sinks
//!
//! Three append-only text files, one per concern:
//!
//! | File | Row format |
//! |------|------------|
//! | raw archive | `<arrival> \| <raw line>` |
//! | structured store (CSV) | `timestamp,temperature,voltage,status_code` |
//! | error log | `<arrival> \| PARSE_ERROR \| <reason> \| <raw line>` |
//!
//! ## Commit Model
//!
//! Every record is formatted completely, written with a single buffered
//! write and flushed before `append` returns. A reader that races a writer
//! can only ever see a trailing row without its `\n`, and replay ignores
//! such a row. Previously committed rows are never rewritten. Reopening a
//! file whose last row was cut off terminates that row, so the fragment
//! stays a row of its own and the next record starts on a fresh line.
//!
//! With `with_sync(true)` each record is also `fsync`ed.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::errors::SinkError;
use crate::parser::ParseError;
use crate::reading::Reading;
use crate::store::memory::RawRecord;
use crate::time::{self, Timestamp};
use crate::traits::{ErrorChannel, RawArchive, ReadingSink, ReadingSource};

/// Header row of the structured store
pub const CSV_HEADER: &str = "timestamp,temperature,voltage,status_code";

const FIELD_SEPARATOR: &str = " | ";

/// Append-only text file shared by the three sinks
#[derive(Debug)]
struct AppendFile {
    path: PathBuf,
    writer: BufWriter<File>,
    sync: bool,
}

impl AppendFile {
    /// Open for appending, terminating a partial trailing row first
    fn open(path: &Path) -> io::Result<Self> {
        let mut file = OpenOptions::new().create(true).read(true).append(true).open(path)?;
        if ends_mid_row(&mut file)? {
            log::warn!("{}: terminating partial trailing row", path.display());
            file.write_all(b"\n")?;
        }
        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
            sync: false,
        })
    }

    fn is_empty(&self) -> io::Result<bool> {
        Ok(self.writer.get_ref().metadata()?.len() == 0)
    }

    fn commit(&mut self, record: &str) -> Result<(), SinkError> {
        self.writer.write_all(record.as_bytes())?;
        self.flush()
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        self.writer.flush()?;
        if self.sync {
            self.writer.get_ref().sync_data()?;
        }
        Ok(())
    }
}

fn ends_mid_row(file: &mut File) -> io::Result<bool> {
    if file.metadata()?.len() == 0 {
        return Ok(false);
    }
    let mut last = [0u8; 1];
    file.seek(SeekFrom::End(-1))?;
    file.read_exact(&mut last)?;
    Ok(last[0] != b'\n')
}

/// Committed rows of a file: complete lines only
///
/// A missing file reads as empty.
fn committed_lines(path: &Path) -> Result<Vec<String>, SinkError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let text = String::from_utf8_lossy(&bytes);
    Ok(text
        .split_inclusive('\n')
        .filter_map(|row| row.strip_suffix('\n'))
        .map(|row| row.strip_suffix('\r').unwrap_or(row).to_string())
        .collect())
}

/// Raw audit archive backed by a text file
#[derive(Debug)]
pub struct RawLogFile {
    file: AppendFile,
}

impl RawLogFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SinkError> {
        Ok(Self {
            file: AppendFile::open(path.as_ref())?,
        })
    }

    pub fn with_sync(mut self, sync: bool) -> Self {
        self.file.sync = sync;
        self
    }

    pub fn path(&self) -> &Path {
        &self.file.path
    }

    /// Forensic replay of an archive file
    ///
    /// Rows without the `<arrival> | ` prefix are skipped with a warning.
    pub fn read_all(path: impl AsRef<Path>) -> Result<Vec<RawRecord>, SinkError> {
        let path = path.as_ref();
        let mut records = Vec::new();
        for (index, row) in committed_lines(path)?.into_iter().enumerate() {
            let parsed = row.split_once(FIELD_SEPARATOR).and_then(|(ts, line)| {
                time::parse_timestamp(ts).map(|arrival| RawRecord {
                    arrival,
                    line: line.to_string(),
                })
            });
            match parsed {
                Some(record) => records.push(record),
                None => log::warn!(
                    "{}: skipping undecodable archive row {}",
                    path.display(),
                    index + 1
                ),
            }
        }
        Ok(records)
    }
}

impl RawArchive for RawLogFile {
    fn append(&mut self, raw_line: &str, arrival: Timestamp) -> Result<(), SinkError> {
        let record = format!(
            "{}{}{}\n",
            time::format_timestamp(&arrival),
            FIELD_SEPARATOR,
            raw_line
        );
        self.file.commit(&record)
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        self.file.flush()
    }
}

/// Structured reading store backed by a CSV file
#[derive(Debug)]
pub struct CsvReadingStore {
    file: AppendFile,
}

impl CsvReadingStore {
    /// Open for appending, writing the header if the file is new or empty
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SinkError> {
        let mut file = AppendFile::open(path.as_ref())?;
        if file.is_empty()? {
            file.commit(&format!("{CSV_HEADER}\n"))?;
        }
        Ok(Self { file })
    }

    pub fn with_sync(mut self, sync: bool) -> Self {
        self.file.sync = sync;
        self
    }

    pub fn path(&self) -> &Path {
        &self.file.path
    }
}

impl ReadingSink for CsvReadingStore {
    fn append(&mut self, reading: &Reading) -> Result<(), SinkError> {
        self.file.commit(&encode_row(reading))
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        self.file.flush()
    }
}

impl ReadingSource for CsvReadingStore {
    fn read_all(&self) -> Result<Vec<Reading>, SinkError> {
        CsvReplay::new(&self.file.path).read_all()
    }
}

/// Read-only view of a CSV store, safe to use while ingestion appends
#[derive(Debug, Clone)]
pub struct CsvReplay {
    path: PathBuf,
}

impl CsvReplay {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl ReadingSource for CsvReplay {
    fn read_all(&self) -> Result<Vec<Reading>, SinkError> {
        let mut readings = Vec::new();
        for (index, row) in committed_lines(&self.path)?.into_iter().enumerate() {
            if index == 0 && row == CSV_HEADER {
                continue;
            }
            match decode_row(&row) {
                Some(reading) => readings.push(reading),
                None => log::warn!(
                    "{}: skipping undecodable row {}: {:?}",
                    self.path.display(),
                    index + 1,
                    row
                ),
            }
        }
        Ok(readings)
    }
}

fn encode_row(reading: &Reading) -> String {
    format!(
        "{},{},{},{}\n",
        time::format_timestamp(&reading.timestamp),
        reading.temperature,
        reading.voltage,
        reading.status
    )
}

fn decode_row(row: &str) -> Option<Reading> {
    let mut fields = row.split(',');
    let timestamp = time::parse_timestamp(fields.next()?)?;
    let temperature = fields.next()?.trim().parse::<f64>().ok().filter(|v| v.is_finite())?;
    let voltage = fields.next()?.trim().parse::<f64>().ok().filter(|v| v.is_finite())?;
    let status = fields.next()?.trim().parse().ok()?;
    if fields.next().is_some() {
        return None;
    }
    Some(Reading::new(timestamp, temperature, voltage, status))
}

/// Error channel backed by a text file
#[derive(Debug)]
pub struct ErrorLogFile {
    file: AppendFile,
}

impl ErrorLogFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SinkError> {
        Ok(Self {
            file: AppendFile::open(path.as_ref())?,
        })
    }

    pub fn path(&self) -> &Path {
        &self.file.path
    }
}

impl ErrorChannel for ErrorLogFile {
    fn append(&mut self, error: &ParseError) -> Result<(), SinkError> {
        let record = format!(
            "{ts}{sep}PARSE_ERROR{sep}{reason}{sep}{line}\n",
            ts = time::format_timestamp(&error.arrival),
            sep = FIELD_SEPARATOR,
            reason = error.reason,
            line = error.raw_line,
        );
        self.file.commit(&record)
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        self.file.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_line;
    use chrono::{Duration, TimeZone, Utc};
    use tempfile::tempdir;

    fn at(secs: i64) -> Timestamp {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap() + Duration::seconds(secs)
    }

    #[test]
    fn csv_round_trip_with_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("metrics.csv");

        {
            let mut store = CsvReadingStore::open(&path).unwrap();
            store.append(&parse_line("T:48.13,V:5.04,S:NORMAL", at(0)).unwrap()).unwrap();
            store.append(&parse_line("T:-3.50,V:4.90,S:WARNING_TEMP", at(1)).unwrap()).unwrap();
        }
        // Reopening must not add a second header
        let store = CsvReadingStore::open(&path).unwrap();
        let readings = store.read_all().unwrap();

        assert_eq!(readings.len(), 2);
        assert_eq!(readings[0].temperature, 48.13);
        assert_eq!(readings[1].status.to_string(), "WARNING_TEMP");
        assert_eq!(readings[1].timestamp, at(1));

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text.matches(CSV_HEADER).count(), 1);
    }

    #[test]
    fn replay_ignores_partial_trailing_row() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("metrics.csv");
        {
            let mut store = CsvReadingStore::open(&path).unwrap();
            store.append(&parse_line("T:20.00,V:5.00,S:NORMAL", at(0)).unwrap()).unwrap();
        }
        // Simulate a writer caught mid-row
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        write!(file, "{},21.0,5.0,NOR", time::format_timestamp(&at(1))).unwrap();

        let readings = CsvReplay::new(&path).read_all().unwrap();
        assert_eq!(readings.len(), 1);
    }

    #[test]
    fn reopen_after_partial_row_keeps_new_records_whole() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("metrics.csv");
        {
            let mut store = CsvReadingStore::open(&path).unwrap();
            store.append(&parse_line("T:20.00,V:5.00,S:NORMAL", at(0)).unwrap()).unwrap();
        }
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        write!(file, "{},21.0,5.0,NOR", time::format_timestamp(&at(1))).unwrap();
        drop(file);

        {
            let mut store = CsvReadingStore::open(&path).unwrap();
            store.append(&parse_line("T:22.00,V:5.00,S:NORMAL", at(2)).unwrap()).unwrap();
        }

        let readings = CsvReplay::new(&path).read_all().unwrap();
        let temperatures: Vec<f64> = readings.iter().map(|r| r.temperature).collect();
        assert_eq!(temperatures, vec![20.0, 22.0]);
        assert_eq!(readings[1].timestamp, at(2));
    }

    #[test]
    fn raw_archive_reopen_after_partial_row() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("raw.log");
        {
            let mut archive = RawLogFile::open(&path).unwrap();
            archive.append("T:1,V:5,S:NORMAL", at(0)).unwrap();
        }
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        write!(file, "2024-05-01T12:0").unwrap();
        drop(file);

        {
            let mut archive = RawLogFile::open(&path).unwrap();
            archive.append("T:2,V:5,S:NORMAL", at(2)).unwrap();
        }

        let records = RawLogFile::read_all(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].line, "T:2,V:5,S:NORMAL");
        assert_eq!(records[1].arrival, at(2));

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("2024-05-01T12:0\n"));
    }

    #[test]
    fn replay_skips_corrupt_rows() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("metrics.csv");
        fs::write(
            &path,
            format!(
                "{CSV_HEADER}\nnot,a,row\n{},20,5,NORMAL\n{},x,5,NORMAL\n",
                time::format_timestamp(&at(0)),
                time::format_timestamp(&at(1)),
            ),
        )
        .unwrap();

        let readings = CsvReplay::new(&path).read_all().unwrap();
        assert_eq!(readings.len(), 1);
        assert_eq!(readings[0].temperature, 20.0);
    }

    #[test]
    fn missing_store_is_empty() {
        let dir = tempdir().unwrap();
        let readings = CsvReplay::new(dir.path().join("absent.csv")).read_all().unwrap();
        assert!(readings.is_empty());
    }

    #[test]
    fn raw_archive_keeps_lines_verbatim() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("raw.log");
        {
            let mut archive = RawLogFile::open(&path).unwrap();
            archive.append("T:1,V:2,S:NORMAL", at(0)).unwrap();
            archive.append("  garbage | with pipes  ", at(1)).unwrap();
            archive.append("", at(2)).unwrap();
        }

        let records = RawLogFile::read_all(&path).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[1].line, "  garbage | with pipes  ");
        assert_eq!(records[1].arrival, at(1));
        assert_eq!(records[2].line, "");
    }

    #[test]
    fn error_log_format() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("errors.log");
        let error = parse_line("T:hot,V:5,S:NORMAL", at(0)).unwrap_err();
        {
            let mut log = ErrorLogFile::open(&path).unwrap();
            log.append(&error).unwrap();
        }
        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(
            text,
            format!(
                "{} | PARSE_ERROR | field 'T' is not a valid number: 'hot' | T:hot,V:5,S:NORMAL\n",
                time::format_timestamp(&at(0))
            )
        );
    }
}
