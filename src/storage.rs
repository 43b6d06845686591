use crate::engine::TestResult;
use crate::util::{mean, std_dev};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("results file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write result: {0}")]
    Csv(#[from] csv::Error),
}

/// Append-only history of finished tests
pub trait ResultStore {
    fn append(&self, result: &TestResult) -> Result<(), StorageError>;
    /// All stored results, oldest first. A store that was never written to is empty.
    fn load_all(&self) -> Result<Vec<TestResult>, StorageError>;
}

/// One CSV row. Floats are written with two decimals.
///
/// Elapsed time is written as seconds. Logs from older releases carry a
/// duration string like `1m0.25s` in that column, which is still read.
#[derive(Debug, Serialize, Deserialize)]
struct ResultRecord {
    timestamp: DateTime<chrono::FixedOffset>,
    #[serde(serialize_with = "two_decimals")]
    wpm: f64,
    #[serde(serialize_with = "two_decimals")]
    accuracy: f64,
    #[serde(serialize_with = "elapsed_two_decimals")]
    elapsed: String,
    total_words: usize,
    errors: usize,
    total_chars: usize,
}

fn two_decimals<S: serde::Serializer>(value: &f64, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&format!("{:.2}", value))
}

fn elapsed_two_decimals<S: serde::Serializer>(value: &str, s: S) -> Result<S::Ok, S::Error> {
    match value.parse::<f64>() {
        Ok(secs) => two_decimals(&secs, s),
        Err(_) => s.serialize_str(value),
    }
}

/// Reads the elapsed column: plain seconds (`60.25`) or a unit-suffixed
/// duration (`1m0.25s`, `850ms`, `1h2m`). Out of range values are rejected.
fn parse_elapsed(field: &str) -> Option<Duration> {
    let field = field.trim();
    if let Ok(secs) = field.parse::<f64>() {
        return Duration::try_from_secs_f64(secs).ok();
    }
    if field.is_empty() {
        return None;
    }

    let mut total = 0.0_f64;
    let mut rest = field;
    while !rest.is_empty() {
        let num_end = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        let value: f64 = rest[..num_end].parse().ok()?;
        rest = &rest[num_end..];

        let unit_end = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let scale = match &rest[..unit_end] {
            "h" => 3600.0,
            "m" => 60.0,
            "s" => 1.0,
            "ms" => 1e-3,
            "us" | "µs" => 1e-6,
            "ns" => 1e-9,
            _ => return None,
        };
        rest = &rest[unit_end..];
        total += value * scale;
    }

    Duration::try_from_secs_f64(total).ok()
}

impl From<&TestResult> for ResultRecord {
    fn from(r: &TestResult) -> Self {
        Self {
            timestamp: r.timestamp.into(),
            wpm: r.wpm,
            accuracy: r.accuracy,
            elapsed: r.elapsed.as_secs_f64().to_string(),
            total_words: r.total_words,
            errors: r.errors,
            total_chars: r.total_chars,
        }
    }
}

impl ResultRecord {
    fn into_result(self) -> Option<TestResult> {
        let elapsed = parse_elapsed(&self.elapsed)?;
        Some(TestResult {
            timestamp: self.timestamp.with_timezone(&Local),
            wpm: self.wpm,
            accuracy: self.accuracy,
            elapsed,
            total_words: self.total_words,
            errors: self.errors,
            total_chars: self.total_chars,
        })
    }
}

#[derive(Debug, Clone)]
pub struct CsvResultStore {
    path: PathBuf,
}

impl CsvResultStore {
    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: io::Error) -> StorageError {
        StorageError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl ResultStore for CsvResultStore {
    fn append(&self, result: &TestResult) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }

        let file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)
            .map_err(|e| self.io_error(e))?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        writer.serialize(ResultRecord::from(result))?;
        writer.flush().map_err(|e| self.io_error(e))?;

        log::info!(
            "saved result to {}: {:.2} wpm, {:.2}% acc",
            self.path.display(),
            result.wpm,
            result.accuracy
        );
        Ok(())
    }

    fn load_all(&self) -> Result<Vec<TestResult>, StorageError> {
        let file = match fs::File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(self.io_error(e)),
        };

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(file);

        let mut results = Vec::new();
        for (line, record) in reader.deserialize::<ResultRecord>().enumerate() {
            match record.ok().and_then(ResultRecord::into_result) {
                Some(result) => results.push(result),
                None => log::warn!(
                    "skipping malformed result on line {} of {}",
                    line + 1,
                    self.path.display()
                ),
            }
        }

        Ok(results)
    }
}

/// Aggregates shown on the history screen
#[derive(Debug, Clone, PartialEq)]
pub struct HistorySummary {
    pub total_tests: usize,
    pub average_wpm: f64,
    pub best_wpm: f64,
    pub average_accuracy: f64,
    pub wpm_std_dev: f64,
}

impl HistorySummary {
    pub fn from_results(results: &[TestResult]) -> Option<Self> {
        let wpms: Vec<f64> = results.iter().map(|r| r.wpm).collect();
        let accuracies: Vec<f64> = results.iter().map(|r| r.accuracy).collect();

        Some(Self {
            total_tests: results.len(),
            average_wpm: mean(&wpms)?,
            best_wpm: wpms.iter().copied().fold(0.0, f64::max),
            average_accuracy: mean(&accuracies)?,
            wpm_std_dev: std_dev(&wpms)?,
        })
    }
}

/// The last `n` results, oldest first
pub fn recent(results: &[TestResult], n: usize) -> &[TestResult] {
    &results[results.len().saturating_sub(n)..]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    fn result(wpm: f64, accuracy: f64) -> TestResult {
        TestResult {
            timestamp: Local::now(),
            wpm,
            accuracy,
            elapsed: Duration::from_millis(60_250),
            total_words: 42,
            errors: 3,
            total_chars: 230,
        }
    }

    #[test]
    fn missing_file_is_empty_history() {
        let dir = tempdir().unwrap();
        let store = CsvResultStore::with_path(dir.path().join("stats.csv"));

        assert!(store.load_all().unwrap().is_empty());
    }

    #[test]
    fn append_creates_parent_dirs_and_keeps_order() {
        let dir = tempdir().unwrap();
        let store = CsvResultStore::with_path(dir.path().join("nested").join("stats.csv"));

        store.append(&result(40.0, 90.0)).unwrap();
        store.append(&result(55.5, 97.25)).unwrap();

        let loaded = store.load_all().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].wpm, 40.0);
        assert_eq!(loaded[1].wpm, 55.5);
        assert_eq!(loaded[1].accuracy, 97.25);
        assert_eq!(loaded[1].total_words, 42);
        assert_eq!(loaded[1].errors, 3);
        assert_eq!(loaded[1].total_chars, 230);
        assert_eq!(loaded[1].elapsed, Duration::from_millis(60_250));
    }

    #[test]
    fn floats_are_written_with_two_decimals() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stats.csv");
        let store = CsvResultStore::with_path(&path);

        store.append(&result(41.666666, 88.8888)).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        let fields: Vec<&str> = contents.trim_end().split(',').collect();
        assert_eq!(fields.len(), 7);
        assert_eq!(&fields[1..], &["41.67", "88.89", "60.25", "42", "3", "230"]);
    }

    #[test]
    fn malformed_rows_are_skipped() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stats.csv");
        let store = CsvResultStore::with_path(&path);
        store.append(&result(30.0, 80.0)).unwrap();

        {
            let mut file = OpenOptions::new().append(true).open(&path).unwrap();
            writeln!(file, "not a date,1,2,3,4,5,6").unwrap();
            writeln!(file, "2024-01-01T10:00:00+00:00,fast,2,3,4,5,6").unwrap();
            writeln!(file, "2024-01-01T10:00:00+00:00,1,2").unwrap();
            writeln!(file, "2024-01-01T10:00:00+00:00,12.50,99.00,30.00,10,0,60").unwrap();
        }

        let loaded = store.load_all().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].wpm, 30.0);
        assert_eq!(loaded[1].wpm, 12.5);
        assert_eq!(loaded[1].total_chars, 60);
    }

    #[test]
    fn out_of_range_elapsed_is_skipped() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stats.csv");
        let store = CsvResultStore::with_path(&path);

        {
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .unwrap();
            writeln!(file, "2024-01-01T10:00:00+00:00,12.50,99.00,1e20,10,0,60").unwrap();
            writeln!(file, "2024-01-01T10:00:00+00:00,12.50,99.00,-3,10,0,60").unwrap();
            writeln!(file, "2024-01-01T10:00:00+00:00,12.50,99.00,NaN,10,0,60").unwrap();
            writeln!(file, "2024-01-01T10:00:00+00:00,12.50,99.00,9e20h,10,0,60").unwrap();
            writeln!(file, "2024-01-01T10:01:00+00:00,20.00,95.00,30.00,10,1,100").unwrap();
        }

        let loaded = store.load_all().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].wpm, 20.0);
        assert_eq!(loaded[0].elapsed, Duration::from_secs(30));
    }

    #[test]
    fn duration_strings_from_older_logs_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stats.csv");
        fs::write(
            &path,
            "2024-01-01T10:00:00Z,41.00,97.50,1m0.25s,40,2,205\n\
             2024-01-02T10:00:00+02:00,30.00,90.00,45.5s,20,4,120\n\
             2024-01-03T10:00:00+02:00,30.00,90.00,1h2m,20,4,120\n\
             2024-01-04T10:00:00+02:00,30.00,90.00,10 fortnights,20,4,120\n",
        )
        .unwrap();

        let loaded = CsvResultStore::with_path(&path).load_all().unwrap();
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded[0].elapsed, Duration::from_millis(60_250));
        assert_eq!(loaded[0].total_chars, 205);
        assert_eq!(loaded[1].elapsed, Duration::from_millis(45_500));
        assert_eq!(loaded[2].elapsed, Duration::from_secs(3720));
    }

    #[test]
    fn parse_elapsed_forms() {
        assert_eq!(parse_elapsed("60.25"), Some(Duration::from_millis(60_250)));
        assert_eq!(parse_elapsed("1500ms"), Some(Duration::from_millis(1500)));
        assert_eq!(parse_elapsed("0s"), Some(Duration::ZERO));
        assert_eq!(parse_elapsed(""), None);
        assert_eq!(parse_elapsed("5x"), None);
        assert_eq!(parse_elapsed("s"), None);
    }

    #[test]
    fn summary_of_results() {
        let results = vec![result(40.0, 90.0), result(60.0, 100.0)];
        let summary = HistorySummary::from_results(&results).unwrap();

        assert_eq!(summary.total_tests, 2);
        assert_eq!(summary.average_wpm, 50.0);
        assert_eq!(summary.best_wpm, 60.0);
        assert_eq!(summary.average_accuracy, 95.0);
        assert_eq!(summary.wpm_std_dev, 10.0);
    }

    #[test]
    fn summary_of_nothing() {
        assert_eq!(HistorySummary::from_results(&[]), None);
    }

    #[test]
    fn recent_takes_tail() {
        let results: Vec<TestResult> = (0..10).map(|i| result(i as f64, 100.0)).collect();

        let tail = recent(&results, 8);
        assert_eq!(tail.len(), 8);
        assert_eq!(tail[0].wpm, 2.0);
        assert_eq!(recent(&results[..3], 8).len(), 3);
    }
}
