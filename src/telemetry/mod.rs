//! # Telemetry Module
//!
//! Flight recorder writing tick reports to JSONL files with rotation.
//!
//! This module handles:
//! - Rate-limiting records to the configured interval
//! - Formatting as JSONL (JSON Lines), one timestamped record per line
//! - Rotating to a new file after N records
//! - Retaining only the newest M files in the log directory

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::config::TelemetryConfig;
use crate::driver::TickReport;
use crate::error::{Result, SimBridgeError};

const FILE_PREFIX: &str = "flight_";
const FILE_SUFFIX: &str = ".jsonl";

#[derive(Serialize)]
struct FlightRecord<'a> {
    timestamp: String,
    #[serde(flatten)]
    report: &'a TickReport,
}

/// Rotating JSONL writer for [`TickReport`]s.
#[derive(Debug)]
pub struct FlightRecorder {
    dir: PathBuf,
    max_records_per_file: usize,
    max_files_to_keep: usize,
    interval: Duration,
    writer: Option<BufWriter<File>>,
    current: Option<PathBuf>,
    records_in_file: usize,
    files: VecDeque<PathBuf>,
    last_record: Option<Instant>,
    sequence: u32,
}

impl FlightRecorder {
    /// Recorder writing into `dir`, creating it if needed.
    ///
    /// Recordings left in `dir` by earlier sessions count towards the
    /// retention limit.
    ///
    /// # Errors
    ///
    /// Returns `Telemetry` if the directory cannot be created or listed.
    pub fn new<P: AsRef<Path>>(
        dir: P,
        max_records_per_file: usize,
        max_files_to_keep: usize,
        interval: Duration,
    ) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|e| {
            SimBridgeError::Telemetry(format!("Failed to create {}: {}", dir.display(), e))
        })?;

        let mut existing: Vec<PathBuf> = fs::read_dir(&dir)
            .map_err(|e| {
                SimBridgeError::Telemetry(format!("Failed to list {}: {}", dir.display(), e))
            })?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| is_recording(path))
            .collect();
        existing.sort();

        Ok(Self {
            dir,
            max_records_per_file: max_records_per_file.max(1),
            max_files_to_keep: max_files_to_keep.max(1),
            interval,
            writer: None,
            current: None,
            records_in_file: 0,
            files: existing.into(),
            last_record: None,
            sequence: 0,
        })
    }

    /// Recorder built from the `[telemetry]` section.
    ///
    /// # Errors
    ///
    /// See [`FlightRecorder::new`].
    pub fn from_config(config: &TelemetryConfig) -> Result<Self> {
        Self::new(
            &config.log_dir,
            config.max_records_per_file,
            config.max_files_to_keep,
            Duration::from_millis(config.log_interval_ms),
        )
    }

    /// Writes `report` unless the previous record is younger than the
    /// interval. Returns whether a record was written.
    ///
    /// # Errors
    ///
    /// Returns `Telemetry` on file or serialization failure.
    pub fn record(&mut self, report: &TickReport) -> Result<bool> {
        let now = Instant::now();
        if let Some(last) = self.last_record {
            if now.duration_since(last) < self.interval {
                return Ok(false);
            }
        }

        if self.writer.is_none() || self.records_in_file >= self.max_records_per_file {
            self.rotate()?;
        }

        let record = FlightRecord {
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            report,
        };

        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| SimBridgeError::Telemetry("No open recording".to_string()))?;
        serde_json::to_writer(&mut *writer, &record)
            .map_err(|e| SimBridgeError::Telemetry(format!("Failed to encode record: {}", e)))?;
        writer
            .write_all(b"\n")
            .map_err(|e| SimBridgeError::Telemetry(format!("Failed to write record: {}", e)))?;

        self.records_in_file += 1;
        self.last_record = Some(now);
        Ok(true)
    }

    /// Flushes buffered records to disk.
    ///
    /// # Errors
    ///
    /// Returns `Telemetry` if the flush fails.
    pub fn flush(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.as_mut() {
            writer.flush().map_err(|e| {
                SimBridgeError::Telemetry(format!("Failed to flush recording: {}", e))
            })?;
        }
        Ok(())
    }

    /// File currently being written.
    #[must_use]
    pub fn current_path(&self) -> Option<&Path> {
        self.current.as_deref()
    }

    #[must_use]
    pub fn records_in_file(&self) -> usize {
        self.records_in_file
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn rotate(&mut self) -> Result<()> {
        self.flush()?;
        self.writer = None;

        self.sequence += 1;
        let name = format!(
            "{}{}_{:04}{}",
            FILE_PREFIX,
            Utc::now().format("%Y%m%d_%H%M%S"),
            self.sequence,
            FILE_SUFFIX
        );
        let path = self.dir.join(name);

        let file = File::create(&path).map_err(|e| {
            SimBridgeError::Telemetry(format!("Failed to create {}: {}", path.display(), e))
        })?;
        debug!("Flight recording rotated to {}", path.display());

        self.writer = Some(BufWriter::new(file));
        self.current = Some(path.clone());
        self.records_in_file = 0;
        self.files.push_back(path);
        self.prune();
        Ok(())
    }

    fn prune(&mut self) {
        while self.files.len() > self.max_files_to_keep {
            let Some(oldest) = self.files.pop_front() else {
                break;
            };
            match fs::remove_file(&oldest) {
                Ok(()) => info!("Removed old flight recording {}", oldest.display()),
                Err(e) => warn!("Failed to remove {}: {}", oldest.display(), e),
            }
        }
    }
}

impl Drop for FlightRecorder {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            warn!("{}", e);
        }
    }
}

fn is_recording(path: &Path) -> bool {
    path.file_name()
        .map(|name| name.to_string_lossy())
        .is_some_and(|name| name.starts_with(FILE_PREFIX) && name.ends_with(FILE_SUFFIX))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::profile::ChannelSet;
    use nalgebra::Vector3;
    use tempfile::TempDir;

    fn report(tick: u64) -> TickReport {
        TickReport {
            tick,
            dt: 0.01,
            channels: ChannelSet::NEUTRAL,
            motors: [0.5; 4],
            forces: Vector3::zeros(),
            motor_sum: 2.0,
            feedback: 0.5,
            thrust: Vector3::new(0.0, 0.0, 260.0),
            attitude: Vector3::zeros(),
            serial_connected: false,
        }
    }

    fn recordings(dir: &Path) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .filter(|p| is_recording(p))
            .collect();
        files.sort();
        files
    }

    #[test]
    fn test_creates_directory() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("nested/logs");
        let recorder = FlightRecorder::new(&dir, 10, 3, Duration::ZERO).unwrap();
        assert!(dir.is_dir());
        assert!(recorder.current_path().is_none());
    }

    #[test]
    fn test_writes_jsonl_records() {
        let tmp = TempDir::new().unwrap();
        let mut recorder = FlightRecorder::new(tmp.path(), 10, 3, Duration::ZERO).unwrap();

        assert!(recorder.record(&report(1)).unwrap());
        assert!(recorder.record(&report(2)).unwrap());
        recorder.flush().unwrap();

        let path = recorder.current_path().unwrap().to_path_buf();
        let contents = fs::read_to_string(path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["tick"], 1);
        assert_eq!(first["motor_sum"], 2.0);
        assert!(first["timestamp"].as_str().unwrap().ends_with('Z'));
        assert_eq!(first["motors"].as_array().unwrap().len(), 4);
    }

    #[test]
    fn test_rotates_after_max_records() {
        let tmp = TempDir::new().unwrap();
        let mut recorder = FlightRecorder::new(tmp.path(), 2, 10, Duration::ZERO).unwrap();

        for tick in 0..5 {
            recorder.record(&report(tick)).unwrap();
        }
        recorder.flush().unwrap();

        assert_eq!(recordings(tmp.path()).len(), 3);
        assert_eq!(recorder.records_in_file(), 1);
    }

    #[test]
    fn test_keeps_newest_files() {
        let tmp = TempDir::new().unwrap();
        let mut recorder = FlightRecorder::new(tmp.path(), 1, 2, Duration::ZERO).unwrap();

        for tick in 0..5 {
            recorder.record(&report(tick)).unwrap();
        }
        recorder.flush().unwrap();

        let files = recordings(tmp.path());
        assert_eq!(files.len(), 2);
        assert_eq!(files.last(), recorder.current_path().map(Path::to_path_buf).as_ref());
    }

    #[test]
    fn test_existing_recordings_count_towards_retention() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("flight_20000101_000000_0001.jsonl"), "{}\n").unwrap();
        fs::write(tmp.path().join("notes.txt"), "keep me").unwrap();

        let mut recorder = FlightRecorder::new(tmp.path(), 10, 1, Duration::ZERO).unwrap();
        recorder.record(&report(1)).unwrap();

        assert_eq!(recordings(tmp.path()).len(), 1);
        assert!(tmp.path().join("notes.txt").exists());
    }

    #[test]
    fn test_interval_throttles_records() {
        let tmp = TempDir::new().unwrap();
        let mut recorder =
            FlightRecorder::new(tmp.path(), 100, 3, Duration::from_secs(60)).unwrap();

        assert!(recorder.record(&report(1)).unwrap());
        assert!(!recorder.record(&report(2)).unwrap());
        assert_eq!(recorder.records_in_file(), 1);
    }

    #[test]
    fn test_from_config() {
        let tmp = TempDir::new().unwrap();
        let config = TelemetryConfig {
            enabled: true,
            log_dir: tmp.path().join("rec").to_string_lossy().to_string(),
            max_records_per_file: 5,
            max_files_to_keep: 2,
            log_interval_ms: 10,
            format: "jsonl".to_string(),
        };
        let recorder = FlightRecorder::from_config(&config).unwrap();
        assert!(recorder.dir().ends_with("rec"));
    }
}
