//! Telemetry sinks and CSV export.
//!
//! The control loop appends one [`TelemetryRecord`] per executed decision
//! and per location study. Sink failures are reported to the caller, which
//! logs them and carries on; telemetry never stops the platform.
//!
//! - [`JsonFileSink`] keeps every record in memory and rewrites the log file
//!   as a pretty-printed JSON array every `save_every` records and on
//!   [`TelemetrySink::flush`].
//! - [`MemorySink`] keeps records in memory only.
//! - [`export_csv`] writes a flat table for spreadsheets and dashboards.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use rover_types::{RoverError, TelemetryRecord};
use tracing::{debug, info};

/// Records between automatic saves of a [`JsonFileSink`].
pub const DEFAULT_SAVE_EVERY: usize = 10;

/// Append-only consumer of telemetry records.
pub trait TelemetrySink: Send {
    /// Append one record.
    ///
    /// # Errors
    ///
    /// [`RoverError::Telemetry`] if persisting failed. The record is still
    /// retained in memory.
    fn record(&mut self, record: TelemetryRecord) -> Result<(), RoverError>;

    /// Persist everything recorded so far.
    fn flush(&mut self) -> Result<(), RoverError>;

    /// Every record accepted so far, oldest first.
    fn records(&self) -> &[TelemetryRecord];
}

// ────────────────────────────────────────────────────────────────────────────
// JsonFileSink
// ────────────────────────────────────────────────────────────────────────────

pub struct JsonFileSink {
    path: PathBuf,
    records: Vec<TelemetryRecord>,
    save_every: usize,
    unsaved: usize,
}

impl JsonFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            records: Vec::new(),
            save_every: DEFAULT_SAVE_EVERY,
            unsaved: 0,
        }
    }

    /// Save after every `n` records (minimum 1).
    pub fn with_save_every(mut self, n: usize) -> Self {
        self.save_every = n.max(1);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TelemetrySink for JsonFileSink {
    fn record(&mut self, record: TelemetryRecord) -> Result<(), RoverError> {
        self.records.push(record);
        self.unsaved += 1;
        if self.unsaved >= self.save_every {
            self.flush()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), RoverError> {
        let json = serde_json::to_string_pretty(&self.records)
            .map_err(|e| RoverError::Telemetry(format!("serialise log: {e}")))?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                RoverError::Telemetry(format!("create {}: {e}", parent.display()))
            })?;
        }
        fs::write(&self.path, json)
            .map_err(|e| RoverError::Telemetry(format!("write {}: {e}", self.path.display())))?;
        self.unsaved = 0;
        debug!(path = %self.path.display(), records = self.records.len(), "telemetry log saved");
        Ok(())
    }

    fn records(&self) -> &[TelemetryRecord] {
        &self.records
    }
}

// ────────────────────────────────────────────────────────────────────────────
// MemorySink
// ────────────────────────────────────────────────────────────────────────────

/// In-memory sink, used when file logging is disabled and in tests.
#[derive(Default)]
pub struct MemorySink {
    records: Vec<TelemetryRecord>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TelemetrySink for MemorySink {
    fn record(&mut self, record: TelemetryRecord) -> Result<(), RoverError> {
        self.records.push(record);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), RoverError> {
        Ok(())
    }

    fn records(&self) -> &[TelemetryRecord] {
        &self.records
    }
}

// ────────────────────────────────────────────────────────────────────────────
// CSV export
// ────────────────────────────────────────────────────────────────────────────

const CSV_HEADER: &str = "timestamp,x,y,heading,temperature,humidity,soil_ph,action";

/// Write `records` as CSV to `path`. Missing environment values become empty
/// cells. Returns the number of data rows written.
pub fn export_csv(records: &[TelemetryRecord], path: &Path) -> Result<usize, RoverError> {
    let to_err = |e: std::io::Error| RoverError::Telemetry(format!("export {}: {e}", path.display()));
    let file = fs::File::create(path).map_err(to_err)?;
    let mut out = BufWriter::new(file);

    writeln!(out, "{CSV_HEADER}").map_err(to_err)?;
    for r in records {
        let env = r.environment.unwrap_or_default();
        writeln!(
            out,
            "{},{},{},{},{},{},{},{}",
            r.timestamp.to_rfc3339(),
            r.position.x,
            r.position.y,
            r.position.heading,
            cell(env.temperature_c),
            cell(env.humidity),
            cell(env.soil_ph),
            escape(&r.action),
        )
        .map_err(to_err)?;
    }
    out.flush().map_err(to_err)?;
    info!(path = %path.display(), rows = records.len(), "telemetry exported to CSV");
    Ok(records.len())
}

fn cell(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn escape(field: &str) -> String {
    if field.contains([',', '"', '\n']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rover_types::{Direction, EnvironmentReading, PositionReport, ProximityStatus};

    fn record(action: &str, environment: Option<EnvironmentReading>) -> TelemetryRecord {
        let mut obstacles = ProximityStatus::default();
        obstacles[Direction::Front] = true;
        TelemetryRecord {
            timestamp: Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
            position: PositionReport {
                x: 0.3,
                y: -0.15,
                heading: 45.0,
            },
            action: action.to_string(),
            obstacles,
            environment,
        }
    }

    fn saved(path: &Path) -> Vec<TelemetryRecord> {
        serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
    }

    #[test]
    fn json_sink_saves_every_n_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.json");
        let mut sink = JsonFileSink::new(&path).with_save_every(3);

        sink.record(record("forward", None)).unwrap();
        sink.record(record("stop", None)).unwrap();
        assert!(!path.exists());

        sink.record(record("spin_right", None)).unwrap();
        assert_eq!(saved(&path).len(), 3);

        sink.record(record("forward", None)).unwrap();
        assert_eq!(saved(&path).len(), 3);
        sink.flush().unwrap();
        assert_eq!(saved(&path).len(), 4);
        assert_eq!(sink.records().len(), 4);
    }

    #[test]
    fn json_log_is_pretty_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/log.json");
        let mut sink = JsonFileSink::new(&path);
        sink.record(record("forward", None)).unwrap();
        sink.flush().unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("[\n"));
        assert!(text.contains("\"front\": true"));
        assert_eq!(saved(&path)[0], record("forward", None));
    }

    #[test]
    fn unwritable_path_is_telemetry_error_but_record_kept() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the file should be.
        let mut sink = JsonFileSink::new(dir.path()).with_save_every(1);
        let err = sink.record(record("forward", None)).unwrap_err();
        assert!(matches!(err, RoverError::Telemetry(_)));
        assert_eq!(sink.records().len(), 1);
    }

    #[test]
    fn csv_has_expected_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.csv");
        let env = EnvironmentReading {
            temperature_c: Some(25.1),
            humidity: Some(45.5),
            soil_ph: Some(6.85),
            soil_voltage: Some(2.1),
        };
        let rows = export_csv(
            &[record("forward", None), record("STUDY_LOCATION", Some(env))],
            &path,
        )
        .unwrap();
        assert_eq!(rows, 2);

        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], CSV_HEADER);
        assert_eq!(lines[1], "2026-03-01T12:00:00+00:00,0.3,-0.15,45,,,,forward");
        assert_eq!(
            lines[2],
            "2026-03-01T12:00:00+00:00,0.3,-0.15,45,25.1,45.5,6.85,STUDY_LOCATION"
        );
    }

    #[test]
    fn csv_escapes_awkward_actions() {
        assert_eq!(escape("a,b"), "\"a,b\"");
        assert_eq!(escape("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(escape("forward"), "forward");
    }
}
