//! Location study mode.
//!
//! Every `interval` (and once immediately at start-up) the control loop
//! halts, samples the environment package several times, and logs the
//! averaged reading as a `STUDY_LOCATION` telemetry record.

use std::time::Duration;

use rover_hal::{EnvironmentSensor, ShutdownSignal};
use rover_types::{EnvironmentReading, RoverError, round_to};
use tokio::time::Instant;
use tracing::{debug, warn};

/// Telemetry action label for study records.
pub const STUDY_ACTION: &str = "STUDY_LOCATION";

#[derive(Debug, Clone, PartialEq)]
pub struct StudyConfig {
    pub enabled: bool,
    /// Minimum time between studies.
    pub interval: Duration,
    /// Samples averaged per study.
    pub samples: usize,
    /// Pause between consecutive samples.
    pub sample_spacing: Duration,
    /// Pause after the study before driving resumes.
    pub settle: Duration,
}

impl Default for StudyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: Duration::from_secs(30),
            samples: 3,
            sample_spacing: Duration::from_secs(1),
            settle: Duration::from_secs(2),
        }
    }
}

/// Decides when the next study is due.
#[derive(Debug, Clone)]
pub struct StudyScheduler {
    config: StudyConfig,
    last: Option<Instant>,
}

impl StudyScheduler {
    pub fn new(config: StudyConfig) -> Self {
        Self { config, last: None }
    }

    pub fn config(&self) -> &StudyConfig {
        &self.config
    }

    /// `true` when enabled and no study has run within `interval` of `now`.
    pub fn is_due(&self, now: Instant) -> bool {
        self.config.enabled
            && self
                .last
                .is_none_or(|last| now.saturating_duration_since(last) >= self.config.interval)
    }

    pub fn mark_done(&mut self, now: Instant) {
        self.last = Some(now);
    }
}

/// Take up to `config.samples` readings spaced by `config.sample_spacing`
/// and average the successful ones. Failed samples are skipped.
///
/// # Errors
///
/// [`RoverError::Interrupted`] if `signal` fires while sampling.
pub async fn sample_environment(
    sensor: &mut dyn EnvironmentSensor,
    config: &StudyConfig,
    signal: &mut ShutdownSignal,
) -> Result<Option<EnvironmentReading>, RoverError> {
    let mut readings = Vec::with_capacity(config.samples);
    for i in 0..config.samples {
        match sensor.read() {
            Ok(reading) => readings.push(reading),
            Err(e) => warn!(sensor = sensor.id(), sample = i, error = %e, "environment sample failed"),
        }
        if i + 1 < config.samples {
            pause(config.sample_spacing, signal).await?;
        }
    }
    debug!(sensor = sensor.id(), ok = readings.len(), "environment sampled");
    Ok(average(&readings))
}

/// Sleep for `duration` unless `signal` fires first.
pub(crate) async fn pause(duration: Duration, signal: &mut ShutdownSignal) -> Result<(), RoverError> {
    tokio::select! {
        _ = tokio::time::sleep(duration) => Ok(()),
        _ = signal.triggered() => Err(RoverError::Interrupted),
    }
}

/// Field-wise mean of `readings`, ignoring missing fields. Temperature,
/// humidity and pH are rounded to 2 decimals, voltage to 3. `None` for an
/// empty slice.
pub fn average(readings: &[EnvironmentReading]) -> Option<EnvironmentReading> {
    if readings.is_empty() {
        return None;
    }
    let mean = |field: fn(&EnvironmentReading) -> Option<f64>, decimals: i32| {
        let values: Vec<f64> = readings.iter().filter_map(field).collect();
        (!values.is_empty())
            .then(|| round_to(values.iter().sum::<f64>() / values.len() as f64, decimals))
    };
    Some(EnvironmentReading {
        temperature_c: mean(|r| r.temperature_c, 2),
        humidity: mean(|r| r.humidity, 2),
        soil_ph: mean(|r| r.soil_ph, 2),
        soil_voltage: mean(|r| r.soil_voltage, 3),
    })
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
