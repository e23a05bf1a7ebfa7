//! Configuration vault – reads/writes `~/.rover/config.toml`.
//!
//! A missing file means defaults. `ROVER_*` environment variables override
//! whatever was loaded (see [`apply_env_overrides`]).

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rover_hal::ProximityFailurePolicy;
use rover_perception::{DetectorConfig, TrackerConfig, TurnModel};
use rover_runtime::{ControlLoopConfig, StudyConfig};
use rover_types::{Direction, RoverError};
use serde::{Deserialize, Serialize};

/// How heading changes are estimated from turns and spins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnModelChoice {
    #[default]
    Fixed,
    Proportional,
}

/// What a failed infrared read is reported as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProximityFailureChoice {
    #[default]
    AssumeClear,
    AssumeBlocked,
}

/// Persisted rover configuration stored in `~/.rover/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoverConfig {
    /// Cruise duty cycle, 0–100.
    pub movement_speed: u8,
    /// Metres covered per second of straight driving.
    pub distance_per_second: f64,
    pub loop_interval_secs: f64,
    pub auto_study_enabled: bool,
    pub study_interval_secs: u64,
    pub log_to_file: bool,
    /// JSON telemetry log.
    pub log_path: PathBuf,
    /// CSV export written on shutdown. Only used when `log_to_file` is set.
    pub csv_path: PathBuf,
    pub min_obstacle_area: f64,
    pub safe_zone_width: f64,
    pub turn_model: TurnModelChoice,
    pub proximity_failure: ProximityFailureChoice,
    /// Directions with a camera attached.
    pub cameras: Vec<Direction>,
}

impl Default for RoverConfig {
    fn default() -> Self {
        Self {
            movement_speed: 50,
            distance_per_second: 0.15,
            loop_interval_secs: 0.5,
            auto_study_enabled: true,
            study_interval_secs: 30,
            log_to_file: true,
            log_path: PathBuf::from("rover_data_log.json"),
            csv_path: PathBuf::from("rover_data.csv"),
            min_obstacle_area: 1500.0,
            safe_zone_width: 0.4,
            turn_model: TurnModelChoice::default(),
            proximity_failure: ProximityFailureChoice::default(),
            cameras: vec![Direction::Front],
        }
    }
}

impl RoverConfig {
    /// Map onto the control-loop configuration. Out-of-range values are
    /// clamped rather than rejected.
    pub fn control_loop(&self) -> ControlLoopConfig {
        let turn_model = match self.turn_model {
            TurnModelChoice::Fixed => TurnModel::Fixed,
            TurnModelChoice::Proportional => TurnModel::proportional(),
        };
        ControlLoopConfig {
            movement_speed: self.movement_speed.min(100),
            loop_interval: secs(self.loop_interval_secs),
            detector: DetectorConfig {
                min_obstacle_area: self.min_obstacle_area.max(0.0),
                safe_zone_width: self.safe_zone_width.clamp(0.0, 1.0),
                ..DetectorConfig::default()
            },
            tracker: TrackerConfig {
                distance_per_second: self.distance_per_second.max(0.0),
                turn_model,
            },
            study: StudyConfig {
                enabled: self.auto_study_enabled,
                interval: Duration::from_secs(self.study_interval_secs),
                ..StudyConfig::default()
            },
            csv_path: self.log_to_file.then(|| self.csv_path.clone()),
            ..ControlLoopConfig::default()
        }
    }

    pub fn failure_policy(&self) -> ProximityFailurePolicy {
        match self.proximity_failure {
            ProximityFailureChoice::AssumeClear => ProximityFailurePolicy::AssumeClear,
            ProximityFailureChoice::AssumeBlocked => ProximityFailurePolicy::AssumeBlocked,
        }
    }
}

fn secs(value: f64) -> Duration {
    if value.is_finite() && value > 0.0 {
        Duration::from_secs_f64(value)
    } else {
        Duration::ZERO
    }
}

/// Return the path to `~/.rover/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".rover").join("config.toml")
}

/// Load the config from disk, or `None` if the file does not exist.
///
/// Environment overrides are applied to a loaded file only; callers that
/// fall back to defaults apply them themselves.
pub fn load() -> Result<Option<RoverConfig>, RoverError> {
    load_from(&config_path())
}

pub(crate) fn load_from(path: &Path) -> Result<Option<RoverConfig>, RoverError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| RoverError::Config(format!("read {}: {e}", path.display())))?;
    let mut cfg: RoverConfig =
        toml::from_str(&raw).map_err(|e| RoverError::Config(format!("parse {}: {e}", path.display())))?;
    apply_env_overrides(&mut cfg);
    Ok(Some(cfg))
}

/// Apply `ROVER_*` environment variable overrides to `cfg`. Unparsable
/// values are ignored.
///
/// | Variable | Config field |
/// |---|---|
/// | `ROVER_SPEED` | `movement_speed` |
/// | `ROVER_DISTANCE_PER_SECOND` | `distance_per_second` |
/// | `ROVER_LOG_PATH` | `log_path` |
/// | `ROVER_STUDY_INTERVAL` | `study_interval_secs` |
pub fn apply_env_overrides(cfg: &mut RoverConfig) {
    if let Ok(v) = std::env::var("ROVER_SPEED")
        && let Ok(speed) = v.trim().parse::<u8>()
    {
        cfg.movement_speed = speed.min(100);
    }
    if let Ok(v) = std::env::var("ROVER_DISTANCE_PER_SECOND")
        && let Ok(dps) = v.trim().parse::<f64>()
        && dps.is_finite()
    {
        cfg.distance_per_second = dps;
    }
    if let Ok(v) = std::env::var("ROVER_LOG_PATH")
        && !v.trim().is_empty()
    {
        cfg.log_path = PathBuf::from(v);
    }
    if let Ok(v) = std::env::var("ROVER_STUDY_INTERVAL")
        && let Ok(interval) = v.trim().parse::<u64>()
    {
        cfg.study_interval_secs = interval;
    }
}

/// Save the config to disk, creating `~/.rover/` if necessary.
pub fn save(cfg: &RoverConfig) -> Result<(), RoverError> {
    save_to(cfg, &config_path())
}

pub(crate) fn save_to(cfg: &RoverConfig, path: &Path) -> Result<(), RoverError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| RoverError::Config(format!("create {}: {e}", parent.display())))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700))
                .map_err(|e| RoverError::Config(format!("chmod {}: {e}", parent.display())))?;
        }
    }
    let raw = toml::to_string_pretty(cfg)
        .map_err(|e| RoverError::Config(format!("serialise config: {e}")))?;
    let write_err = |e: std::io::Error| RoverError::Config(format!("write {}: {e}", path.display()));
    #[cfg(unix)]
    {
        use std::io::Write;
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| f.write_all(raw.as_bytes()))
            .map_err(write_err)?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw).map_err(write_err)?;
    Ok(())
}
