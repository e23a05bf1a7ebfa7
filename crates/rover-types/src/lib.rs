use std::collections::BTreeMap;
use std::fmt;
use std::ops::{Index, IndexMut};

use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// One of the four sensing directions around the platform.
///
/// The same enumeration indexes cameras, proximity sensors, and the
/// [`DirectionMap`] slots, so a direction cannot be misspelled or missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Front,
    Back,
    Left,
    Right,
}

impl Direction {
    /// Every direction, in slot order.
    pub const ALL: [Direction; 4] = [
        Direction::Front,
        Direction::Back,
        Direction::Left,
        Direction::Right,
    ];

    /// Exploration priority used for arbitration and tie-breaking.
    pub const PRIORITY: [Direction; 4] = [
        Direction::Front,
        Direction::Left,
        Direction::Right,
        Direction::Back,
    ];

    /// Slot index inside a [`DirectionMap`].
    pub const fn index(self) -> usize {
        match self {
            Direction::Front => 0,
            Direction::Back => 1,
            Direction::Left => 2,
            Direction::Right => 3,
        }
    }

    /// Lowercase label, e.g. `"front"`.
    pub const fn label(self) -> &'static str {
        match self {
            Direction::Front => "front",
            Direction::Back => "back",
            Direction::Left => "left",
            Direction::Right => "right",
        }
    }

    /// The opposite side for lateral directions (`Left` ↔ `Right`).
    pub const fn opposite_side(self) -> Option<Direction> {
        match self {
            Direction::Left => Some(Direction::Right),
            Direction::Right => Some(Direction::Left),
            _ => None,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Fixed-size map with exactly one slot per [`Direction`].
///
/// Serialises as a JSON object keyed by direction label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DirectionMap<T>([T; 4]);

impl<T> DirectionMap<T> {
    /// Build a map by evaluating `f` once per direction.
    pub fn from_fn(mut f: impl FnMut(Direction) -> T) -> Self {
        Self(Direction::ALL.map(&mut f))
    }

    pub fn get(&self, direction: Direction) -> &T {
        &self.0[direction.index()]
    }

    pub fn get_mut(&mut self, direction: Direction) -> &mut T {
        &mut self.0[direction.index()]
    }

    /// Replace the value stored for `direction`.
    pub fn set(&mut self, direction: Direction, value: T) {
        self.0[direction.index()] = value;
    }

    /// Iterate `(direction, &value)` pairs in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (Direction, &T)> {
        Direction::ALL.into_iter().zip(self.0.iter())
    }

    /// Iterate `(direction, &mut value)` pairs in slot order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Direction, &mut T)> {
        Direction::ALL.into_iter().zip(self.0.iter_mut())
    }

    /// Transform every slot, keeping the direction association.
    pub fn map<U>(&self, mut f: impl FnMut(Direction, &T) -> U) -> DirectionMap<U> {
        DirectionMap::from_fn(|d| f(d, self.get(d)))
    }
}

impl<T> Index<Direction> for DirectionMap<T> {
    type Output = T;

    fn index(&self, direction: Direction) -> &T {
        self.get(direction)
    }
}

impl<T> IndexMut<Direction> for DirectionMap<T> {
    fn index_mut(&mut self, direction: Direction) -> &mut T {
        self.get_mut(direction)
    }
}

impl<T: Serialize> Serialize for DirectionMap<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(4))?;
        for (direction, value) in self.iter() {
            map.serialize_entry(&direction, value)?;
        }
        map.end()
    }
}

impl<'de, T: Deserialize<'de> + Default> Deserialize<'de> for DirectionMap<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut entries = BTreeMap::<Direction, T>::deserialize(deserializer)?;
        Ok(Self::from_fn(|d| entries.remove(&d).unwrap_or_default()))
    }
}

/// Snapshot of the proximity sensors: `true` means "obstacle present".
pub type ProximityStatus = DirectionMap<bool>;

/// Movement primitives understood by the actuator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Forward,
    Backward,
    TurnLeft,
    TurnRight,
    SpinLeft,
    SpinRight,
    Stop,
}

impl ActionKind {
    pub const fn label(self) -> &'static str {
        match self {
            ActionKind::Forward => "forward",
            ActionKind::Backward => "backward",
            ActionKind::TurnLeft => "turn_left",
            ActionKind::TurnRight => "turn_right",
            ActionKind::SpinLeft => "spin_left",
            ActionKind::SpinRight => "spin_right",
            ActionKind::Stop => "stop",
        }
    }

    /// The side of the platform this action moves toward; `None` for `Stop`.
    pub const fn direction(self) -> Option<Direction> {
        match self {
            ActionKind::Forward => Some(Direction::Front),
            ActionKind::Backward => Some(Direction::Back),
            ActionKind::TurnLeft | ActionKind::SpinLeft => Some(Direction::Left),
            ActionKind::TurnRight | ActionKind::SpinRight => Some(Direction::Right),
            ActionKind::Stop => None,
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The single movement command produced per control-loop tick.
///
/// Only constructible through [`NavigationDecision::new`] and
/// [`NavigationDecision::stop`], which derive `direction` from `action`:
/// `direction()` is `None` exactly when `action()` is [`ActionKind::Stop`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NavigationDecision {
    action: ActionKind,
    direction: Option<Direction>,
    duration: f64,
    reason: String,
}

impl NavigationDecision {
    /// A decision to perform `action` for `duration` seconds.
    ///
    /// `Stop` always carries a zero duration; negative durations clamp to zero.
    pub fn new(action: ActionKind, duration: f64, reason: impl Into<String>) -> Self {
        let duration = if action == ActionKind::Stop {
            0.0
        } else {
            duration.max(0.0)
        };
        Self {
            action,
            direction: action.direction(),
            duration,
            reason: reason.into(),
        }
    }

    pub fn stop(reason: impl Into<String>) -> Self {
        Self::new(ActionKind::Stop, 0.0, reason)
    }

    pub fn action(&self) -> ActionKind {
        self.action
    }

    pub fn direction(&self) -> Option<Direction> {
        self.direction
    }

    /// Requested duration in seconds.
    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

/// Dead-reckoning pose estimate. Heading is in degrees, counter-clockwise
/// from +X, always within `[0, 360)`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose {
    pub x: f64,
    pub y: f64,
    pub heading_degrees: f64,
}

impl Pose {
    /// Rounded view used in telemetry: x/y to centimetres, heading to 0.1°.
    pub fn report(&self) -> PositionReport {
        PositionReport {
            x: round_to(self.x, 2),
            y: round_to(self.y, 2),
            // Rounding can carry 359.96 up to 360.0.
            heading: round_to(self.heading_degrees, 1).rem_euclid(360.0),
        }
    }
}

/// Position as it appears in telemetry records.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PositionReport {
    pub x: f64,
    pub y: f64,
    pub heading: f64,
}

/// Round `value` to `decimals` decimal places.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Vision verdict for one direction, recomputed every tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectionReading {
    pub direction: Direction,
    /// `false` when no frame could be obtained for this direction.
    pub available: bool,
    /// `true` when no detected obstacle lies in the navigable corridor.
    pub clear: bool,
    pub obstacle_count: usize,
    pub path_obstacle_count: usize,
}

impl DirectionReading {
    /// Reading for a direction whose camera is absent or failed.
    pub fn unavailable(direction: Direction) -> Self {
        Self {
            direction,
            available: false,
            clear: false,
            obstacle_count: 0,
            path_obstacle_count: 0,
        }
    }
}

/// Environmental sample taken while studying a location.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EnvironmentReading {
    pub temperature_c: Option<f64>,
    pub humidity: Option<f64>,
    pub soil_ph: Option<f64>,
    pub soil_voltage: Option<f64>,
}

/// One append-only telemetry entry: what the platform did and where it was.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryRecord {
    pub timestamp: DateTime<Utc>,
    pub position: PositionReport,
    pub action: String,
    pub obstacles: ProximityStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<EnvironmentReading>,
}

/// Workspace-wide error type. Only boundary I/O produces these; the decision
/// logic itself never fails.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RoverError {
    #[error("Sensor unavailable on {component}: {details}")]
    SensorUnavailable { component: String, details: String },

    #[error("Actuation failed for {action}: {details}")]
    ActuationFailure { action: ActionKind, details: String },

    #[error("Telemetry write failed: {0}")]
    Telemetry(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Interrupted by operator")]
    Interrupted,
}
