//! Dead-reckoning position tracker.
//!
//! Integrates executed [`NavigationDecision`]s into a 2-D [`Pose`] using a
//! constant linear speed. Heading is in degrees, counter-clockwise from +X,
//! so left turns increase it.
//!
//! ```text
//! Forward:   x += v·t·cos(θ)   y += v·t·sin(θ)
//! Backward:  x −= v·t·cos(θ)   y −= v·t·sin(θ)
//! Turn*:     θ ± 45°                      (TurnModel::Fixed)
//! Spin*:     θ ± 90°                      (TurnModel::Fixed)
//! ```
//!
//! The estimate drifts; there is no external correction.
//!
//! # Example
//!
//! ```rust
//! use rover_perception::dead_reckoning::{PositionTracker, TrackerConfig};
//! use rover_types::{ActionKind, NavigationDecision};
//!
//! let mut tracker = PositionTracker::new(TrackerConfig::default());
//! tracker.update(&NavigationDecision::new(ActionKind::Forward, 2.0, "clear"), 2.0);
//! let pose = tracker.update(&NavigationDecision::new(ActionKind::SpinRight, 0.8, "rescan"), 0.8);
//!
//! assert!((pose.x - 0.3).abs() < 1e-9);
//! assert_eq!(pose.heading_degrees, 270.0);
//! ```

use rover_types::{ActionKind, NavigationDecision, Pose};
use tracing::debug;

/// How much heading changes for turn and spin commands.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum TurnModel {
    /// ±45° per turn and ±90° per spin, whatever the elapsed time.
    #[default]
    Fixed,
    /// Heading changes by `rate × elapsed`.
    Proportional {
        turn_rate_deg_per_sec: f64,
        spin_rate_deg_per_sec: f64,
    },
}

impl TurnModel {
    pub const FIXED_TURN_DEGREES: f64 = 45.0;
    pub const FIXED_SPIN_DEGREES: f64 = 90.0;

    /// Rates that reproduce the fixed angles at the nominal 0.5 s turn and
    /// 0.8 s spin durations.
    pub const fn proportional() -> Self {
        TurnModel::Proportional {
            turn_rate_deg_per_sec: 90.0,
            spin_rate_deg_per_sec: 112.5,
        }
    }

    fn turn_degrees(self, elapsed: f64) -> f64 {
        match self {
            TurnModel::Fixed => Self::FIXED_TURN_DEGREES,
            TurnModel::Proportional {
                turn_rate_deg_per_sec,
                ..
            } => turn_rate_deg_per_sec * elapsed,
        }
    }

    fn spin_degrees(self, elapsed: f64) -> f64 {
        match self {
            TurnModel::Fixed => Self::FIXED_SPIN_DEGREES,
            TurnModel::Proportional {
                spin_rate_deg_per_sec,
                ..
            } => spin_rate_deg_per_sec * elapsed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackerConfig {
    /// Assumed linear speed in metres per second.
    pub distance_per_second: f64,
    pub turn_model: TurnModel,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            distance_per_second: 0.15,
            turn_model: TurnModel::Fixed,
        }
    }
}

/// Sole owner of the platform's [`Pose`] estimate.
#[derive(Debug, Clone)]
pub struct PositionTracker {
    config: TrackerConfig,
    pose: Pose,
}

impl PositionTracker {
    /// Start at the origin facing +X.
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            pose: Pose::default(),
        }
    }

    /// Read-only snapshot of the current estimate.
    pub fn pose(&self) -> Pose {
        self.pose
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Integrate one executed decision. `elapsed_seconds` is the time the
    /// command actually ran; negative values count as zero.
    pub fn update(&mut self, decision: &NavigationDecision, elapsed_seconds: f64) -> Pose {
        let elapsed = elapsed_seconds.max(0.0);
        let model = self.config.turn_model;
        match decision.action() {
            ActionKind::Forward => self.translate(elapsed),
            ActionKind::Backward => self.translate(-elapsed),
            ActionKind::TurnLeft => self.rotate(model.turn_degrees(elapsed)),
            ActionKind::TurnRight => self.rotate(-model.turn_degrees(elapsed)),
            ActionKind::SpinLeft => self.rotate(model.spin_degrees(elapsed)),
            ActionKind::SpinRight => self.rotate(-model.spin_degrees(elapsed)),
            ActionKind::Stop => {}
        }
        debug!(
            action = %decision.action(),
            elapsed,
            x = self.pose.x,
            y = self.pose.y,
            heading = self.pose.heading_degrees,
            "pose updated"
        );
        self.pose
    }

    fn translate(&mut self, signed_seconds: f64) {
        let distance = self.config.distance_per_second * signed_seconds;
        let heading = self.pose.heading_degrees.to_radians();
        self.pose.x += distance * heading.cos();
        self.pose.y += distance * heading.sin();
    }

    fn rotate(&mut self, degrees: f64) {
        self.pose.heading_degrees = normalize_heading(self.pose.heading_degrees + degrees);
    }
}

/// Wrap `degrees` into `[0, 360)`.
pub fn normalize_heading(degrees: f64) -> f64 {
    let wrapped = degrees.rem_euclid(360.0);
    if wrapped >= 360.0 { 0.0 } else { wrapped }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
