//! `rover-perception` – turns raw sensor data into the rover's picture of the
//! world.
//!
//! # Modules
//!
//! - [`imaging`] – greyscale conversion, Gaussian blur, Canny edges, and
//!   rectangular morphology on [`image::GrayImage`].
//! - [`contour`] – external contour extraction and polygon area.
//! - [`detector`] – [`ObstacleDetector`][detector::ObstacleDetector]: one
//!   camera frame in, an obstacle list and a clear/blocked
//!   [`DirectionReading`][rover_types::DirectionReading] out.
//! - [`dead_reckoning`] – [`PositionTracker`][dead_reckoning::PositionTracker]:
//!   integrates executed commands into a 2-D pose estimate.

pub mod contour;
pub mod dead_reckoning;
pub mod detector;
pub mod imaging;

pub use dead_reckoning::{PositionTracker, TrackerConfig, TurnModel};
pub use detector::{Detection, DetectorConfig, Obstacle, ObstacleDetector};
