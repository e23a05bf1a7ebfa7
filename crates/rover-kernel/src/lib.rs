//! `rover-kernel` – navigation authority.
//!
//! Pure, synchronous decision logic. Nothing here performs I/O or fails; the
//! worst case is a degraded but valid recommendation.
//!
//! # Modules
//!
//! - [`arbiter`] – [`DirectionArbiter`][arbiter::DirectionArbiter]: fixed
//!   priority vision arbitration over per-direction readings.
//! - [`decision`] – [`DecisionEngine`][decision::DecisionEngine]: fuses the
//!   proximity snapshot with the vision recommendation into one
//!   [`NavigationDecision`][rover_types::NavigationDecision]. Proximity always
//!   wins.

pub mod arbiter;
pub mod decision;

pub use arbiter::{Confidence, DirectionArbiter, VisionRecommendation};
pub use decision::{DecisionEngine, DecisionTimings};
