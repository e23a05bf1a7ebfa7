//! [`DirectionArbiter`] – picks a preferred movement direction from vision
//! alone.
//!
//! Directions are considered in the fixed priority order
//! [`Direction::PRIORITY`] (front, left, right, back):
//!
//! 1. The first direction that is available and clear wins, `Confident`.
//! 2. Otherwise the available direction with the fewest in-path obstacles
//!    wins, ties going to the higher-priority direction, `Caution`.
//! 3. With nothing available the recommendation is to stop.
//!
//! An unavailable direction is never recommended.
//!
//! # Example
//!
//! ```
//! use rover_kernel::arbiter::{Confidence, DirectionArbiter};
//! use rover_types::{Direction, DirectionMap, DirectionReading};
//!
//! let mut readings = DirectionMap::from_fn(DirectionReading::unavailable);
//! readings.set(Direction::Right, DirectionReading {
//!     direction: Direction::Right,
//!     available: true,
//!     clear: true,
//!     obstacle_count: 0,
//!     path_obstacle_count: 0,
//! });
//!
//! let rec = DirectionArbiter::new().best_vision_direction(&readings);
//! assert_eq!(rec.target, Some(Direction::Right));
//! assert_eq!(rec.confidence, Confidence::Confident);
//! ```

use rover_types::{Direction, DirectionMap, DirectionReading};

/// Reason attached to the stop recommendation.
pub const ALL_BLOCKED_REASON: &str = "all paths blocked or sensors unavailable";

/// How much the arbiter trusts its recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confidence {
    /// The recommended direction is clear.
    Confident,
    /// Least-bad choice, or no choice at all.
    Caution,
}

/// Output of [`DirectionArbiter::best_vision_direction`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisionRecommendation {
    /// `None` is the stop sentinel.
    pub target: Option<Direction>,
    pub reason: String,
    pub confidence: Confidence,
}

impl VisionRecommendation {
    pub fn stop() -> Self {
        Self {
            target: None,
            reason: ALL_BLOCKED_REASON.to_string(),
            confidence: Confidence::Caution,
        }
    }
}

/// Stateless vision arbitration.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectionArbiter;

impl DirectionArbiter {
    pub fn new() -> Self {
        Self
    }

    /// Recommend a direction from per-direction vision readings.
    pub fn best_vision_direction(
        &self,
        readings: &DirectionMap<DirectionReading>,
    ) -> VisionRecommendation {
        if let Some(direction) = Direction::PRIORITY
            .into_iter()
            .find(|&d| readings[d].available && readings[d].clear)
        {
            return VisionRecommendation {
                target: Some(direction),
                reason: format!("{direction} path clear"),
                confidence: Confidence::Confident,
            };
        }

        // `min_by_key` keeps the first minimum, so priority breaks ties.
        let least_blocked = Direction::PRIORITY
            .into_iter()
            .filter(|&d| readings[d].available)
            .min_by_key(|&d| readings[d].path_obstacle_count);

        match least_blocked {
            Some(direction) => VisionRecommendation {
                target: Some(direction),
                reason: format!(
                    "{direction} least obstructed ({} in path)",
                    readings[direction].path_obstacle_count
                ),
                confidence: Confidence::Caution,
            },
            None => VisionRecommendation::stop(),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(direction: Direction, path_obstacles: usize) -> DirectionReading {
        DirectionReading {
            direction,
            available: true,
            clear: path_obstacles == 0,
            obstacle_count: path_obstacles,
            path_obstacle_count: path_obstacles,
        }
    }

    fn readings(entries: &[(Direction, usize)]) -> DirectionMap<DirectionReading> {
        let mut map = DirectionMap::from_fn(DirectionReading::unavailable);
        for &(d, n) in entries {
            map.set(d, reading(d, n));
        }
        map
    }

    fn best(entries: &[(Direction, usize)]) -> VisionRecommendation {
        DirectionArbiter::new().best_vision_direction(&readings(entries))
    }

    #[test]
    fn front_wins_when_everything_is_clear() {
        let rec = best(&[
            (Direction::Back, 0),
            (Direction::Right, 0),
            (Direction::Left, 0),
            (Direction::Front, 0),
        ]);
        assert_eq!(rec.target, Some(Direction::Front));
        assert_eq!(rec.confidence, Confidence::Confident);
    }

    #[test]
    fn left_beats_right_and_back() {
        let rec = best(&[
            (Direction::Front, 2),
            (Direction::Left, 0),
            (Direction::Right, 0),
            (Direction::Back, 0),
        ]);
        assert_eq!(rec.target, Some(Direction::Left));
    }

    #[test]
    fn clear_back_beats_obstructed_front() {
        let rec = best(&[(Direction::Front, 1), (Direction::Back, 0)]);
        assert_eq!(rec.target, Some(Direction::Back));
        assert_eq!(rec.confidence, Confidence::Confident);
    }

    #[test]
    fn least_obstructed_when_none_clear() {
        let rec = best(&[
            (Direction::Front, 3),
            (Direction::Left, 2),
            (Direction::Right, 1),
            (Direction::Back, 1),
        ]);
        assert_eq!(rec.target, Some(Direction::Right));
        assert_eq!(rec.confidence, Confidence::Caution);
    }

    #[test]
    fn ties_break_by_priority() {
        let rec = best(&[(Direction::Back, 2), (Direction::Left, 2), (Direction::Front, 2)]);
        assert_eq!(rec.target, Some(Direction::Front));
    }

    #[test]
    fn unavailable_direction_is_never_selected() {
        let mut map = readings(&[(Direction::Front, 1)]);
        // Unavailable but nominally clear: must still be ignored.
        map.set(
            Direction::Left,
            DirectionReading {
                available: false,
                clear: true,
                ..DirectionReading::unavailable(Direction::Left)
            },
        );
        let rec = DirectionArbiter::new().best_vision_direction(&map);
        assert_eq!(rec.target, Some(Direction::Front));
        assert_eq!(rec.confidence, Confidence::Caution);
    }

    #[test]
    fn nothing_available_means_stop() {
        let rec = best(&[]);
        assert_eq!(rec, VisionRecommendation::stop());
        assert_eq!(rec.reason, ALL_BLOCKED_REASON);
    }

    #[test]
    fn arbitration_is_deterministic() {
        let input = readings(&[(Direction::Left, 1), (Direction::Right, 1)]);
        let arbiter = DirectionArbiter::new();
        let first = arbiter.best_vision_direction(&input);
        for _ in 0..10 {
            assert_eq!(arbiter.best_vision_direction(&input), first);
        }
    }
}
