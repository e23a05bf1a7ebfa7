//! [`DecisionEngine`] – final authority over what the platform does next.
//!
//! Proximity sensors are safety-critical and always override vision:
//!
//! 1. Front proximity blocked → stop, whatever vision says.
//! 2. Otherwise follow the vision recommendation, with side fallback:
//!    a blocked left turn becomes a right turn and vice versa; both sides
//!    blocked stops.
//! 3. No usable recommendation → spin right to re-scan.
//!
//! [`DecisionEngine::decide`] is a pure function of its inputs.
//!
//! # Example
//!
//! ```
//! use rover_kernel::arbiter::{Confidence, VisionRecommendation};
//! use rover_kernel::decision::DecisionEngine;
//! use rover_types::{ActionKind, Direction, ProximityStatus};
//!
//! let mut proximity = ProximityStatus::default();
//! proximity[Direction::Left] = true;
//!
//! let vision = VisionRecommendation {
//!     target: Some(Direction::Left),
//!     reason: "left path clear".into(),
//!     confidence: Confidence::Confident,
//! };
//!
//! let decision = DecisionEngine::default().decide(&proximity, &vision);
//! assert_eq!(decision.action(), ActionKind::TurnRight);
//! assert_eq!(decision.direction(), Some(Direction::Right));
//! assert_eq!(decision.duration(), 0.5);
//! ```

use rover_types::{ActionKind, Direction, NavigationDecision, ProximityStatus};

use crate::arbiter::VisionRecommendation;

/// Nominal command durations in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecisionTimings {
    pub forward: f64,
    pub turn: f64,
    pub backward: f64,
    pub spin: f64,
}

impl Default for DecisionTimings {
    fn default() -> Self {
        Self {
            forward: 2.0,
            turn: 0.5,
            backward: 1.0,
            spin: 0.8,
        }
    }
}

/// Fuses a proximity snapshot with the vision recommendation.
#[derive(Debug, Clone, Default)]
pub struct DecisionEngine {
    timings: DecisionTimings,
}

impl DecisionEngine {
    pub fn new(timings: DecisionTimings) -> Self {
        Self { timings }
    }

    pub fn timings(&self) -> &DecisionTimings {
        &self.timings
    }

    /// Produce exactly one decision for this tick.
    pub fn decide(
        &self,
        proximity: &ProximityStatus,
        vision: &VisionRecommendation,
    ) -> NavigationDecision {
        let t = &self.timings;
        if proximity[Direction::Front] {
            return NavigationDecision::stop("front proximity obstacle");
        }

        match vision.target {
            Some(Direction::Front) => NavigationDecision::new(
                ActionKind::Forward,
                t.forward,
                format!("vision: {}", vision.reason),
            ),
            Some(side @ (Direction::Left | Direction::Right)) => self.turn(proximity, side),
            Some(Direction::Back) if !proximity[Direction::Back] => NavigationDecision::new(
                ActionKind::Backward,
                t.backward,
                format!("vision: {}", vision.reason),
            ),
            Some(Direction::Back) => NavigationDecision::stop("back proximity obstacle"),
            None => NavigationDecision::new(
                ActionKind::SpinRight,
                t.spin,
                "no usable direction; spinning to re-scan",
            ),
        }
    }

    fn turn(&self, proximity: &ProximityStatus, preferred: Direction) -> NavigationDecision {
        let other = preferred.opposite_side().unwrap_or(preferred);
        if !proximity[preferred] {
            NavigationDecision::new(
                turn_action(preferred),
                self.timings.turn,
                format!("vision prefers {preferred}"),
            )
        } else if !proximity[other] {
            NavigationDecision::new(
                turn_action(other),
                self.timings.turn,
                format!("{preferred} proximity obstacle; turning {other}"),
            )
        } else {
            NavigationDecision::stop("sides blocked")
        }
    }
}

fn turn_action(side: Direction) -> ActionKind {
    match side {
        Direction::Left => ActionKind::TurnLeft,
        _ => ActionKind::TurnRight,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arbiter::{Confidence, VisionRecommendation};

    fn prox(front: bool, left: bool, right: bool, back: bool) -> ProximityStatus {
        let mut p = ProximityStatus::default();
        p[Direction::Front] = front;
        p[Direction::Left] = left;
        p[Direction::Right] = right;
        p[Direction::Back] = back;
        p
    }

    fn vision(target: Option<Direction>) -> VisionRecommendation {
        match target {
            Some(d) => VisionRecommendation {
                target: Some(d),
                reason: format!("{d} path clear"),
                confidence: Confidence::Confident,
            },
            None => VisionRecommendation::stop(),
        }
    }

    fn decide(p: ProximityStatus, target: Option<Direction>) -> NavigationDecision {
        DecisionEngine::default().decide(&p, &vision(target))
    }

    fn summary(d: &NavigationDecision) -> (ActionKind, Option<Direction>, f64) {
        (d.action(), d.direction(), d.duration())
    }

    #[test]
    fn scenario_all_clear_front_recommended() {
        let d = decide(prox(false, false, false, false), Some(Direction::Front));
        assert_eq!(summary(&d), (ActionKind::Forward, Some(Direction::Front), 2.0));
    }

    #[test]
    fn scenario_front_proximity_stops() {
        let d = decide(prox(true, false, false, false), Some(Direction::Front));
        assert_eq!(summary(&d), (ActionKind::Stop, None, 0.0));
        assert_eq!(d.reason(), "front proximity obstacle");
    }

    #[test]
    fn scenario_left_blocked_falls_back_right() {
        let d = decide(prox(false, true, false, false), Some(Direction::Left));
        assert_eq!(summary(&d), (ActionKind::TurnRight, Some(Direction::Right), 0.5));
    }

    #[test]
    fn scenario_both_sides_blocked_stops() {
        let d = decide(prox(false, true, true, false), Some(Direction::Left));
        assert_eq!(summary(&d), (ActionKind::Stop, None, 0.0));
        assert_eq!(d.reason(), "sides blocked");
    }

    #[test]
    fn right_blocked_falls_back_left() {
        let d = decide(prox(false, false, true, false), Some(Direction::Right));
        assert_eq!(summary(&d), (ActionKind::TurnLeft, Some(Direction::Left), 0.5));
    }

    #[test]
    fn clear_side_turns_that_way() {
        let d = decide(prox(false, false, false, false), Some(Direction::Left));
        assert_eq!(summary(&d), (ActionKind::TurnLeft, Some(Direction::Left), 0.5));
        let d = decide(prox(false, false, false, false), Some(Direction::Right));
        assert_eq!(summary(&d), (ActionKind::TurnRight, Some(Direction::Right), 0.5));
    }

    #[test]
    fn backward_only_when_back_is_clear() {
        let d = decide(prox(false, false, false, false), Some(Direction::Back));
        assert_eq!(summary(&d), (ActionKind::Backward, Some(Direction::Back), 1.0));
        let d = decide(prox(false, false, false, true), Some(Direction::Back));
        assert_eq!(summary(&d), (ActionKind::Stop, None, 0.0));
    }

    #[test]
    fn no_recommendation_spins_right() {
        let d = decide(prox(false, true, true, true), None);
        assert_eq!(summary(&d), (ActionKind::SpinRight, Some(Direction::Right), 0.8));
    }

    #[test]
    fn front_proximity_overrides_every_input() {
        let targets = [
            None,
            Some(Direction::Front),
            Some(Direction::Left),
            Some(Direction::Right),
            Some(Direction::Back),
        ];
        for mask in 0u8..8 {
            let p = prox(true, mask & 1 != 0, mask & 2 != 0, mask & 4 != 0);
            for target in targets {
                assert_eq!(decide(p, target).action(), ActionKind::Stop);
            }
        }
    }

    #[test]
    fn direction_is_none_exactly_when_stopping() {
        let targets = [
            None,
            Some(Direction::Front),
            Some(Direction::Left),
            Some(Direction::Right),
            Some(Direction::Back),
        ];
        for mask in 0u8..16 {
            let p = prox(mask & 1 != 0, mask & 2 != 0, mask & 4 != 0, mask & 8 != 0);
            for target in targets {
                let d = decide(p, target);
                assert_eq!(d.direction().is_none(), d.action() == ActionKind::Stop);
            }
        }
    }

    #[test]
    fn custom_timings_are_used() {
        let engine = DecisionEngine::new(DecisionTimings {
            forward: 1.0,
            ..DecisionTimings::default()
        });
        assert_eq!(engine.timings().forward, 1.0);
        assert_eq!(engine.timings().turn, 0.5);
        let d = engine.decide(&prox(false, false, false, false), &vision(Some(Direction::Front)));
        assert_eq!(d.duration(), 1.0);
    }
}
