//! Short-range proximity (IR) sensors and the array that snapshots them.
//!
//! Individual sensor failures never propagate: [`ProximityArray::read_all`]
//! substitutes a value chosen by [`ProximityFailurePolicy`] and logs the
//! fault. The default policy reports a failed sensor as clear, which can mask
//! a real hazard; fit-for-purpose deployments should consider
//! [`ProximityFailurePolicy::AssumeBlocked`].

use rover_types::{Direction, DirectionMap, ProximityStatus, RoverError};
use tracing::warn;

/// A single binary obstacle-presence sensor.
pub trait ProximitySensor: Send {
    /// Stable identifier, e.g. `"ir/front"`.
    fn id(&self) -> &str;

    /// `true` when an obstacle is within trigger range.
    ///
    /// # Errors
    ///
    /// Returns [`RoverError::SensorUnavailable`] if the sensor cannot be read.
    fn obstacle_present(&mut self) -> Result<bool, RoverError>;
}

/// What a failed sensor read is reported as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProximityFailurePolicy {
    /// Report "no obstacle".
    #[default]
    AssumeClear,
    /// Report "obstacle present", steering the platform away from the side.
    AssumeBlocked,
}

impl ProximityFailurePolicy {
    pub const fn fallback(self) -> bool {
        matches!(self, ProximityFailurePolicy::AssumeBlocked)
    }
}

/// Anything that can produce a full [`ProximityStatus`] snapshot.
pub trait ProximitySensorArray: Send {
    /// Read every direction. Never fails.
    fn read_all(&mut self) -> ProximityStatus;
}

/// One optional [`ProximitySensor`] per direction plus a failure policy.
///
/// A direction with no sensor fitted always reads clear.
#[derive(Default)]
pub struct ProximityArray {
    sensors: DirectionMap<Option<Box<dyn ProximitySensor>>>,
    policy: ProximityFailurePolicy,
}

impl ProximityArray {
    pub fn new(policy: ProximityFailurePolicy) -> Self {
        Self {
            sensors: DirectionMap::default(),
            policy,
        }
    }

    /// Fit `sensor` on `direction`, replacing any previous one.
    pub fn with_sensor(mut self, direction: Direction, sensor: Box<dyn ProximitySensor>) -> Self {
        self.sensors.set(direction, Some(sensor));
        self
    }

    pub fn policy(&self) -> ProximityFailurePolicy {
        self.policy
    }
}

impl ProximitySensorArray for ProximityArray {
    fn read_all(&mut self) -> ProximityStatus {
        let policy = self.policy();
        let mut status = ProximityStatus::default();
        for (direction, slot) in self.sensors.iter_mut() {
            let Some(sensor) = slot else { continue };
            let value = match sensor.obstacle_present() {
                Ok(present) => present,
                Err(e) => {
                    warn!(
                        sensor = sensor.id(),
                        %direction,
                        error = %e,
                        ?policy,
                        "proximity read failed; substituting policy value"
                    );
                    policy.fallback()
                }
            };
            status.set(direction, value);
        }
        status
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedSensor(Result<bool, RoverError>);

    impl ProximitySensor for FixedSensor {
        fn id(&self) -> &str {
            "ir/test"
        }

        fn obstacle_present(&mut self) -> Result<bool, RoverError> {
            self.0.clone()
        }
    }

    fn broken() -> Box<dyn ProximitySensor> {
        Box::new(FixedSensor(Err(RoverError::SensorUnavailable {
            component: "ir/test".to_string(),
            details: "gpio read failed".to_string(),
        })))
    }

    #[test]
    fn unfitted_directions_read_clear() {
        let mut array = ProximityArray::new(ProximityFailurePolicy::AssumeBlocked);
        let status = array.read_all();
        assert!(status.iter().all(|(_, blocked)| !blocked));
    }

    #[test]
    fn healthy_sensors_report_their_value() {
        let mut array = ProximityArray::default()
            .with_sensor(Direction::Front, Box::new(FixedSensor(Ok(true))))
            .with_sensor(Direction::Left, Box::new(FixedSensor(Ok(false))));
        let status = array.read_all();
        assert!(status[Direction::Front]);
        assert!(!status[Direction::Left]);
    }

    #[test]
    fn failed_read_defaults_to_clear() {
        let mut array = ProximityArray::default().with_sensor(Direction::Front, broken());
        assert_eq!(array.policy(), ProximityFailurePolicy::AssumeClear);
        assert!(!array.read_all()[Direction::Front]);
    }

    #[test]
    fn failed_read_can_fail_safe() {
        let mut array = ProximityArray::new(ProximityFailurePolicy::AssumeBlocked)
            .with_sensor(Direction::Right, broken());
        assert_eq!(array.policy(), ProximityFailurePolicy::AssumeBlocked);
        let status = array.read_all();
        assert!(status[Direction::Right]);
        assert!(!status[Direction::Left]);
    }
}
