//! [`HardwareSet`] – the one place hardware handles live.
//!
//! Built once at process start, handed by `&mut` to the control loop, and
//! released exactly once: either explicitly via [`HardwareSet::release`] or
//! when the set is dropped. Nothing else in the workspace holds a device
//! handle.

use rover_types::{Direction, DirectionMap};
use tracing::{info, warn};

use crate::actuator::Actuator;
use crate::camera::FrameSource;
use crate::environment::EnvironmentSensor;
use crate::proximity::ProximitySensorArray;

/// One optional camera per direction.
pub type CameraBank = DirectionMap<Option<Box<dyn FrameSource>>>;

/// Owner of every camera, sensor, and actuator handle.
pub struct HardwareSet {
    cameras: CameraBank,
    proximity: Box<dyn ProximitySensorArray>,
    actuator: Box<dyn Actuator>,
    environment: Option<Box<dyn EnvironmentSensor>>,
    released: bool,
}

impl HardwareSet {
    /// Create a set with no cameras and no environment sensor.
    pub fn new(proximity: Box<dyn ProximitySensorArray>, actuator: Box<dyn Actuator>) -> Self {
        Self {
            cameras: CameraBank::default(),
            proximity,
            actuator,
            environment: None,
            released: false,
        }
    }

    /// Attach `camera` to `direction`, replacing any previous one.
    pub fn with_camera(mut self, direction: Direction, camera: Box<dyn FrameSource>) -> Self {
        info!(%direction, camera = camera.id(), "camera attached");
        self.cameras.set(direction, Some(camera));
        self
    }

    pub fn with_environment(mut self, sensor: Box<dyn EnvironmentSensor>) -> Self {
        self.environment = Some(sensor);
        self
    }

    pub fn cameras_mut(&mut self) -> &mut CameraBank {
        &mut self.cameras
    }

    /// Directions that currently have a camera attached.
    pub fn camera_directions(&self) -> Vec<Direction> {
        self.cameras
            .iter()
            .filter(|(_, cam)| cam.is_some())
            .map(|(d, _)| d)
            .collect()
    }

    pub fn proximity_mut(&mut self) -> &mut dyn ProximitySensorArray {
        self.proximity.as_mut()
    }

    pub fn actuator_mut(&mut self) -> &mut dyn Actuator {
        self.actuator.as_mut()
    }

    pub fn environment_mut(&mut self) -> Option<&mut (dyn EnvironmentSensor + 'static)> {
        self.environment.as_deref_mut()
    }

    /// Brake the motors and release every camera. Idempotent.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if let Err(e) = self.actuator.stop() {
            warn!(error = %e, "failed to brake motors during release");
        }
        for (direction, slot) in self.cameras.iter_mut() {
            if let Some(camera) = slot.as_mut() {
                camera.release();
                info!(%direction, camera = camera.id(), "camera released");
            }
        }
    }

    pub fn is_released(&self) -> bool {
        self.released
    }
}

impl Drop for HardwareSet {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actuator::{Side, SideCommand, TimedDrive};
    use crate::proximity::ProximityArray;
    use crate::sim::{SimFrameSource, SimMotorDriver};

    #[test]
    fn release_brakes_and_closes_cameras() {
        let (driver, log) = SimMotorDriver::new("l298n");
        let (camera, cam_handle) = SimFrameSource::blank("camera/front", 8, 8);
        let mut set = HardwareSet::new(
            Box::new(ProximityArray::default()),
            Box::new(TimedDrive::new(driver)),
        )
        .with_camera(Direction::Front, Box::new(camera));

        assert_eq!(set.camera_directions(), vec![Direction::Front]);
        set.release();

        assert!(set.is_released());
        assert!(cam_handle.is_released());
        assert_eq!(log.last(Side::Left), Some(SideCommand::BRAKE));
    }

    #[test]
    fn drop_releases_once() {
        let (driver, log) = SimMotorDriver::new("l298n");
        let mut set = HardwareSet::new(
            Box::new(ProximityArray::default()),
            Box::new(TimedDrive::new(driver)),
        );
        set.release();
        let after_release = log.commands().len();
        drop(set);
        assert_eq!(log.commands().len(), after_release);
    }
}
