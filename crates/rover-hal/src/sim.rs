//! In-process simulated drivers for CI/CD testing without physical hardware.
//!
//! Every simulated driver is created together with a cloneable handle that
//! stays with the test (or the CLI's demo mode) after the driver itself has
//! been boxed into a [`HardwareSet`]. Handles script sensor values and inspect
//! recorded motor commands.
//!
//! # Example
//!
//! ```rust
//! use rover_hal::sim::{scene_frame, SceneBox, SimFrameSource, SimHardware, SimProximitySensor};
//! use rover_types::Direction;
//!
//! let frame = scene_frame(320, 240, &[SceneBox { x: 120, y: 80, width: 80, height: 80 }]);
//! let (front_cam, _cam) = SimFrameSource::new("camera/front", frame);
//! let (front_ir, ir) = SimProximitySensor::new("ir/front");
//!
//! let mut hardware = SimHardware::new()
//!     .with_camera(Direction::Front, front_cam)
//!     .with_proximity(Direction::Front, front_ir)
//!     .build();
//!
//! ir.set_obstacle(true);
//! assert!(hardware.proximity_mut().read_all()[Direction::Front]);
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use rover_types::{ActionKind, Direction, EnvironmentReading, RoverError};

use crate::actuator::{DriveConfig, MotorDriver, Rotation, Side, SideCommand, TimedDrive};
use crate::camera::{CameraFrame, FrameSource};
use crate::environment::EnvironmentSensor;
use crate::proximity::{ProximityArray, ProximityFailurePolicy};
use crate::registry::HardwareSet;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ────────────────────────────────────────────────────────────────────────────
// Synthetic scenes
// ────────────────────────────────────────────────────────────────────────────

/// A dark axis-aligned box drawn onto a synthetic scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SceneBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl SceneBox {
    fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.x && x < self.x + self.width && y >= self.y && y < self.y + self.height
    }
}

/// Render a greyscale frame: white floor with black boxes.
pub fn scene_frame(width: u32, height: u32, boxes: &[SceneBox]) -> CameraFrame {
    let mut data = Vec::with_capacity(width as usize * height as usize);
    for y in 0..height {
        for x in 0..width {
            let dark = boxes.iter().any(|b| b.contains(x, y));
            data.push(if dark { 0 } else { 255 });
        }
    }
    CameraFrame::gray(width, height, data)
}

// ────────────────────────────────────────────────────────────────────────────
// Simulated camera
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug)]
struct CameraState {
    frame: CameraFrame,
    connected: bool,
    released: bool,
    reads: usize,
}

/// A simulated camera that keeps returning its current scripted frame until
/// disconnected. Disconnection is permanent, like a closed capture device.
pub struct SimFrameSource {
    id: String,
    state: Arc<Mutex<CameraState>>,
}

/// Test-side handle for a [`SimFrameSource`].
#[derive(Clone)]
pub struct SimCameraHandle {
    state: Arc<Mutex<CameraState>>,
}

impl SimFrameSource {
    pub fn new(id: impl Into<String>, frame: CameraFrame) -> (Self, SimCameraHandle) {
        let state = Arc::new(Mutex::new(CameraState {
            frame,
            connected: true,
            released: false,
            reads: 0,
        }));
        let handle = SimCameraHandle {
            state: Arc::clone(&state),
        };
        (
            Self {
                id: id.into(),
                state,
            },
            handle,
        )
    }

    /// A camera looking at an empty (uniformly white) floor.
    pub fn blank(id: impl Into<String>, width: u32, height: u32) -> (Self, SimCameraHandle) {
        Self::new(id, scene_frame(width, height, &[]))
    }
}

impl FrameSource for SimFrameSource {
    fn id(&self) -> &str {
        &self.id
    }

    fn read(&mut self) -> Result<CameraFrame, RoverError> {
        let mut state = lock(&self.state);
        if !state.connected || state.released {
            return Err(RoverError::SensorUnavailable {
                component: self.id.clone(),
                details: "capture device closed".to_string(),
            });
        }
        state.reads += 1;
        Ok(state.frame.clone())
    }

    fn release(&mut self) {
        lock(&self.state).released = true;
    }
}

impl SimCameraHandle {
    /// Replace the frame returned by subsequent reads.
    pub fn set_frame(&self, frame: CameraFrame) {
        lock(&self.state).frame = frame;
    }

    /// Permanently disconnect the camera.
    pub fn disconnect(&self) {
        lock(&self.state).connected = false;
    }

    pub fn is_released(&self) -> bool {
        lock(&self.state).released
    }

    /// Number of successful reads so far.
    pub fn reads(&self) -> usize {
        lock(&self.state).reads
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Simulated proximity sensor
// ────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct ProximityState {
    obstacle: AtomicBool,
    failing: AtomicBool,
}

/// A simulated IR sensor whose reading (or failure) is scripted via its
/// [`SimProximityHandle`].
pub struct SimProximitySensor {
    id: String,
    state: Arc<ProximityState>,
}

#[derive(Clone)]
pub struct SimProximityHandle {
    state: Arc<ProximityState>,
}

impl SimProximitySensor {
    pub fn new(id: impl Into<String>) -> (Self, SimProximityHandle) {
        let state = Arc::new(ProximityState::default());
        let handle = SimProximityHandle {
            state: Arc::clone(&state),
        };
        (
            Self {
                id: id.into(),
                state,
            },
            handle,
        )
    }
}

impl crate::proximity::ProximitySensor for SimProximitySensor {
    fn id(&self) -> &str {
        &self.id
    }

    fn obstacle_present(&mut self) -> Result<bool, RoverError> {
        if self.state.failing.load(Ordering::Acquire) {
            return Err(RoverError::SensorUnavailable {
                component: self.id.clone(),
                details: "simulated read failure".to_string(),
            });
        }
        Ok(self.state.obstacle.load(Ordering::Acquire))
    }
}

impl SimProximityHandle {
    pub fn set_obstacle(&self, present: bool) {
        self.state.obstacle.store(present, Ordering::Release);
    }

    pub fn set_failing(&self, failing: bool) {
        self.state.failing.store(failing, Ordering::Release);
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Simulated motor driver
// ────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct MotorState {
    commands: Vec<(Side, SideCommand)>,
    failing: bool,
}

/// A simulated dual H-bridge that records every side command.
pub struct SimMotorDriver {
    id: String,
    state: Arc<Mutex<MotorState>>,
}

/// Test-side view of a [`SimMotorDriver`]'s command log.
#[derive(Clone)]
pub struct SimMotorLog {
    state: Arc<Mutex<MotorState>>,
}

impl SimMotorDriver {
    pub fn new(id: impl Into<String>) -> (Self, SimMotorLog) {
        let state = Arc::new(Mutex::new(MotorState::default()));
        let log = SimMotorLog {
            state: Arc::clone(&state),
        };
        (
            Self {
                id: id.into(),
                state,
            },
            log,
        )
    }
}

impl MotorDriver for SimMotorDriver {
    fn id(&self) -> &str {
        &self.id
    }

    fn set_side(&mut self, side: Side, command: SideCommand) -> Result<(), RoverError> {
        let mut state = lock(&self.state);
        if state.failing {
            let action = match command.rotation {
                Rotation::Forward => ActionKind::Forward,
                Rotation::Backward => ActionKind::Backward,
                Rotation::Brake => ActionKind::Stop,
            };
            return Err(RoverError::ActuationFailure {
                action,
                details: format!("{}: simulated driver fault on {side:?} side", self.id),
            });
        }
        state.commands.push((side, command));
        Ok(())
    }
}

impl SimMotorLog {
    /// Every command applied so far, oldest first.
    pub fn commands(&self) -> Vec<(Side, SideCommand)> {
        lock(&self.state).commands.clone()
    }

    /// Most recent command applied to `side`.
    pub fn last(&self, side: Side) -> Option<SideCommand> {
        lock(&self.state)
            .commands
            .iter()
            .rev()
            .find(|(s, _)| *s == side)
            .map(|(_, c)| *c)
    }

    /// Make every subsequent command fail.
    pub fn set_failing(&self, failing: bool) {
        lock(&self.state).failing = failing;
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Simulated environment package
// ────────────────────────────────────────────────────────────────────────────

/// A simulated environment package. Each sample drifts slightly upward so
/// averaging is observable.
pub struct SimEnvironmentSensor {
    id: String,
    base: EnvironmentReading,
    samples: u32,
    failing: Arc<AtomicBool>,
}

#[derive(Clone)]
pub struct SimEnvironmentHandle {
    failing: Arc<AtomicBool>,
}

impl SimEnvironmentSensor {
    pub fn new(id: impl Into<String>) -> (Self, SimEnvironmentHandle) {
        let failing = Arc::new(AtomicBool::new(false));
        let handle = SimEnvironmentHandle {
            failing: Arc::clone(&failing),
        };
        (
            Self {
                id: id.into(),
                base: EnvironmentReading {
                    temperature_c: Some(25.0),
                    humidity: Some(45.0),
                    soil_ph: Some(6.8),
                    soil_voltage: Some(2.1),
                },
                samples: 0,
                failing,
            },
            handle,
        )
    }
}

impl EnvironmentSensor for SimEnvironmentSensor {
    fn id(&self) -> &str {
        &self.id
    }

    fn read(&mut self) -> Result<EnvironmentReading, RoverError> {
        if self.failing.load(Ordering::Acquire) {
            return Err(RoverError::SensorUnavailable {
                component: self.id.clone(),
                details: "simulated read failure".to_string(),
            });
        }
        let n = f64::from(self.samples);
        self.samples += 1;
        Ok(EnvironmentReading {
            temperature_c: self.base.temperature_c.map(|t| t + 0.1 * n),
            humidity: self.base.humidity.map(|h| h + 0.5 * n),
            soil_ph: self.base.soil_ph.map(|p| p + 0.05 * n),
            soil_voltage: self.base.soil_voltage,
        })
    }
}

impl SimEnvironmentHandle {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Release);
    }
}

// ────────────────────────────────────────────────────────────────────────────
// SimHardware builder
// ────────────────────────────────────────────────────────────────────────────

/// Builder that assembles a [`HardwareSet`] from simulated drivers.
#[derive(Default)]
pub struct SimHardware {
    cameras: Vec<(Direction, SimFrameSource)>,
    proximity: Vec<(Direction, SimProximitySensor)>,
    policy: ProximityFailurePolicy,
    motor: Option<(SimMotorDriver, DriveConfig)>,
    environment: Option<SimEnvironmentSensor>,
}

impl SimHardware {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_camera(mut self, direction: Direction, camera: SimFrameSource) -> Self {
        self.cameras.push((direction, camera));
        self
    }

    pub fn with_proximity(mut self, direction: Direction, sensor: SimProximitySensor) -> Self {
        self.proximity.push((direction, sensor));
        self
    }

    pub fn with_failure_policy(mut self, policy: ProximityFailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Use `driver` for the drive base. Without this a silent driver is fitted.
    pub fn with_motor(mut self, driver: SimMotorDriver, config: DriveConfig) -> Self {
        self.motor = Some((driver, config));
        self
    }

    pub fn with_environment(mut self, sensor: SimEnvironmentSensor) -> Self {
        self.environment = Some(sensor);
        self
    }

    /// Consume the builder and return a fully wired [`HardwareSet`].
    pub fn build(self) -> HardwareSet {
        let mut array = ProximityArray::new(self.policy);
        for (direction, sensor) in self.proximity {
            array = array.with_sensor(direction, Box::new(sensor));
        }
        let (driver, config) = self
            .motor
            .unwrap_or_else(|| (SimMotorDriver::new("sim/l298n").0, DriveConfig::default()));
        let mut set = HardwareSet::new(
            Box::new(array),
            Box::new(TimedDrive::with_config(driver, config)),
        );
        for (direction, camera) in self.cameras {
            set = set.with_camera(direction, Box::new(camera));
        }
        if let Some(sensor) = self.environment {
            set = set.with_environment(Box::new(sensor));
        }
        set
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proximity::ProximitySensor;

    #[test]
    fn scene_frame_draws_dark_boxes() {
        let frame = scene_frame(10, 10, &[SceneBox { x: 2, y: 3, width: 2, height: 2 }]);
        assert_eq!(frame.data.len(), 100);
        assert_eq!(frame.data[3 * 10 + 2], 0);
        assert_eq!(frame.data[0], 255);
        assert_eq!(frame.data[5 * 10 + 2], 255);
    }

    #[test]
    fn disconnected_camera_stays_unavailable() {
        let (mut cam, handle) = SimFrameSource::blank("camera/left", 4, 4);
        assert!(cam.read().is_ok());
        handle.disconnect();
        assert!(cam.read().is_err());
        handle.set_frame(scene_frame(4, 4, &[]));
        assert!(cam.read().is_err());
        assert_eq!(handle.reads(), 1);
    }

    #[test]
    fn proximity_handle_scripts_reading_and_failure() {
        let (mut ir, handle) = SimProximitySensor::new("ir/back");
        assert_eq!(ir.obstacle_present(), Ok(false));
        handle.set_obstacle(true);
        assert_eq!(ir.obstacle_present(), Ok(true));
        handle.set_failing(true);
        assert!(ir.obstacle_present().is_err());
    }

    #[test]
    fn environment_samples_drift() {
        let (mut env, _handle) = SimEnvironmentSensor::new("env/sim");
        let first = env.read().unwrap();
        let second = env.read().unwrap();
        assert!(second.temperature_c.unwrap() > first.temperature_c.unwrap());
        assert_eq!(first.soil_voltage, second.soil_voltage);
    }

    #[test]
    fn sim_hardware_full_stack_no_hardware_required() {
        let (cam, _c) = SimFrameSource::blank("camera/front", 16, 16);
        let (ir, ir_handle) = SimProximitySensor::new("ir/left");
        let (env, _e) = SimEnvironmentSensor::new("env/sim");
        let mut hardware = SimHardware::new()
            .with_camera(Direction::Front, cam)
            .with_proximity(Direction::Left, ir)
            .with_failure_policy(ProximityFailurePolicy::AssumeBlocked)
            .with_environment(env)
            .build();

        assert_eq!(hardware.camera_directions(), vec![Direction::Front]);
        ir_handle.set_failing(true);
        assert!(hardware.proximity_mut().read_all()[Direction::Left]);
        assert!(hardware.environment_mut().is_some());
    }

    #[test]
    fn motor_fault_is_actuation_failure() {
        let (mut driver, log) = SimMotorDriver::new("l298n");
        log.set_failing(true);
        let err = driver.set_side(Side::Left, SideCommand::BRAKE).unwrap_err();
        match err {
            RoverError::ActuationFailure { action, details } => {
                assert_eq!(action, ActionKind::Stop);
                assert!(details.contains("l298n"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(log.commands().is_empty());
    }
}
