//! `rover-hal` – hardware abstraction for the rover's external collaborators.
//!
//! The decision core never touches a device. Everything that blocks on
//! hardware lives behind a trait in this crate, and every concrete handle is
//! owned by a single [`HardwareSet`].
//!
//! # Modules
//!
//! - [`camera`] – [`FrameSource`]: one camera per sensing direction.
//! - [`proximity`] – [`ProximitySensor`] and [`ProximityArray`]: IR obstacle
//!   sensors with a configurable read-failure policy.
//! - [`actuator`] – [`Actuator`] and [`TimedDrive`]: timed, interruptible
//!   drive commands on a two-channel [`MotorDriver`].
//! - [`environment`] – [`EnvironmentSensor`]: temperature/humidity/soil probe.
//! - [`registry`] – [`HardwareSet`]: scoped owner of all handles.
//! - [`signal`] – operator interrupt channel.
//! - [`sim`] – simulated drivers for tests and demo runs.

pub mod actuator;
pub mod camera;
pub mod environment;
pub mod proximity;
pub mod registry;
pub mod signal;
pub mod sim;

pub use actuator::{Actuator, DriveCommand, DriveConfig, Executed, MotorDriver, TimedDrive};
pub use camera::{CameraFrame, FrameSource, PixelFormat};
pub use environment::EnvironmentSensor;
pub use proximity::{ProximityArray, ProximityFailurePolicy, ProximitySensor, ProximitySensorArray};
pub use registry::{CameraBank, HardwareSet};
pub use signal::{ShutdownSignal, ShutdownTrigger, shutdown_channel};
