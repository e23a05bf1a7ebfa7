//! Timed, cancellable drive commands over a two-channel motor driver.
//!
//! The platform is a skid-steer base whose wheels are wired in left/right
//! pairs onto one dual H-bridge. A [`MotorDriver`] only knows how to set one
//! side's rotation and PWM duty; [`TimedDrive`] turns an [`ActionKind`] into
//! per-side commands, owns the command's timing, and lets an operator
//! interrupt preempt it.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use rover_hal::actuator::{Actuator, DriveCommand, TimedDrive};
//! use rover_hal::signal::ShutdownSignal;
//! use rover_hal::sim::SimMotorDriver;
//! use rover_types::ActionKind;
//!
//! let rt = tokio::runtime::Runtime::new().unwrap();
//! rt.block_on(async {
//!     let (driver, _log) = SimMotorDriver::new("l298n");
//!     let mut drive = TimedDrive::new(driver);
//!     let mut signal = ShutdownSignal::never();
//!     let cmd = DriveCommand::new(ActionKind::Forward, 50, Some(Duration::from_millis(5)));
//!     let executed = drive.execute(cmd, &mut signal).await.unwrap();
//!     assert!(executed.elapsed >= Duration::from_millis(5));
//!     assert!(executed.brake_fault.is_none());
//! });
//! ```

use std::time::Duration;

use async_trait::async_trait;
use rover_types::{ActionKind, RoverError};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::signal::ShutdownSignal;

/// Highest PWM duty accepted by the drivers.
pub const MAX_SPEED: u8 = 100;

/// One side of the drive base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Left,
    Right,
}

/// H-bridge direction for one side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rotation {
    Forward,
    Backward,
    /// Both bridge inputs low, duty zero.
    Brake,
}

/// Command for one side of the drive base.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SideCommand {
    pub rotation: Rotation,
    /// PWM duty, `0..=100`.
    pub duty: u8,
}

impl SideCommand {
    pub const BRAKE: SideCommand = SideCommand {
        rotation: Rotation::Brake,
        duty: 0,
    };

    fn new(rotation: Rotation, duty: f64) -> Self {
        Self {
            rotation,
            duty: duty.clamp(0.0, f64::from(MAX_SPEED)) as u8,
        }
    }
}

/// Low-level dual-channel motor driver (e.g. an L298N on GPIO/PWM pins).
pub trait MotorDriver: Send {
    /// Stable identifier, e.g. `"l298n"`.
    fn id(&self) -> &str;

    /// Apply `command` to `side`.
    ///
    /// # Errors
    ///
    /// Returns [`RoverError::ActuationFailure`] when the command cannot be
    /// applied to the hardware.
    fn set_side(&mut self, side: Side, command: SideCommand) -> Result<(), RoverError>;
}

/// A movement request as handed to the [`Actuator`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriveCommand {
    pub action: ActionKind,
    /// Cruise speed, `0..=100`.
    pub speed: u8,
    /// Run time; `None` runs until an explicit [`Actuator::stop`].
    pub duration: Option<Duration>,
}

impl DriveCommand {
    /// Build a command, clamping `speed` to [`MAX_SPEED`].
    pub fn new(action: ActionKind, speed: u8, duration: Option<Duration>) -> Self {
        Self {
            action,
            speed: speed.min(MAX_SPEED),
            duration,
        }
    }
}

/// Speed shaping applied when mapping actions onto the two sides.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriveConfig {
    /// Fraction of cruise speed used for gradual turns.
    pub turn_speed_factor: f64,
    /// Fraction of turn speed applied to the inner side during a turn.
    pub inner_side_factor: f64,
    /// Fraction of cruise speed used for in-place spins.
    pub spin_speed_factor: f64,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            turn_speed_factor: 0.6,
            inner_side_factor: 0.3,
            spin_speed_factor: 0.7,
        }
    }
}

impl DriveConfig {
    /// Per-side commands `(left, right)` for `action` at cruise `speed`.
    pub fn side_commands(&self, action: ActionKind, speed: u8) -> (SideCommand, SideCommand) {
        use Rotation::{Backward, Forward};

        let cruise = f64::from(speed.min(MAX_SPEED));
        let turn = (cruise * self.turn_speed_factor).trunc();
        let inner = (turn * self.inner_side_factor).trunc();
        let spin = (cruise * self.spin_speed_factor).trunc();
        match action {
            ActionKind::Forward => (SideCommand::new(Forward, cruise), SideCommand::new(Forward, cruise)),
            ActionKind::Backward => (SideCommand::new(Backward, cruise), SideCommand::new(Backward, cruise)),
            ActionKind::TurnLeft => (SideCommand::new(Forward, inner), SideCommand::new(Forward, turn)),
            ActionKind::TurnRight => (SideCommand::new(Forward, turn), SideCommand::new(Forward, inner)),
            ActionKind::SpinLeft => (SideCommand::new(Backward, spin), SideCommand::new(Forward, spin)),
            ActionKind::SpinRight => (SideCommand::new(Forward, spin), SideCommand::new(Backward, spin)),
            ActionKind::Stop => (SideCommand::BRAKE, SideCommand::BRAKE),
        }
    }
}

/// Outcome of a command that started moving the platform.
#[derive(Debug, Clone, PartialEq)]
pub struct Executed {
    /// Time the motors actually ran.
    pub elapsed: Duration,
    /// Set when the closing brake failed. The motion still happened.
    pub brake_fault: Option<RoverError>,
}

impl Executed {
    pub fn clean(elapsed: Duration) -> Self {
        Self {
            elapsed,
            brake_fault: None,
        }
    }
}

/// Executes [`DriveCommand`]s and owns their timing.
#[async_trait]
pub trait Actuator: Send {
    /// Run `command` to completion or until `signal` fires, then stop.
    ///
    /// A `Stop` command returns immediately with zero elapsed. Once the
    /// motors have started, the outcome is always `Ok` and carries the
    /// elapsed time; a failed closing brake is reported in
    /// [`Executed::brake_fault`].
    ///
    /// # Errors
    ///
    /// - [`RoverError::Interrupted`] if `signal` had already fired; the
    ///   motors are stopped and the command is not started.
    /// - [`RoverError::ActuationFailure`] if the driver rejects the command
    ///   before anything moved.
    async fn execute(
        &mut self,
        command: DriveCommand,
        signal: &mut ShutdownSignal,
    ) -> Result<Executed, RoverError>;

    /// Brake both sides immediately.
    fn stop(&mut self) -> Result<(), RoverError>;
}

/// [`Actuator`] on top of any [`MotorDriver`].
pub struct TimedDrive<M> {
    driver: M,
    config: DriveConfig,
}

impl<M: MotorDriver> TimedDrive<M> {
    pub fn new(driver: M) -> Self {
        Self::with_config(driver, DriveConfig::default())
    }

    pub fn with_config(driver: M, config: DriveConfig) -> Self {
        Self { driver, config }
    }

    fn apply(&mut self, action: ActionKind, speed: u8) -> Result<(), RoverError> {
        let (left, right) = self.config.side_commands(action, speed);
        self.driver
            .set_side(Side::Left, left)
            .and_then(|()| self.driver.set_side(Side::Right, right))
            .map_err(|e| {
                let details = match e {
                    RoverError::ActuationFailure { details, .. } => details,
                    other => other.to_string(),
                };
                RoverError::ActuationFailure { action, details }
            })
    }
}

#[async_trait]
impl<M: MotorDriver> Actuator for TimedDrive<M> {
    async fn execute(
        &mut self,
        command: DriveCommand,
        signal: &mut ShutdownSignal,
    ) -> Result<Executed, RoverError> {
        if signal.is_triggered() {
            self.stop()?;
            return Err(RoverError::Interrupted);
        }
        if command.action == ActionKind::Stop {
            self.stop()?;
            return Ok(Executed::clean(Duration::ZERO));
        }

        debug!(driver = self.driver.id(), action = %command.action, speed = command.speed, "drive start");
        if let Err(e) = self.apply(command.action, command.speed) {
            // Never leave one side running after a half-applied command.
            if let Err(stop_err) = self.stop() {
                warn!(error = %stop_err, "brake after failed command also failed");
            }
            return Err(e);
        }
        let started = Instant::now();

        let Some(duration) = command.duration else {
            return Ok(Executed::clean(started.elapsed()));
        };
        tokio::select! {
            _ = tokio::time::sleep(duration) => {}
            _ = signal.triggered() => {
                debug!(action = %command.action, "drive preempted by interrupt");
            }
        }
        let elapsed = started.elapsed();
        let brake_fault = self.stop().err();
        if let Some(e) = &brake_fault {
            warn!(error = %e, action = %command.action, "brake after timed command failed");
        }
        Ok(Executed {
            elapsed,
            brake_fault,
        })
    }

    fn stop(&mut self) -> Result<(), RoverError> {
        self.apply(ActionKind::Stop, 0)
    }
}
