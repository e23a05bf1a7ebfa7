//! [`ControlLoop`] – the rover's sense → decide → act cycle.
//!
//! Each tick runs strictly in order:
//!
//! 1. **Study** – if a location study is due, halt and sample the
//!    environment package.
//! 2. **See** – [`ObstacleDetector`] analyses every fitted camera.
//! 3. **Feel** – the proximity array is snapshotted.
//! 4. **Arbitrate** – [`DirectionArbiter`] picks a vision direction.
//! 5. **Decide** – [`DecisionEngine`] fuses proximity and vision into one
//!    [`NavigationDecision`]; front proximity always stops.
//! 6. **Act** – the actuator runs the timed command, preemptible by the
//!    operator interrupt, and reports the time it actually ran.
//! 7. **Track** – [`PositionTracker`] integrates the decision over that
//!    actual elapsed time.
//! 8. **Log** – a telemetry record is appended.
//!
//! An actuation failure re-issues a stop, skips steps 7–8 and surfaces to
//! the caller; [`ControlLoop::run`] logs it and keeps going.
//!
//! # Example
//!
//! ```rust,no_run
//! use rover_hal::sim::{SimFrameSource, SimHardware};
//! use rover_hal::shutdown_channel;
//! use rover_runtime::control_loop::{ControlLoop, ControlLoopConfig};
//! use rover_runtime::data_log::MemorySink;
//! use rover_types::Direction;
//!
//! # async fn demo() {
//! let (camera, _cam) = SimFrameSource::blank("camera/front", 320, 240);
//! let hardware = SimHardware::new().with_camera(Direction::Front, camera).build();
//! let (_trigger, signal) = shutdown_channel();
//!
//! let mut rover = ControlLoop::new(
//!     ControlLoopConfig::default(),
//!     hardware,
//!     Box::new(MemorySink::new()),
//!     signal,
//! );
//! rover.run().await;
//! let final_pose = rover.shutdown();
//! # }
//! ```

use std::path::PathBuf;
use std::time::Duration;

use chrono::Utc;
use rover_hal::{DriveCommand, HardwareSet, ShutdownSignal};
use rover_kernel::{DecisionEngine, DecisionTimings, DirectionArbiter, VisionRecommendation};
use rover_perception::{DetectorConfig, ObstacleDetector, PositionTracker, TrackerConfig};
use rover_types::{
    DirectionMap, DirectionReading, EnvironmentReading, NavigationDecision, Pose, ProximityStatus,
    RoverError, TelemetryRecord,
};
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::data_log::{TelemetrySink, export_csv};
use crate::study::{STUDY_ACTION, StudyConfig, StudyScheduler, pause, sample_environment};

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration bundle for [`ControlLoop`].
#[derive(Debug, Clone)]
pub struct ControlLoopConfig {
    /// Cruise speed passed to the actuator, 0–100.
    pub movement_speed: u8,
    /// Idle time between ticks.
    pub loop_interval: Duration,
    /// Stop [`ControlLoop::run`] after this many ticks. `None` runs until
    /// interrupted.
    pub max_ticks: Option<u64>,
    pub detector: DetectorConfig,
    pub tracker: TrackerConfig,
    pub timings: DecisionTimings,
    pub study: StudyConfig,
    /// Where [`ControlLoop::shutdown`] exports the CSV table, if anywhere.
    pub csv_path: Option<PathBuf>,
}

impl Default for ControlLoopConfig {
    fn default() -> Self {
        Self {
            movement_speed: 50,
            loop_interval: Duration::from_millis(500),
            max_ticks: None,
            detector: DetectorConfig::default(),
            tracker: TrackerConfig::default(),
            timings: DecisionTimings::default(),
            study: StudyConfig::default(),
            csv_path: None,
        }
    }
}

/// Everything that happened during one successful tick.
#[derive(Debug, Clone)]
pub struct TickReport {
    pub tick: u64,
    /// A location study ran before this tick's decision.
    pub studied: bool,
    pub readings: DirectionMap<DirectionReading>,
    pub proximity: ProximityStatus,
    pub vision: VisionRecommendation,
    pub decision: NavigationDecision,
    /// Time the command actually ran.
    pub elapsed: Duration,
    pub pose: Pose,
}

// ─────────────────────────────────────────────────────────────────────────────
// ControlLoop
// ─────────────────────────────────────────────────────────────────────────────

pub struct ControlLoop {
    config: ControlLoopConfig,
    hardware: HardwareSet,
    detector: ObstacleDetector,
    arbiter: DirectionArbiter,
    engine: DecisionEngine,
    tracker: PositionTracker,
    study: StudyScheduler,
    sink: Box<dyn TelemetrySink>,
    signal: ShutdownSignal,
    ticks: u64,
}

impl ControlLoop {
    pub fn new(
        config: ControlLoopConfig,
        hardware: HardwareSet,
        sink: Box<dyn TelemetrySink>,
        signal: ShutdownSignal,
    ) -> Self {
        Self {
            detector: ObstacleDetector::new(config.detector.clone()),
            arbiter: DirectionArbiter::new(),
            engine: DecisionEngine::new(config.timings),
            tracker: PositionTracker::new(config.tracker),
            study: StudyScheduler::new(config.study.clone()),
            config,
            hardware,
            sink,
            signal,
            ticks: 0,
        }
    }

    /// Last committed pose estimate.
    pub fn pose(&self) -> Pose {
        self.tracker.pose()
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn sink(&self) -> &dyn TelemetrySink {
        self.sink.as_ref()
    }

    pub fn hardware(&self) -> &HardwareSet {
        &self.hardware
    }

    // -------------------------------------------------------------------------
    // Tick
    // -------------------------------------------------------------------------

    /// Run one full cycle.
    ///
    /// # Errors
    ///
    /// - [`RoverError::Interrupted`] if the operator interrupt has fired or
    ///   the hardware has been released.
    /// - [`RoverError::ActuationFailure`] if the command could not be
    ///   started. The motors have been told to stop and the pose is
    ///   unchanged.
    /// - [`RoverError::ActuationFailure`] if the closing brake failed. The
    ///   motion that did happen has already been integrated and logged, and
    ///   a stop has been re-issued.
    #[instrument(level = "debug", skip(self), fields(tick = self.ticks + 1))]
    pub async fn tick(&mut self) -> Result<TickReport, RoverError> {
        if self.signal.is_triggered() || self.hardware.is_released() {
            return Err(RoverError::Interrupted);
        }
        self.ticks += 1;

        let studied = self.study.is_due(Instant::now());
        if studied {
            self.study_location().await?;
        }

        let readings = self.detector.analyze_all(self.hardware.cameras_mut());
        let proximity = self.hardware.proximity_mut().read_all();
        let vision = self.arbiter.best_vision_direction(&readings);
        let decision = self.engine.decide(&proximity, &vision);
        debug!(
            target_direction = ?vision.target,
            confidence = ?vision.confidence,
            vision_reason = %vision.reason,
            "vision arbitrated"
        );

        let duration = command_duration(decision.duration());
        let command = DriveCommand::new(decision.action(), self.config.movement_speed, Some(duration));
        let executed = match self
            .hardware
            .actuator_mut()
            .execute(command, &mut self.signal)
            .await
        {
            Ok(executed) => executed,
            Err(RoverError::Interrupted) => return Err(RoverError::Interrupted),
            Err(e) => {
                warn!(error = %e, action = %decision.action(), "actuation failed; re-issuing stop");
                self.reissue_stop();
                return Err(e);
            }
        };
        let elapsed = executed.elapsed;

        // The platform moved for `elapsed` even if the closing brake failed.
        let pose = self.tracker.update(&decision, elapsed.as_secs_f64());
        info!(
            tick = self.ticks,
            action = %decision.action(),
            reason = decision.reason(),
            elapsed_ms = elapsed.as_millis() as u64,
            x = pose.x,
            y = pose.y,
            heading = pose.heading_degrees,
            "decision executed"
        );
        self.log(decision.action().label(), proximity, None);

        if let Some(fault) = executed.brake_fault {
            warn!(error = %fault, action = %decision.action(), "brake failed after command; re-issuing stop");
            self.reissue_stop();
            return Err(fault);
        }

        Ok(TickReport {
            tick: self.ticks,
            studied,
            readings,
            proximity,
            vision,
            decision,
            elapsed,
            pose,
        })
    }

    fn reissue_stop(&mut self) {
        if let Err(e) = self.hardware.actuator_mut().stop() {
            warn!(error = %e, "re-issued stop also failed");
        }
    }

    /// Halt, sample the environment, log a study record, and settle.
    async fn study_location(&mut self) -> Result<(), RoverError> {
        let pose = self.tracker.pose();
        info!(x = pose.x, y = pose.y, heading = pose.heading_degrees, "studying location");
        if let Err(e) = self.hardware.actuator_mut().stop() {
            warn!(error = %e, "failed to halt before study");
        }

        let environment = match self.hardware.environment_mut() {
            Some(sensor) => sample_environment(sensor, self.study.config(), &mut self.signal).await?,
            None => {
                warn!("no environment sensor fitted; study record carries no reading");
                None
            }
        };
        let proximity = self.hardware.proximity_mut().read_all();
        self.log(STUDY_ACTION, proximity, environment);
        self.study.mark_done(Instant::now());

        if let Some(env) = environment {
            info!(
                temperature_c = env.temperature_c,
                humidity = env.humidity,
                soil_ph = env.soil_ph,
                soil_voltage = env.soil_voltage,
                "study complete"
            );
        }
        pause(self.study.config().settle, &mut self.signal).await
    }

    fn log(
        &mut self,
        action: &str,
        obstacles: ProximityStatus,
        environment: Option<EnvironmentReading>,
    ) {
        let record = TelemetryRecord {
            timestamp: Utc::now(),
            position: self.tracker.pose().report(),
            action: action.to_string(),
            obstacles,
            environment,
        };
        if let Err(e) = self.sink.record(record) {
            warn!(error = %e, "telemetry write failed; continuing");
        }
    }

    // -------------------------------------------------------------------------
    // Run / shutdown
    // -------------------------------------------------------------------------

    /// Tick until interrupted or `max_ticks` is reached. Failed ticks are
    /// logged and do not stop the loop.
    pub async fn run(&mut self) {
        let timings = self.engine.timings();
        info!(
            speed = self.config.movement_speed,
            forward_secs = timings.forward,
            turn_secs = timings.turn,
            backward_secs = timings.backward,
            spin_secs = timings.spin,
            "control loop started"
        );
        loop {
            match self.tick().await {
                Ok(_) => {}
                Err(RoverError::Interrupted) => break,
                Err(e) => warn!(error = %e, tick = self.ticks, "tick failed; continuing"),
            }
            if self.config.max_ticks.is_some_and(|max| self.ticks >= max) {
                break;
            }
            if pause(self.config.loop_interval, &mut self.signal).await.is_err() {
                break;
            }
        }
        info!(ticks = self.ticks, "control loop stopped");
    }

    /// Stop the motors, persist telemetry, and release the hardware.
    ///
    /// Idempotent. Returns the last committed pose, which stays queryable
    /// through [`ControlLoop::pose`].
    pub fn shutdown(&mut self) -> Pose {
        if !self.hardware.is_released() {
            if let Err(e) = self.hardware.actuator_mut().stop() {
                warn!(error = %e, "failed to stop motors during shutdown");
            }
        }
        if let Err(e) = self.sink.flush() {
            warn!(error = %e, "failed to flush telemetry during shutdown");
        }
        if let Some(path) = &self.config.csv_path {
            if let Err(e) = export_csv(self.sink.records(), path) {
                warn!(error = %e, "CSV export failed");
            }
        }
        self.hardware.release();

        let pose = self.tracker.pose();
        info!(
            records = self.sink.records().len(),
            x = pose.x,
            y = pose.y,
            heading = pose.heading_degrees,
            "rover shutdown complete"
        );
        pose
    }
}

/// Nominal decision duration as a [`Duration`]. Negative, non-finite and
/// overflowing values become zero, which the actuator runs as an immediate
/// brake.
fn command_duration(seconds: f64) -> Duration {
    Duration::try_from_secs_f64(seconds).unwrap_or_else(|_| {
        warn!(seconds, "unusable command duration; treating as zero");
        Duration::ZERO
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
