//! End-to-end navigation over simulated hardware: synthetic camera scenes go
//! through the full detector → arbiter → decision → actuator → tracker chain.

use std::time::Duration;

use rover_hal::actuator::{Rotation, Side};
use rover_hal::sim::{
    SceneBox, SimEnvironmentSensor, SimFrameSource, SimHardware, SimMotorDriver,
    SimProximitySensor, scene_frame,
};
use rover_hal::{DriveConfig, ShutdownSignal, shutdown_channel};
use rover_kernel::Confidence;
use rover_runtime::study::{STUDY_ACTION, StudyConfig};
use rover_runtime::{ControlLoop, ControlLoopConfig, JsonFileSink, MemorySink};
use rover_types::{ActionKind, Direction, RoverError, TelemetryRecord};

const W: u32 = 320;
const H: u32 = 240;

/// A large box dead ahead, inside the corridor.
const BOX_AHEAD: SceneBox = SceneBox {
    x: 120,
    y: 60,
    width: 80,
    height: 120,
};

fn no_study() -> ControlLoopConfig {
    ControlLoopConfig {
        study: StudyConfig {
            enabled: false,
            ..StudyConfig::default()
        },
        ..ControlLoopConfig::default()
    }
}

fn rover(config: ControlLoopConfig, hardware: rover_hal::HardwareSet) -> ControlLoop {
    ControlLoop::new(config, hardware, Box::new(MemorySink::new()), ShutdownSignal::never())
}

#[tokio::test(start_paused = true)]
async fn obstacle_ahead_turns_toward_clear_left_camera() {
    let (front, _f) = SimFrameSource::new("camera/front", scene_frame(W, H, &[BOX_AHEAD]));
    let (left, _l) = SimFrameSource::blank("camera/left", W, H);
    let (driver, motors) = SimMotorDriver::new("l298n");
    let hardware = SimHardware::new()
        .with_camera(Direction::Front, front)
        .with_camera(Direction::Left, left)
        .with_motor(driver, DriveConfig::default())
        .build();
    let mut rover = rover(no_study(), hardware);

    let report = rover.tick().await.unwrap();

    let front = &report.readings[Direction::Front];
    assert!(front.available);
    assert!(!front.clear);
    assert!(front.path_obstacle_count >= 1);
    assert!(report.readings[Direction::Left].clear);

    assert_eq!(report.vision.target, Some(Direction::Left));
    assert_eq!(report.vision.confidence, Confidence::Confident);
    assert_eq!(report.decision.action(), ActionKind::TurnLeft);
    assert_eq!(report.elapsed, Duration::from_millis(500));
    assert_eq!(report.pose.heading_degrees, 45.0);
    assert_eq!(report.pose.x, 0.0);

    // The turn ran both sides forward, then braked.
    let forward_left = motors
        .commands()
        .iter()
        .any(|(side, cmd)| *side == Side::Left && cmd.rotation == Rotation::Forward);
    assert!(forward_left);
    assert_eq!(motors.last(Side::Left).map(|c| c.rotation), Some(Rotation::Brake));
}

#[tokio::test(start_paused = true)]
async fn obstacle_off_corridor_keeps_driving_forward() {
    let off_corridor = SceneBox {
        x: 10,
        y: 60,
        width: 80,
        height: 120,
    };
    let (front, _f) = SimFrameSource::new("camera/front", scene_frame(W, H, &[off_corridor]));
    let hardware = SimHardware::new().with_camera(Direction::Front, front).build();
    let mut rover = rover(no_study(), hardware);

    let report = rover.tick().await.unwrap();
    let front = &report.readings[Direction::Front];
    assert!(front.clear);
    assert!(front.obstacle_count >= 1);
    assert_eq!(front.path_obstacle_count, 0);
    assert_eq!(report.decision.action(), ActionKind::Forward);
    assert!((report.pose.x - 0.3).abs() < 1e-9);
}

#[tokio::test(start_paused = true)]
async fn front_infrared_overrides_clear_vision() {
    let (front, _f) = SimFrameSource::blank("camera/front", W, H);
    let (ir, ir_handle) = SimProximitySensor::new("ir/front");
    let hardware = SimHardware::new()
        .with_camera(Direction::Front, front)
        .with_proximity(Direction::Front, ir)
        .build();
    let mut rover = rover(no_study(), hardware);

    ir_handle.set_obstacle(true);
    let report = rover.tick().await.unwrap();
    assert!(report.readings[Direction::Front].clear);
    assert_eq!(report.decision.action(), ActionKind::Stop);
    assert_eq!(report.decision.direction(), None);
    assert_eq!(report.pose, rover_types::Pose::default());

    ir_handle.set_obstacle(false);
    let report = rover.tick().await.unwrap();
    assert_eq!(report.decision.action(), ActionKind::Forward);
}

#[tokio::test(start_paused = true)]
async fn blocked_turn_falls_back_to_other_side() {
    let (front, _f) = SimFrameSource::new("camera/front", scene_frame(W, H, &[BOX_AHEAD]));
    let (left, _l) = SimFrameSource::blank("camera/left", W, H);
    let (left_ir, left_handle) = SimProximitySensor::new("ir/left");
    let hardware = SimHardware::new()
        .with_camera(Direction::Front, front)
        .with_camera(Direction::Left, left)
        .with_proximity(Direction::Left, left_ir)
        .build();
    let mut rover = rover(no_study(), hardware);

    left_handle.set_obstacle(true);
    let report = rover.tick().await.unwrap();
    assert_eq!(report.vision.target, Some(Direction::Left));
    assert_eq!(report.decision.action(), ActionKind::TurnRight);
    assert_eq!(report.pose.heading_degrees, 315.0);
}

#[tokio::test(start_paused = true)]
async fn disconnected_camera_is_skipped() {
    let (front, front_handle) = SimFrameSource::blank("camera/front", W, H);
    let (right, _r) = SimFrameSource::blank("camera/right", W, H);
    let hardware = SimHardware::new()
        .with_camera(Direction::Front, front)
        .with_camera(Direction::Right, right)
        .build();
    let mut rover = rover(no_study(), hardware);

    front_handle.disconnect();
    let report = rover.tick().await.unwrap();
    assert!(!report.readings[Direction::Front].available);
    assert_eq!(report.vision.target, Some(Direction::Right));
    assert_eq!(report.decision.action(), ActionKind::TurnRight);
}

#[tokio::test(start_paused = true)]
async fn operator_interrupt_cuts_command_short() {
    let (front, _f) = SimFrameSource::blank("camera/front", W, H);
    let (driver, motors) = SimMotorDriver::new("l298n");
    let hardware = SimHardware::new()
        .with_camera(Direction::Front, front)
        .with_motor(driver, DriveConfig::default())
        .build();
    let (trigger, signal) = shutdown_channel();
    let mut rover = ControlLoop::new(no_study(), hardware, Box::new(MemorySink::new()), signal);

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(500)).await;
        trigger.trigger();
    });

    let report = rover.tick().await.unwrap();
    assert_eq!(report.decision.action(), ActionKind::Forward);
    assert_eq!(report.elapsed, Duration::from_millis(500));
    assert!((report.pose.x - 0.075).abs() < 1e-9);
    assert_eq!(motors.last(Side::Right).map(|c| c.rotation), Some(Rotation::Brake));

    assert_eq!(rover.tick().await.unwrap_err(), RoverError::Interrupted);
    let pose = rover.shutdown();
    assert!((pose.x - 0.075).abs() < 1e-9);
}

#[tokio::test(start_paused = true)]
async fn run_persists_json_log_and_csv_on_shutdown() {
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("logs/rover_data_log.json");
    let csv_path = dir.path().join("rover_data.csv");

    let (front, _f) = SimFrameSource::blank("camera/front", W, H);
    let (environment, _env) = SimEnvironmentSensor::new("env/sim");
    let hardware = SimHardware::new()
        .with_camera(Direction::Front, front)
        .with_environment(environment)
        .build();
    let config = ControlLoopConfig {
        max_ticks: Some(2),
        csv_path: Some(csv_path.clone()),
        ..ControlLoopConfig::default()
    };
    let mut rover = ControlLoop::new(
        config,
        hardware,
        Box::new(JsonFileSink::new(&log_path)),
        ShutdownSignal::never(),
    );

    rover.run().await;
    assert!(!log_path.exists(), "below the save threshold nothing is written yet");
    let pose = rover.shutdown();
    assert!((pose.x - 0.6).abs() < 1e-9);
    assert!(rover.hardware().is_released());

    let saved: Vec<TelemetryRecord> =
        serde_json::from_str(&std::fs::read_to_string(&log_path).unwrap()).unwrap();
    let actions: Vec<&str> = saved.iter().map(|r| r.action.as_str()).collect();
    assert_eq!(actions, [STUDY_ACTION, "forward", "forward"]);

    let study = saved[0].environment.unwrap();
    assert_eq!(study.temperature_c, Some(25.1));
    assert_eq!(study.soil_ph, Some(6.85));
    assert_eq!(saved[2].position.x, 0.6);

    let csv = std::fs::read_to_string(&csv_path).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 4);
    assert_eq!(lines[0], "timestamp,x,y,heading,temperature,humidity,soil_ph,action");
    assert!(lines[1].ends_with(",0,0,0,25.1,45.5,6.85,STUDY_LOCATION"));
    assert!(lines[3].ends_with(",0.6,0,0,,,,forward"));
}

#[tokio::test(start_paused = true)]
async fn failed_brake_after_timed_move_still_tracks_the_move() {
    let (front, _f) = SimFrameSource::blank("camera/front", W, H);
    let (driver, motors) = SimMotorDriver::new("l298n");
    let hardware = SimHardware::new()
        .with_camera(Direction::Front, front)
        .with_motor(driver, DriveConfig::default())
        .build();
    let mut rover = rover(no_study(), hardware);

    let fault = motors.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(1900)).await;
        fault.set_failing(true);
    });

    let err = rover.tick().await.unwrap_err();
    assert!(matches!(
        err,
        RoverError::ActuationFailure { action: ActionKind::Stop, .. }
    ));
    assert!((rover.pose().x - 0.3).abs() < 1e-9);
    let records = rover.sink().records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].action, "forward");
    assert_eq!(records[0].position.x, 0.3);

    motors.set_failing(false);
    let report = rover.tick().await.unwrap();
    assert!((report.pose.x - 0.6).abs() < 1e-9);
}
