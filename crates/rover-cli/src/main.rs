//! `rover` – autonomous rover command line.
//!
//! This binary is the ignition switch for the navigation stack. It:
//!
//! 1. Loads `~/.rover/config.toml`, writing defaults on first run.
//! 2. Wires the simulated hardware set (cameras, infrared array, L298N-style
//!    drive, environment package) described by the config.
//! 3. Runs the sense → decide → act loop until **Ctrl-C**, which preempts
//!    any running motor command.
//! 4. Stops the motors, saves telemetry, exports CSV, and prints the final
//!    pose estimate.

mod config;

use colored::Colorize;
use rover_hal::sim::{
    SceneBox, SimEnvironmentSensor, SimFrameSource, SimHardware, SimProximitySensor, scene_frame,
};
use rover_hal::{HardwareSet, ShutdownTrigger, shutdown_channel};
use rover_runtime::{ControlLoop, JsonFileSink, MemorySink, TelemetrySink, init_tracing};
use rover_types::Direction;
use tracing::{error, info, warn};

use crate::config::RoverConfig;

const FRAME_WIDTH: u32 = 640;
const FRAME_HEIGHT: u32 = 480;

fn main() {
    // Must precede the Tokio runtime; see `rover_runtime::telemetry`.
    let _guard = init_tracing("rover");

    print_banner();

    let cfg = load_config();
    info!(?cfg, "configuration resolved");

    let (trigger, signal) = shutdown_channel();
    install_interrupt(trigger);

    let hardware = sim_hardware(&cfg);
    let sink: Box<dyn TelemetrySink> = if cfg.log_to_file {
        println!("  Telemetry log: {}", cfg.log_path.display().to_string().bold());
        Box::new(JsonFileSink::new(&cfg.log_path))
    } else {
        Box::new(MemorySink::new())
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "failed to start async runtime");
            std::process::exit(1);
        }
    };

    println!(
        "  Driving at speed {} – press {} to stop.\n",
        cfg.movement_speed.to_string().bold(),
        "Ctrl-C".bold().yellow()
    );

    let mut rover = ControlLoop::new(cfg.control_loop(), hardware, sink, signal);
    runtime.block_on(rover.run());
    let pose = rover.shutdown();

    println!();
    println!(
        "  {} Final position: x={:.2} m, y={:.2} m, heading={:.1}°",
        "✓".green().bold(),
        pose.x,
        pose.y,
        pose.heading_degrees
    );
    println!(
        "  {} {} telemetry record(s) over {} tick(s).",
        "✓".green().bold(),
        rover.sink().records().len(),
        rover.ticks()
    );
}

// ─────────────────────────────────────────────────────────────────────────────
// Setup
// ─────────────────────────────────────────────────────────────────────────────

fn load_config() -> RoverConfig {
    match config::load() {
        Ok(Some(cfg)) => {
            println!(
                "  Config loaded from {}",
                config::config_path().display().to_string().bold()
            );
            cfg
        }
        Ok(None) => {
            let cfg = RoverConfig::default();
            match config::save(&cfg) {
                Ok(()) => println!(
                    "  {} Default config written to {}",
                    "✓".green().bold(),
                    config::config_path().display().to_string().bold()
                ),
                Err(e) => warn!(error = %e, "could not write default config"),
            }
            with_overrides(cfg)
        }
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
            with_overrides(RoverConfig::default())
        }
    }
}

fn with_overrides(mut cfg: RoverConfig) -> RoverConfig {
    config::apply_env_overrides(&mut cfg);
    cfg
}

fn install_interrupt(trigger: ShutdownTrigger) {
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!(
            "{}",
            "⚠  Ctrl-C received – stopping motors …".yellow().bold()
        );
        trigger.trigger();
    }) {
        warn!(error = %e, "failed to install Ctrl-C handler; the loop can only end on its own");
    }
}

/// Simulated rover: one camera per configured direction, an infrared sensor
/// on every side, and the environment package. The front camera sees a
/// single box off to the left of the corridor.
fn sim_hardware(cfg: &RoverConfig) -> HardwareSet {
    let mut builder = SimHardware::new().with_failure_policy(cfg.failure_policy());

    for &direction in &cfg.cameras {
        let boxes: &[SceneBox] = match direction {
            Direction::Front => &[SceneBox {
                x: 40,
                y: 180,
                width: 100,
                height: 120,
            }],
            _ => &[],
        };
        let (camera, _handle) = SimFrameSource::new(
            format!("camera/{direction}"),
            scene_frame(FRAME_WIDTH, FRAME_HEIGHT, boxes),
        );
        builder = builder.with_camera(direction, camera);
    }
    for direction in Direction::ALL {
        let (sensor, _handle) = SimProximitySensor::new(format!("ir/{direction}"));
        builder = builder.with_proximity(direction, sensor);
    }
    let (environment, _handle) = SimEnvironmentSensor::new("env/sim");

    builder.with_environment(environment).build()
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", r#"   ___                      "#.bold().cyan());
    println!("{}", r#"  / _ \___ _  _____ ____    "#.bold().cyan());
    println!("{}", r#" / , _/ _ \ |/ / -_) __/    "#.bold().cyan());
    println!("{}", r#"/_/|_|\___/___/\__/_/       "#.bold().cyan());
    println!();
    println!(
        "  {} {}",
        "Rover".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Sensor-fusion navigation");
    println!();
}
