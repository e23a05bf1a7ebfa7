//! `rover-runtime` – the control loop that drives the rover.
//!
//! # Modules
//!
//! - [`control_loop`] – [`ControlLoop`][control_loop::ControlLoop]: the
//!   sequential study → see → feel → decide → act → track → log cycle over a
//!   [`HardwareSet`][rover_hal::HardwareSet].
//! - [`data_log`] – [`TelemetrySink`][data_log::TelemetrySink] with JSON file
//!   and in-memory implementations, plus CSV export.
//! - [`study`] – periodic location studies: scheduling and averaging of
//!   environment samples.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]:
//!   initialises the global `tracing` subscriber with an optional OTLP span
//!   exporter. Set `OTEL_EXPORTER_OTLP_ENDPOINT` to enable live trace export.

pub mod control_loop;
pub mod data_log;
pub mod study;
pub mod telemetry;

pub use control_loop::{ControlLoop, ControlLoopConfig, TickReport};
pub use data_log::{JsonFileSink, MemorySink, TelemetrySink, export_csv};
pub use study::{StudyConfig, StudyScheduler};
pub use telemetry::{TracerProviderGuard, init_tracing};
