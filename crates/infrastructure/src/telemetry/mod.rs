//! Telemetry
//!
//! Installs the process-wide `tracing` subscriber used by the bridge.

mod subscriber;

pub use subscriber::{TelemetryConfig, TelemetryError, init_telemetry};
