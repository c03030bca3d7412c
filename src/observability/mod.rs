pub mod telemetry;

pub use telemetry::{init, TelemetryGuard};
