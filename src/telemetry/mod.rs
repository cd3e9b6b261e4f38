//! Telemetry and logging infrastructure

pub mod logging;

pub use logging::{init_logging, LogConfig, LogFormat, LogGuard};
