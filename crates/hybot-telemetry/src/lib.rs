//! HyBot Telemetry - logging setup for the HyBot agent.
//!
//! Wraps `tracing-subscriber` and `tracing-appender` behind a small
//! [`LogConfig`] builder so every binary configures logging the same way.
//!
//! # Example
//!
//! ```rust,no_run
//! use hybot_telemetry::{LogConfig, LogFormat, setup_logging};
//!
//! # fn main() -> Result<(), hybot_telemetry::TelemetryError> {
//! let config = LogConfig::new("info")
//!     .with_format(LogFormat::Compact)
//!     .with_directive("hybot_guard=debug");
//!
//! // Keep the guard alive for the lifetime of the process.
//! let _guard = setup_logging(&config)?;
//! tracing::info!("logging ready");
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

mod error;
mod logging;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::{
    FileLogConfig, FileRotation, LogConfig, LogFormat, LogTarget, LoggingGuard,
    setup_default_logging, setup_logging,
};
