//! Logging infrastructure for the workflow.
//!
//! This module provides:
//! - A per-run logger with file + console dual output
//! - Verbatim recording of external tool output
//! - Integration with the `tracing` ecosystem
//!
//! # Example
//!
//! ```no_run
//! use idt_core::logging::{LogConfig, WorkflowLogger};
//!
//! let logger = WorkflowLogger::new(
//!     "workflow_orchestrator",
//!     "/path/to/output/logs",
//!     LogConfig::default(),
//!     None,
//! ).unwrap();
//!
//! logger.phase("describe");
//! logger.command("python3 image_describer.py photos --recursive");
//! logger.success("Image description completed");
//! ```

mod types;
mod workflow_logger;

pub use types::{LogCallback, LogConfig, LogLevel, MessagePrefix};
pub use workflow_logger::WorkflowLogger;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize the global tracing subscriber for console output.
///
/// This sets up a subscriber that:
/// - Respects RUST_LOG environment variable
/// - Falls back to the provided default level
/// - Outputs to stderr with timestamps
///
/// Should be called once at application startup; later calls are ignored.
pub fn init_tracing(default_level: LogLevel) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level_to_filter_str(default_level)));

    let _ = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .try_init();
}

/// Convert LogLevel to filter string.
fn level_to_filter_str(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Trace => "trace",
        LogLevel::Debug => "debug",
        LogLevel::Info => "info",
        LogLevel::Warn => "warn",
        LogLevel::Error => "error",
    }
}
