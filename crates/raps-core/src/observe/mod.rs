//! # Observability
//!
//! Structured logging for simulation runs via `tracing`. Per-frame metrics
//! are not exported here; they flow to a result sink in `raps-sim`.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use raps_core::observe::{init_logging, LogConfig};
//!
//! init_logging(&LogConfig::development())?;
//! tracing::info!(repetition = 0, iteration = 3, "frame complete");
//! ```

pub mod logging;

pub use logging::{init_logging, LogConfig, LogFormat, LogLevel};
