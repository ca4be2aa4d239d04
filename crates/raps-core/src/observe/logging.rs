//! # Structured Logging
//!
//! Structured logging via the `tracing` ecosystem:
//!
//! - Output formats (JSON, Pretty, Compact)
//! - Log level filtering, overridable through `RUST_LOG`
//! - Optional log file alongside stdout
//!
//! ## Example
//!
//! ```rust,ignore
//! use raps_core::observe::{init_logging, LogConfig, LogFormat, LogLevel};
//!
//! let config = LogConfig {
//!     level: LogLevel::Debug,
//!     format: LogFormat::Compact,
//!     ..Default::default()
//! };
//!
//! init_logging(&config)?;
//!
//! tracing::info!(cell = 4, supply = 312.5, "frame scheduled");
//! ```

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::Subscriber;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{fmt, prelude::*, EnvFilter, Layer};

/// Log level configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level (most verbose)
    Trace,
    /// Debug level
    Debug,
    /// Info level (default)
    Info,
    /// Warning level
    Warn,
    /// Error level (least verbose)
    Error,
}

impl Default for LogLevel {
    fn default() -> Self {
        LogLevel::Info
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "trace"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON format (machine-readable)
    Json,
    /// Pretty format (human-readable, colored)
    Pretty,
    /// Compact format (minimal, one line per event)
    Compact,
}

impl Default for LogFormat {
    fn default() -> Self {
        LogFormat::Compact
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level
    pub level: LogLevel,
    /// Output format
    pub format: LogFormat,
    /// Additional log file (None for stdout only)
    pub file: Option<PathBuf>,
    /// Include timestamps
    pub timestamps: bool,
    /// Include source location (file:line)
    pub source_location: bool,
    /// Include thread IDs
    pub thread_ids: bool,
    /// Module filter (e.g., "raps_sim=debug,raps_core=info")
    pub filter: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Compact,
            file: None,
            timestamps: true,
            source_location: false,
            thread_ids: false,
            filter: None,
        }
    }
}

impl LogConfig {
    /// Create a development configuration (verbose, pretty).
    pub fn development() -> Self {
        Self {
            level: LogLevel::Debug,
            format: LogFormat::Pretty,
            source_location: true,
            thread_ids: true,
            ..Default::default()
        }
    }

    /// Create a production configuration (JSON, minimal).
    pub fn production() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Json,
            timestamps: true,
            ..Default::default()
        }
    }

    /// Create a quiet configuration (errors only).
    pub fn quiet() -> Self {
        Self {
            level: LogLevel::Error,
            format: LogFormat::Compact,
            timestamps: false,
            ..Default::default()
        }
    }

    fn env_filter(&self) -> EnvFilter {
        match self.filter {
            Some(ref custom) => EnvFilter::try_new(custom).unwrap_or_else(|_| EnvFilter::new(self.level.to_string())),
            None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(self.level.to_string())),
        }
    }
}

type BoxedLayer<S> = Box<dyn Layer<S> + Send + Sync + 'static>;

fn fmt_layer<S, W>(config: &LogConfig, writer: W, ansi: bool) -> BoxedLayer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(ansi)
        .with_file(config.source_location)
        .with_line_number(config.source_location)
        .with_thread_ids(config.thread_ids);

    match (config.format, config.timestamps) {
        (LogFormat::Json, true) => layer.json().boxed(),
        (LogFormat::Json, false) => layer.json().without_time().boxed(),
        (LogFormat::Pretty, true) => layer.pretty().boxed(),
        (LogFormat::Pretty, false) => layer.pretty().without_time().boxed(),
        (LogFormat::Compact, true) => layer.compact().boxed(),
        (LogFormat::Compact, false) => layer.compact().without_time().boxed(),
    }
}

/// Initialize the global logging subscriber.
///
/// This should be called once at application startup. Subsequent calls are
/// silently ignored. Fails only if the configured log file cannot be created.
///
/// # Example
///
/// ```rust,ignore
/// use raps_core::observe::{init_logging, LogConfig};
///
/// init_logging(&LogConfig::default())?;
///
/// tracing::info!("simulation started");
/// ```
pub fn init_logging(config: &LogConfig) -> std::io::Result<()> {
    let file_layer = match config.file {
        Some(ref path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let file = File::create(path)?;
            Some(fmt_layer(config, Mutex::new(file), false))
        }
        None => None,
    };

    let subscriber = tracing_subscriber::registry()
        .with(fmt_layer(config, std::io::stdout, true))
        .with(file_layer)
        .with(config.env_filter());

    // Ignore error if subscriber was already set
    let _ = tracing::subscriber::set_global_default(subscriber);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_display() {
        assert_eq!(format!("{}", LogLevel::Debug), "debug");
        assert_eq!(format!("{}", LogLevel::Info), "info");
        assert_eq!(format!("{}", LogLevel::Error), "error");
    }

    #[test]
    fn test_config_presets() {
        let dev = LogConfig::development();
        assert_eq!(dev.level, LogLevel::Debug);
        assert_eq!(dev.format, LogFormat::Pretty);
        assert!(dev.source_location);

        let prod = LogConfig::production();
        assert_eq!(prod.format, LogFormat::Json);

        let quiet = LogConfig::quiet();
        assert_eq!(quiet.level, LogLevel::Error);
        assert!(!quiet.timestamps);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config: LogConfig = serde_yaml::from_str("level: warn\nformat: json\n").unwrap();
        assert_eq!(config.level, LogLevel::Warn);
        assert_eq!(config.format, LogFormat::Json);
        assert!(config.timestamps);
        assert!(config.file.is_none());
    }

    #[test]
    fn test_init_twice_is_harmless() {
        let dir = tempfile::tempdir().unwrap();
        let config = LogConfig {
            file: Some(dir.path().join("logs").join("raps.log")),
            ..LogConfig::quiet()
        };
        init_logging(&config).unwrap();
        init_logging(&LogConfig::default()).unwrap();
        assert!(dir.path().join("logs").join("raps.log").exists());
    }
}
