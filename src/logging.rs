// SPDX-License-Identifier: MIT
// Copyright 2026 Tyler Zervas

//! Logging setup and the structured events emitted by CTC invocations.
//!
//! Events use three targets so they can be filtered independently through
//! `RUST_LOG`:
//!
//! - `ctc_bridge::memory` - allocation accounting, buffer reuse decisions
//! - `ctc_bridge::kernel` - workspace sizing, kernel failures, skipped items
//! - `ctc_bridge::metrics` - per-call cost summaries
//!
//! Libraries never install a subscriber themselves; applications call
//! [`init_logging`] once (or bring their own subscriber).

use std::sync::Once;

/// Configuration for [`init_logging`].
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Level used when `RUST_LOG` is not set.
    pub default_level: LogLevel,
    /// Include timestamps.
    pub with_timestamps: bool,
    /// Include the event target.
    pub with_target: bool,
    /// Include source file and line numbers.
    pub with_file_line: bool,
    /// Use ANSI colors.
    pub with_ansi: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            default_level: LogLevel::Info,
            with_timestamps: true,
            with_target: true,
            with_file_line: false,
            with_ansi: true,
        }
    }
}

impl LogConfig {
    /// Configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default log level.
    #[must_use]
    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.default_level = level;
        self
    }

    /// Enable or disable timestamps.
    #[must_use]
    pub fn with_timestamps(mut self, enable: bool) -> Self {
        self.with_timestamps = enable;
        self
    }

    /// Enable or disable ANSI colors.
    #[must_use]
    pub fn with_ansi(mut self, enable: bool) -> Self {
        self.with_ansi = enable;
        self
    }

    /// Debug level with file/line info, for chasing allocation problems.
    #[must_use]
    pub fn development() -> Self {
        Self {
            default_level: LogLevel::Debug,
            with_timestamps: true,
            with_target: true,
            with_file_line: true,
            with_ansi: true,
        }
    }

    /// Warnings only, no decoration. Suits test harness capture.
    #[must_use]
    pub fn testing() -> Self {
        Self {
            default_level: LogLevel::Warn,
            with_timestamps: false,
            with_target: false,
            with_file_line: false,
            with_ansi: false,
        }
    }

    /// `EnvFilter` directive for this configuration.
    ///
    /// `RUST_LOG` wins when set.
    #[must_use]
    pub fn filter_directive(&self) -> String {
        std::env::var("RUST_LOG").unwrap_or_else(|_| self.default_level.as_filter_str().to_string())
    }
}

/// Log level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    /// Errors only.
    Error,
    /// Warnings and above.
    Warn,
    /// Informational messages and above.
    #[default]
    Info,
    /// Debug messages and above.
    Debug,
    /// Everything.
    Trace,
}

impl LogLevel {
    fn as_filter_str(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}

static INIT_LOGGING: Once = Once::new();

/// Install a global `tracing` subscriber. Later calls are no-ops.
///
/// If another subscriber is already installed the call leaves it in place.
///
/// ```rust
/// use ctc_bridge::{init_logging, LogConfig};
///
/// init_logging(&LogConfig::testing());
/// init_logging(&LogConfig::development()); // ignored
/// ```
pub fn init_logging(config: &LogConfig) {
    INIT_LOGGING.call_once(|| {
        let builder = tracing_subscriber::fmt()
            .with_env_filter(config.filter_directive())
            .with_ansi(config.with_ansi)
            .with_target(config.with_target)
            .with_file(config.with_file_line)
            .with_line_number(config.with_file_line);

        let installed = if config.with_timestamps {
            builder.try_init()
        } else {
            builder.without_time().try_init()
        };
        if let Err(err) = installed {
            tracing::debug!(target: "ctc_bridge", %err, "subscriber already installed");
        }
    });
}

/// Log tracker usage after an allocation event.
#[allow(clippy::cast_precision_loss)]
pub fn log_memory_usage(allocated_bytes: usize, peak_bytes: usize, context: &str) {
    let allocated_kb = allocated_bytes as f64 / 1024.0;
    let peak_kb = peak_bytes as f64 / 1024.0;

    tracing::debug!(
        target: "ctc_bridge::memory",
        allocated_kb = format!("{allocated_kb:.2}"),
        peak_kb = format!("{peak_kb:.2}"),
        context,
        "memory usage"
    );
}

/// Log the outcome of one successful cost computation.
pub fn log_cost_summary(batch: usize, mean_cost: f32) {
    tracing::debug!(
        target: "ctc_bridge::metrics",
        batch,
        mean_cost = format!("{mean_cost:.6}"),
        "ctc cost computed"
    );
}

pub use tracing::{debug, error, info, trace, warn};
