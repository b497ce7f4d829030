//! Logger configuration

use std::str::FromStr;

use tracing_subscriber::filter::LevelFilter;

use crate::writer::WriterConfig;

/// Severity levels, most to least severe
///
/// The first four all map onto `tracing::Level::ERROR`; the distinction is
/// kept in the configuration vocabulary so existing `error_log` directives
/// translate one-to-one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// System is unusable
    Emerg,
    /// Immediate action required
    Alert,
    /// Critical condition
    Crit,
    /// Error condition
    Error,
    /// Warning condition
    Warn,
    /// Normal but significant
    Notice,
    /// Informational
    Info,
    /// Debug-level detail
    Debug,
}

impl Severity {
    /// Configuration name of the level
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Emerg => "emerg",
            Self::Alert => "alert",
            Self::Crit => "crit",
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Notice => "notice",
            Self::Info => "info",
            Self::Debug => "debug",
        }
    }

    /// The most verbose `tracing` level this severity admits
    pub fn level_filter(self) -> LevelFilter {
        match self {
            Self::Emerg | Self::Alert | Self::Crit | Self::Error => LevelFilter::ERROR,
            Self::Warn => LevelFilter::WARN,
            Self::Notice | Self::Info => LevelFilter::INFO,
            Self::Debug => LevelFilter::DEBUG,
        }
    }
}

impl FromStr for Severity {
    type Err = crate::LogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "emerg" => Ok(Self::Emerg),
            "alert" => Ok(Self::Alert),
            "crit" => Ok(Self::Crit),
            "error" => Ok(Self::Error),
            "warn" => Ok(Self::Warn),
            "notice" => Ok(Self::Notice),
            "info" => Ok(Self::Info),
            "debug" => Ok(Self::Debug),
            other => Err(crate::LogError::Config(format!(
                "unknown log level {other:?}"
            ))),
        }
    }
}

/// Line layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineFormat {
    /// One event per line with full metadata
    #[default]
    Full,
    /// Abbreviated single-line format
    Compact,
}

/// Logger configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Minimum severity written
    pub level: Severity,
    /// Line layout
    pub format: LineFormat,
    /// Destination
    pub writer: WriterConfig,
    /// Honor `RUST_LOG` / `KEEL_LOG` directives when present
    pub env_filter: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            level: Severity::Notice,
            format: LineFormat::Full,
            writer: WriterConfig::Stderr,
            env_filter: true,
        }
    }
}

impl Config {
    /// Verbose configuration for development
    pub fn development() -> Self {
        Self {
            level: Severity::Debug,
            format: LineFormat::Full,
            ..Self::default()
        }
    }

    /// Quiet, compact configuration for production
    pub fn production() -> Self {
        Self {
            level: Severity::Notice,
            format: LineFormat::Compact,
            ..Self::default()
        }
    }
}
