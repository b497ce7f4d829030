//! Leveled, formatted logging for the keel runtime
//!
//! Core crates emit events through the `tracing` facade; this crate owns
//! installing the subscriber: severity vocabulary, line format, destination
//! selection (stderr, stdout, file, in-memory ring, custom callback),
//! cached-clock timestamp prefixing, and the disk-full backoff policy for
//! file destinations.
//!
//! ```no_run
//! use keel_log::{Config, Severity};
//!
//! fn main() -> Result<(), keel_log::LogError> {
//!     let _guard = keel_log::init_with(Config {
//!         level: Severity::Info,
//!         ..Config::default()
//!     })?;
//!
//!     tracing::info!(workers = 4, "runtime starting");
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config;
mod time;
mod writer;

use std::sync::Arc;

use keel_clock::CachedClock;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

pub use config::{Config, LineFormat, Severity};
pub use time::CachedTimer;
pub use writer::{FileWriter, MemoryBuffer, WriterCallback, WriterConfig};

// Re-export the facade macros so hosts need only one logging import.
pub use tracing::{debug, error, info, trace, warn};

/// Logger setup errors
#[derive(Debug, Error)]
pub enum LogError {
    /// Bad configuration value
    #[error("log configuration error: {0}")]
    Config(String),

    /// Could not install the subscriber (usually one is already set)
    #[error("failed to install log subscriber: {0}")]
    Install(String),

    /// Destination could not be opened
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Keeps logger-owned state alive for the program's lifetime
///
/// For the memory destination this carries the handle the host uses to
/// read the ring back (for a post-mortem dump, say).
pub struct LoggerGuard {
    /// Ring-buffer handle when the destination is [`WriterConfig::Memory`]
    pub memory: Option<MemoryBuffer>,
}

/// Configures and installs the global subscriber
pub struct LoggerBuilder {
    config: Config,
    clock: Option<Arc<CachedClock>>,
}

impl LoggerBuilder {
    /// Starts from a configuration
    pub fn from_config(config: Config) -> Self {
        Self {
            config,
            clock: None,
        }
    }

    /// Uses `clock` for timestamp prefixes instead of a private one
    ///
    /// Hosts that already tick a [`CachedClock`] from their event loop
    /// should pass it here so log timestamps and response headers agree.
    pub fn with_clock(mut self, clock: Arc<CachedClock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Installs the global subscriber
    pub fn init(self) -> Result<LoggerGuard, LogError> {
        let (writer, memory) = writer::make_writer(&self.config.writer)?;
        let timer = CachedTimer::new(self.clock.unwrap_or_default());
        let ansi = matches!(
            self.config.writer,
            WriterConfig::Stderr | WriterConfig::Stdout
        );

        let env_directives = self
            .config
            .env_filter
            .then(|| std::env::var("KEEL_LOG").or_else(|_| std::env::var("RUST_LOG")).ok())
            .flatten();

        let builder = tracing_subscriber::fmt()
            .with_writer(writer)
            .with_timer(timer)
            .with_ansi(ansi);

        // The filter and format calls each change the builder's type, so
        // every combination terminates in its own try_init.
        let result = match (env_directives, self.config.format) {
            (Some(directives), LineFormat::Full) => builder
                .with_env_filter(EnvFilter::new(directives))
                .try_init(),
            (Some(directives), LineFormat::Compact) => builder
                .with_env_filter(EnvFilter::new(directives))
                .compact()
                .try_init(),
            (None, LineFormat::Full) => builder
                .with_max_level(self.config.level.level_filter())
                .try_init(),
            (None, LineFormat::Compact) => builder
                .with_max_level(self.config.level.level_filter())
                .compact()
                .try_init(),
        };

        result.map_err(|e| LogError::Install(e.to_string()))?;
        Ok(LoggerGuard { memory })
    }
}

/// Installs a subscriber picked from the environment
///
/// Uses the development profile in debug builds and the production profile
/// otherwise; `KEEL_LOG` / `RUST_LOG` directives win when set.
pub fn auto_init() -> Result<LoggerGuard, LogError> {
    if cfg!(debug_assertions) {
        init_with(Config::development())
    } else {
        init_with(Config::production())
    }
}

/// Installs a subscriber with the default configuration
pub fn init() -> Result<LoggerGuard, LogError> {
    init_with(Config::default())
}

/// Installs a subscriber with the given configuration
pub fn init_with(config: Config) -> Result<LoggerGuard, LogError> {
    LoggerBuilder::from_config(config).init()
}

impl Default for LoggerBuilder {
    fn default() -> Self {
        Self::from_config(Config::default())
    }
}

/// Renders an OS error the way log lines carry it: `" (code: message)"`
///
/// ```
/// use std::io;
///
/// let err = io::Error::from_raw_os_error(2);
/// assert!(keel_log::os_error_suffix(&err).starts_with(" (2: "));
/// ```
pub fn os_error_suffix(err: &std::io::Error) -> String {
    match err.raw_os_error() {
        Some(code) => format!(" ({code}: {err})"),
        None => format!(" ({err})"),
    }
}
