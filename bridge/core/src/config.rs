//! Bridge Configuration
//!
//! Everything a session needs to know up front. The daemon fills this in
//! from its command line and environment; tests build it directly.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::discovery::DiscoveryConfig;
use crate::pipe::DEFAULT_PIPE_NAME;
use crate::relay::CHUNK_SIZE;

/// Log verbosity, from silent to every syscall
///
/// Levels are totally ordered; each one shows everything the previous one
/// shows plus its own events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    /// No output at all
    #[default]
    None,
    /// Fatal conditions
    Error,
    /// Failed connect attempts and unexpected disconnects
    Warning,
    /// Session milestones and per-chunk byte counts
    Info,
    /// Endpoint lifecycle
    Debug,
    /// Every syscall
    Trace,
}

impl LogLevel {
    /// All levels in ascending order
    pub const ALL: [Self; 6] = [
        Self::None,
        Self::Error,
        Self::Warning,
        Self::Info,
        Self::Debug,
        Self::Trace,
    ];

    /// Name as accepted on the command line
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }

    /// Equivalent `tracing` filter
    pub fn level_filter(self) -> LevelFilter {
        match self {
            Self::None => LevelFilter::OFF,
            Self::Error => LevelFilter::ERROR,
            Self::Warning => LevelFilter::WARN,
            Self::Info => LevelFilter::INFO,
            Self::Debug => LevelFilter::DEBUG,
            Self::Trace => LevelFilter::TRACE,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        match lower.as_str() {
            "warn" => Ok(Self::Warning),
            name => Self::ALL
                .into_iter()
                .find(|level| level.as_str() == name)
                .ok_or_else(|| ConfigError::UnknownLogLevel(s.to_string())),
        }
    }
}

/// Invalid configuration
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Log level name not recognised
    #[error("unknown log level '{0}' (expected one of: none, error, warning, info, debug, trace)")]
    UnknownLogLevel(String),

    /// Pipe name is empty
    #[error("pipe name must not be empty")]
    EmptyPipeName,

    /// Chunk size is zero
    #[error("chunk size must be at least 1 byte")]
    ZeroChunkSize,

    /// Socket directory override is empty
    #[error("socket directory must not be empty")]
    EmptySocketDir,

    /// No directory layouts to search
    #[error("no socket path templates configured")]
    NoTemplates,
}

/// Settings for one bridge session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Name of the pipe RPC clients connect to
    pub pipe_name: String,
    /// Largest read or write on either endpoint; also the pipe buffer size
    pub chunk_size: usize,
    /// Where to look for the Discord socket
    pub discovery: DiscoveryConfig,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            pipe_name: DEFAULT_PIPE_NAME.to_string(),
            chunk_size: CHUNK_SIZE,
            discovery: DiscoveryConfig::default(),
        }
    }
}

impl BridgeConfig {
    /// Override the pipe name
    #[must_use]
    pub fn with_pipe_name(mut self, name: impl Into<String>) -> Self {
        self.pipe_name = name.into();
        self
    }

    /// Search for the Discord socket below `dir` only
    #[must_use]
    pub fn with_socket_dir(mut self, dir: impl Into<String>) -> Self {
        self.discovery = self.discovery.with_base_dir(dir);
        self
    }

    /// Check the settings before any endpoint is created
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pipe_name.is_empty() {
            return Err(ConfigError::EmptyPipeName);
        }
        if self.chunk_size == 0 {
            return Err(ConfigError::ZeroChunkSize);
        }
        if self.discovery.base_dir.as_deref() == Some("") {
            return Err(ConfigError::EmptySocketDir);
        }
        if self.discovery.templates.is_empty() {
            return Err(ConfigError::NoTemplates);
        }
        Ok(())
    }
}
