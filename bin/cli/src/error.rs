//! Error types for the command-line application.

use std::fmt;

/// Errors from loading configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The sources could not be read or deserialized.
    Load { reason: String },
    /// A setting is out of range.
    Invalid { field: &'static str, reason: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Load { reason } => write!(f, "failed to load configuration: {reason}"),
            Self::Invalid { field, reason } => write!(f, "invalid setting '{field}': {reason}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Top-level failures of a command.
///
/// Use these as context when wrapping lower-level errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    /// Configuration could not be loaded.
    Configuration,
    /// A client or connection could not be set up.
    Startup { component: &'static str },
    /// Reading from the terminal failed.
    Terminal,
    /// A document could not be ingested.
    Ingest { path: String },
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration => write!(f, "configuration error"),
            Self::Startup { component } => write!(f, "failed to start {component}"),
            Self::Terminal => write!(f, "terminal I/O failed"),
            Self::Ingest { path } => write!(f, "failed to ingest {path}"),
        }
    }
}

impl std::error::Error for AppError {}
