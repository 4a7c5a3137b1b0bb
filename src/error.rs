//! Error taxonomy
//!
//! Per-file errors (`FileAccess`, `Parse`) are caught at the batch level and
//! turned into failed `ScoreResult`s. Whole-run errors (`Configuration`,
//! `ResourceExhausted`, `Interrupted`) abort the run and decide the exit code.

use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the validator
#[derive(Error, Debug)]
pub enum ValidatorError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("cannot access {}: {source}", path.display())]
    FileAccess {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("resource exhausted: circuit breaker still active after {retries} retries")]
    ResourceExhausted { retries: u32 },

    #[error("run interrupted before batch {next_batch}")]
    Interrupted { next_batch: usize },
}

pub type ValidatorResult<T> = Result<T, ValidatorError>;

/// Serializable tag for an error class (as written into the run report)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    ConfigurationError,
    FileAccessError,
    ParseError,
    ResourceExhausted,
    InterruptedError,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::ConfigurationError => "ConfigurationError",
            ErrorKind::FileAccessError => "FileAccessError",
            ErrorKind::ParseError => "ParseError",
            ErrorKind::ResourceExhausted => "ResourceExhausted",
            ErrorKind::InterruptedError => "InterruptedError",
        };
        write!(f, "{}", name)
    }
}

impl ValidatorError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ValidatorError::Configuration(_) => ErrorKind::ConfigurationError,
            ValidatorError::FileAccess { .. } => ErrorKind::FileAccessError,
            ValidatorError::Parse { .. } => ErrorKind::ParseError,
            ValidatorError::ResourceExhausted { .. } => ErrorKind::ResourceExhausted,
            ValidatorError::Interrupted { .. } => ErrorKind::InterruptedError,
        }
    }

    /// Process exit code for an error that ends the run
    pub fn exit_code(&self) -> u8 {
        match self {
            ValidatorError::Configuration(_) => 2,
            _ => 1,
        }
    }

    pub fn file_access(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ValidatorError::FileAccess {
            path: path.into(),
            source,
        }
    }
}
