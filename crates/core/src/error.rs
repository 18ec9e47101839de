//! Error types surfaced by the engine.
//!
//! Detection itself never fails: probes and checks degrade to "not detected".
//! The only errors a caller can see come from argument validation and from
//! loading a configuration file.

use std::path::PathBuf;

use thiserror::Error;

/// Error type for engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A flagset (or technique name) did not satisfy the operation's contract.
    #[error("InvalidArgument: {0}")]
    InvalidArgument(String),

    /// The configuration file could not be read.
    #[error("Failed to read engine config at {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configuration file was readable but not valid JSON/YAML.
    #[error("Failed to parse engine config at {path}: {message}")]
    ConfigParse { path: PathBuf, message: String },
}

impl EngineError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// True for the strict-validator failure path.
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument(_))
    }
}

/// Convenience result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
