//! Error types for s3p-core
//!
//! A single error enum shared by locations, the transfer port, the local
//! bridge and the directory sync engine.

use thiserror::Error;

/// Result type alias using the s3p error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by s3p operations
#[derive(Debug, Error)]
pub enum Error {
    /// A location string failed structural parsing
    #[error("Malformed location: {0}")]
    MalformedLocation(String),

    /// A store operation failed after the port's retry policy was exhausted
    #[error("Transfer failed: {0}")]
    Transfer(String),

    /// The store reported a transient condition (throttling, 5xx, timeout,
    /// dropped connection); still present after the retry policy ran out
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Temporary file allocation or cleanup failed
    #[error("Local resource error: {0}")]
    LocalResource(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Caller-supplied configuration is out of range
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration file could not be read or written
    #[error("Config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    General(String),
}

impl Error {
    /// Wrap an I/O error raised while managing a scratch file
    pub fn local_resource(context: &str, err: impl std::fmt::Display) -> Self {
        Error::LocalResource(format!("{context}: {err}"))
    }

    /// Whether this error came from the store rather than the local environment
    pub fn is_transfer(&self) -> bool {
        matches!(
            self,
            Error::Transfer(_) | Error::Unavailable(_) | Error::NotFound(_)
        )
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for Error {
    fn from(err: toml::ser::Error) -> Self {
        Error::Config(err.to_string())
    }
}
