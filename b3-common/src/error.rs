//! Common error types for B3

use std::path::PathBuf;
use thiserror::Error;

/// Common result type for B3 operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared by the service and the parameter store
#[derive(Error, Debug)]
pub enum Error {
    /// Parameter store could not be read or written
    #[error("Config store error ({path}): {source}")]
    Store {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Key outside the persisted parameter set
    #[error("Invalid config key: {0}")]
    InvalidKey(String),

    /// Value that does not parse for its key
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    /// Service configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    pub(crate) fn store(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Store {
            path: path.into(),
            source,
        }
    }
}
