use std::path::PathBuf;
use thiserror::Error;

use crate::hasher::InvalidCrc;
use crate::status::UnknownStatus;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The scan root itself could not be enumerated. No outcomes were produced.
    #[error("Scan of {} failed: {source}", path.display())]
    ScanFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A store operation was called in a way its contract forbids.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    InvalidStatus(#[from] UnknownStatus),

    #[error(transparent)]
    InvalidCrc(#[from] InvalidCrc),

    #[error("Scan cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(String),
}
