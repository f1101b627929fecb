use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CellKeyError {
    #[error("cell key '{0}' is missing the ',' separator")]
    MissingSeparator(String),
    #[error("cell key component '{0}' is not an integer")]
    InvalidComponent(String),
}

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("storage key '{0}' contains unsupported characters")]
    InvalidKey(String),
    #[error("save data is malformed: {0}")]
    Malformed(String),
    #[error("unsupported save version {0}")]
    UnsupportedVersion(u8),
    #[error("failed to encode save data: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MovementError {
    #[error("location unavailable: {0}")]
    LocationUnavailable(String),
}
