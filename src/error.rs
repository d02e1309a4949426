//! Error types for friendlizer

use thiserror::Error;

/// Main error type for friendlizer operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Invalid manifest: {0}")]
    InvalidManifest(String),

    #[error("Cannot replace file: {0}")]
    Swap(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Invalid pattern: {0}")]
    Pattern(#[from] globset::Error),
}

/// Result type alias for friendlizer operations
pub type Result<T> = std::result::Result<T, Error>;
