//! Error types for the core crate

use thiserror::Error;

/// Core error type
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration file: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Unknown value type: {0}")]
    UnknownValueType(String),
}

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, CoreError>;
