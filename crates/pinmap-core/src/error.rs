//! Error types for pinmap-core

use thiserror::Error;

/// Result type alias using pinmap-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in pinmap-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// libSQL error
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Marker not found
    #[error("Marker not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Geocoding request or response failure (network, HTTP status, parse)
    #[error("Geocoding error: {0}")]
    Geocode(String),
}
