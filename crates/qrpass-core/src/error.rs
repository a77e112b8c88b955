//! Error types for QR-Pass core library.

use thiserror::Error;

/// Result type alias using QR-Pass Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for QR-Pass operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed base64url or JSON at a parse boundary
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
