// Relay error taxonomy
use thiserror::Error;

/// Failure categories for the ingestion pipeline. Per-message failures are
/// isolated and non-fatal; only the startup storage probe may abort the
/// process.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Malformed base64, undecodable image, or unusable JSON.
    #[error("decode error: {0}")]
    Decode(String),

    /// Blob storage write/list failure.
    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),

    /// Bus unreachable, auth rejected, or TLS handshake failure.
    #[error("bus connection error: {0}")]
    BusConnection(String),

    /// Direct API call missing required fields. Surfaced to the caller,
    /// nothing merged.
    #[error("validation error: {0}")]
    Validation(String),
}

pub type Result<T> = std::result::Result<T, RelayError>;
