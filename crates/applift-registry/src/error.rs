//! Error types for applift-registry

use thiserror::Error;

/// Result type for registry operations
pub type Result<T> = std::result::Result<T, RegistryError>;

/// Errors that can occur while talking to the registry
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RegistryError {
    /// HTTP transport failure
    #[error("registry request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The registry answered with an unexpected status code
    #[error("registry returned status {status} for {url}")]
    UnexpectedStatus { status: u16, url: String },

    /// A successful manifest response did not carry a digest header
    #[error("missing digest in manifest {media_type} response")]
    MissingDigest { media_type: String },
}
