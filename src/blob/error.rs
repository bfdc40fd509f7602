use thiserror::Error;

/// Errors surfaced by the remote blob store boundary.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("HTTP error {status} for blob {object}")]
    HttpStatus { status: u16, object: String },

    #[error("Blob transfer failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The store answered 2xx but the body was not usable.
    #[error("Unusable store response: {0}")]
    InvalidResponse(String),
}
