//! Uploader error types.

/// Errors raised while setting up an upload.
///
/// Failures of individual chunks are not errors at this level; they are
/// reported through [`crate::TransportFailure`] and the file's status.
#[derive(Debug, thiserror::Error)]
pub enum UploaderError {
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("transfer error: {0}")]
    Transfer(#[from] simpleupload_transfer::TransferError),
}
