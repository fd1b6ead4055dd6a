//! Chunk transport trait: one upload attempt for one chunk.
//!
//! [`crate::HttpTransport`] is the production implementation. Keeping the
//! seam as a trait lets the retry, controller and orchestrator layers be
//! tested with scripted transports.

use std::future::Future;
use std::pin::Pin;

use simpleupload_transfer::{Chunk, SourceFile};
use tokio_util::sync::CancellationToken;

/// Progress callback: bytes of the current chunk sent so far.
pub type ProgressFn<'a> = dyn Fn(u64) + Send + Sync + 'a;

/// Everything a transport needs to send one chunk.
#[derive(Debug, Clone, Copy)]
pub struct ChunkRequest<'a> {
    pub source: &'a SourceFile,
    pub chunk: Chunk,
    /// Number of chunks in the file.
    pub chunk_count: usize,
    /// Identifier shared by every chunk of this file in this invocation.
    pub upload_id: &'a str,
}

/// Why an attempt failed. Every variant is retryable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportFailure {
    #[error("Upload timed out.")]
    Timeout,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Upload failed: {reason}")]
    Status { code: u16, reason: String },

    #[error("Read error: {0}")]
    Read(String),
}

impl TransportFailure {
    /// Builds a status failure using the canonical reason phrase.
    pub fn from_status(status: reqwest::StatusCode) -> Self {
        TransportFailure::Status {
            code: status.as_u16(),
            reason: status
                .canonical_reason()
                .map(str::to_string)
                .unwrap_or_else(|| status.as_u16().to_string()),
        }
    }
}

/// Terminal result of one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// The server acknowledged the chunk. Carries the stored object names.
    Success(Vec<String>),
    /// The attempt failed and may be retried.
    Failed(TransportFailure),
    /// The cancellation token fired before the request settled.
    Aborted,
}

/// Sends a single chunk in a single request.
///
/// Implementations must issue exactly one request per call, report
/// progress through `progress` as the body is written, and return
/// [`AttemptOutcome::Aborted`] promptly once `cancel` fires.
pub trait ChunkTransport: Send + Sync {
    fn send_chunk<'a>(
        &'a self,
        request: &'a ChunkRequest<'a>,
        progress: &'a ProgressFn<'a>,
        cancel: &'a CancellationToken,
    ) -> Pin<Box<dyn Future<Output = AttemptOutcome> + Send + 'a>>;
}
