//! Chunked, cancellable upload engine.
//!
//! Implements the client side of large-file uploads to `POST /api/upload`.
//! It is a library crate with no UI dependencies; front ends subscribe to
//! [`UploadEvent`]s and hold an [`AbortHandle`].
//!
//! # Layers
//!
//! 1. **Transport** sends one chunk in one HTTP request
//! 2. **Retry policy** repeats a chunk up to a bounded number of attempts
//! 3. **Controller** drives one file's chunks in order
//! 4. **Orchestrator** runs the selected files one after another

pub mod controller;
pub mod error;
pub mod http;
pub mod orchestrator;
pub mod retry;
pub mod transport;
pub mod types;

pub use controller::FileTransferController;
pub use error::UploaderError;
pub use http::HttpTransport;
pub use orchestrator::{AbortHandle, BatchUploadOrchestrator};
pub use retry::{ChunkOutcome, RetryPolicy};
pub use transport::{AttemptOutcome, ChunkRequest, ChunkTransport, ProgressFn, TransportFailure};
pub use types::{
    BatchOutcome, BatchStatus, EventSink, FileOutcome, TransferSettings, UploadEvent,
};
