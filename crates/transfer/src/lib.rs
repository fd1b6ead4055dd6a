//! Chunked file transfer primitives: chunk planning, ranged readers and
//! progress tracking.

mod chunked;
mod chunker;
mod progress;
mod types;

pub use chunked::{ChunkBody, SourceFile, checksum_bytes};
pub use chunker::{ChunkPlan, Chunks};
pub use progress::ThroughputMeter;
pub use types::{Chunk, FileSession};

/// Default chunk size: 100 MiB.
///
/// Large enough that multi-gigabyte files need few requests, small enough
/// that a failed chunk is cheap to resend.
pub const DEFAULT_CHUNK_SIZE: u64 = 100 * 1024 * 1024;

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("file name is empty")]
    EmptyName,

    #[error("chunk {offset}+{length} is outside a file of {size} bytes")]
    OutOfBounds { offset: u64, length: u64, size: u64 },
}
