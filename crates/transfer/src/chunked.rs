use std::io::{Cursor, SeekFrom};
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeekExt};

use crate::TransferError;
use crate::chunker::ChunkPlan;
use crate::types::Chunk;

/// Async reader limited to one chunk's byte range.
pub type ChunkBody = Pin<Box<dyn AsyncRead + Send + Sync>>;

// ---------------------------------------------------------------------------
// Checksum helpers
// ---------------------------------------------------------------------------

/// Computes SHA-256 of `data` and returns the hex-encoded digest.
pub fn checksum_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

// ---------------------------------------------------------------------------
// SourceFile
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum SourceData {
    Path(PathBuf),
    Memory(Arc<[u8]>),
}

/// Read-only handle to the bytes of one file selected for upload.
///
/// The size is captured when the handle is created and never changes.
#[derive(Debug, Clone)]
pub struct SourceFile {
    name: String,
    size: u64,
    data: SourceData,
}

impl SourceFile {
    /// Opens a file on disk. The display name is the path's final component.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, TransferError> {
        let path = path.as_ref();
        let metadata = tokio::fs::metadata(path).await?;
        if !metadata.is_file() {
            return Err(TransferError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("not a regular file: {}", path.display()),
            )));
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if name.is_empty() {
            return Err(TransferError::EmptyName);
        }
        Ok(Self {
            name,
            size: metadata.len(),
            data: SourceData::Path(path.to_path_buf()),
        })
    }

    /// Wraps an in-memory buffer.
    pub fn from_bytes(
        name: impl Into<String>,
        data: impl Into<Arc<[u8]>>,
    ) -> Result<Self, TransferError> {
        let name = name.into();
        if name.is_empty() {
            return Err(TransferError::EmptyName);
        }
        let data = data.into();
        Ok(Self {
            name,
            size: data.len() as u64,
            data: SourceData::Memory(data),
        })
    }

    /// Display name, also used as the multipart file name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Total size in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Backing path, if the file lives on disk.
    pub fn path(&self) -> Option<&Path> {
        match &self.data {
            SourceData::Path(p) => Some(p),
            SourceData::Memory(_) => None,
        }
    }

    /// Plans the chunks of this file.
    pub fn chunks(&self, chunk_size: u64) -> ChunkPlan {
        ChunkPlan::new(self.size, chunk_size)
    }

    /// Opens a reader over exactly `chunk`'s byte range.
    pub async fn open_chunk(&self, chunk: &Chunk) -> Result<ChunkBody, TransferError> {
        self.check_bounds(chunk)?;
        match &self.data {
            SourceData::Path(path) => {
                let mut file = tokio::fs::File::open(path).await?;
                file.seek(SeekFrom::Start(chunk.offset)).await?;
                Ok(Box::pin(file.take(chunk.length)))
            }
            SourceData::Memory(data) => {
                let mut cursor = Cursor::new(Arc::clone(data));
                cursor.set_position(chunk.offset);
                Ok(Box::pin(cursor.take(chunk.length)))
            }
        }
    }

    /// Computes the SHA-256 of `chunk`'s bytes.
    pub async fn chunk_checksum(&self, chunk: &Chunk) -> Result<String, TransferError> {
        let mut reader = self.open_chunk(chunk).await?;
        let mut hasher = Sha256::new();
        let mut buf = vec![0u8; 64 * 1024];
        loop {
            let n = reader.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        Ok(hex::encode(hasher.finalize()))
    }

    fn check_bounds(&self, chunk: &Chunk) -> Result<(), TransferError> {
        match chunk.offset.checked_add(chunk.length) {
            Some(end) if end <= self.size => Ok(()),
            _ => Err(TransferError::OutOfBounds {
                offset: chunk.offset,
                length: chunk.length,
                size: self.size,
            }),
        }
    }
}
