use crate::DEFAULT_CHUNK_SIZE;
use crate::types::Chunk;

/// Splits a file of known size into fixed-size chunks.
///
/// The plan is a plain value: iterating it always yields the same sequence,
/// so it can be restarted freely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPlan {
    file_size: u64,
    chunk_size: u64,
}

impl ChunkPlan {
    /// Creates a plan for `file_size` bytes.
    ///
    /// If `chunk_size` is 0, [`DEFAULT_CHUNK_SIZE`] (100 MiB) is used.
    pub fn new(file_size: u64, chunk_size: u64) -> Self {
        let chunk_size = if chunk_size == 0 {
            DEFAULT_CHUNK_SIZE
        } else {
            chunk_size
        };
        Self {
            file_size,
            chunk_size,
        }
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    /// Number of chunks: `ceil(file_size / chunk_size)`.
    pub fn chunk_count(&self) -> usize {
        self.file_size.div_ceil(self.chunk_size) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.file_size == 0
    }

    /// Returns a fresh iterator over the chunks, starting at offset 0.
    pub fn iter(&self) -> Chunks {
        Chunks {
            plan: *self,
            index: 0,
            offset: 0,
        }
    }
}

impl IntoIterator for ChunkPlan {
    type Item = Chunk;
    type IntoIter = Chunks;

    fn into_iter(self) -> Chunks {
        self.iter()
    }
}

impl IntoIterator for &ChunkPlan {
    type Item = Chunk;
    type IntoIter = Chunks;

    fn into_iter(self) -> Chunks {
        self.iter()
    }
}

/// Lazy iterator over the chunks of a [`ChunkPlan`].
#[derive(Debug, Clone)]
pub struct Chunks {
    plan: ChunkPlan,
    index: usize,
    offset: u64,
}

impl Iterator for Chunks {
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        let remaining = self.plan.file_size - self.offset;
        if remaining == 0 {
            return None;
        }

        let length = remaining.min(self.plan.chunk_size);
        let chunk = Chunk {
            index: self.index,
            offset: self.offset,
            length,
        };
        self.index += 1;
        self.offset += length;
        Some(chunk)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.plan.chunk_count() - self.index;
        (left, Some(left))
    }
}

impl ExactSizeIterator for Chunks {}
