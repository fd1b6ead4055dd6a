use std::sync::RwLock;
use std::time::{Duration, Instant};

use simpleupload_protocol::{FileProgress, UploadStatus};

/// A contiguous byte range of a source file: `[offset, offset + length)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    /// Zero-based position in the file's chunk sequence.
    pub index: usize,
    /// Byte offset within the file.
    pub offset: u64,
    /// Size of this chunk in bytes.
    pub length: u64,
}

impl Chunk {
    /// Exclusive end offset.
    pub fn end(&self) -> u64 {
        self.offset + self.length
    }
}

/// Progress state of one file upload (thread-safe).
///
/// Written only by the controller that owns the upload; the in-flight
/// counter is also updated from inside the request body stream.
pub struct FileSession {
    inner: RwLock<SessionInner>,
}

struct SessionInner {
    file_name: String,
    status: UploadStatus,
    total_bytes: u64,
    confirmed_bytes: u64,
    in_flight_bytes: u64,
    started_at: Option<Instant>,
    completed_at: Option<Instant>,
    error: String,
}

impl FileSession {
    /// Creates a new pending session.
    pub fn new(file_name: impl Into<String>, total_bytes: u64) -> Self {
        Self {
            inner: RwLock::new(SessionInner {
                file_name: file_name.into(),
                status: UploadStatus::Pending,
                total_bytes,
                confirmed_bytes: 0,
                in_flight_bytes: 0,
                started_at: None,
                completed_at: None,
                error: String::new(),
            }),
        }
    }

    /// Marks the session as uploading.
    pub fn start(&self) {
        let mut s = self.inner.write().unwrap();
        s.status = UploadStatus::Uploading;
        s.started_at = Some(Instant::now());
    }

    /// Records how many bytes of the current chunk have been sent.
    ///
    /// Returns the new percentage.
    pub fn set_in_flight(&self, bytes: u64) -> f64 {
        let mut s = self.inner.write().unwrap();
        s.in_flight_bytes = bytes;
        s.snapshot().percentage()
    }

    /// Adds an acknowledged chunk to the confirmed total and clears the
    /// in-flight counter. Returns the new percentage.
    pub fn confirm_chunk(&self, length: u64) -> f64 {
        let mut s = self.inner.write().unwrap();
        s.confirmed_bytes += length;
        s.in_flight_bytes = 0;
        s.snapshot().percentage()
    }

    /// Marks the session as succeeded.
    pub fn succeed(&self) {
        let mut s = self.inner.write().unwrap();
        s.status = UploadStatus::Succeeded;
        s.in_flight_bytes = 0;
        s.completed_at = Some(Instant::now());
    }

    /// Marks the session as failed with an error message.
    pub fn fail(&self, err: &str) {
        self.finish(UploadStatus::Failed, err);
    }

    /// Marks the session as aborted by the user.
    pub fn abort(&self, message: &str) {
        self.finish(UploadStatus::Aborted, message);
    }

    fn finish(&self, status: UploadStatus, err: &str) {
        let mut s = self.inner.write().unwrap();
        s.status = status;
        s.error = err.to_string();
        s.in_flight_bytes = 0;
        s.completed_at = Some(Instant::now());
    }

    /// Returns a snapshot for the presentation layer.
    pub fn progress(&self) -> FileProgress {
        self.inner.read().unwrap().snapshot()
    }

    pub fn status(&self) -> UploadStatus {
        self.inner.read().unwrap().status
    }

    pub fn confirmed_bytes(&self) -> u64 {
        self.inner.read().unwrap().confirmed_bytes
    }

    /// Confirmed plus in-flight bytes.
    pub fn transferred_bytes(&self) -> u64 {
        let s = self.inner.read().unwrap();
        s.confirmed_bytes + s.in_flight_bytes
    }

    /// Time spent uploading, up to completion or now.
    pub fn elapsed(&self) -> Duration {
        let s = self.inner.read().unwrap();
        match (s.started_at, s.completed_at) {
            (Some(start), Some(end)) => end.duration_since(start),
            (Some(start), None) => start.elapsed(),
            _ => Duration::ZERO,
        }
    }
}

impl SessionInner {
    fn snapshot(&self) -> FileProgress {
        FileProgress {
            file_name: self.file_name.clone(),
            status: self.status,
            total_bytes: self.total_bytes,
            confirmed_bytes: self.confirmed_bytes,
            in_flight_bytes: self.in_flight_bytes,
            error: self.error.clone(),
        }
    }
}
