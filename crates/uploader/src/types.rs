//! Data types for the upload flow.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use simpleupload_protocol::constants::{
    ABORTED_MESSAGE, ALL_SUCCEEDED_MESSAGE, SOME_FAILED_MESSAGE, UPLOAD_PATH,
};
use simpleupload_protocol::{FileProgress, UploadStatus};
use simpleupload_transfer::DEFAULT_CHUNK_SIZE;
use tokio::sync::mpsc;

use crate::retry::RetryPolicy;

/// Default number of attempts per chunk: one initial attempt plus two retries.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default per-attempt timeout. Large chunks over slow links need minutes.
pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Tunables of the upload engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TransferSettings {
    /// Full URL of the upload endpoint.
    pub endpoint: String,
    /// Maximum chunk size in bytes.
    pub chunk_size: u64,
    /// Attempts per chunk, including the first.
    pub max_attempts: u32,
    /// Deadline of one attempt, from request start to response body.
    #[serde(with = "duration_secs")]
    pub attempt_timeout: Duration,
    /// Pause before each retry.
    #[serde(with = "duration_secs")]
    pub retry_delay: Duration,
    /// Send a SHA-256 of every chunk alongside its bytes.
    pub send_checksums: bool,
}

impl Default for TransferSettings {
    fn default() -> Self {
        Self {
            endpoint: format!("http://localhost:3000{UPLOAD_PATH}"),
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            attempt_timeout: DEFAULT_ATTEMPT_TIMEOUT,
            retry_delay: Duration::ZERO,
            send_checksums: false,
        }
    }
}

impl TransferSettings {
    /// Retry policy described by these settings.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts).with_delay(self.retry_delay)
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

/// Progress event emitted during an upload.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadEvent {
    /// A file left the pending state.
    FileStarted {
        file_name: String,
        total_bytes: u64,
        chunk_count: usize,
    },
    /// Byte-level progress of a file.
    Progress {
        file_name: String,
        percent: f64,
        transferred_bytes: u64,
        total_bytes: u64,
        bytes_per_second: f64,
    },
    /// A chunk attempt failed and will be retried.
    ChunkRetry {
        file_name: String,
        chunk_index: usize,
        attempt: u32,
        error: String,
    },
    /// A file reached a terminal status.
    FileFinished {
        file_name: String,
        status: UploadStatus,
        error: Option<String>,
    },
    /// The whole batch settled.
    BatchFinished { status: BatchStatus, message: String },
}

/// Sending half of the event stream. A sink without a channel drops events.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<mpsc::Sender<UploadEvent>>,
}

impl EventSink {
    pub fn new(tx: mpsc::Sender<UploadEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    /// Sink that discards everything.
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    /// Non-blocking send for high-frequency events; drops under backpressure.
    pub fn emit(&self, event: UploadEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.try_send(event);
        }
    }

    /// Waits for channel capacity; used for events that must not be lost.
    pub async fn deliver(&self, event: UploadEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event).await;
        }
    }
}

/// Result of uploading one file.
#[derive(Debug, Clone, PartialEq)]
pub struct FileOutcome {
    /// Final progress snapshot, including status and error message.
    pub progress: FileProgress,
    /// Session identifier sent with every chunk of this file.
    pub upload_id: String,
    /// Chunks the server acknowledged.
    pub chunks_uploaded: usize,
    /// Object names returned by the server, in chunk order.
    pub stored_objects: Vec<String>,
}

impl FileOutcome {
    pub fn file_name(&self) -> &str {
        &self.progress.file_name
    }

    pub fn status(&self) -> UploadStatus {
        self.progress.status
    }

    pub fn error(&self) -> Option<&str> {
        if self.progress.error.is_empty() {
            None
        } else {
            Some(&self.progress.error)
        }
    }

    pub fn succeeded(&self) -> bool {
        self.progress.status == UploadStatus::Succeeded
    }
}

/// Overall status of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Succeeded,
    Failed,
    Aborted,
}

/// Result of one orchestrator invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOutcome {
    pub status: BatchStatus,
    /// One entry per file that was started, in upload order.
    pub files: Vec<FileOutcome>,
    /// `"<file name>: <error>"` for every failed file. Empty when aborted.
    pub errors: Vec<String>,
}

impl BatchOutcome {
    /// Aggregates per-file outcomes.
    pub fn from_files(files: Vec<FileOutcome>, aborted: bool) -> Self {
        if aborted {
            return Self {
                status: BatchStatus::Aborted,
                files,
                errors: Vec::new(),
            };
        }

        let errors: Vec<String> = files
            .iter()
            .filter(|f| !f.succeeded())
            .map(|f| format!("{}: {}", f.file_name(), f.error().unwrap_or_default()))
            .collect();
        let status = if errors.is_empty() {
            BatchStatus::Succeeded
        } else {
            BatchStatus::Failed
        };
        Self {
            status,
            files,
            errors,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.status == BatchStatus::Succeeded
    }

    /// Human-readable batch status line.
    pub fn status_message(&self) -> String {
        match self.status {
            BatchStatus::Succeeded => ALL_SUCCEEDED_MESSAGE.to_string(),
            BatchStatus::Aborted => ABORTED_MESSAGE.to_string(),
            BatchStatus::Failed => {
                format!("{SOME_FAILED_MESSAGE}\n{}", self.errors.join("\n"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(name: &str, status: UploadStatus, error: &str) -> FileOutcome {
        FileOutcome {
            progress: FileProgress {
                file_name: name.into(),
                status,
                total_bytes: 10,
                confirmed_bytes: 0,
                in_flight_bytes: 0,
                error: error.into(),
            },
            upload_id: "u1".into(),
            chunks_uploaded: 0,
            stored_objects: Vec::new(),
        }
    }

    #[test]
    fn default_settings() {
        let s = TransferSettings::default();
        assert_eq!(s.endpoint, "http://localhost:3000/api/upload");
        assert_eq!(s.chunk_size, 100 * 1024 * 1024);
        assert_eq!(s.max_attempts, 3);
        assert_eq!(s.attempt_timeout, Duration::from_secs(600));
        assert_eq!(s.retry_delay, Duration::ZERO);
        assert_eq!(s.retry_policy().max_attempts(), 3);
    }

    #[test]
    fn settings_json_partial() {
        let s: TransferSettings =
            serde_json::from_str(r#"{"chunkSize":1024,"attemptTimeout":1.5}"#).unwrap();
        assert_eq!(s.chunk_size, 1024);
        assert_eq!(s.attempt_timeout, Duration::from_millis(1500));
        assert_eq!(s.max_attempts, DEFAULT_MAX_ATTEMPTS);
    }

    #[test]
    fn settings_reject_negative_duration() {
        let result = serde_json::from_str::<TransferSettings>(r#"{"retryDelay":-1}"#);
        assert!(result.is_err());
    }

    #[test]
    fn batch_all_succeeded() {
        let batch = BatchOutcome::from_files(
            vec![
                outcome("a.bin", UploadStatus::Succeeded, ""),
                outcome("b.bin", UploadStatus::Succeeded, ""),
            ],
            false,
        );
        assert!(batch.succeeded());
        assert!(batch.errors.is_empty());
        assert_eq!(batch.status_message(), "All files uploaded successfully!");
    }

    #[test]
    fn batch_collects_errors_by_name() {
        let batch = BatchOutcome::from_files(
            vec![
                outcome("a.bin", UploadStatus::Failed, "Upload failed: Bad Gateway"),
                outcome("b.bin", UploadStatus::Succeeded, ""),
                outcome("c.bin", UploadStatus::Failed, "Upload timed out."),
            ],
            false,
        );
        assert_eq!(batch.status, BatchStatus::Failed);
        assert_eq!(
            batch.errors,
            vec![
                "a.bin: Upload failed: Bad Gateway".to_string(),
                "c.bin: Upload timed out.".to_string(),
            ]
        );
        assert_eq!(
            batch.status_message(),
            "Some files failed to upload:\na.bin: Upload failed: Bad Gateway\nc.bin: Upload timed out."
        );
    }

    #[test]
    fn batch_aborted_reports_single_message() {
        let batch = BatchOutcome::from_files(
            vec![outcome("a.bin", UploadStatus::Aborted, "Upload aborted by user.")],
            true,
        );
        assert_eq!(batch.status, BatchStatus::Aborted);
        assert!(batch.errors.is_empty());
        assert_eq!(batch.status_message(), "Upload aborted by user.");
    }

    #[test]
    fn empty_batch_succeeds() {
        let batch = BatchOutcome::from_files(Vec::new(), false);
        assert!(batch.succeeded());
    }

    #[tokio::test]
    async fn disabled_sink_drops_events() {
        let sink = EventSink::disabled();
        sink.emit(UploadEvent::BatchFinished {
            status: BatchStatus::Succeeded,
            message: String::new(),
        });
        sink.deliver(UploadEvent::BatchFinished {
            status: BatchStatus::Succeeded,
            message: String::new(),
        })
        .await;
    }

    #[tokio::test]
    async fn emit_drops_when_full_but_deliver_waits() {
        let (tx, mut rx) = mpsc::channel(1);
        let sink = EventSink::new(tx);
        let ev = |n: usize| UploadEvent::ChunkRetry {
            file_name: "a".into(),
            chunk_index: n,
            attempt: 1,
            error: String::new(),
        };
        sink.emit(ev(0));
        sink.emit(ev(1)); // dropped: channel full

        assert_eq!(rx.recv().await, Some(ev(0)));
        sink.deliver(ev(2)).await;
        assert_eq!(rx.recv().await, Some(ev(2)));
    }
}
