//! Per-file upload controller.
//!
//! Drives one file through `Pending -> Uploading -> Succeeded | Failed |
//! Aborted`, sending its chunks strictly in order through the retry policy.

use std::sync::atomic::{AtomicU64, Ordering};

use simpleupload_protocol::constants::ABORTED_MESSAGE;
use simpleupload_protocol::UploadStatus;
use simpleupload_transfer::{FileSession, SourceFile, ThroughputMeter};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use uuid::Uuid;

use crate::retry::ChunkOutcome;
use crate::transport::{ChunkRequest, ChunkTransport, TransportFailure};
use crate::types::{EventSink, FileOutcome, TransferSettings, UploadEvent};

/// Uploads a single file.
pub struct FileTransferController<'a> {
    transport: &'a dyn ChunkTransport,
    settings: &'a TransferSettings,
    cancel: CancellationToken,
}

impl<'a> FileTransferController<'a> {
    pub fn new(
        transport: &'a dyn ChunkTransport,
        settings: &'a TransferSettings,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            transport,
            settings,
            cancel,
        }
    }

    /// Uploads `source` and returns its final state.
    ///
    /// A zero-byte file succeeds without any request. The first chunk that
    /// exhausts its attempts fails the file; an abort stops it at once.
    pub async fn run(&self, source: &SourceFile, events: &EventSink) -> FileOutcome {
        let plan = source.chunks(self.settings.chunk_size);
        let chunk_count = plan.chunk_count();
        let upload_id = Uuid::new_v4().to_string();
        let session = FileSession::new(source.name(), source.size());

        if self.cancel.is_cancelled() {
            session.abort(ABORTED_MESSAGE);
            return self.finish(&session, upload_id, 0, Vec::new(), events).await;
        }

        session.start();
        info!(
            file = %source.name(),
            bytes = source.size(),
            chunks = chunk_count,
            upload_id = %upload_id,
            "upload started"
        );
        events
            .deliver(UploadEvent::FileStarted {
                file_name: source.name().to_string(),
                total_bytes: source.size(),
                chunk_count,
            })
            .await;

        let policy = self.settings.retry_policy();
        let speed = ThroughputMeter::default();
        let last_sent = AtomicU64::new(0);

        let progress = |sent: u64| {
            let previous = last_sent.swap(sent, Ordering::Relaxed);
            if sent > previous {
                speed.record(sent - previous);
            }
            let percent = session.set_in_flight(sent);
            events.emit(progress_event(&session, percent, speed.bytes_per_second()));
        };

        let mut chunks_uploaded = 0;
        let mut stored_objects = Vec::new();

        for chunk in &plan {
            let request = ChunkRequest {
                source,
                chunk,
                chunk_count,
                upload_id: &upload_id,
            };
            let on_retry = |attempt: u32, failure: &TransportFailure| {
                events.emit(UploadEvent::ChunkRetry {
                    file_name: source.name().to_string(),
                    chunk_index: chunk.index,
                    attempt,
                    error: failure.to_string(),
                });
            };

            match policy
                .run(self.transport, &request, &progress, &self.cancel, &on_retry)
                .await
            {
                ChunkOutcome::Success { stored, .. } => {
                    last_sent.store(0, Ordering::Relaxed);
                    let percent = session.confirm_chunk(chunk.length);
                    chunks_uploaded += 1;
                    stored_objects.extend(stored);
                    events
                        .deliver(progress_event(&session, percent, speed.bytes_per_second()))
                        .await;
                }
                ChunkOutcome::Aborted => {
                    info!(file = %source.name(), chunk = chunk.index, "upload aborted");
                    session.abort(ABORTED_MESSAGE);
                    break;
                }
                ChunkOutcome::Exhausted { failure, attempts } => {
                    error!(
                        file = %source.name(),
                        chunk = chunk.index,
                        attempts,
                        error = %failure,
                        "upload failed"
                    );
                    session.fail(&failure.to_string());
                    break;
                }
            }
        }

        if session.status() == UploadStatus::Uploading {
            session.succeed();
            info!(
                file = %source.name(),
                chunks = chunks_uploaded,
                elapsed_ms = session.elapsed().as_millis() as u64,
                "upload completed"
            );
            if chunk_count == 0 {
                events.deliver(progress_event(&session, 100.0, 0.0)).await;
            }
        }

        self.finish(&session, upload_id, chunks_uploaded, stored_objects, events)
            .await
    }

    async fn finish(
        &self,
        session: &FileSession,
        upload_id: String,
        chunks_uploaded: usize,
        stored_objects: Vec<String>,
        events: &EventSink,
    ) -> FileOutcome {
        let progress = session.progress();
        events
            .deliver(UploadEvent::FileFinished {
                file_name: progress.file_name.clone(),
                status: progress.status,
                error: (!progress.error.is_empty()).then(|| progress.error.clone()),
            })
            .await;

        FileOutcome {
            progress,
            upload_id,
            chunks_uploaded,
            stored_objects,
        }
    }
}

fn progress_event(session: &FileSession, percent: f64, bytes_per_second: f64) -> UploadEvent {
    let p = session.progress();
    UploadEvent::Progress {
        transferred_bytes: p.confirmed_bytes + p.in_flight_bytes,
        total_bytes: p.total_bytes,
        file_name: p.file_name,
        percent,
        bytes_per_second,
    }
}
