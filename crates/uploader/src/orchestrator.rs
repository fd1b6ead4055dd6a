//! Batch upload orchestrator.
//!
//! Uploads the selected files one after another and aggregates the
//! outcome. Supports user abort through a cloneable [`AbortHandle`].

use std::sync::{Arc, Mutex};

use simpleupload_protocol::UploadStatus;
use simpleupload_transfer::SourceFile;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::controller::FileTransferController;
use crate::error::UploaderError;
use crate::http::HttpTransport;
use crate::transport::ChunkTransport;
use crate::types::{BatchOutcome, BatchStatus, EventSink, TransferSettings, UploadEvent};

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Cancels the batch that is currently uploading.
///
/// Cloneable and `Send`, so a signal handler or UI task can hold one.
/// Aborting when nothing is uploading has no effect on later batches.
#[derive(Debug, Clone, Default)]
pub struct AbortHandle {
    token: Arc<Mutex<CancellationToken>>,
}

impl AbortHandle {
    /// Requests abort. Idempotent.
    pub fn abort(&self) {
        self.token.lock().unwrap().cancel();
    }

    /// Returns `true` if the current (or last) batch was aborted.
    pub fn is_aborted(&self) -> bool {
        self.token.lock().unwrap().is_cancelled()
    }

    /// Installs a fresh token for a new batch and returns it.
    fn arm(&self) -> CancellationToken {
        let fresh = CancellationToken::new();
        *self.token.lock().unwrap() = fresh.clone();
        fresh
    }
}

/// Uploads a set of files sequentially.
pub struct BatchUploadOrchestrator {
    transport: Arc<dyn ChunkTransport>,
    settings: TransferSettings,
    files: Vec<SourceFile>,
    abort: AbortHandle,
    events: EventSink,
    events_taken: bool,
}

impl BatchUploadOrchestrator {
    pub fn new(transport: Arc<dyn ChunkTransport>, settings: TransferSettings) -> Self {
        Self {
            transport,
            settings,
            files: Vec::new(),
            abort: AbortHandle::default(),
            events: EventSink::disabled(),
            events_taken: false,
        }
    }

    /// Creates an orchestrator that uploads over HTTP to `settings.endpoint`.
    pub fn with_http(settings: TransferSettings) -> Result<Self, UploaderError> {
        let transport = HttpTransport::new(&settings)?;
        Ok(Self::new(Arc::new(transport), settings))
    }

    pub fn settings(&self) -> &TransferSettings {
        &self.settings
    }

    /// Replaces the selected files.
    pub fn select_files(&mut self, files: impl IntoIterator<Item = SourceFile>) {
        self.files = files.into_iter().collect();
    }

    /// Appends one file to the selection.
    pub fn add_file(&mut self, file: SourceFile) {
        self.files.push(file);
    }

    pub fn files(&self) -> &[SourceFile] {
        &self.files
    }

    pub fn clear(&mut self) {
        self.files.clear();
    }

    /// Takes the event receiver. Can only be called once.
    ///
    /// Until this is called, events are discarded.
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<UploadEvent>> {
        if self.events_taken {
            return None;
        }
        self.events_taken = true;
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        self.events = EventSink::new(tx);
        Some(rx)
    }

    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    /// Aborts the running batch.
    pub fn abort(&self) {
        self.abort.abort();
    }

    /// Uploads every selected file in order, then clears the selection.
    ///
    /// Files after an aborted one are never started.
    pub async fn upload(&mut self) -> BatchOutcome {
        let files = std::mem::take(&mut self.files);
        let batch = self.abort.arm();

        if !files.is_empty() {
            info!(files = files.len(), endpoint = %self.settings.endpoint, "batch upload started");
        }

        let mut outcomes = Vec::with_capacity(files.len());
        for file in &files {
            if batch.is_cancelled() {
                break;
            }
            let controller = FileTransferController::new(
                self.transport.as_ref(),
                &self.settings,
                batch.child_token(),
            );
            outcomes.push(controller.run(file, &self.events).await);
        }

        let aborted = outcomes.len() < files.len()
            || outcomes.iter().any(|o| o.status() == UploadStatus::Aborted);
        let outcome = BatchOutcome::from_files(outcomes, aborted);

        match outcome.status {
            BatchStatus::Succeeded => info!(files = outcome.files.len(), "batch upload completed"),
            BatchStatus::Failed => {
                warn!(failed = outcome.errors.len(), "batch upload finished with failures")
            }
            BatchStatus::Aborted => info!(
                started = outcome.files.len(),
                selected = files.len(),
                "batch upload aborted"
            ),
        }

        self.events
            .deliver(UploadEvent::BatchFinished {
                status: outcome.status,
                message: outcome.status_message(),
            })
            .await;
        outcome
    }
}
