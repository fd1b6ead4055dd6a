//! HTTP chunk transport: one multipart `POST` per chunk.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client, StatusCode, Url};
use simpleupload_protocol::constants::{
    FIELD_CHECKSUM, FIELD_CHUNK_COUNT, FIELD_CHUNK_INDEX, FIELD_FILES, FIELD_OFFSET,
    FIELD_TOTAL_SIZE, FIELD_UPLOAD_ID,
};
use simpleupload_protocol::{ErrorResponse, UploadResponse};
use simpleupload_transfer::TransferError;
use tokio::sync::watch;
use tokio_util::io::ReaderStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::UploaderError;
use crate::transport::{
    AttemptOutcome, ChunkRequest, ChunkTransport, ProgressFn, TransportFailure,
};
use crate::types::TransferSettings;

/// Sends chunks to the upload endpoint with `reqwest`.
///
/// The chunk body is streamed from the source, so memory use does not grow
/// with the chunk size.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    endpoint: Url,
    attempt_timeout: Duration,
    send_checksums: bool,
}

impl HttpTransport {
    pub fn new(settings: &TransferSettings) -> Result<Self, UploaderError> {
        let endpoint = Url::parse(&settings.endpoint)
            .map_err(|e| UploaderError::InvalidEndpoint(format!("{}: {e}", settings.endpoint)))?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(UploaderError::InvalidEndpoint(format!(
                "{}: unsupported scheme",
                settings.endpoint
            )));
        }

        let client = Client::builder()
            .user_agent(concat!("simpleupload/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            endpoint,
            attempt_timeout: settings.attempt_timeout,
            send_checksums: settings.send_checksums,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    async fn attempt(
        &self,
        request: &ChunkRequest<'_>,
        progress: &ProgressFn<'_>,
        cancel: &CancellationToken,
    ) -> AttemptOutcome {
        let (sent_tx, mut sent_rx) = watch::channel(0u64);

        let deadline = tokio::time::sleep(self.attempt_timeout);
        tokio::pin!(deadline);
        let exchange = self.exchange(request, sent_tx);
        tokio::pin!(exchange);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(
                        file = %request.source.name(),
                        chunk = request.chunk.index,
                        "chunk request cancelled"
                    );
                    return AttemptOutcome::Aborted;
                }
                _ = &mut deadline => {
                    warn!(
                        file = %request.source.name(),
                        chunk = request.chunk.index,
                        timeout_secs = self.attempt_timeout.as_secs_f64(),
                        "chunk request timed out"
                    );
                    return AttemptOutcome::Failed(TransportFailure::Timeout);
                }
                Ok(()) = sent_rx.changed() => {
                    let sent = *sent_rx.borrow_and_update();
                    progress(sent);
                }
                outcome = &mut exchange => return outcome,
            }
        }
    }

    /// Sends the request and reads the response. Bytes written to the
    /// request body are published on `sent_tx`.
    async fn exchange(
        &self,
        request: &ChunkRequest<'_>,
        sent_tx: watch::Sender<u64>,
    ) -> AttemptOutcome {
        let form = match self.build_form(request, sent_tx).await {
            Ok(form) => form,
            Err(e) => return AttemptOutcome::Failed(TransportFailure::Read(e.to_string())),
        };

        debug!(
            file = %request.source.name(),
            chunk = request.chunk.index,
            of = request.chunk_count,
            offset = request.chunk.offset,
            bytes = request.chunk.length,
            "sending chunk"
        );

        let response = match self
            .client
            .post(self.endpoint.clone())
            .multipart(form)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => return AttemptOutcome::Failed(TransportFailure::Network(e.to_string())),
        };

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            if let Ok(err) = serde_json::from_str::<ErrorResponse>(&body) {
                warn!(status = status.as_u16(), error = %err.error, "server rejected chunk");
            } else {
                warn!(status = status.as_u16(), "server rejected chunk");
            }
            return AttemptOutcome::Failed(TransportFailure::from_status(status));
        }

        match response.bytes().await {
            Ok(body) => {
                // A body that is not the usual JSON is ignored.
                let parsed: UploadResponse = serde_json::from_slice(&body).unwrap_or_default();
                AttemptOutcome::Success(parsed.uploaded_files)
            }
            Err(e) => AttemptOutcome::Failed(TransportFailure::Network(e.to_string())),
        }
    }

    async fn build_form(
        &self,
        request: &ChunkRequest<'_>,
        sent_tx: watch::Sender<u64>,
    ) -> Result<Form, TransferError> {
        let source = request.source;
        let chunk = request.chunk;

        let mut form = Form::new()
            .text(FIELD_UPLOAD_ID, request.upload_id.to_string())
            .text(FIELD_CHUNK_INDEX, chunk.index.to_string())
            .text(FIELD_CHUNK_COUNT, request.chunk_count.to_string())
            .text(FIELD_OFFSET, chunk.offset.to_string())
            .text(FIELD_TOTAL_SIZE, source.size().to_string());
        if self.send_checksums {
            form = form.text(FIELD_CHECKSUM, source.chunk_checksum(&chunk).await?);
        }

        let reader = source.open_chunk(&chunk).await?;
        let mut sent = 0u64;
        let stream = ReaderStream::new(reader).map(move |item| {
            if let Ok(bytes) = &item {
                sent += bytes.len() as u64;
                let _ = sent_tx.send(sent);
            }
            item
        });

        let part = Part::stream_with_length(Body::wrap_stream(stream), chunk.length)
            .file_name(source.name().to_string());
        Ok(form.part(FIELD_FILES, part))
    }
}

impl ChunkTransport for HttpTransport {
    fn send_chunk<'a>(
        &'a self,
        request: &'a ChunkRequest<'a>,
        progress: &'a ProgressFn<'a>,
        cancel: &'a CancellationToken,
    ) -> Pin<Box<dyn Future<Output = AttemptOutcome> + Send + 'a>> {
        Box::pin(self.attempt(request, progress, cancel))
    }
}
