use serde::{Deserialize, Serialize};

/// Successful response body of the upload endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    /// Names under which the blob sink stored the uploaded parts.
    #[serde(default)]
    pub uploaded_files: Vec<String>,
}

/// Error response body of the upload endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Lifecycle of a single file upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadStatus {
    Pending,
    Uploading,
    Succeeded,
    Failed,
    Aborted,
}

impl UploadStatus {
    /// Returns `true` once the upload has settled.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            UploadStatus::Succeeded | UploadStatus::Failed | UploadStatus::Aborted
        )
    }
}

/// Snapshot of a file's upload progress, handed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileProgress {
    pub file_name: String,
    pub status: UploadStatus,
    pub total_bytes: u64,
    /// Bytes of chunks the server acknowledged.
    pub confirmed_bytes: u64,
    /// Bytes sent so far for the chunk currently in flight.
    pub in_flight_bytes: u64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
}

impl FileProgress {
    /// Returns the upload progress as a percentage clamped to `[0, 100]`.
    ///
    /// An empty file counts as complete only once it has succeeded.
    pub fn percentage(&self) -> f64 {
        if self.total_bytes == 0 {
            return if self.status == UploadStatus::Succeeded {
                100.0
            } else {
                0.0
            };
        }
        let sent = self.confirmed_bytes.saturating_add(self.in_flight_bytes);
        (sent as f64 / self.total_bytes as f64 * 100.0).min(100.0)
    }
}
