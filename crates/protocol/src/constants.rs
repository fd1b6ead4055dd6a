//! Endpoint path and multipart field names.

/// Path of the upload endpoint.
pub const UPLOAD_PATH: &str = "/api/upload";

/// Multipart field carrying the chunk bytes under the original file name.
pub const FIELD_FILES: &str = "files";

/// Per-file upload session identifier, shared by all chunks of one file.
pub const FIELD_UPLOAD_ID: &str = "uploadId";

/// Zero-based sequence index of the chunk.
pub const FIELD_CHUNK_INDEX: &str = "chunkIndex";

/// Total number of chunks in the file.
pub const FIELD_CHUNK_COUNT: &str = "chunkCount";

/// Byte offset of the chunk within the file.
pub const FIELD_OFFSET: &str = "offset";

/// Total size of the file in bytes.
pub const FIELD_TOTAL_SIZE: &str = "totalSize";

/// SHA-256 hex digest of the chunk bytes (optional).
pub const FIELD_CHECKSUM: &str = "checksum";

/// Status message recorded when the user aborts an upload.
pub const ABORTED_MESSAGE: &str = "Upload aborted by user.";

/// Batch status message when every file succeeded.
pub const ALL_SUCCEEDED_MESSAGE: &str = "All files uploaded successfully!";

/// Header line of the batch status message when some files failed.
pub const SOME_FAILED_MESSAGE: &str = "Some files failed to upload:";
