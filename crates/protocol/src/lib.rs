//! Wire protocol types for the `POST /api/upload` endpoint.
//!
//! Shared by the uploader engine (client side) and any server that
//! accepts chunk uploads.

pub mod constants;
pub mod destination;
pub mod types;

pub use destination::{ConfigError, DestinationConfig};
pub use types::{ErrorResponse, FileProgress, UploadResponse, UploadStatus};
