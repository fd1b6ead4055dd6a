//! Blob-sink destination configuration.
//!
//! Replaces process-wide environment globals with an explicit struct that
//! the server collaborator receives at construction time.

use serde::{Deserialize, Serialize};

/// Environment variable naming the storage account.
pub const ENV_ACCOUNT_NAME: &str = "AZURE_STORAGE_ACCOUNT_NAME";

/// Environment variable naming the blob container.
pub const ENV_CONTAINER_NAME: &str = "AZURE_STORAGE_CONTAINER_NAME";

/// Errors produced while resolving the destination.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Storage configuration missing.")]
    MissingDestination,
}

/// Where the blob sink stores uploaded objects.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DestinationConfig {
    #[serde(default)]
    pub account_name: String,
    #[serde(default)]
    pub container_name: String,
}

impl DestinationConfig {
    pub fn new(account_name: impl Into<String>, container_name: impl Into<String>) -> Self {
        Self {
            account_name: account_name.into(),
            container_name: container_name.into(),
        }
    }

    /// Reads the destination from the process environment.
    ///
    /// Missing variables become empty strings; call [`validate`](Self::validate)
    /// before use.
    pub fn from_env() -> Self {
        Self {
            account_name: std::env::var(ENV_ACCOUNT_NAME).unwrap_or_default(),
            container_name: std::env::var(ENV_CONTAINER_NAME).unwrap_or_default(),
        }
    }

    /// Fails if either the account or the container is unset.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.account_name.trim().is_empty() || self.container_name.trim().is_empty() {
            return Err(ConfigError::MissingDestination);
        }
        Ok(())
    }

    /// Blob service endpoint of the account.
    pub fn service_url(&self) -> String {
        format!("https://{}.blob.core.windows.net", self.account_name)
    }
}
