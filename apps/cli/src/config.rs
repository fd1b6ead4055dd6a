//! CLI configuration.
//!
//! Settings live in `~/.config/simpleupload/config.json` (`%APPDATA%` on
//! Windows). Every field is optional; command-line flags win over the file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use simpleupload_uploader::TransferSettings;

/// Contents of the config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CliConfig {
    #[serde(flatten)]
    pub transfer: TransferSettings,

    /// Draw per-file progress bars.
    pub show_progress: bool,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            transfer: TransferSettings::default(),
            show_progress: true,
        }
    }
}

/// Values given on the command line. `None` keeps the configured value.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub endpoint: Option<String>,
    pub chunk_size_mib: Option<u64>,
    pub max_attempts: Option<u32>,
    pub timeout_secs: Option<u64>,
    pub retry_delay_secs: Option<u64>,
    pub checksums: bool,
    pub no_progress: bool,
}

impl CliConfig {
    /// Loads the config file at `path`, or the default location.
    ///
    /// A missing default file yields defaults. An explicit path must exist.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let (path, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (config_path()?, false),
        };

        if !path.exists() {
            if explicit {
                anyhow::bail!("config file not found: {}", path.display());
            }
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        match serde_json::from_str::<CliConfig>(&content) {
            Ok(config) => {
                tracing::debug!(path = %path.display(), "configuration loaded");
                Ok(config)
            }
            Err(e) if explicit => {
                Err(e).with_context(|| format!("failed to parse {}", path.display()))
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config, using defaults"
                );
                Ok(Self::default())
            }
        }
    }

    /// Applies command-line overrides.
    pub fn apply(mut self, overrides: &Overrides) -> Self {
        let t = &mut self.transfer;
        if let Some(endpoint) = &overrides.endpoint {
            t.endpoint = endpoint.clone();
        }
        if let Some(mib) = overrides.chunk_size_mib {
            t.chunk_size = mib.saturating_mul(1024 * 1024);
        }
        if let Some(n) = overrides.max_attempts {
            t.max_attempts = n;
        }
        if let Some(secs) = overrides.timeout_secs {
            t.attempt_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = overrides.retry_delay_secs {
            t.retry_delay = Duration::from_secs(secs);
        }
        if overrides.checksums {
            t.send_checksums = true;
        }
        if overrides.no_progress {
            self.show_progress = false;
        }
        self
    }
}

/// Default config file location.
pub fn config_path() -> anyhow::Result<PathBuf> {
    Ok(config_base_dir()?.join("simpleupload").join("config.json"))
}

fn config_base_dir() -> anyhow::Result<PathBuf> {
    #[cfg(target_os = "linux")]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        Ok(PathBuf::from(home).join(".config"))
    }

    #[cfg(target_os = "windows")]
    {
        let appdata =
            std::env::var("APPDATA").unwrap_or_else(|_| "C:\\Users\\Default\\AppData".into());
        Ok(PathBuf::from(appdata))
    }

    #[cfg(not(any(target_os = "linux", target_os = "windows")))]
    {
        Ok(PathBuf::from("/tmp"))
    }
}
