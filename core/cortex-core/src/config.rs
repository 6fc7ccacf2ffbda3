//! Daemon settings loaded from `settings.yaml`.
//!
//! A missing or empty file yields defaults. Unknown keys are ignored so older
//! binaries can read settings written by newer ones.

use std::path::Path;

use fs_err as fs;
use serde::{Deserialize, Serialize};

use crate::error::{CortexError, Result};

pub const DEFAULT_PORT: u16 = 4200;
pub const DEFAULT_LOG_LEVEL: &str = "info";
pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    pub port: u16,
    pub log_level: String,
    pub bind_address: String,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        DaemonConfig {
            port: DEFAULT_PORT,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
        }
    }
}

impl DaemonConfig {
    /// Loads settings, returning defaults if the file doesn't exist.
    pub fn load(path: &Path) -> Result<Self> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(CortexError::io(format!("reading {}", path.display()), e)),
        };

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        serde_yaml::from_str(&content).map_err(|e| CortexError::ConfigMalformed {
            path: path.to_path_buf(),
            details: e.to_string(),
        })
    }

    /// Base URL the daemon serves on.
    pub fn base_url(&self) -> String {
        format!("http://localhost:{}", self.port)
    }
}
