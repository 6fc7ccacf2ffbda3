//! The daemon's PID file: a small JSON self-description written at spawn.
//!
//! ```json
//! {"pid": 12345, "port": 4200, "started_at": "2026-01-01T00:00:00Z", "version": "0.3.0"}
//! ```

use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use fs_err as fs;
use serde::{Deserialize, Serialize};

use crate::error::{CortexError, Result};
use crate::store::write_atomic;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PidInfo {
    pub pid: u32,
    pub port: u16,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub version: String,
}

impl PidInfo {
    pub fn new(pid: u32, port: u16, version: impl Into<String>) -> Self {
        PidInfo {
            pid,
            port,
            started_at: Utc::now(),
            version: version.into(),
        }
    }

    /// Time since the daemon started, clamped at zero.
    pub fn uptime(&self, now: DateTime<Utc>) -> Duration {
        (now - self.started_at).max(Duration::zero())
    }
}

#[derive(Debug, Clone)]
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes atomically, creating the parent directory if needed.
    pub fn write(&self, info: &PidInfo) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| CortexError::io(format!("creating {}", parent.display()), e))?;
        }
        let content = serde_json::to_string_pretty(info).map_err(|source| CortexError::Json {
            context: "serializing PID file".to_string(),
            source,
        })?;
        write_atomic(&self.path, content.as_bytes())
    }

    /// `Ok(None)` when the file doesn't exist; malformed contents are an error.
    pub fn read(&self) -> Result<Option<PidInfo>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(CortexError::io(
                    format!("reading {}", self.path.display()),
                    e,
                ))
            }
        };
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|source| CortexError::Json {
                context: format!("parsing {}", self.path.display()),
                source,
            })
    }

    /// Removes the file. A file that is already gone is not an error.
    pub fn remove(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CortexError::io(
                format!("removing {}", self.path.display()),
                e,
            )),
        }
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }
}
