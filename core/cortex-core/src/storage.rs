//! Storage configuration and path management for Cortex.
//!
//! Two kinds of paths exist:
//!
//! - **Global** files under the Cortex home (`~/.cortex` or `$CORTEX_HOME`): the daemon
//!   PID file, its log, settings, and the meta session registry.
//! - **Project** files under `{project}/.cortex/`: tickets, docs, and that project's
//!   session registry.
//!
//! Tests use `StorageConfig::with_root()` so nothing touches the real home directory.

use std::path::{Path, PathBuf};

use crate::error::{CortexError, Result};

/// Environment variable overriding the Cortex home directory.
pub const HOME_ENV: &str = "CORTEX_HOME";

/// Directory name used both in the home directory and inside projects.
pub const CORTEX_DIR: &str = ".cortex";

/// Central configuration for global Cortex paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    /// Root directory for global Cortex data (default: ~/.cortex)
    root: PathBuf,
}

impl StorageConfig {
    /// Resolves the home from `$CORTEX_HOME`, falling back to `~/.cortex`.
    pub fn from_env() -> Result<Self> {
        if let Some(root) = std::env::var_os(HOME_ENV).filter(|v| !v.is_empty()) {
            return Ok(Self::with_root(PathBuf::from(root)));
        }
        let home = dirs::home_dir().ok_or(CortexError::HomeDirNotFound)?;
        Ok(Self::with_root(home.join(CORTEX_DIR)))
    }

    /// Creates a StorageConfig with a custom root directory.
    /// Used for testing with temp directories.
    pub fn with_root(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Global Files
    // ─────────────────────────────────────────────────────────────────────────────

    /// Path to daemon.pid (running daemon's self-description).
    pub fn pid_file(&self) -> PathBuf {
        self.root.join("daemon.pid")
    }

    /// Directory holding daemon.log.
    pub fn log_dir(&self) -> &Path {
        &self.root
    }

    pub fn log_file(&self) -> PathBuf {
        self.root.join("daemon.log")
    }

    /// Path to settings.yaml (daemon configuration).
    pub fn settings_file(&self) -> PathBuf {
        self.root.join("settings.yaml")
    }

    /// Path to meta-session.json (the single daemon-wide meta session).
    pub fn meta_sessions_file(&self) -> PathBuf {
        self.root.join("meta-session.json")
    }

    /// Creates the root directory if it doesn't exist.
    pub fn ensure_root(&self) -> Result<()> {
        fs_err::create_dir_all(&self.root)
            .map_err(|e| CortexError::io(format!("creating {}", self.root.display()), e))
    }
}

/// Paths inside one project's `.cortex` directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectPaths {
    project: PathBuf,
}

impl ProjectPaths {
    pub fn new(project: impl Into<PathBuf>) -> Self {
        Self {
            project: project.into(),
        }
    }

    pub fn project(&self) -> &Path {
        &self.project
    }

    pub fn cortex_dir(&self) -> PathBuf {
        self.project.join(CORTEX_DIR)
    }

    pub fn tickets_dir(&self) -> PathBuf {
        self.cortex_dir().join("tickets")
    }

    pub fn docs_dir(&self) -> PathBuf {
        self.cortex_dir().join("docs")
    }

    pub fn sessions_file(&self) -> PathBuf {
        self.cortex_dir().join("sessions.json")
    }
}
