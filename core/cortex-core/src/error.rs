//! Error types for cortex-core operations.

use std::path::PathBuf;

use crate::store::frontmatter::FrontmatterError;

/// All errors that can occur in cortex-core operations.
#[derive(Debug, thiserror::Error)]
pub enum CortexError {
    // ─────────────────────────────────────────────────────────────────────
    // Input Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("validation failed: {field}: {message}")]
    Validation { field: String, message: String },

    #[error("{resource} not found: {id}")]
    NotFound { resource: String, id: String },

    // ─────────────────────────────────────────────────────────────────────
    // Format Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Frontmatter error: {context}: {source}")]
    Frontmatter {
        context: String,
        #[source]
        source: FrontmatterError,
    },

    #[error("JSON parsing error: {context}: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    // ─────────────────────────────────────────────────────────────────────
    // I/O Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("I/O error: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // ─────────────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Configuration file malformed: {path}: {details}")]
    ConfigMalformed { path: PathBuf, details: String },

    #[error("Home directory could not be determined")]
    HomeDirNotFound,

    // ─────────────────────────────────────────────────────────────────────
    // Daemon Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("daemon failed to start: not healthy after {attempts} attempts")]
    DaemonStartFailed { attempts: usize },

    #[error("daemon executable not found: {name}")]
    DaemonExecutableNotFound { name: String },

    #[error("daemon is not running ({reason})")]
    DaemonNotRunning { reason: String },

    #[error("operation cancelled")]
    Cancelled,
}

impl CortexError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        CortexError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn not_found(resource: impl Into<String>, id: impl Into<String>) -> Self {
        CortexError::NotFound {
            resource: resource.into(),
            id: id.into(),
        }
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        CortexError::Io {
            context: context.into(),
            source,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, CortexError::NotFound { .. })
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, CortexError::Validation { .. })
    }
}

/// Convenience type alias for Results using CortexError.
pub type Result<T> = std::result::Result<T, CortexError>;

// Conversion for string error compatibility
impl From<CortexError> for String {
    fn from(err: CortexError) -> String {
        err.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_message_names_resource_and_id() {
        let err = CortexError::not_found("ticket", "abc12345");
        assert_eq!(err.to_string(), "ticket not found: abc12345");
        assert!(err.is_not_found());
        assert!(!err.is_validation());
    }

    #[test]
    fn io_error_keeps_source() {
        use std::error::Error;
        let err = CortexError::io(
            "reading /tmp/x",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(err.to_string().contains("reading /tmp/x"));
        assert!(err.source().is_some());
    }
}
