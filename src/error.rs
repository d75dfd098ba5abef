//! Error types for MemoryLane.
//!
//! Provides structured error handling with:
//! - Machine-readable error codes (`ErrorCode`)
//! - Category-based exit codes (2=store, 3=document, 4=validation, etc.)
//! - Context-aware recovery hints
//! - Structured JSON output for piped / non-TTY consumers

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for MemoryLane operations.
pub type Result<T> = std::result::Result<T, Error>;

// ── Error Code ────────────────────────────────────────────────

/// Machine-readable error codes grouped by category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Store (exit 2)
    NotInitialized,
    AlreadyInitialized,
    DatabaseError,

    // Documents (exit 3)
    DocumentReadError,
    VaultNotConfigured,

    // Validation (exit 4)
    InvalidArgument,

    // Config (exit 7)
    ConfigError,

    // I/O (exit 8)
    IoError,
    JsonError,

    // Internal (exit 1)
    InternalError,
}

impl ErrorCode {
    /// Machine-readable SCREAMING_SNAKE code string.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        match self {
            Self::NotInitialized => "NOT_INITIALIZED",
            Self::AlreadyInitialized => "ALREADY_INITIALIZED",
            Self::DatabaseError => "DATABASE_ERROR",
            Self::DocumentReadError => "DOCUMENT_READ_ERROR",
            Self::VaultNotConfigured => "VAULT_NOT_CONFIGURED",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::ConfigError => "CONFIG_ERROR",
            Self::IoError => "IO_ERROR",
            Self::JsonError => "JSON_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Category-based exit code.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::InternalError => 1,
            Self::NotInitialized | Self::AlreadyInitialized | Self::DatabaseError => 2,
            Self::DocumentReadError | Self::VaultNotConfigured => 3,
            Self::InvalidArgument => 4,
            Self::ConfigError => 7,
            Self::IoError | Self::JsonError => 8,
        }
    }

    /// Whether retrying the same call may succeed.
    ///
    /// Busy databases and unreadable documents are transient; a store that
    /// was never opened is not.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::InvalidArgument | Self::DatabaseError | Self::DocumentReadError
        )
    }
}

// ── Error Enum ────────────────────────────────────────────────

/// Errors that can occur in MemoryLane operations.
#[derive(Error, Debug)]
pub enum Error {
    /// The row store has not been opened (or was closed).
    ///
    /// Distinct from an empty result: callers must surface it as a failure.
    #[error("Index store unavailable: run `mlane init` first")]
    NotInitialized,

    #[error("Already initialized at {path}")]
    AlreadyInitialized { path: PathBuf },

    #[error("No vault configured")]
    VaultNotConfigured,

    #[error("Failed to read document {path}: {message}")]
    DocumentRead { path: String, message: String },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Map this error to its structured `ErrorCode`.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::NotInitialized => ErrorCode::NotInitialized,
            Self::AlreadyInitialized { .. } => ErrorCode::AlreadyInitialized,
            Self::VaultNotConfigured => ErrorCode::VaultNotConfigured,
            Self::DocumentRead { .. } => ErrorCode::DocumentReadError,
            Self::Database(_) => ErrorCode::DatabaseError,
            Self::InvalidArgument(_) => ErrorCode::InvalidArgument,
            Self::Config(_) => ErrorCode::ConfigError,
            Self::Io(_) => ErrorCode::IoError,
            Self::Json(_) => ErrorCode::JsonError,
            Self::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Category-based exit code, delegating to the `ErrorCode`.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        self.error_code().exit_code()
    }

    /// Context-aware recovery hint.
    ///
    /// Returns `None` if no actionable suggestion exists.
    #[must_use]
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::NotInitialized => {
                Some("Run `mlane init` to create the index database".to_string())
            }

            Self::AlreadyInitialized { path } => Some(format!(
                "Database already exists at {}. Use `--force` to reinitialize.",
                path.display()
            )),

            Self::VaultNotConfigured => Some(
                "Point MemoryLane at your notes:\n  \
                 mlane config set vault <dir>\n  \
                 or pass --vault <dir> / MLANE_VAULT"
                    .to_string(),
            ),

            Self::InvalidArgument(msg) => {
                if msg.starts_with("Invalid date") {
                    Some("Dates use the YYYY-MM-DD form, e.g. 2024-05-01".to_string())
                } else {
                    None
                }
            }

            Self::DocumentRead { .. }
            | Self::Database(_)
            | Self::Io(_)
            | Self::Json(_)
            | Self::Config(_)
            | Self::Other(_) => None,
        }
    }

    /// Structured JSON representation for machine consumption.
    #[must_use]
    pub fn to_structured_json(&self) -> serde_json::Value {
        let code = self.error_code();
        let mut obj = serde_json::json!({
            "error": {
                "code": code.as_str(),
                "message": self.to_string(),
                "retryable": code.is_retryable(),
                "exit_code": code.exit_code(),
            }
        });

        if let Some(hint) = self.hint() {
            obj["error"]["hint"] = serde_json::Value::String(hint);
        }

        obj
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_unavailable_is_not_retryable() {
        let err = Error::NotInitialized;
        assert_eq!(err.error_code(), ErrorCode::NotInitialized);
        assert_eq!(err.exit_code(), 2);
        assert!(!err.error_code().is_retryable());
        assert!(err.hint().is_some());
    }

    #[test]
    fn test_structured_json_includes_hint() {
        let json = Error::VaultNotConfigured.to_structured_json();
        assert_eq!(json["error"]["code"], "VAULT_NOT_CONFIGURED");
        assert_eq!(json["error"]["exit_code"], 3);
        assert!(json["error"]["hint"].is_string());
    }

    #[test]
    fn test_document_read_error_message() {
        let err = Error::DocumentRead {
            path: "journal/a.md".to_string(),
            message: "invalid UTF-8".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Failed to read document journal/a.md: invalid UTF-8"
        );
        assert!(err.hint().is_none());
    }
}
