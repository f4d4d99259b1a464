//! Engine error taxonomy
//!
//! Every public engine operation fails with exactly one [`EngineError`], and
//! every error belongs to one [`ErrorCategory`].

use crate::id::{FolderId, RuleId};
use std::path::PathBuf;
use thiserror::Error;

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Broad class of an engine error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Invalid folder or rule definitions, missing roots, unknown ids
    Configuration,
    /// The OS change-notification channel failed for a folder
    Notification,
    /// A single file could not be processed
    Processing,
    /// Reading or writing persisted configuration failed
    ConfigurationIo,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Configuration => "configuration",
            ErrorCategory::Notification => "notification",
            ErrorCategory::Processing => "processing",
            ErrorCategory::ConfigurationIo => "configuration-io",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised across the engine boundary
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("watched folder not found: {0}")]
    FolderNotFound(FolderId),

    #[error("watched folder already registered: {0}")]
    DuplicateFolder(FolderId),

    #[error("rule {rule} not found in folder {folder}")]
    RuleNotFound { folder: FolderId, rule: RuleId },

    #[error("root path does not exist or is not a directory: {}", .0.display())]
    RootMissing(PathBuf),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("watch failed for folder {folder}: {message}")]
    Notification { folder: FolderId, message: String },

    #[error("failed to process {}: {message}", .path.display())]
    Processing { path: PathBuf, message: String },

    #[error("failed to access {}: {source}", .path.display())]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed configuration in {}: {message}", .path.display())]
    ConfigFormat { path: PathBuf, message: String },
}

impl EngineError {
    /// The category this error belongs to
    pub fn category(&self) -> ErrorCategory {
        match self {
            EngineError::FolderNotFound(_)
            | EngineError::DuplicateFolder(_)
            | EngineError::RuleNotFound { .. }
            | EngineError::RootMissing(_)
            | EngineError::InvalidConfig(_) => ErrorCategory::Configuration,
            EngineError::Notification { .. } => ErrorCategory::Notification,
            EngineError::Processing { .. } => ErrorCategory::Processing,
            EngineError::ConfigIo { .. } | EngineError::ConfigFormat { .. } => {
                ErrorCategory::ConfigurationIo
            }
        }
    }

    /// Shorthand for an I/O failure on a configuration file
    pub fn config_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        EngineError::ConfigIo {
            path: path.into(),
            source,
        }
    }

    /// Shorthand for a parse failure on a configuration file
    pub fn config_format(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        EngineError::ConfigFormat {
            path: path.into(),
            message: message.to_string(),
        }
    }
}
