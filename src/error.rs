//! Custom error types for plansync.
//!
//! Only two points of a sync run are allowed to fail hard: loading the
//! authoritative model and writing it back. Everything else (missing phase
//! documents, unmatched issues, individual tracker calls) degrades to a
//! warning, so the variants here are deliberately few.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for plansync operations
#[derive(Error, Debug)]
pub enum SyncError {
    // =========================================================================
    // Authoritative Model Errors
    // =========================================================================
    /// The model file does not exist
    #[error("Authoritative model not found: {path}")]
    ModelMissing { path: PathBuf },

    /// The model file exists but could not be read
    #[error("Failed to read authoritative model {path}: {source}")]
    ModelRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The model file is not valid JSON or has the wrong shape
    #[error("Failed to parse authoritative model {path}: {source}")]
    ModelParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Writing the updated model back failed
    #[error("Failed to write authoritative model {path}: {message}")]
    ModelWrite { path: PathBuf, message: String },

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Failed to load configuration
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        path: Option<PathBuf>,
    },

    /// Invalid configuration value
    #[error("Invalid configuration: {field} - {reason}")]
    InvalidConfig { field: String, reason: String },

    // =========================================================================
    // Tracker Errors
    // =========================================================================
    /// Issue tracker operation failed
    #[error("Issue tracker operation failed: {operation} - {message}")]
    Tracker { operation: String, message: String },

    /// Missing required tool
    #[error("Missing required tool: {tool}")]
    MissingTool { tool: String },
}

impl SyncError {
    // =========================================================================
    // Constructor helpers
    // =========================================================================

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            path: None,
        }
    }

    /// Create a configuration error with path
    pub fn config_with_path(message: impl Into<String>, path: PathBuf) -> Self {
        Self::Config {
            message: message.into(),
            path: Some(path),
        }
    }

    /// Create a tracker error
    pub fn tracker(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Tracker {
            operation: operation.into(),
            message: message.into(),
        }
    }

    // =========================================================================
    // Classification helpers
    // =========================================================================

    /// Check if this error must abort a sync run before anything is written
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ModelMissing { .. }
                | Self::ModelRead { .. }
                | Self::ModelParse { .. }
                | Self::ModelWrite { .. }
                | Self::Config { .. }
                | Self::InvalidConfig { .. }
                | Self::MissingTool { .. }
        )
    }

    /// Get error code for exit status
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ModelMissing { .. } | Self::MissingTool { .. } => 6,
            Self::Config { .. } | Self::InvalidConfig { .. } => 7,
            Self::ModelParse { .. } => 8,
            _ => 1,
        }
    }
}

/// Type alias for plansync results
pub type Result<T> = std::result::Result<T, SyncError>;

/// Extension trait for converting anyhow errors to SyncError
pub trait IntoSyncError<T> {
    fn into_sync_tracker(self, operation: &str) -> Result<T>;
}

impl<T, E: Into<anyhow::Error>> IntoSyncError<T> for std::result::Result<T, E> {
    fn into_sync_tracker(self, operation: &str) -> Result<T> {
        self.map_err(|e| SyncError::tracker(operation, e.into().to_string()))
    }
}
