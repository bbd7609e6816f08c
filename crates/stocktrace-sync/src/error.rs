//! # Sync Error Types
//!
//! Error types for reconciliation, scan queue, and remote transport.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                      Sync Error Categories                          │
//! │                                                                     │
//! │  ┌─────────────────┐  ┌──────────────────┐  ┌───────────────────┐  │
//! │  │  Configuration  │  │     Remote       │  │     Local         │  │
//! │  │                 │  │                  │  │                   │  │
//! │  │  InvalidConfig  │  │  RemoteUnavail.  │  │  Database         │  │
//! │  │  ConfigLoad/... │  │  RemoteRejected  │  │  Serialization    │  │
//! │  └─────────────────┘  └──────────────────┘  └───────────────────┘  │
//! │                                                                     │
//! │  RemoteUnavailable is the "keep working offline" signal: callers    │
//! │  treat it as a deferral, not a failure.                             │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Sync error type covering configuration, transport, and local store
/// failures.
#[derive(Debug, Error)]
pub enum SyncError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid sync configuration.
    #[error("Invalid sync configuration: {0}")]
    InvalidConfig(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Remote Errors
    // =========================================================================
    /// The remote store could not be reached (connect failure, timeout,
    /// DNS). The row stays local and will be retried on the next cycle.
    #[error("Remote store unavailable: {0}")]
    RemoteUnavailable(String),

    /// The remote store answered but refused the request.
    #[error("Remote store rejected request ({status}): {message}")]
    RemoteRejected { status: u16, message: String },

    // =========================================================================
    // Local Errors
    // =========================================================================
    /// Local database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] stocktrace_db::DbError),

    /// Payload (de)serialization failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SyncError {
    /// Returns true when the failure is connectivity, not data: the
    /// operation should be retried later rather than surfaced as broken
    /// state.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SyncError::RemoteUnavailable(_))
    }
}

impl From<std::io::Error> for SyncError {
    fn from(e: std::io::Error) -> Self {
        SyncError::ConfigLoadFailed(e.to_string())
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(e: toml::de::Error) -> Self {
        SyncError::ConfigLoadFailed(e.to_string())
    }
}

impl From<toml::ser::Error> for SyncError {
    fn from(e: toml::ser::Error) -> Self {
        SyncError::ConfigSaveFailed(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unavailable_is_retryable_rejected_is_not() {
        assert!(SyncError::RemoteUnavailable("timeout".into()).is_retryable());
        assert!(!SyncError::RemoteRejected {
            status: 409,
            message: "duplicate".into()
        }
        .is_retryable());
    }
}
