//! Error types for the experiment registry
//!
//! Toyota Way: Clear error messages with actionable guidance (Respect for People)

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Registry error types
#[derive(Error, Debug)]
pub enum Error {
    /// Requested record or artifact is absent
    #[error("Not found: {0}")]
    NotFound(String),

    /// Record exists but does not parse into a valid experiment
    #[error("Corrupt record at {key}: {reason}")]
    CorruptRecord {
        /// Experiment key of the offending record
        key: String,
        /// Parse failure detail
        reason: String,
    },

    /// Transport or auth failure talking to a keyed or blob store
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// Failure computing derived info (metric value, log tail)
    #[error("Derived info unavailable: {0}")]
    DerivedInfo(String),

    /// Caller does not own the experiment
    #[error("Permission denied: {identity} cannot write experiment {key}")]
    PermissionDenied {
        /// Experiment key
        key: String,
        /// Identity of the rejected caller
        identity: String,
    },

    /// Invalid argument
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Invalid or unreadable configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Background task panicked or was cancelled
    #[error("Task failed: {0}")]
    TaskFailed(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error outside record parsing
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Coarse classification of an [`Error`].
///
/// Cheap to copy, so per-item results (validation passes, checkpoint
/// reports) can carry it without holding the full error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`Error::NotFound`]
    NotFound,
    /// See [`Error::CorruptRecord`]
    CorruptRecord,
    /// See [`Error::StoreUnavailable`]
    StoreUnavailable,
    /// See [`Error::DerivedInfo`]
    DerivedInfo,
    /// See [`Error::PermissionDenied`]
    PermissionDenied,
    /// Everything else
    Other,
}

impl Error {
    /// Classify this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::CorruptRecord { .. } => ErrorKind::CorruptRecord,
            Self::StoreUnavailable(_) => ErrorKind::StoreUnavailable,
            Self::DerivedInfo(_) => ErrorKind::DerivedInfo,
            Self::PermissionDenied { .. } => ErrorKind::PermissionDenied,
            Self::InvalidInput(_)
            | Self::Config(_)
            | Self::TaskFailed(_)
            | Self::Io(_)
            | Self::Serialization(_) => ErrorKind::Other,
        }
    }

    pub(crate) fn corrupt(key: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::CorruptRecord {
            key: key.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::TaskFailed(err.to_string())
    }
}
