use std::error::Error as StdError;
use std::fmt;
use std::io;

use serde::Serialize;

/// Stable error kinds surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    ValidationError,
    NotFoundError,
    ConflictError,
    NonEmptyDirectoryError,
    SizeLimitExceeded,
    #[serde(rename = "InternalIOError")]
    InternalIoError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ValidationError => "ValidationError",
            ErrorKind::NotFoundError => "NotFoundError",
            ErrorKind::ConflictError => "ConflictError",
            ErrorKind::NonEmptyDirectoryError => "NonEmptyDirectoryError",
            ErrorKind::SizeLimitExceeded => "SizeLimitExceeded",
            ErrorKind::InternalIoError => "InternalIOError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors produced by the storage core.
///
/// Messages only ever carry root-relative paths. [`StoreError::Io`] keeps the
/// underlying cause as its `source` for logging.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("invalid request: {0}")]
    Validation(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("already exists: {0}")]
    Conflict(String),
    #[error("directory '{path}' is not empty ({item_count} item(s))")]
    NonEmptyDirectory { path: String, item_count: usize },
    #[error("upload exceeds the limit of {limit} bytes")]
    SizeLimitExceeded { limit: u64 },
    #[error("upload stream failed: {0}")]
    Interrupted(#[source] Box<dyn StdError + Send + Sync>),
    #[error("storage operation failed: {op}")]
    Io {
        op: &'static str,
        #[source]
        source: io::Error,
    },
}

impl StoreError {
    pub fn io(op: &'static str, source: io::Error) -> Self {
        StoreError::Io { op, source }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::Validation(_) | StoreError::Interrupted(_) => ErrorKind::ValidationError,
            StoreError::NotFound(_) => ErrorKind::NotFoundError,
            StoreError::Conflict(_) => ErrorKind::ConflictError,
            StoreError::NonEmptyDirectory { .. } => ErrorKind::NonEmptyDirectoryError,
            StoreError::SizeLimitExceeded { .. } => ErrorKind::SizeLimitExceeded,
            StoreError::Io { .. } => ErrorKind::InternalIoError,
        }
    }

    /// Message safe to hand to a remote caller.
    pub fn public_message(&self) -> String {
        match self {
            StoreError::Io { .. } => "internal storage error".to_string(),
            other => other.to_string(),
        }
    }
}

/// Helper for attaching an operation name to `io::Result`s.
pub(crate) trait IoContext<T> {
    fn op(self, op: &'static str) -> Result<T, StoreError>;
}

impl<T> IoContext<T> for io::Result<T> {
    fn op(self, op: &'static str) -> Result<T, StoreError> {
        self.map_err(|source| StoreError::io(op, source))
    }
}
