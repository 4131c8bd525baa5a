//! Error types
//!
//! A single error enum shared by the frame, engine and registry layers.
//! `Ok(..)` stands in for the success code of the taxonomy.

use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for processor and registry operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Generic failure
    #[error("operation failed: {0}")]
    Failed(String),

    /// Malformed settings, out-of-range id or bad frame geometry
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Unknown id or name, or an operation the processor type does not implement
    #[error("not found: {0}")]
    NotFound(String),

    /// Duplicate name or occupied slot
    #[error("conflict: {0}")]
    Conflict(String),

    /// Allocation failure
    #[error("out of memory: {0}")]
    OutOfMemory(String),

    /// Non-blocking operation cannot proceed now
    #[error("operation would block")]
    WouldBlock,

    /// Timed wait expired
    #[error("operation timed out")]
    TimedOut,

    /// Processing callback reached natural completion
    #[error("end of stream")]
    EndOfStream,

    /// Idempotent no-op
    #[error("not modified")]
    NotModified,
}

impl Error {
    pub(crate) fn not_found(what: impl Into<String>) -> Self {
        Error::NotFound(what.into())
    }

    pub(crate) fn invalid(what: impl Into<String>) -> Self {
        Error::InvalidArgument(what.into())
    }

    /// Short, stable name of the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Failed(_) => "error",
            Error::InvalidArgument(_) => "invalid_argument",
            Error::NotFound(_) => "not_found",
            Error::Conflict(_) => "conflict",
            Error::OutOfMemory(_) => "out_of_memory",
            Error::WouldBlock => "would_block",
            Error::TimedOut => "timed_out",
            Error::EndOfStream => "end_of_stream",
            Error::NotModified => "not_modified",
        }
    }
}
