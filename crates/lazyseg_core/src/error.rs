//! Error types for lazyseg core.

use crate::types::SegmentId;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Boxed source error of a persistence failure.
pub type BoxedSource = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur in container operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Index or position outside the container. No state was changed.
    #[error("index {index} out of range for length {len}")]
    IndexOutOfRange {
        /// The offending index.
        index: usize,
        /// The container length at the time of the call.
        len: usize,
    },

    /// The segment index violates its partition invariant.
    ///
    /// This is an internal fault and never expected in correct operation.
    #[error("corrupt segment index: {message}")]
    CorruptSegmentIndex {
        /// Description of the violation.
        message: String,
    },

    /// The container changed structurally underneath a cursor or splitter.
    #[error("concurrent structural change: expected generation {expected}, found {actual}")]
    ConcurrentStructuralChange {
        /// Generation captured by the cursor.
        expected: u64,
        /// Generation of the container now.
        actual: u64,
    },

    /// Invalid construction argument.
    #[error("invalid configuration: {message}")]
    InvalidConfiguration {
        /// Description of the problem.
        message: String,
    },

    /// The persistence collaborator failed to fetch or store a payload.
    #[error("persistence unavailable for segment {segment}: {source}")]
    PersistenceUnavailable {
        /// Segment whose payload was requested.
        segment: SegmentId,
        /// Underlying failure.
        #[source]
        source: BoxedSource,
    },

    /// Cursor misuse, e.g. removing before the first advance.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of the misuse.
        message: String,
    },
}

impl CoreError {
    /// Creates an index out of range error.
    pub fn index_out_of_range(index: usize, len: usize) -> Self {
        Self::IndexOutOfRange { index, len }
    }

    /// Creates a corrupt segment index error.
    pub fn corrupt_index(message: impl Into<String>) -> Self {
        Self::CorruptSegmentIndex {
            message: message.into(),
        }
    }

    /// Creates a concurrent structural change error.
    pub fn concurrent_change(expected: u64, actual: u64) -> Self {
        Self::ConcurrentStructuralChange { expected, actual }
    }

    /// Creates an invalid configuration error.
    pub fn invalid_configuration(message: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            message: message.into(),
        }
    }

    /// Creates a persistence error for `segment`.
    pub fn persistence(segment: SegmentId, source: impl Into<BoxedSource>) -> Self {
        Self::PersistenceUnavailable {
            segment,
            source: source.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }
}
