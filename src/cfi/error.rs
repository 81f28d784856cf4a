//! CFI error types
//!
//! Every failure is returned to the caller. A wrong address must never be
//! swapped in for the one that was asked for.

use thiserror::Error;

/// Errors produced by the CFI subsystem
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CfiError {
    /// Grammar violation: marker, delimiter or offset encoding
    #[error("Malformed CFI at position {position}: {reason}")]
    MalformedIdentifier { position: usize, reason: String },

    /// A step token that is not a non-negative integer
    #[error("Invalid step index '{token}' at position {position}")]
    InvalidStepIndex { token: String, position: usize },

    /// The operation needs both identifiers to share a base path
    #[error("CFIs have different base paths: {left} vs {right}")]
    IncomparableBase { left: String, right: String },

    /// A range whose endpoint reduces to a path without steps
    #[error("Cannot collapse range {0}: endpoint has no steps")]
    EmptyRangeCollapse(String),
}

impl CfiError {
    pub(crate) fn malformed(position: usize, reason: impl Into<String>) -> Self {
        Self::MalformedIdentifier {
            position,
            reason: reason.into(),
        }
    }
}

/// Result type alias for CFI operations
pub type Result<T> = std::result::Result<T, CfiError>;
