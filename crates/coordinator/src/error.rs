//! Coordinator error types.

use common::LraId;
use store::{LraStatus, StoreError};
use thiserror::Error;

/// Errors surfaced to callers of coordinator operations.
///
/// Participant callback failures never appear here: they are absorbed into
/// participant state and observed through LRA status queries.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    /// Unknown or evicted LRA.
    #[error("LRA not found: {0}")]
    NotFound(LraId),

    /// Unknown participant within a known LRA.
    #[error("participant {endpoint} not enlisted in LRA {lra}")]
    ParticipantNotFound { lra: LraId, endpoint: String },

    /// The LRA is in the wrong state for the requested operation.
    #[error("cannot {op} LRA {lra} in state {status}")]
    InvalidState {
        lra: LraId,
        op: &'static str,
        status: LraStatus,
    },

    /// A participant tried to leave after close/cancel had begun.
    #[error("cannot leave LRA {lra}: end processing already begun")]
    EndAlreadyBegun { lra: LraId },
}

impl From<StoreError> for CoordinatorError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => CoordinatorError::NotFound(id),
        }
    }
}

/// Convenience type alias for coordinator results.
pub type Result<T> = std::result::Result<T, CoordinatorError>;
