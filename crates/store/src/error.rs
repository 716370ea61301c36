//! Record store error types.

use common::LraId;
use thiserror::Error;

/// Errors that can occur during record store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No record exists for the given id; either never started or already
    /// evicted. Distinct from any transient fault.
    #[error("LRA not found: {0}")]
    NotFound(LraId),
}

/// Convenience type alias for store results.
pub type Result<T> = std::result::Result<T, StoreError>;
