//! Monitor Error Types

use storage::StorageError;
use thiserror::Error;

/// Failures of a single collaborator call during a sweep.
///
/// None of these are fatal: the affected sensor or pass is skipped and
/// retried on the next tick.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// Store reported an error
    #[error("Store error: {0}")]
    Storage(#[from] StorageError),

    /// Store did not answer within the per-call budget
    #[error("{operation} timed out after {after_ms}ms")]
    Timeout {
        operation: &'static str,
        after_ms: u64,
    },
}
